//! HTTP server setup.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::{AppState, EventsState};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use matriz_sdk::EVENTS_PATH;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Largest request body the API reads, multipart included.
pub const MAX_BODY_BYTES: usize = 10 << 20;

/// How long in-flight requests get to finish after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Build the CRUD API router.
///
/// Route structure:
/// - `GET /health` - Health check
/// - `/api/empresas` - Empresa CRUD (form encoded requests, JSON responses)
pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health_check))
        .nest("/api", api::empresas::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Build the events router.
///
/// Route structure:
/// - `GET /health` - Health check with the live subscriber count
/// - `GET /ws/events` - WebSocket stream of event notifications
pub fn build_events_router(state: EventsState) -> Router {
    Router::new()
        .route("/health", get(api::events::health_check))
        .route(EVENTS_PATH, get(api::events::events_ws))
        .with_state(state)
}

/// Bind `addr` and serve `router` until SIGINT or SIGTERM.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    run_server_until(router, addr, shutdown_signal()).await
}

/// Like [`run_server`], stopping on `signal` instead.
pub async fn run_server_until<F>(
    router: Router,
    addr: SocketAddr,
    signal: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);
    serve_until(listener, router, signal).await
}

/// Serve until `signal` completes, then give in-flight requests
/// [`SHUTDOWN_GRACE`] to finish before dropping them.
pub async fn serve_until<F>(
    listener: TcpListener,
    router: Router,
    signal: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        signal.await;
        let _ = stop_tx.send(());
    });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => return result.map_err(std::io::Error::other)?,
        _ = stop_rx => {}
    }

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(result) => result.map_err(std::io::Error::other)?,
        Err(_) => {
            tracing::warn!(
                "Connections still open after {:?}, forcing shutdown",
                SHUTDOWN_GRACE
            );
            server.abort();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use matriz_core::hub::Hub;
    use matriz_core::processors::EmpresaService;
    use matriz_core::events::Notifier;
    use matriz_core::store::MemoryEmpresaStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn api_router() -> Router {
        let service = EmpresaService::new(Arc::new(MemoryEmpresaStore::new()), Notifier::disabled());
        build_api_router(AppState::new(service))
    }

    #[tokio::test]
    async fn test_api_health() {
        let response = api_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_events_health_reports_subscribers() {
        let (hub, _task) = Hub::spawn(4);
        let _sub = hub.subscribe().await.unwrap();
        let response = build_events_router(EventsState::new(hub, vec![]))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["subscribers"], 1);
    }

    /// Publishes straight into a hub, standing in for the broker.
    struct HubPublisher(matriz_core::hub::HubHandle);

    #[async_trait::async_trait]
    impl matriz_core::events::EventPublisher for HubPublisher {
        async fn publish(&self, message: &str) -> Result<(), matriz_core::events::PublishError> {
            let _ = self.0.broadcast(message.to_string()).await;
            Ok(())
        }
    }

    async fn spawn(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        addr
    }

    #[tokio::test]
    async fn test_crud_changes_reach_event_subscribers() {
        use matriz_sdk::client::{EmpresaClient, EventStream};
        use matriz_sdk::objects::EmpresaForm;
        use url::Url;

        let (hub, _task) = Hub::spawn(8);
        let events_addr = spawn(build_events_router(EventsState::new(hub.clone(), vec![]))).await;
        let notifier = Notifier::new(Some(
            Arc::new(HubPublisher(hub.clone())) as Arc<dyn matriz_core::events::EventPublisher>,
        ));
        let service = EmpresaService::new(Arc::new(MemoryEmpresaStore::new()), notifier);
        let api_addr = spawn(build_api_router(AppState::new(service))).await;

        let mut events = EventStream::connect(&Url::parse(&format!("ws://{events_addr}")).unwrap())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.subscriber_count().await.unwrap() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let client = EmpresaClient::new(Url::parse(&format!("http://{api_addr}")).unwrap());
        let mut form = EmpresaForm {
            cnpj: "12345678000199".into(),
            nome_fantasia: "Loja X".into(),
            num_funcionarios: 150,
            ..EmpresaForm::default()
        };
        let id = client.create(&form).await.unwrap();
        assert_eq!(
            events.next_event().await.unwrap().as_deref(),
            Some("Cadastro de EMPRESA Loja X")
        );

        let fetched = client.get(&id).await.unwrap();
        assert_eq!(fetched.num_funcionarios, 150);

        form.nome_fantasia = "Loja Y".into();
        client.update(&id, &form).await.unwrap();
        assert_eq!(
            events.next_event().await.unwrap().as_deref(),
            Some("Edição da EMPRESA Loja Y")
        );

        let err = client.create(&form).await.unwrap_err();
        assert!(err.to_string().contains("cnpj já cadastrado"), "{err}");

        client.delete(&id).await.unwrap();
        assert_eq!(
            events.next_event().await.unwrap().as_deref(),
            Some("Exclusão da EMPRESA Loja Y")
        );
        assert!(client.list().await.unwrap().is_empty());
        events.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_until_stops_on_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_until(listener, api_router(), async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
