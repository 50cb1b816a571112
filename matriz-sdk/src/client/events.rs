//! Live event stream client.

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::EVENTS_PATH;

/// A connection to the events server's `/ws/events` endpoint.
///
/// Each server push is one raw event string, e.g.
/// `"Cadastro de EMPRESA Loja X"`.
pub struct EventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventStream {
    /// Connect to `base_url` (`ws://` or `wss://`).
    pub async fn connect(base_url: &Url) -> Result<Self, ClientError> {
        let url = base_url.join(EVENTS_PATH)?;
        let (socket, _response) = connect_async(url.as_str()).await?;
        Ok(Self { socket })
    }

    /// Next event text. `Ok(None)` once the server closes the connection.
    ///
    /// Control frames are handled internally and skipped.
    pub async fn next_event(&mut self) -> Result<Option<String>, ClientError> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(data) => {
                    return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
                }
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    /// Close the connection politely.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
