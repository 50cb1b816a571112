//! Event type definitions.

use crate::entities::Empresa;
use std::fmt;

/// A change to an empresa record, rendered as the plain-text message that
/// goes on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmpresaEvent {
    Created { nome_fantasia: String },
    Updated { nome_fantasia: String },
    /// The name is empty when the record could not be read before deletion.
    Deleted { nome_fantasia: String },
}

impl EmpresaEvent {
    pub fn deleted(previous: Option<&Empresa>) -> Self {
        Self::Deleted {
            nome_fantasia: previous
                .map(|e| e.fields.nome_fantasia.clone())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for EmpresaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmpresaEvent::Created { nome_fantasia } => {
                write!(f, "Cadastro de EMPRESA {nome_fantasia}")
            }
            EmpresaEvent::Updated { nome_fantasia } => {
                write!(f, "Edição da EMPRESA {nome_fantasia}")
            }
            EmpresaEvent::Deleted { nome_fantasia } => {
                write!(f, "Exclusão da EMPRESA {nome_fantasia}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_messages() {
        let name = || "Loja X".to_string();
        assert_eq!(
            EmpresaEvent::Created { nome_fantasia: name() }.to_string(),
            "Cadastro de EMPRESA Loja X"
        );
        assert_eq!(
            EmpresaEvent::Updated { nome_fantasia: name() }.to_string(),
            "Edição da EMPRESA Loja X"
        );
        assert_eq!(
            EmpresaEvent::deleted(None).to_string(),
            "Exclusão da EMPRESA "
        );
    }
}
