//! Input validation for empresa records.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cnpj obrigatório")]
    MissingCnpj,
}

/// Checks the CNPJ. Only presence is enforced for now; checksum validation
/// can be added here without touching callers.
pub fn validate_cnpj(cnpj: &str) -> Result<(), ValidationError> {
    if cnpj.trim().is_empty() {
        return Err(ValidationError::MissingCnpj);
    }
    Ok(())
}
