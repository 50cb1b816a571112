pub mod empresa;
pub mod responses;

pub use empresa::{EmpresaForm, EmpresaResponse};
pub use responses::{CreatedResponse, ErrorResponse, StatusResponse};
