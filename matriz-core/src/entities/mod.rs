pub mod empresa;

pub use empresa::{Empresa, EmpresaFields, EmpresaId, EmpresaKey};
