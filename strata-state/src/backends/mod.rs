//! Backend implementations for state storage

mod local;

pub use local::LocalBackend;

use strata_core::config::BackendSettings;

use crate::backend::{BackendError, BackendResult, StateBackend};

/// Create the configured backend; without a `backend` block the local
/// backend with its default path is used
pub fn create_backend(settings: Option<&BackendSettings>) -> BackendResult<Box<dyn StateBackend>> {
    let Some(settings) = settings else {
        return Ok(Box::new(LocalBackend::new()));
    };
    match settings.backend_type.as_str() {
        "local" => Ok(Box::new(LocalBackend::from_settings(settings))),
        other => Err(BackendError::UnsupportedBackend(other.to_string())),
    }
}
