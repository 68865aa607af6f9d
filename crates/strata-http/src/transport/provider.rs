//! Process-wide transport handle

use std::sync::{Arc, OnceLock};

use super::{ReqwestTransport, TransportHandle};
use crate::error::HttpError;
use crate::response::Response;

static INSTANCE: OnceLock<TransportHandle> = OnceLock::new();

/// Supplies the shared transport handle
///
/// The first call to [`TransportProvider::instance`] constructs a
/// [`ReqwestTransport`]; every later call returns the same handle. The handle
/// lives for the rest of the process.
#[derive(Debug, Clone, Copy)]
pub struct TransportProvider;

impl TransportProvider {
    /// Get the shared handle, creating it on first use
    pub fn instance() -> TransportHandle {
        INSTANCE
            .get_or_init(|| {
                tracing::debug!("Creating shared transport");
                Arc::new(ReqwestTransport::new())
            })
            .clone()
    }

    /// Install `handle` as the shared transport
    ///
    /// Fails when a handle was already created or installed.
    pub fn install(handle: TransportHandle) -> Response<()> {
        INSTANCE
            .set(handle)
            .map_err(|_| HttpError::Config("shared transport is already initialized".into()))
    }

    /// Whether the shared handle exists yet
    pub fn is_initialized() -> bool {
        INSTANCE.get().is_some()
    }
}
