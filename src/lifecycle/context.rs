use std::sync::Arc;
use tokio::sync::watch;

/// Context handed to module boot functions.
///
/// Cheap to clone. Background work started by a module should select on
/// [`AppContext::shutdown_requested`] to learn when the application begins
/// stopping.
#[derive(Debug, Clone)]
pub struct AppContext {
    service_name: Arc<str>,
    shutdown: watch::Receiver<bool>,
}

impl AppContext {
    pub(crate) fn new(service_name: &str, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            service_name: Arc::from(service_name),
            shutdown,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once the application starts stopping.
    pub async fn shutdown_requested(&self) {
        let mut shutdown = self.shutdown.clone();
        // A dropped sender means the lifecycle manager is gone.
        let _ = shutdown.wait_for(|requested| *requested).await;
    }
}
