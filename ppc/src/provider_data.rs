//! Provider data structure passed to resources and data sources

use crate::api::Client;
use crate::waiter::Waiter;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tfplug::types::Diagnostic;

#[derive(Clone)]
pub struct PpcProviderData {
    pub client: Arc<Client>,
    /// Fixed delay and poll interval for every waiter, `None` in production
    pub poll_override: Option<Duration>,
}

impl PpcProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            poll_override: None,
        }
    }

    pub fn with_poll_override(mut self, every: Duration) -> Self {
        self.poll_override = Some(every);
        self
    }

    /// Applies the poll override, if any, to a waiter built by a handler
    pub fn tune(&self, waiter: Waiter) -> Waiter {
        waiter.poll_override(self.poll_override)
    }

    /// Downcasts the opaque data handed to `configure`. `kind` names the
    /// receiver in the diagnostic, e.g. "resource" or "data source".
    pub fn from_configure(
        data: Option<Arc<dyn Any + Send + Sync>>,
        kind: &str,
    ) -> Result<Self, Diagnostic> {
        let Some(data) = data else {
            tracing::warn!("No provider data provided to {}", kind);
            return Err(Diagnostic::error(
                "No provider data",
                format!("No provider data was provided to the {}", kind),
            ));
        };

        match data.downcast_ref::<PpcProviderData>() {
            Some(provider_data) => Ok(provider_data.clone()),
            None => {
                tracing::error!("Failed to downcast provider data to PpcProviderData");
                Err(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract PpcProviderData from provider data",
                ))
            }
        }
    }
}
