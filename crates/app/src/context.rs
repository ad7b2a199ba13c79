//! App Context

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::{
    checkout::CheckoutService,
    config::AppConfig,
    gateways::{GatewayError, OrderEndpoint, ProfileService, RecipientLookup, WalletGateway},
    http::HttpGateway,
    local::{LocalBackend, LocalStateError},
    orders::OrdersService,
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("no API URL configured; set CANTEEN_API_URL or use --offline")]
    MissingApiUrl,

    #[error("unknown currency code {0:?}")]
    UnknownCurrency(String),

    #[error("failed to build the HTTP client")]
    Http(#[source] GatewayError),

    #[error("failed to load offline state")]
    LocalState(#[from] LocalStateError),

    #[error("failed to install the log subscriber")]
    Observability(#[from] TryInitError),
}

/// The collaborators every service is built from.
#[derive(Clone)]
pub struct AppContext {
    pub account: String,
    pub profiles: Arc<dyn ProfileService>,
    pub recipients: Arc<dyn RecipientLookup>,
    pub orders: Arc<dyn OrderEndpoint>,
    pub wallet: Arc<dyn WalletGateway>,
}

impl AppContext {
    /// Uses one backend for every collaborator.
    pub fn from_backend<B>(account: impl Into<String>, backend: Arc<B>) -> Self
    where
        B: ProfileService + RecipientLookup + OrderEndpoint + WalletGateway + 'static,
    {
        Self {
            account: account.into(),
            profiles: backend.clone(),
            recipients: backend.clone(),
            orders: backend.clone(),
            wallet: backend,
        }
    }

    /// Build application context against the REST backend.
    ///
    /// # Errors
    ///
    /// Returns an error when no API URL is configured or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppInitError> {
        let gateway = HttpGateway::new(config.http_config()?).map_err(AppInitError::Http)?;

        Ok(Self::from_backend(config.account.clone(), Arc::new(gateway)))
    }

    /// Build application context against an in-process backend.
    pub fn offline(backend: Arc<LocalBackend>) -> Self {
        Self::from_backend(backend.account().to_string(), backend)
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(
            self.profiles.clone(),
            self.recipients.clone(),
            self.orders.clone(),
        )
    }

    #[must_use]
    pub fn orders(&self) -> OrdersService {
        OrdersService::new(self.orders.clone(), self.wallet.clone(), self.account.clone())
    }
}
