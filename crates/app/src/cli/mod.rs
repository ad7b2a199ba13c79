use std::{path::PathBuf, sync::Arc};

use canteen::cart::{CartStore, FileCartStorage};
use canteen_app::{config::AppConfig, context::AppContext, local::LocalBackend, observability};
use clap::{Parser, Subcommand};
use rusty_money::iso::Currency;

mod cart;
mod checkout;
mod order;
mod profile;
mod wallet;

#[derive(Debug, Parser)]
#[command(name = "canteen", about = "Canteen ordering CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Cart(cart::CartCommand),
    Checkout(checkout::CheckoutArgs),
    Order(order::OrderCommand),
    Wallet(wallet::WalletCommand),
    Profile(profile::ProfileCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        observability::init(&self.config.logging)
            .map_err(|error| format!("failed to initialise logging: {error}"))?;

        let session = Session::open(&self.config).await?;

        let result = match self.command {
            Commands::Cart(command) => cart::run(command, &session),
            Commands::Checkout(args) => checkout::run(args, &session).await,
            Commands::Order(command) => order::run(command, &session).await,
            Commands::Wallet(command) => wallet::run(command, &session).await,
            Commands::Profile(command) => profile::run(command, &session).await,
        };

        session.close().await?;

        result
    }
}

/// Everything a command needs, built once from configuration.
pub(crate) struct Session {
    pub(crate) context: AppContext,
    pub(crate) currency: &'static Currency,
    cart_path: PathBuf,
    local: Option<(Arc<LocalBackend>, PathBuf)>,
}

impl Session {
    async fn open(config: &AppConfig) -> Result<Self, String> {
        let currency = config.currency().map_err(|error| error.to_string())?;

        let (context, local) = if config.offline {
            let backend = LocalBackend::load(config.account.clone(), &config.offline_state)
                .await
                .map_err(|error| format!("failed to load offline state: {error}"))?;
            let backend = Arc::new(backend);

            (
                AppContext::offline(backend.clone()),
                Some((backend, config.offline_state.clone())),
            )
        } else {
            (
                AppContext::from_config(config).map_err(|error| error.to_string())?,
                None,
            )
        };

        Ok(Self {
            context,
            currency,
            cart_path: config.cart_path.clone(),
            local,
        })
    }

    pub(crate) fn cart(&self) -> Result<CartStore<FileCartStorage>, String> {
        CartStore::open(FileCartStorage::new(&self.cart_path))
            .map_err(|error| format!("failed to open cart: {error}"))
    }

    pub(crate) fn offline_backend(&self) -> Result<&LocalBackend, String> {
        self.local
            .as_ref()
            .map(|(backend, _)| backend.as_ref())
            .ok_or_else(|| "only available with --offline".to_string())
    }

    async fn close(self) -> Result<(), String> {
        let Some((backend, path)) = self.local else {
            return Ok(());
        };

        backend
            .save(&path)
            .await
            .map_err(|error| format!("failed to save offline state: {error}"))
    }
}
