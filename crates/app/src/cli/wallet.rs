use canteen::money::Amount;
use canteen_app::gateways::WalletGateway;
use clap::{Args, Subcommand};

use super::Session;

#[derive(Debug, Args)]
pub(crate) struct WalletCommand {
    #[command(subcommand)]
    command: WalletSubcommand,
}

#[derive(Debug, Subcommand)]
enum WalletSubcommand {
    /// Show the current balance
    Balance,
    /// Add money to the wallet (offline only)
    Deposit(DepositArgs),
}

#[derive(Debug, Args)]
struct DepositArgs {
    /// Amount in minor units
    #[arg(long)]
    amount: u64,
}

pub(crate) async fn run(command: WalletCommand, session: &Session) -> Result<(), String> {
    let balance = match command.command {
        WalletSubcommand::Balance => session
            .context
            .wallet
            .balance(&session.context.account)
            .await
            .map_err(|error| format!("failed to read balance: {error}"))?,
        WalletSubcommand::Deposit(DepositArgs { amount }) => session
            .offline_backend()?
            .deposit(Amount::new(amount))
            .await
            .map_err(|error| format!("failed to deposit: {error}"))?,
    };

    println!("balance: {}", balance.display_in(session.currency));

    Ok(())
}
