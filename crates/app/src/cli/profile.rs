use canteen::delivery::DeliveryProfile;
use canteen_app::gateways::ProfileService;
use clap::{Args, Subcommand};

use super::Session;

#[derive(Debug, Args)]
pub(crate) struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Debug, Subcommand)]
enum ProfileSubcommand {
    /// Show your delivery details
    Show,
    /// Replace your delivery details (offline only)
    Set(SetProfileArgs),
}

#[derive(Debug, Args)]
struct SetProfileArgs {
    /// Delivery location
    #[arg(long)]
    location: String,

    /// Contact phone
    #[arg(long)]
    phone: String,

    /// Landmark near the location
    #[arg(long)]
    landmark: String,
}

pub(crate) async fn run(command: ProfileCommand, session: &Session) -> Result<(), String> {
    if let ProfileSubcommand::Set(args) = command.command {
        session
            .offline_backend()?
            .set_profile(DeliveryProfile {
                location: args.location,
                phone: args.phone,
                landmark: args.landmark,
                ..DeliveryProfile::default()
            })
            .await;
    }

    let profile = session
        .context
        .profiles
        .get_profile()
        .await
        .map_err(|error| format!("failed to load profile: {error}"))?;

    println!("location: {}", profile.location);
    println!("phone: {}", profile.phone);
    println!("landmark: {}", profile.landmark);
    println!(
        "wallet_balance: {}",
        profile.wallet_balance.display_in(session.currency)
    );

    Ok(())
}
