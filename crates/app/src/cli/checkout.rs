use canteen::{
    checkout::{CheckoutError, DEFAULT_AUTHORIZED_FEE},
    delivery::{ExternalRecipient, RecipientOverrides},
    money::Amount,
    summary::order_table,
};
use canteen_app::checkout::{CheckoutOptions, CheckoutServiceError, Recipient};
use clap::{ArgGroup, Args};

use super::Session;

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("recipient").args(["to_user", "external_name"])))]
pub(crate) struct CheckoutArgs {
    /// Restaurant whose cart lines should be ordered
    #[arg(long)]
    restaurant: String,

    /// Most you agree to pay for delivery, packaging and other costs, in minor units
    #[arg(long, default_value_t = DEFAULT_AUTHORIZED_FEE.minor_units())]
    fee: u64,

    /// Note for the restaurant
    #[arg(long, default_value = "")]
    note: String,

    /// Deliver to another account
    #[arg(long)]
    to_user: Option<String>,

    /// Deliver to someone without an account
    #[arg(long)]
    external_name: Option<String>,

    /// Recipient location
    #[arg(long, requires = "recipient")]
    location: Option<String>,

    /// Recipient phone
    #[arg(long, requires = "recipient")]
    phone: Option<String>,

    /// Recipient landmark
    #[arg(long, requires = "recipient")]
    landmark: Option<String>,

    /// Recipient email, for recipients without an account
    #[arg(long, requires = "external_name")]
    email: Option<String>,
}

impl CheckoutArgs {
    fn recipient(&self) -> Recipient {
        if let Some(username) = &self.to_user {
            return Recipient::Registered {
                username: username.clone(),
                overrides: RecipientOverrides {
                    location: self.location.clone(),
                    phone: self.phone.clone(),
                    landmark: self.landmark.clone(),
                },
            };
        }

        if let Some(name) = &self.external_name {
            return Recipient::External(ExternalRecipient {
                name: name.clone(),
                phone: self.phone.clone().unwrap_or_default(),
                email: self.email.clone(),
                location: self.location.clone().unwrap_or_default(),
                landmark: self.landmark.clone(),
            });
        }

        Recipient::Myself
    }
}

pub(crate) async fn run(args: CheckoutArgs, session: &Session) -> Result<(), String> {
    let mut cart = session.cart()?;

    let options = CheckoutOptions {
        recipient: args.recipient(),
        restaurant_id: args.restaurant,
        authorized_fee: Amount::new(args.fee),
        note: args.note,
    };

    let order = session
        .context
        .checkout()
        .checkout(&mut cart, options)
        .await
        .map_err(|error| match error {
            CheckoutServiceError::Checkout(CheckoutError::ProfileIncomplete { .. }) => {
                format!("{error}\nrun `canteen profile set` to add your delivery details")
            }
            error => format!("checkout failed: {error}"),
        })?;

    println!("{}", order_table(&order, session.currency));
    println!("order_id: {}", order.id);
    println!("the restaurant will confirm or ask you to approve a higher fee");

    Ok(())
}
