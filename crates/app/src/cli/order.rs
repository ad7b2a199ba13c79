use canteen::{
    money::Amount,
    orders::{Order, OrderStatus, OrderUuid, Party},
    summary::order_table,
};
use canteen_app::orders::{NextStep, OrderServiceError, OrdersService};
use clap::{Args, Subcommand, ValueEnum};
use rusty_money::iso::Currency;

use super::Session;

#[derive(Debug, Args)]
pub(crate) struct OrderCommand {
    #[command(subcommand)]
    command: OrderSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrderSubcommand {
    /// List your orders
    List,
    /// Show one order and whether your wallet covers it
    Show(IdArgs),
    /// Restaurant: accept, optionally setting a fee within the authorized limit
    Confirm(ConfirmArgs),
    /// Restaurant: propose a fee; above the limit it goes to the customer
    RequestFee(RequestFeeArgs),
    /// Restaurant: turn the order down
    Reject(IdArgs),
    /// Restaurant: mark the order delivered
    Deliver(IdArgs),
    /// Customer: accept the requested fee
    Accept(IdArgs),
    /// Customer: decline the requested fee
    Decline(IdArgs),
    /// Close the order
    Cancel(CancelArgs),
}

#[derive(Debug, Args)]
struct IdArgs {
    /// Order UUID
    id: OrderUuid,
}

#[derive(Debug, Args)]
struct ConfirmArgs {
    /// Order UUID
    id: OrderUuid,

    /// Fee in minor units; defaults to the current fee
    #[arg(long)]
    fee: Option<u64>,
}

#[derive(Debug, Args)]
struct RequestFeeArgs {
    /// Order UUID
    id: OrderUuid,

    /// Proposed fee in minor units
    #[arg(long)]
    fee: u64,

    /// Why the fee is needed
    #[arg(long, default_value = "")]
    description: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Side {
    Customer,
    Restaurant,
}

impl From<Side> for Party {
    fn from(side: Side) -> Self {
        match side {
            Side::Customer => Party::Customer,
            Side::Restaurant => Party::Restaurant,
        }
    }
}

#[derive(Debug, Args)]
struct CancelArgs {
    /// Order UUID
    id: OrderUuid,

    /// Who is canceling
    #[arg(long = "as", value_enum, default_value_t = Side::Customer)]
    side: Side,
}

pub(crate) async fn run(command: OrderCommand, session: &Session) -> Result<(), String> {
    let orders = session.context.orders();

    let (id, result) = match command.command {
        OrderSubcommand::List => return list(&orders, session.currency).await,
        OrderSubcommand::Show(IdArgs { id }) => return show(&orders, id, session.currency).await,
        OrderSubcommand::Confirm(ConfirmArgs { id, fee }) => {
            (id, orders.confirm(id, fee.map(Amount::new)).await)
        }
        OrderSubcommand::RequestFee(RequestFeeArgs {
            id,
            fee,
            description,
        }) => (
            id,
            orders.request_fee(id, Amount::new(fee), description).await,
        ),
        OrderSubcommand::Reject(IdArgs { id }) => (id, orders.reject(id).await),
        OrderSubcommand::Deliver(IdArgs { id }) => (id, orders.mark_delivered(id).await),
        OrderSubcommand::Accept(IdArgs { id }) => (id, orders.accept_fee(id).await),
        OrderSubcommand::Decline(IdArgs { id }) => (id, orders.decline_fee(id).await),
        OrderSubcommand::Cancel(CancelArgs { id, side }) => {
            (id, orders.cancel(id, side.into()).await)
        }
    };

    let order = result.map_err(|error| describe(id, &error, session.currency))?;

    print_order(&order, session.currency);

    Ok(())
}

async fn list(orders: &OrdersService, currency: &'static Currency) -> Result<(), String> {
    let all = orders
        .refresh_all()
        .await
        .map_err(|error| format!("failed to list orders: {error}"))?;

    if all.is_empty() {
        println!("no orders yet");
        return Ok(());
    }

    for order in all {
        println!(
            "{}  {:<13}  {}  {}",
            order.id,
            order.status,
            order.restaurant_id,
            order.total_price.display_in(currency)
        );
    }

    Ok(())
}

async fn show(
    orders: &OrdersService,
    id: OrderUuid,
    currency: &'static Currency,
) -> Result<(), String> {
    let order = orders
        .refresh(id)
        .await
        .map_err(|error| describe(id, &error, currency))?;

    print_order(&order, currency);

    match orders.affordability(&order).await {
        Ok(Some(hint)) if hint.covers() => {
            println!(
                "wallet: {} covers {}",
                hint.balance.display_in(currency),
                hint.required.display_in(currency)
            );
        }
        Ok(Some(hint)) => {
            println!(
                "wallet: {} is short of {}; top up {}",
                hint.balance.display_in(currency),
                hint.required.display_in(currency),
                hint.top_up().display_in(currency)
            );
        }
        Ok(None) => {}
        Err(error) => println!("wallet: unavailable ({error})"),
    }

    Ok(())
}

fn print_order(order: &Order, currency: &'static Currency) {
    println!("{}", order_table(order, currency));

    if order.status == OrderStatus::FeeRequested {
        println!(
            "waiting for the customer: `canteen order accept {0}` or `canteen order decline {0}`",
            order.id
        );
    }
}

fn describe(id: OrderUuid, error: &OrderServiceError, currency: &'static Currency) -> String {
    let hint = match error.next_step() {
        Some(NextStep::TopUp { amount }) => format!(
            "\nthe order was canceled; top up at least {} and order again",
            amount.display_in(currency)
        ),
        Some(NextStep::SendForApproval { fee }) => format!(
            "\nsend it for approval: canteen order request-fee {id} --fee {}",
            fee.minor_units()
        ),
        Some(NextStep::Retry) => "\nthe order was not changed; try again".to_string(),
        None => String::new(),
    };

    format!("{error}{hint}")
}
