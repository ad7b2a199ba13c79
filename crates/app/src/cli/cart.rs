use canteen::{cart::Meal, money::Amount, summary::cart_table};
use clap::{Args, Subcommand};

use super::Session;

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    /// Show every restaurant's lines and subtotals
    Show,
    /// Add a meal, summing quantities with an existing line
    Add(AddArgs),
    /// Replace a meal's quantity; zero or less removes it
    Set(SetArgs),
    /// Remove a meal, or a whole restaurant's lines
    Remove(RemoveArgs),
    /// Empty the cart
    Clear,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Restaurant identifier
    #[arg(long)]
    restaurant: String,

    /// Meal identifier
    #[arg(long)]
    meal: String,

    /// Unit price in minor units
    #[arg(long)]
    price: u64,

    /// Display name
    #[arg(long)]
    name: Option<String>,

    /// Mark as an add-on that cannot be ordered alone
    #[arg(long)]
    add_on: bool,

    /// Quantity to add
    #[arg(long, default_value_t = 1)]
    quantity: u32,
}

#[derive(Debug, Args)]
struct SetArgs {
    /// Meal identifier
    #[arg(long)]
    meal: String,

    /// New quantity
    #[arg(long, allow_negative_numbers = true)]
    quantity: i64,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    /// Meal identifier
    #[arg(long, required_unless_present = "restaurant", conflicts_with = "restaurant")]
    meal: Option<String>,

    /// Restaurant whose lines should all be removed
    #[arg(long)]
    restaurant: Option<String>,
}

pub(crate) fn run(command: CartCommand, session: &Session) -> Result<(), String> {
    let mut cart = session.cart()?;

    let result = match command.command {
        CartSubcommand::Show => Ok(()),
        CartSubcommand::Add(args) => {
            let mut meal = Meal::new(args.meal, args.restaurant, Amount::new(args.price));
            if let Some(name) = args.name {
                meal = meal.named(name);
            }
            if args.add_on {
                meal = meal.add_on();
            }

            cart.add_item(meal, args.quantity)
        }
        CartSubcommand::Set(args) => cart.update_quantity(&args.meal, args.quantity),
        CartSubcommand::Remove(RemoveArgs {
            meal: Some(meal), ..
        }) => cart.remove_item(&meal),
        CartSubcommand::Remove(RemoveArgs {
            restaurant: Some(restaurant),
            ..
        }) => cart.remove_restaurant(&restaurant),
        CartSubcommand::Remove(_) => return Err("nothing to remove".to_string()),
        CartSubcommand::Clear => cart.clear(),
    };

    result.map_err(|error| format!("failed to update cart: {error}"))?;

    if cart.cart().is_empty() {
        println!("cart is empty");
        return Ok(());
    }

    println!("{}", cart_table(cart.cart(), session.currency));

    for restaurant in cart.cart().restaurants() {
        let subtotal = cart
            .subtotal(restaurant)
            .map_err(|error| format!("failed to total {restaurant}: {error}"))?;

        println!(
            "subtotal {restaurant}: {}",
            subtotal.display_in(session.currency)
        );
    }

    println!("items: {}", cart.item_count());

    Ok(())
}
