//! Command parsing and execution.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use dairydesk_core::api::{OrderGateway, QuantitySource, Repository};
use dairydesk_core::cache::EntityCache;
use dairydesk_core::cart::CartStore;
use dairydesk_core::checkout::{CheckoutOrchestrator, CheckoutOutcome, PaymentCapture};
use dairydesk_core::config::Config;
use dairydesk_core::filter::ListView;
use dairydesk_core::models::{
    Customer, Entity, EntityKind, MilkDelivery, Order, Payment, Product, QuantityCategory,
};
use dairydesk_core::notify::{Notification, Notifier};
use dairydesk_core::quantities::{QuantityBroadcaster, QuantitySnapshot};
use dairydesk_core::storage::{FileStore, KeyValueStore};
use dairydesk_core::utils::format_amount;
use dairydesk_core::ApiClient;
use tokio::sync::mpsc;
use tracing::debug;

use crate::prompt::StdinPayment;
use crate::table::{self, TableRow};

pub const USAGE: &str = "\
Usage: dairydesk <command> [options]

Lists:
  customers|products|deliveries|payments|orders [--search TERM] [--filter NAME=VALUE]...
  filters <list>              Show the filters a list accepts
  create <list> <JSON>        Create a record
  update <list> <JSON>        Update a record (JSON must carry its id)
  delete <list> <ID>          Delete a record

Stock:
  stock [--watch N]           Show stock levels, then wait for N background refreshes

Cart:
  cart [show]                 Show the cart
  cart add|remove|inc|dec ID  Change the cart
  cart clear                  Empty the cart

Checkout:
  checkout [--customer ID]    Place an order for the cart

Environment: DAIRYDESK_API_URL, DAIRYDESK_TOKEN, RUST_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartCommand {
    Show,
    Add(i64),
    Remove(i64),
    Inc(i64),
    Dec(i64),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List {
        kind: EntityKind,
        search: Option<String>,
        filters: Vec<(String, String)>,
    },
    Filters(EntityKind),
    Create(EntityKind, String),
    Update(EntityKind, String),
    Delete(EntityKind, i64),
    Stock {
        watch: u32,
    },
    Cart(CartCommand),
    Checkout {
        customer: Option<i64>,
    },
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_id(raw: Option<&String>, what: &str) -> Result<i64> {
    let raw = raw.ok_or_else(|| anyhow!("Missing {}", what))?;
    raw.parse()
        .map_err(|_| anyhow!("Invalid {} '{}'", what, raw))
}

fn parse_kind(raw: Option<&String>) -> Result<EntityKind> {
    let raw = raw.ok_or_else(|| anyhow!("Missing list name"))?;
    EntityKind::parse(raw).ok_or_else(|| anyhow!("Unknown list '{}'", raw))
}

/// Value following `flag`, advancing the cursor past it.
fn flag_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a String> {
    *i += 1;
    args.get(*i)
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((head, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };
        match head.as_str() {
            "help" | "-h" | "--help" => Ok(Command::Help),
            "filters" => Ok(Command::Filters(parse_kind(rest.first())?)),
            "create" | "update" => {
                let kind = parse_kind(rest.first())?;
                let json = rest
                    .get(1)
                    .cloned()
                    .ok_or_else(|| anyhow!("Missing JSON record"))?;
                Ok(if head == "create" {
                    Command::Create(kind, json)
                } else {
                    Command::Update(kind, json)
                })
            }
            "delete" => Ok(Command::Delete(
                parse_kind(rest.first())?,
                parse_id(rest.get(1), "id")?,
            )),
            "stock" => {
                let mut watch = 0;
                let mut i = 0;
                while i < rest.len() {
                    match rest[i].as_str() {
                        "--watch" => {
                            let raw = flag_value(rest, &mut i, "--watch")?;
                            watch = raw
                                .parse()
                                .map_err(|_| anyhow!("Invalid refresh count '{}'", raw))?;
                        }
                        other => bail!("Unknown option '{}'", other),
                    }
                    i += 1;
                }
                Ok(Command::Stock { watch })
            }
            "cart" => {
                let action = rest.first().map(String::as_str).unwrap_or("show");
                let cart = match action {
                    "show" => CartCommand::Show,
                    "clear" => CartCommand::Clear,
                    "add" => CartCommand::Add(parse_id(rest.get(1), "product id")?),
                    "remove" => CartCommand::Remove(parse_id(rest.get(1), "product id")?),
                    "inc" => CartCommand::Inc(parse_id(rest.get(1), "product id")?),
                    "dec" => CartCommand::Dec(parse_id(rest.get(1), "product id")?),
                    other => bail!("Unknown cart action '{}'", other),
                };
                Ok(Command::Cart(cart))
            }
            "checkout" => {
                let mut customer = None;
                let mut i = 0;
                while i < rest.len() {
                    match rest[i].as_str() {
                        "--customer" => {
                            customer = Some(parse_id(
                                Some(flag_value(rest, &mut i, "--customer")?),
                                "customer id",
                            )?);
                        }
                        other => bail!("Unknown option '{}'", other),
                    }
                    i += 1;
                }
                Ok(Command::Checkout { customer })
            }
            other => {
                let kind =
                    EntityKind::parse(other).ok_or_else(|| anyhow!("Unknown command '{}'", other))?;
                let mut search = None;
                let mut filters = Vec::new();
                let mut i = 0;
                while i < rest.len() {
                    match rest[i].as_str() {
                        "--search" => search = Some(flag_value(rest, &mut i, "--search")?.clone()),
                        "--filter" => {
                            let raw = flag_value(rest, &mut i, "--filter")?;
                            let (name, value) = raw
                                .split_once('=')
                                .ok_or_else(|| anyhow!("Filter must look like NAME=VALUE, got '{}'", raw))?;
                            filters.push((name.trim().to_string(), value.to_string()));
                        }
                        other => bail!("Unknown option '{}'", other),
                    }
                    i += 1;
                }
                Ok(Command::List {
                    kind,
                    search,
                    filters,
                })
            }
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

pub async fn run(command: Command, config: &Config, client: ApiClient) -> Result<()> {
    let client = Arc::new(client);
    match command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::List {
            kind,
            search,
            filters,
        } => match kind {
            EntityKind::Customers => list::<Customer>(&client, config, search, &filters).await,
            EntityKind::Products => list::<Product>(&client, config, search, &filters).await,
            EntityKind::Deliveries => list::<MilkDelivery>(&client, config, search, &filters).await,
            EntityKind::Payments => list::<Payment>(&client, config, search, &filters).await,
            EntityKind::Orders => list::<Order>(&client, config, search, &filters).await,
        },
        Command::Filters(kind) => {
            let inputs = match kind {
                EntityKind::Customers => Customer::filter_schema().inputs(),
                EntityKind::Products => Product::filter_schema().inputs(),
                EntityKind::Deliveries => MilkDelivery::filter_schema().inputs(),
                EntityKind::Payments => Payment::filter_schema().inputs(),
                EntityKind::Orders => Order::filter_schema().inputs(),
            };
            println!("Filters for {}:", kind);
            for (name, input) in inputs {
                println!("  {:<12} {}", name, input.label());
            }
            Ok(())
        }
        Command::Create(kind, json) => match kind {
            EntityKind::Customers => write::<Customer>(&client, config, WriteOp::Create(json)).await,
            EntityKind::Products => write::<Product>(&client, config, WriteOp::Create(json)).await,
            EntityKind::Deliveries => write::<MilkDelivery>(&client, config, WriteOp::Create(json)).await,
            EntityKind::Payments => write::<Payment>(&client, config, WriteOp::Create(json)).await,
            EntityKind::Orders => write::<Order>(&client, config, WriteOp::Create(json)).await,
        },
        Command::Update(kind, json) => match kind {
            EntityKind::Customers => write::<Customer>(&client, config, WriteOp::Update(json)).await,
            EntityKind::Products => write::<Product>(&client, config, WriteOp::Update(json)).await,
            EntityKind::Deliveries => write::<MilkDelivery>(&client, config, WriteOp::Update(json)).await,
            EntityKind::Payments => write::<Payment>(&client, config, WriteOp::Update(json)).await,
            EntityKind::Orders => write::<Order>(&client, config, WriteOp::Update(json)).await,
        },
        Command::Delete(kind, id) => match kind {
            EntityKind::Customers => write::<Customer>(&client, config, WriteOp::Delete(id)).await,
            EntityKind::Products => write::<Product>(&client, config, WriteOp::Delete(id)).await,
            EntityKind::Deliveries => write::<MilkDelivery>(&client, config, WriteOp::Delete(id)).await,
            EntityKind::Payments => write::<Payment>(&client, config, WriteOp::Delete(id)).await,
            EntityKind::Orders => write::<Order>(&client, config, WriteOp::Delete(id)).await,
        },
        Command::Stock { watch } => stock(&client, config, watch).await,
        Command::Cart(action) => cart(&client, config, action).await,
        Command::Checkout { customer } => checkout(&client, config, customer).await,
    }
}

fn quantities(client: &Arc<ApiClient>, config: &Config) -> QuantityBroadcaster {
    QuantityBroadcaster::new(
        Arc::clone(client) as Arc<dyn QuantitySource>,
        config.quantity_refresh_interval(),
    )
}

fn open_cart(config: &Config) -> Result<CartStore> {
    let store = FileStore::new(config.data_dir()?).context("Could not open cart storage")?;
    Ok(CartStore::open(Arc::new(store) as Arc<dyn KeyValueStore>))
}

async fn list<T: Entity + TableRow>(
    client: &Arc<ApiClient>,
    config: &Config,
    search: Option<String>,
    filters: &[(String, String)],
) -> Result<()> {
    let view = ListView::new(
        Arc::clone(client) as Arc<dyn Repository<T>>,
        config.search_debounce(),
    );
    for (name, raw) in filters {
        view.set_filter_input(name, raw)?;
    }
    if let Some(term) = search {
        view.set_search_now(term);
    }
    view.refresh().await?;

    let shown = view.current();
    println!("{}", table::render_rows(shown.iter()));
    println!(
        "\n{} of {} {} (fetched {})",
        shown.len(),
        shown.total(),
        T::KIND.title().to_lowercase(),
        view.cache_age()
    );
    view.close();
    Ok(())
}

enum WriteOp {
    Create(String),
    Update(String),
    Delete(i64),
}

async fn write<T: Entity + TableRow>(client: &Arc<ApiClient>, config: &Config, op: WriteOp) -> Result<()> {
    let stock = quantities(client, config);
    let view = ListView::new(
        Arc::clone(client) as Arc<dyn Repository<T>>,
        config.search_debounce(),
    )
    .with_invalidator(stock.invalidator());

    let parse = |json: &str| -> Result<T> {
        serde_json::from_str(json).with_context(|| format!("Invalid {} record", T::KIND))
    };
    match op {
        WriteOp::Create(json) => {
            let created = view.create(parse(&json)?).await?;
            println!("{}", table::render(T::HEADERS, &[created.cells()]));
        }
        WriteOp::Update(json) => {
            let updated = view.update(parse(&json)?).await?;
            println!("{}", table::render(T::HEADERS, &[updated.cells()]));
        }
        WriteOp::Delete(id) => {
            view.delete(id).await?;
            println!("Deleted {} #{}", T::KIND, id);
        }
    }
    println!("{} now has {} record(s)", T::KIND, view.current().total());

    if T::KIND.affects_stock() {
        // Show post-write levels before exiting
        stock.refresh().await?;
        print_stock(&stock.current());
    }
    Ok(())
}

fn print_stock(snapshot: &QuantitySnapshot) {
    let freshness = match snapshot.as_of {
        Some(at) => format!("as of {}", at.with_timezone(&chrono::Local).format("%H:%M:%S")),
        None => "placeholder values".to_string(),
    };
    println!("Stock ({}):", freshness);
    for category in QuantityCategory::ALL {
        println!("  {:<14} {}", category.label(), snapshot.quantities.get(category));
    }
}

async fn stock(client: &Arc<ApiClient>, config: &Config, watch: u32) -> Result<()> {
    let broadcaster = quantities(client, config);
    if let Err(e) = broadcaster.refresh().await {
        eprintln!("{}", e);
    }
    print_stock(&broadcaster.current());

    if watch > 0 {
        let mut updates = broadcaster.subscribe();
        let _ = updates.latest();
        for _ in 0..watch {
            let snapshot = updates.next().await;
            println!();
            print_stock(&snapshot);
        }
    }
    broadcaster.shutdown();
    Ok(())
}

fn print_cart(cart: &CartStore) {
    let items = cart.items();
    if items.is_empty() {
        println!("Cart is empty");
        return;
    }
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            vec![
                item.product_id().map_or_else(|| "-".to_string(), |id| id.to_string()),
                item.product.name.clone(),
                item.quantity.to_string(),
                format_amount(item.product.price_per_unit),
                format_amount(item.line_total()),
            ]
        })
        .collect();
    println!("{}", table::render(&["ID", "Product", "Qty", "Price", "Total"], &rows));
    println!(
        "\n{} item(s), total {}",
        cart.total_item_count(),
        format_amount(cart.total_price())
    );
}

async fn cart(client: &Arc<ApiClient>, config: &Config, action: CartCommand) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
    let cart = open_cart(config)?.with_notifier(Arc::new(tx));
    match action {
        CartCommand::Show => {}
        CartCommand::Add(id) => {
            let mut products = EntityCache::<Product>::new();
            let catalogue = products.fetch_all(client.as_ref()).await?;
            let product = catalogue
                .iter()
                .find(|p| p.id == Some(id))
                .ok_or_else(|| anyhow!("No product with id {}", id))?;
            cart.add(product)?;
        }
        CartCommand::Remove(id) => {
            if !cart.remove(id) {
                bail!("Product {} is not in the cart", id);
            }
        }
        CartCommand::Inc(id) | CartCommand::Dec(id) => {
            let delta = if action == CartCommand::Inc(id) { 1 } else { -1 };
            if !cart.items().iter().any(|i| i.product_id() == Some(id)) {
                bail!("Product {} is not in the cart", id);
            }
            cart.set_quantity_delta(id, delta);
        }
        CartCommand::Clear => cart.clear(),
    }
    while let Ok(note) = rx.try_recv() {
        println!(">> {}", note.message);
    }
    print_cart(&cart);
    Ok(())
}

async fn checkout(client: &Arc<ApiClient>, config: &Config, customer: Option<i64>) -> Result<()> {
    let cart = open_cart(config)?;
    print_cart(&cart);

    let stock = quantities(client, config);
    // Availability warnings fall back to the placeholder levels if this fails
    if let Err(e) = stock.refresh().await {
        debug!(error = %e, "Checkout continuing without fresh stock levels");
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
    let printer = tokio::spawn(async move {
        while let Some(note) = rx.recv().await {
            println!(">> {}", note.message);
        }
    });

    let mut orchestrator = CheckoutOrchestrator::new(
        cart,
        Arc::clone(client) as Arc<dyn OrderGateway>,
        Arc::new(StdinPayment) as Arc<dyn PaymentCapture>,
        Arc::new(tx) as Arc<dyn Notifier>,
        stock,
    );
    let result = orchestrator.checkout(customer).await;
    drop(orchestrator);
    let _ = printer.await;

    match result? {
        CheckoutOutcome::Completed(order) => {
            let id = order.id.map_or_else(|| "-".to_string(), |id| id.to_string());
            println!("Order #{} total {}", id, format_amount(order.total_amount));
        }
        CheckoutOutcome::Cancelled => println!("Checkout cancelled"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_list_with_search_and_filters() {
        let command = Command::parse(&args("products --search cow --filter min_price=40 --filter type=COW_MILK")).unwrap();
        assert_eq!(
            command,
            Command::List {
                kind: EntityKind::Products,
                search: Some("cow".to_string()),
                filters: vec![
                    ("min_price".to_string(), "40".to_string()),
                    ("type".to_string(), "COW_MILK".to_string()),
                ],
            }
        );
    }

    #[test]
    fn test_parse_cart_defaults_to_show() {
        assert_eq!(Command::parse(&args("cart")).unwrap(), Command::Cart(CartCommand::Show));
        assert_eq!(Command::parse(&args("cart dec 4")).unwrap(), Command::Cart(CartCommand::Dec(4)));
    }

    #[test]
    fn test_parse_checkout_customer() {
        assert_eq!(
            Command::parse(&args("checkout --customer 7")).unwrap(),
            Command::Checkout { customer: Some(7) }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args("cart add")).is_err());
        assert!(Command::parse(&args("products --filter min_price")).is_err());
        assert!(Command::parse(&args("stock --watch soon")).is_err());
        assert!(Command::parse(&args("cattle")).is_err());
    }

    #[test]
    fn test_no_args_is_help() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::Help);
    }
}
