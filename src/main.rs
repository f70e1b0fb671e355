use clap::Parser;
use kasir_core::application::commands::OrderDetails;
use kasir_core::application::engine::OrderEngine;
use kasir_core::domain::money::Money;
use kasir_core::domain::order::Order;
use kasir_core::domain::ports::{CatalogStoreBox, OrderStore};
use kasir_core::error::{OrderError, Result as CoreResult};
use kasir_core::infrastructure::in_memory::InMemoryOrderStore;
#[cfg(feature = "storage-rocksdb")]
use kasir_core::infrastructure::rocksdb::RocksDbOrderStore;
use kasir_core::interfaces::catalog_file::load_catalog;
use kasir_core::interfaces::csv::order_writer::OrderWriter;
use kasir_core::interfaces::jsonl::command_reader::{Command, CommandReader};
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_LOG_FILTER: &str = "kasir_core=info";

/// Replays a script of order commands against a catalog and prints a CSV
/// summary of every order it created.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog JSON file
    catalog: PathBuf,

    /// Command script, one JSON object per line
    commands: PathBuf,

    /// Outlet the orders belong to
    #[arg(long, env = "KASIR_OUTLET")]
    outlet: Uuid,

    /// Cashier recorded as creator and payment processor
    #[arg(long, env = "KASIR_ACTOR", default_value = "00000000-0000-0000-0000-000000000000")]
    actor: Uuid,

    /// Path to a persistent database. If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long, env = "KASIR_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log filter, e.g. `kasir_core=debug`. Falls back to RUST_LOG.
    #[arg(long, env = "KASIR_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let catalog: CatalogStoreBox = Box::new(load_catalog(&cli.catalog).into_diagnostic()?);
    open_and_run(&cli, catalog).await
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
async fn open_and_run(cli: &Cli, catalog: CatalogStoreBox) -> Result<()> {
    match &cli.db_path {
        Some(db_path) => {
            let store = RocksDbOrderStore::open(db_path).into_diagnostic()?;
            run(OrderEngine::new(store, catalog), cli).await
        }
        None => run(OrderEngine::new(InMemoryOrderStore::new(), catalog), cli).await,
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn open_and_run(cli: &Cli, catalog: CatalogStoreBox) -> Result<()> {
    run(OrderEngine::new(InMemoryOrderStore::new(), catalog), cli).await
}

async fn run<S: OrderStore>(engine: OrderEngine<S>, cli: &Cli) -> Result<()> {
    let mut replay = Replay {
        engine,
        outlet_id: cli.outlet,
        actor_id: cli.actor,
        labels: HashMap::new(),
        created: Vec::new(),
    };

    let file = File::open(&cli.commands).into_diagnostic()?;
    let reader = CommandReader::new(BufReader::new(file));
    for command in reader.commands() {
        match command {
            Ok(command) => {
                let label = command.label().to_string();
                if let Err(e) = replay.apply(command).await {
                    eprintln!("Error processing command for {}: {}", label, e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let rows = replay.summary().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer
        .write_orders(rows.iter().map(|(order, paid)| (order, *paid)))
        .into_diagnostic()?;

    Ok(())
}

/// Script state: maps order labels to the ids the engine assigned.
struct Replay<S: OrderStore> {
    engine: OrderEngine<S>,
    outlet_id: Uuid,
    actor_id: Uuid,
    labels: HashMap<String, Uuid>,
    created: Vec<Uuid>,
}

impl<S: OrderStore> Replay<S> {
    async fn apply(&mut self, command: Command) -> CoreResult<()> {
        let outlet = self.outlet_id;
        match command {
            Command::CreateOrder { label, order } => {
                if self.labels.contains_key(&label) {
                    return Err(OrderError::validation(format!(
                        "order label {label} is already in use"
                    )));
                }
                let details = self.engine.create_order(outlet, order, self.actor_id).await?;
                self.labels.insert(label, details.order.id);
                self.created.push(details.order.id);
            }
            Command::AddItem { label, item } => {
                let order_id = self.order_id(&label)?;
                self.engine.add_item(outlet, order_id, item).await?;
            }
            Command::UpdateItem {
                label,
                item,
                update,
            } => {
                let item_id = self.item_id(&label, item).await?;
                self.engine.update_item(outlet, item_id, update).await?;
            }
            Command::RemoveItem { label, item } => {
                let item_id = self.item_id(&label, item).await?;
                self.engine.remove_item(outlet, item_id).await?;
            }
            Command::UpdateStatus { label, status } => {
                let order_id = self.order_id(&label)?;
                self.engine.update_order_status(outlet, order_id, status).await?;
            }
            Command::UpdateItemStatus {
                label,
                item,
                status,
            } => {
                let item_id = self.item_id(&label, item).await?;
                self.engine.update_item_status(outlet, item_id, status).await?;
            }
            Command::AddPayment { label, payment } => {
                let order_id = self.order_id(&label)?;
                let outcome = self
                    .engine
                    .add_payment(outlet, order_id, payment, self.actor_id)
                    .await?;
                if let Some(change) = outcome.payment.change_amount
                    && change.is_positive()
                {
                    eprintln!("{}: change due {}", outcome.order.order_number, change);
                }
            }
        }
        Ok(())
    }

    fn order_id(&self, label: &str) -> CoreResult<Uuid> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| OrderError::not_found(format!("no order labelled {label}")))
    }

    async fn item_id(&self, label: &str, position: usize) -> CoreResult<Uuid> {
        let OrderDetails { order, items, .. } =
            self.engine.get_order(self.outlet_id, self.order_id(label)?).await?;
        items.get(position).map(|item| item.id).ok_or_else(|| {
            OrderError::not_found(format!(
                "order {} has no item at position {position}",
                order.order_number
            ))
        })
    }

    async fn summary(&self) -> CoreResult<Vec<(Order, Money)>> {
        let mut rows = Vec::with_capacity(self.created.len());
        for order_id in &self.created {
            let details = self.engine.get_order(self.outlet_id, *order_id).await?;
            let paid = self
                .engine
                .payment_summary(self.outlet_id, *order_id)
                .await?
                .total_paid;
            rows.push((details.order, paid));
        }
        Ok(rows)
    }
}
