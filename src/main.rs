use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use watchpost::config::DispatchConfig;
use watchpost::dispatch::{DispatchEngine, MemoryLeaseStore, MemoryStatStore};
use watchpost::orders::{MemoryOrderBoard, OrderBoard};
use watchpost::shutdown::install_shutdown_handler;
use watchpost::watchman::{RosterDirectory, WatchmanId};

#[derive(Parser, Debug)]
#[command(name = "watchpost")]
#[command(version)]
#[command(about = "Lease-based dispatch console for order verification")]
struct Args {
    /// On-duty watchman names, comma-separated, badges assigned in order
    #[arg(long, default_value = "mills,reyes,okafor")]
    watchmen: String,

    /// Badge-number capacity of the roster
    #[arg(long, default_value = "5")]
    capacity: u8,

    /// Lease TTL in seconds
    #[arg(long, default_value = "300")]
    ttl_secs: i64,

    /// Seconds between expiry sweeps
    #[arg(long, default_value = "45")]
    sweep_interval_secs: u64,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

struct Console {
    engine: DispatchEngine,
    board: Arc<MemoryOrderBoard>,
    capacity: u8,
    output: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DispatchConfig::default()
        .with_ttl_secs(args.ttl_secs)
        .with_sweep_interval_secs(args.sweep_interval_secs)
        .with_watchman_capacity(args.capacity);

    let names: Vec<&str> = args.watchmen.split(',').collect();
    let directory = Arc::new(RosterDirectory::from_names(&names, config.watchman_capacity));
    let leases = Arc::new(MemoryLeaseStore::new());
    let stats = Arc::new(MemoryStatStore::new());
    let board = Arc::new(MemoryOrderBoard::default());

    let engine = DispatchEngine::new(
        config.clone(),
        directory,
        leases,
        stats,
        board.clone(),
    );

    let shutdown = install_shutdown_handler();
    let sweeper = engine.sweeper.clone();
    let sweeper_shutdown = shutdown.clone();
    let sweeper_task = tokio::spawn(async move {
        sweeper.run(sweeper_shutdown).await;
    });

    tracing::info!(
        watchmen = %args.watchmen,
        ttl_secs = config.lease_ttl_secs,
        "Watchpost console ready, type 'help' for commands"
    );

    let console = Console {
        engine,
        board,
        capacity: config.watchman_capacity,
        output: args.output,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !console.handle(line.trim()) {
                            shutdown.cancel();
                            break;
                        }
                    }
                    None => {
                        shutdown.cancel();
                        break;
                    }
                }
            }
        }
    }

    sweeper_task.await?;
    Ok(())
}

impl Console {
    /// Dispatch one console line. Returns false when the session should end.
    fn handle(&self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return true;
        };
        let rest: Vec<&str> = parts.collect();

        match command {
            "order" => self.cmd_order(&rest),
            "assign" => self.cmd_assign(&rest),
            "confirm" => self.cmd_confirm(&rest),
            "sweep" => self.cmd_sweep(),
            "stats" => self.cmd_stats(&rest),
            "report" => self.cmd_report(),
            "history" => self.cmd_history(&rest),
            "help" => print_help(),
            "quit" | "exit" => return false,
            other => println!("Unknown command: {other} (try 'help')"),
        }
        true
    }

    fn cmd_order(&self, rest: &[&str]) {
        let order = match rest.first() {
            Some(&"new") | None => Uuid::new_v4(),
            Some(raw) => match raw.parse() {
                Ok(id) => id,
                Err(_) => return println!("Invalid order id: {raw}"),
            },
        };
        match self.board.put(order) {
            Ok(()) => println!("Order registered: {order}"),
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_assign(&self, rest: &[&str]) {
        let Some(order) = parse_order(rest.first()) else {
            return println!("Usage: assign <order-id>");
        };
        // Readiness is the caller's check; the engine only guards the lease.
        match self.board.exists(order) {
            Ok(true) => {}
            Ok(false) => return println!("Unknown order: {order} (register with 'order {order}')"),
            Err(e) => return println!("Error: {e}"),
        }
        match self.engine.dispatcher.assign(order) {
            Ok(lease) => match self.output {
                OutputFormat::Json => print_json(&lease),
                OutputFormat::Table => println!(
                    "Order {} assigned to {} (lease {})",
                    order, lease.watchman, lease.id
                ),
            },
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_confirm(&self, rest: &[&str]) {
        let (Some(order), Some(badge)) = (parse_order(rest.first()), rest.get(1)) else {
            return println!("Usage: confirm <order-id> <badge> <name>");
        };
        let Some(watchman) = badge
            .parse::<u8>()
            .ok()
            .and_then(|b| WatchmanId::new(b, self.capacity))
        else {
            return println!("Invalid badge: {badge}");
        };
        let name = rest[2..].join(" ");
        match self.engine.confirmations.confirm(order, watchman, &name) {
            Ok(elapsed_secs) => match self.output {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "order": order,
                    "watchman": watchman,
                    "elapsed_secs": elapsed_secs,
                })),
                OutputFormat::Table => {
                    println!("Order {order} confirmed by {watchman} after {elapsed_secs}s")
                }
            },
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_sweep(&self) {
        match self.engine.sweeper.sweep() {
            Ok(n) => println!("Sweep expired {n} lease(s)"),
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_stats(&self, rest: &[&str]) {
        let Some(watchman) = rest
            .first()
            .and_then(|b| b.parse::<u8>().ok())
            .and_then(|b| WatchmanId::new(b, self.capacity))
        else {
            return println!("Usage: stats <badge>");
        };
        match self.engine.reporting.stats_for(watchman) {
            Ok(view) => match self.output {
                OutputFormat::Json => print_json(&view),
                OutputFormat::Table => println!(
                    "{}: assigned {} confirmed {} expired {} efficiency {}% pending {}",
                    view.watchman,
                    view.total_assigned,
                    view.total_confirmed,
                    view.total_expired,
                    view.efficiency,
                    view.pending
                ),
            },
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_report(&self) {
        match self.engine.reporting.report() {
            Ok(rows) => match self.output {
                OutputFormat::Json => print_json(&rows),
                OutputFormat::Table => {
                    println!(
                        "{:<6} {:<16} {:>8} {:>9} {:>7} {:>10} {:>7} {:>6}",
                        "BADGE", "NAME", "ASSIGNED", "CONFIRMED", "EXPIRED", "EFFICIENCY", "PENDING", "TODAY"
                    );
                    println!("{}", "-".repeat(78));
                    for row in rows {
                        println!(
                            "{:<6} {:<16} {:>8} {:>9} {:>7} {:>9}% {:>7} {:>6}",
                            row.watchman.to_string(),
                            row.name,
                            row.total_assigned,
                            row.total_confirmed,
                            row.total_expired,
                            row.efficiency,
                            row.pending,
                            row.confirmed_today
                        );
                    }
                }
            },
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_history(&self, rest: &[&str]) {
        let Some(order) = parse_order(rest.first()) else {
            return println!("Usage: history <order-id>");
        };
        match self.engine.reporting.history_for(order) {
            Ok(history) => match self.output {
                OutputFormat::Json => print_json(&history),
                OutputFormat::Table => {
                    if history.is_empty() {
                        return println!("No leases for order {order}");
                    }
                    for lease in history {
                        let chain = lease
                            .reassigned_from
                            .map(|id| format!(" (reassigned from {id})"))
                            .unwrap_or_default();
                        println!(
                            "{} {} -> {} at {}{}",
                            lease.id, lease.watchman, lease.status, lease.created_at, chain
                        );
                    }
                }
            },
            Err(e) => println!("Error: {e}"),
        }
    }
}

fn parse_order(raw: Option<&&str>) -> Option<Uuid> {
    raw.and_then(|r| r.parse().ok())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("Error: {e}"),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  order [new|<id>]                register a completed order");
    println!("  assign <order>                  lease the order to a watchman");
    println!("  confirm <order> <badge> <name>  confirm verification");
    println!("  sweep                           expire stale leases now");
    println!("  stats <badge>                   counters for one watchman");
    println!("  report                          summaries for the active pool");
    println!("  history <order>                 the order's lease chain");
    println!("  quit                            leave the console");
}
