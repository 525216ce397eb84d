//! A-share LLM trading agent.
//!
//! Autonomous paper-trading agent for the simulated A-share market.

use ashare_agent::{
    agent::{position_summary, SessionOutcome, TradingAgent},
    config::Config,
    context::FileRuntimeStore,
    ledger::Ledger,
    market::{PriceStore, TradingCalendar},
    model::{DecisionModel, LlmModel},
};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ashare-agent")]
#[command(about = "Autonomous LLM trading agent for a simulated A-share account")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the configured agent signature
    #[arg(short, long)]
    signature: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the initial position ledger for a fresh agent
    Register,
    /// Run pending trading sessions day by day
    Run {
        /// Last date to run (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,
        /// Ask the model but write nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the account state as of a date
    Status {
        /// Date to resolve (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Inspect price data coverage, or one day's opening prices
    Data {
        /// Show opening prices for this date instead of coverage
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(signature) = cli.signature {
        config.agent.signature = signature;
    }

    match cli.command {
        Commands::Register => register(config),
        Commands::Run { to, dry_run } => run_agent(config, to, dry_run).await,
        Commands::Status { date } => show_status(config, date),
        Commands::Data { date } => show_data(config, date),
    }
}

fn build_parts(config: &Config) -> (PriceStore, Ledger) {
    let store = PriceStore::new(&config.market.price_file);
    let calendar = TradingCalendar::new(store.clone());
    let ledger = Ledger::new(
        config.agent.position_file(&config.agent.signature),
        calendar,
        config.ledger.clone(),
    );
    (store, ledger)
}

fn register(config: Config) -> anyhow::Result<()> {
    let (_, ledger) = build_parts(&config);
    if ledger.register(&config.agent.init_date)? {
        println!(
            "Registered {} at {}",
            config.agent.signature,
            ledger.path().display()
        );
    } else {
        println!("Ledger already exists at {}", ledger.path().display());
    }
    Ok(())
}

async fn run_agent(config: Config, to: Option<String>, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        tracing::warn!("Running in DRY RUN mode - no ledger writes");
    }

    let (store, ledger) = build_parts(&config);
    let model = LlmModel::from_config(config.llm.clone());
    tracing::info!("Decision model: {}", model.name());
    let runtime = Arc::new(FileRuntimeStore::new(config.runtime.resolved_path()));

    let agent = TradingAgent::new(
        config.agent.signature.clone(),
        config.agent.clone(),
        ledger,
        store,
        Box::new(model),
        runtime,
    )
    .with_dry_run(dry_run);

    let end = to.unwrap_or_else(today);
    let report = agent.run_date_range(&end).await?;

    println!(
        "\n{} session(s): {} traded, {} held, {} skipped\n",
        report.sessions.len(),
        report.traded(),
        report.held(),
        report.skipped()
    );
    for session in &report.sessions {
        match &session.outcome {
            SessionOutcome::Traded(t) => match &t.snapshot.this_action {
                Some(a) => println!(
                    "  {}  {} {} x {} @ {} (fees {:.2})",
                    session.date, a.action, a.symbol, a.amount, t.price, t.cost.total_cost
                ),
                None => println!("  {}  traded @ {}", session.date, t.price),
            },
            SessionOutcome::Held => println!("  {}  no trade", session.date),
            SessionOutcome::Skipped => println!("  {}  skipped", session.date),
        }
    }
    Ok(())
}

fn show_status(config: Config, date: Option<String>) -> anyhow::Result<()> {
    let (store, ledger) = build_parts(&config);
    let date = date.unwrap_or_else(today);
    let summary = position_summary(&ledger, &store, &date);

    println!("\n💰 {} as of {}\n", config.agent.signature, summary.date);
    println!("Cash: {:.2} CNY", summary.cash);
    println!(
        "Snapshots: {} (latest id {})",
        summary.record_count, summary.latest_id
    );

    if summary.holdings.is_empty() {
        println!("No holdings");
    } else {
        println!("\n{:<12} {:>10}  {}", "Symbol", "Shares", "Name");
        println!("{}", "-".repeat(40));
        for holding in &summary.holdings {
            println!(
                "{:<12} {:>10}  {}",
                holding.symbol, holding.shares, holding.name
            );
        }
    }
    Ok(())
}

fn show_data(config: Config, date: Option<String>) -> anyhow::Result<()> {
    let (store, _) = build_parts(&config);

    match date {
        Some(date) => {
            let symbols = config.ledger.symbols.clone();
            let opens = store.open_prices(&date, &symbols);
            let names = store.name_map(Some(&symbols));

            println!("\n📈 Opening prices on {}\n", date);
            if opens.is_empty() {
                println!("No bars for {}", date);
                return Ok(());
            }
            println!("{:<12} {:>12}  {}", "Symbol", "Open", "Name");
            println!("{}", "-".repeat(44));
            for (symbol, price) in &opens {
                let name = names.get(symbol).cloned().unwrap_or_default();
                match price {
                    Some(p) => println!("{:<12} {:>12}  {}", symbol, p, name),
                    None => println!("{:<12} {:>12}  {}", symbol, "n/a", name),
                }
            }
        }
        None => {
            let records = store.records();
            let days = store.trading_days();
            let symbols: BTreeSet<&str> = records
                .iter()
                .map(|r| r.meta.symbol.as_str())
                .filter(|s| !s.is_empty())
                .collect();

            println!("\n📊 Price data at {}\n", config.market.price_file);
            println!("Symbols: {}", symbols.len());
            println!("Trading days: {}", days.len());
            if let (Some(first), Some(last)) = (days.first(), days.last()) {
                println!("Span: {} to {}", first, last);
            }
            if records.is_empty() {
                println!("\nNo usable records; check market.price_file");
            }
        }
    }
    Ok(())
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
