//! CLI definition and dispatch.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use crate::adapters::csv_adapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::http_market_adapter::HttpMarketAdapter;
use crate::adapters::sqlite_adapter::SqliteStoreAdapter;
use crate::domain::challenge::Challenge;
use crate::domain::config_validation::{validate_desk_settings, DeskSettings};
use crate::domain::error::PropdeskError;
use crate::domain::ledger::Ledger;
use crate::domain::session::{DeskSession, DEFAULT_DAILY_LOSS_LIMIT};
use crate::domain::signal::{evaluate_all, opportunities};
use crate::domain::ticker::PriceBoard;
use crate::domain::trade::{OrderTicket, Side};
use crate::domain::{plan as plan_engine, signal as signal_engine};
use crate::ports::challenge_port::ChallengeStorePort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::trade_store_port::{NewTrade, TradeStorePort};

#[derive(Parser, Debug)]
#[command(name = "propdesk", about = "Prop-trading challenge desk")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema and seed the default challenge plans
    Init {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List available challenge plans
    Plans {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Open a new challenge on a plan
    StartChallenge {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        plan: String,
    },
    /// Show open holdings marked to market
    Holdings {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show signals, and the trade plan and risk alert for a symbol
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Place an order on the active challenge
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        side: String,
        #[arg(long)]
        quantity: f64,
    },
    /// Poll prices and the trade feed, re-rendering the desk each cycle
    Watch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Override the configured poll interval, in seconds
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many cycles (0 = run until interrupted)
        #[arg(long, default_value_t = 0)]
        cycles: u64,
    },
    /// Import a CSV trade log into the active challenge
    ImportTrades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Export the active challenge's trade log to CSV
    ExportTrades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Init { config } => run_init(&config),
        Command::Plans { config } => run_plans(&config),
        Command::StartChallenge { config, plan } => run_start_challenge(&config, &plan),
        Command::Holdings { config } => run_holdings(&config),
        Command::Signals { config, symbol } => run_signals(&config, symbol.as_deref()),
        Command::Trade {
            config,
            symbol,
            side,
            quantity,
        } => run_trade(&config, &symbol, &side, quantity),
        Command::Watch {
            config,
            symbol,
            interval,
            cycles,
        } => run_watch(&config, symbol.as_deref(), interval, cycles),
        Command::ImportTrades { config, file } => run_import(&config, &file),
        Command::ExportTrades { config, file } => run_export(&config, &file),
    }
}

fn fail(err: PropdeskError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_settings(path: &PathBuf) -> Result<DeskSettings, PropdeskError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_desk_settings(&adapter)
}

fn open_store(settings: &DeskSettings) -> Result<SqliteStoreAdapter, PropdeskError> {
    let store = SqliteStoreAdapter::from_path(&settings.database_path)?;
    store.initialize_schema()?;
    Ok(store)
}

fn active_challenge(
    store: &SqliteStoreAdapter,
    settings: &DeskSettings,
) -> Result<Challenge, PropdeskError> {
    store
        .active_challenge(&settings.user)?
        .ok_or_else(|| PropdeskError::NoActiveChallenge {
            user: settings.user.clone(),
        })
}

fn fetch_board(settings: &DeskSettings) -> Result<PriceBoard, PropdeskError> {
    let market = HttpMarketAdapter::new(&settings.market_base_url)?;
    let batch = market.fetch_tickers(&settings.selection)?;
    let mut board = PriceBoard::new();
    board.apply(batch);
    Ok(board)
}

fn run_init(config_path: &PathBuf) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let store = match open_store(&settings) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if let Err(e) = store.seed_default_plans() {
        return fail(e);
    }
    eprintln!("Initialized {}", settings.database_path);
    ExitCode::SUCCESS
}

fn run_plans(config_path: &PathBuf) -> ExitCode {
    let result = load_settings(config_path)
        .and_then(|settings| open_store(&settings))
        .and_then(|store| store.list_plans());
    let plans = match result {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    println!(
        "{:<14} {:>12} {:>10} {:>9} {:>9} {:>7}",
        "PLAN", "ACCOUNT", "DAILY DD%", "TARGET 1", "TARGET 2", "SPLIT"
    );
    for plan in plans {
        println!(
            "{:<14} {:>12.2} {:>10.1} {:>8.1}% {:>8.1}% {:>6.0}%",
            plan.name,
            plan.account_size,
            plan.daily_loss_limit,
            plan.profit_target_phase1,
            plan.profit_target_phase2,
            plan.profit_split
        );
    }
    ExitCode::SUCCESS
}

fn run_start_challenge(config_path: &PathBuf, plan: &str) -> ExitCode {
    let result = load_settings(config_path).and_then(|settings| {
        let store = open_store(&settings)?;
        store.seed_default_plans()?;
        store.create_challenge(&settings.user, plan)
    });
    match result {
        Ok(challenge) => {
            eprintln!(
                "Started challenge {} on plan {} ({:.2})",
                challenge.id, challenge.plan.name, challenge.starting_balance
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_holdings(config_path: &PathBuf) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let store = match open_store(&settings) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let challenge = match active_challenge(&store, &settings) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let trades = match store.list_trades(&challenge.id) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    // A dead feed degrades to unpriced holdings rather than no output.
    eprintln!("Fetching market data from {}", settings.market_base_url);
    let board = match fetch_board(&settings) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("warning: {e}; holdings shown without market prices");
            PriceBoard::new()
        }
    };

    let ledger = Ledger::from_trades(&trades);
    let holdings = ledger.holdings(&board);
    print_challenge_line(&challenge, trades.len() as u64);

    if holdings.is_empty() {
        println!("No open holdings.");
        return ExitCode::SUCCESS;
    }
    println!(
        "{:<10} {:>12} {:>12} {:>12} {:>14} {:>12}",
        "SYMBOL", "QTY", "AVG ENTRY", "MARKET", "VALUE", "P/L"
    );
    for h in &holdings {
        println!(
            "{:<10} {:>12.4} {:>12.4} {:>12.4} {:>14.2} {:>+12.2}",
            h.symbol, h.quantity, h.avg_entry_price, h.market_price, h.value, h.unrealized_pnl
        );
    }
    ExitCode::SUCCESS
}

fn run_signals(config_path: &PathBuf, symbol: Option<&str>) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Signals work without a challenge; the stop distance then uses the
    // default daily-loss budget.
    let limit = match open_store(&settings)
        .and_then(|store| store.active_challenge(&settings.user))
    {
        Ok(Some(challenge)) => challenge.plan.daily_loss_limit,
        Ok(None) => DEFAULT_DAILY_LOSS_LIMIT,
        Err(e) => return fail(e),
    };

    eprintln!("Fetching market data from {}", settings.market_base_url);
    let board = match fetch_board(&settings) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };
    if board.is_empty() {
        println!("No market data.");
        return ExitCode::SUCCESS;
    }

    let signals = evaluate_all(board.tickers(), limit);
    println!(
        "{:<10} {:<5} {:>5} {:>12} {:>12} {:>12} {:>7}  {}",
        "SYMBOL", "ACT", "CONF", "ENTRY", "SL", "TP", "RISK", "REASON"
    );
    for s in &signals {
        println!(
            "{:<10} {:<5} {:>4.0}% {:>12.4} {:>12.4} {:>12.4} {:>7}  {}",
            s.symbol,
            s.action.as_str(),
            s.confidence,
            s.entry,
            s.stop_loss,
            s.take_profit,
            s.risk.as_str(),
            s.reason
        );
    }

    if let Some(symbol) = symbol {
        let symbol = symbol.to_uppercase();
        let tick = match board.get(&symbol) {
            Some(t) => t.clone(),
            None => return fail(PropdeskError::UnknownSymbol { symbol }),
        };
        let signal = signal_engine::evaluate(&tick, limit);
        let plan = plan_engine::build_plan(&tick, limit);
        let alert = plan_engine::build_alert(&tick, &signal);

        println!();
        println!("Plan for {}:", plan.symbol);
        println!(
            "  bullish  entry {:.4}  sl {:.4}  tp {:.4}  rr {:.2}",
            plan.bullish.entry, plan.bullish.stop_loss, plan.bullish.take_profit, plan.bullish.rr
        );
        println!(
            "  bearish  entry {:.4}  sl {:.4}  tp {:.4}  rr {:.2}",
            plan.bearish.entry, plan.bearish.stop_loss, plan.bearish.take_profit, plan.bearish.rr
        );
        println!("  invalidation {:.4}", plan.invalidation);
        println!(
            "Risk: {} ({}) -> {}",
            alert.level.as_str(),
            alert.message,
            alert.recommendation.as_str()
        );
    }

    let ranked = opportunities(&signals);
    if !ranked.is_empty() {
        println!();
        println!("Opportunities:");
        for o in &ranked {
            println!(
                "  {:<10} {:<5} conf {:>3.0}%  entry {:.4}  sl {:.4}  tp {:.4}",
                o.symbol,
                o.action.as_str(),
                o.confidence,
                o.entry,
                o.stop_loss,
                o.take_profit
            );
        }
    }
    ExitCode::SUCCESS
}

fn run_trade(config_path: &PathBuf, symbol: &str, side: &str, quantity: f64) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let side = match Side::parse(side) {
        Ok(s) => s,
        Err(_) => {
            return fail(PropdeskError::OrderRejected {
                reason: format!("side must be buy or sell, got {side}"),
            })
        }
    };
    let store = match open_store(&settings) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let mut challenge = match active_challenge(&store, &settings) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!("Fetching market data from {}", settings.market_base_url);
    let board = match fetch_board(&settings) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };
    let symbol = symbol.to_uppercase();
    let price = match board.price(&symbol) {
        Some(p) => p,
        None => return fail(PropdeskError::UnknownSymbol { symbol }),
    };

    let order = OrderTicket {
        symbol: symbol.clone(),
        side,
        quantity,
        price,
    };
    if let Err(e) = order.validate(&challenge) {
        return fail(e);
    }

    let inserted = store.insert_trade(&NewTrade {
        challenge_id: challenge.id.clone(),
        symbol,
        side,
        quantity,
        entry_price: price,
        created_at: Utc::now(),
    });
    if let Err(e) = inserted {
        return fail(e);
    }

    challenge.settle_order(&order);
    if let Err(e) = store.update_challenge(&challenge) {
        return fail(e);
    }

    println!(
        "{} {} {} @ {:.4}  balance {:.2}  trades {}",
        side.as_str().to_uppercase(),
        quantity,
        order.symbol,
        price,
        challenge.current_balance,
        challenge.trading_days
    );
    ExitCode::SUCCESS
}

fn run_watch(
    config_path: &PathBuf,
    symbol: Option<&str>,
    interval: Option<u64>,
    cycles: u64,
) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let store = match open_store(&settings) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let challenge = match active_challenge(&store, &settings) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let market = match HttpMarketAdapter::new(&settings.market_base_url) {
        Ok(m) => m,
        Err(e) => return fail(e),
    };

    let mut session = DeskSession::new();
    session.set_challenge(Some(challenge.clone()));
    session.select_symbol(symbol.map(|s| s.to_uppercase()));
    let generation = session.generation();

    let trades = match store.list_trades(&challenge.id) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    session.apply_trade_log(generation, trades);

    // Dropping the feed on exit is the unsubscribe.
    let mut feed = match store.subscribe(&challenge.id) {
        Ok(f) => f,
        Err(e) => return fail(e),
    };

    let interval = Duration::from_secs(interval.unwrap_or(settings.poll_interval_secs));
    eprintln!(
        "Watching challenge {} (poll every {}s)",
        challenge.id,
        interval.as_secs()
    );

    let mut cycle = 0u64;
    loop {
        match market.fetch_tickers(&settings.selection) {
            Ok(batch) => {
                session.apply_price_refresh(generation, batch);
            }
            Err(e) => {
                session.apply_fetch_error(generation, e.to_string());
            }
        }
        match feed.poll() {
            Ok(batch) => {
                for trade in batch {
                    session.apply_trade_event(generation, trade);
                }
            }
            Err(e) => {
                session.apply_fetch_error(generation, e.to_string());
            }
        }

        render_snapshot(&session);

        cycle += 1;
        if cycles > 0 && cycle >= cycles {
            return ExitCode::SUCCESS;
        }
        thread::sleep(interval);
    }
}

fn run_import(config_path: &PathBuf, file: &PathBuf) -> ExitCode {
    let result = load_settings(config_path).and_then(|settings| {
        let store = open_store(&settings)?;
        let challenge = active_challenge(&store, &settings)?;
        let trades = csv_adapter::read_trade_log(file, &challenge.id)?;
        for trade in &trades {
            store.insert_trade(trade)?;
        }
        Ok((challenge.id, trades.len()))
    });
    match result {
        Ok((challenge_id, count)) => {
            eprintln!("Imported {count} trades into {challenge_id}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_export(config_path: &PathBuf, file: &PathBuf) -> ExitCode {
    let result = load_settings(config_path).and_then(|settings| {
        let store = open_store(&settings)?;
        let challenge = active_challenge(&store, &settings)?;
        let trades = store.list_trades(&challenge.id)?;
        csv_adapter::write_trade_log(file, &trades)?;
        Ok((challenge.id, trades.len()))
    });
    match result {
        Ok((challenge_id, count)) => {
            eprintln!("Exported {count} trades from {challenge_id}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn print_challenge_line(challenge: &Challenge, trade_count: u64) {
    println!(
        "Challenge {}  [{} phase {}]  balance {:.2} / start {:.2}  p/l {:+.2}%  trades {}",
        challenge.id,
        challenge.status.as_str(),
        challenge.phase,
        challenge.current_balance,
        challenge.starting_balance,
        challenge.profit_percent(),
        trade_count
    );
}

fn render_snapshot(session: &DeskSession) {
    println!("----------------------------------------------------------------");
    if let Some(challenge) = session.challenge() {
        print_challenge_line(challenge, session.trade_count());
    }
    if let Some(error) = session.last_error() {
        println!("feed error: {error} (will retry)");
    }

    if session.holdings().is_empty() {
        println!("No open holdings.");
    } else {
        for h in session.holdings() {
            println!(
                "  {:<10} qty {:>10.4}  avg {:>10.4}  mkt {:>10.4}  p/l {:>+10.2}",
                h.symbol, h.quantity, h.avg_entry_price, h.market_price, h.unrealized_pnl
            );
        }
    }

    for s in session.signals() {
        println!(
            "  {:<10} {:<5} conf {:>3.0}%  {:<7} {}",
            s.symbol,
            s.action.as_str(),
            s.confidence,
            s.risk.as_str(),
            s.reason
        );
    }
    if let Some(plan) = session.plan() {
        println!(
            "  plan {}: bull sl {:.4} tp {:.4} / bear sl {:.4} tp {:.4} / invalidation {:.4}",
            plan.symbol,
            plan.bullish.stop_loss,
            plan.bullish.take_profit,
            plan.bearish.stop_loss,
            plan.bearish.take_profit,
            plan.invalidation
        );
    }
    if let Some(alert) = session.alert() {
        println!(
            "  risk {}: {} -> {}",
            alert.level.as_str(),
            alert.message,
            alert.recommendation.as_str()
        );
    }
    for o in session.opportunities() {
        println!(
            "  opportunity {:<10} {:<5} conf {:>3.0}%",
            o.symbol,
            o.action.as_str(),
            o.confidence
        );
    }
}
