use std::io::Write as _;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api_client;
mod command;
mod render;
mod state;

use api_client::DashboardApi;
use command::Command;
use state::{Event, ViewState};

#[derive(Debug, Parser)]
#[command(name = "cryptodash_dashboard")]
struct Args {
    /// Base URL of the dashboard API.
    #[arg(long, env = "CRYPTODASH_API_URL", default_value = "http://localhost:8001")]
    api_url: String,

    /// Seconds between price refreshes.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    refresh_secs: u64,

    /// Days of price history per sparkline.
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=90))]
    history_days: u32,

    /// Fetch prices and charts once, print a single frame, and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = cryptodash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    // Logs go to stderr so frames on stdout stay readable.
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let api = DashboardApi::new(&args.api_url)?;

    if args.once {
        return run_once(&api, args.history_days).await;
    }

    run_interactive(api, &args).await
}

async fn run_once(api: &DashboardApi, history_days: u32) -> anyhow::Result<()> {
    let mut state = ViewState::default();
    let mounted = state.apply(Event::Prices(api.prices().await.map_err(message)));

    for symbol in mounted {
        let result = api.price_history(&symbol, history_days).await.map_err(message);
        state.apply(Event::Chart { symbol, result });
    }

    print!("{}", render::render(&state));
    if let Some(err) = state.error() {
        let err = anyhow::anyhow!("{err}");
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "dashboard snapshot failed");
        return Err(err);
    }
    Ok(())
}

async fn run_interactive(api: DashboardApi, args: &Args) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let mut state = ViewState::default();

    let mut ticker = tokio::time::interval(Duration::from_secs(args.refresh_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    tracing::info!(api_url = %args.api_url, refresh_secs = args.refresh_secs, "dashboard started");
    redraw(&state);

    loop {
        tokio::select! {
            // The first tick fires immediately and performs the initial load.
            _ = ticker.tick() => spawn_prices(&api, &tx),

            Some(event) = rx.recv() => {
                for symbol in state.apply(event) {
                    spawn_chart(&api, &tx, symbol, args.history_days);
                }
                redraw(&state);
            }

            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::debug!("stdin closed; continuing with timer refresh only");
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed; disabling commands");
                        stdin_open = false;
                        continue;
                    }
                };

                match command::parse_command(&line) {
                    Command::Analyze(symbol) => {
                        if state.begin_analysis(&symbol) {
                            spawn_analysis(&api, &tx, symbol);
                        }
                    }
                    Command::Refresh => spawn_prices(&api, &tx),
                    Command::Quit => break,
                    Command::Empty => {}
                    Command::Unknown(input) => state.set_error(format!(
                        "Unknown command: {input} (try analyze <SYMBOL>, refresh or quit)"
                    )),
                }
                redraw(&state);
            }
        }
    }

    Ok(())
}

fn spawn_prices(api: &DashboardApi, tx: &mpsc::UnboundedSender<Event>) {
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.prices().await.map_err(message);
        let _ = tx.send(Event::Prices(result));
    });
}

fn spawn_analysis(api: &DashboardApi, tx: &mpsc::UnboundedSender<Event>, symbol: String) {
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.recommendation(&symbol).await.map_err(message);
        let _ = tx.send(Event::Analysis { symbol, result });
    });
}

fn spawn_chart(api: &DashboardApi, tx: &mpsc::UnboundedSender<Event>, symbol: String, days: u32) {
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.price_history(&symbol, days).await.map_err(message);
        let _ = tx.send(Event::Chart { symbol, result });
    });
}

fn message(err: anyhow::Error) -> String {
    tracing::warn!(error = %format!("{err:#}"), "dashboard request failed");
    format!("{err:#}")
}

fn redraw(state: &ViewState) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\x1b[2J\x1b[H{}", render::render(state));
    let _ = stdout.flush();
}

fn init_sentry(settings: &cryptodash_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
