//! Mood Detector CLI
//!
//! Runs detection sessions, serves the record API and queries statistics.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mood_detector::{
    config::Config,
    core::{StatsFilter, StatsQueryEngine},
    detection::{
        replay_file, ControllerConfig, DetectionEvent, DetectionLoopController, LoopState,
    },
    gateway::{DetectionSink, PersistOutcome, PersistenceGateway},
    monitor::LoopMonitor,
    store::JsonlStore,
    SessionContext, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "gateway")]
use mood_detector::{ApiClient, ApiConfig};

#[derive(Parser)]
#[command(name = "mood-detector")]
#[command(version = VERSION)]
#[command(about = "Facial-expression mood tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the record and statistics API
    #[cfg(feature = "server")]
    Serve {
        /// Port to bind to (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// JSON-lines record file (overrides config)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Run a detection session over recorded classifier output
    Detect {
        /// Replay file: one score object or `null` per line
        #[arg(long)]
        replay: PathBuf,

        /// Session id (generated when absent)
        #[arg(long)]
        session: Option<String>,

        /// Record API base URL to persist into
        #[arg(long, conflicts_with = "store")]
        api: Option<String>,

        /// Persist into a local JSON-lines file instead of the API
        #[arg(long)]
        store: Option<PathBuf>,

        /// Tick period in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Show aggregate statistics from a local record file
    Stats {
        /// JSON-lines record file (overrides config)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Restrict to one session
        #[arg(long, conflicts_with = "recent")]
        session: Option<String>,

        /// Only count the last N minutes
        #[arg(long)]
        recent: Option<f64>,
    },

    /// List stored records, newest first
    List {
        /// JSON-lines record file (overrides config)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Only records of this session
        #[arg(long)]
        session: Option<String>,

        /// Maximum records to show (overrides config)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not load config, using defaults");
        Config::default()
    });

    match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve { port, store } => cmd_serve(config, port, store).await,
        Commands::Detect {
            replay,
            session,
            api,
            store,
            interval_ms,
        } => cmd_detect(config, replay, session, api, store, interval_ms).await,
        Commands::Stats {
            store,
            session,
            recent,
        } => cmd_stats(&config, store, session, recent),
        Commands::List {
            store,
            session,
            limit,
        } => cmd_list(&config, store, session, limit),
        Commands::Config => {
            cmd_config(&config);
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(feature = "server")]
async fn cmd_serve(
    mut config: Config,
    port: Option<u16>,
    store: Option<PathBuf>,
) -> anyhow::Result<()> {
    use mood_detector::server::{run, ServerConfig};

    if let Some(port) = port {
        config.server_port = port;
    }
    if let Some(store) = store {
        config.store_path = store;
    }
    if let Err(e) = config.ensure_directories() {
        tracing::warn!(error = %e, "Could not create data directories");
    }

    let store: mood_detector::store::SharedStore = Arc::new(JsonlStore::new(&config.store_path));
    let (addr, shutdown_tx) = run(ServerConfig::from_config(&config, store)).await?;

    println!("Mood Detector v{VERSION}");
    println!("  Listening on: http://{addr}");
    println!("  Records: {}", config.store_path.display());
    println!();
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    let _ = shutdown_tx.send(());
    Ok(())
}

async fn cmd_detect(
    mut config: Config,
    replay: PathBuf,
    session: Option<String>,
    api: Option<String>,
    store: Option<PathBuf>,
    interval_ms: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(ms) = interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Err(e) = config.ensure_directories() {
        tracing::warn!(error = %e, "Could not create data directories");
    }

    let session = match session {
        Some(id) => SessionContext::with_id(id),
        None => SessionContext::new(),
    };

    if let Some(store) = store {
        let sink = PersistenceGateway::new(JsonlStore::new(store));
        return run_session(&config, session, replay, sink).await;
    }

    #[cfg(feature = "gateway")]
    {
        let base_url = api.unwrap_or_else(|| config.api_base_url.clone());
        let client = ApiClient::new(ApiConfig::new(base_url))?;
        match client.health().await {
            Ok(true) => println!("  Record API: {}", client.config().url()),
            _ => eprintln!(
                "Warning: record API at {} is not reachable; detections will not be stored",
                client.config().url()
            ),
        }
        run_session(&config, session, replay, client).await
    }

    #[cfg(not(feature = "gateway"))]
    {
        if api.is_some() {
            eprintln!("Warning: --api ignored (gateway feature not enabled at compile time)");
        }
        let sink = PersistenceGateway::new(JsonlStore::new(&config.store_path));
        run_session(&config, session, replay, sink).await
    }
}

async fn run_session<S: DetectionSink>(
    config: &Config,
    session: SessionContext,
    replay: PathBuf,
    sink: S,
) -> anyhow::Result<()> {
    let monitor = Arc::new(LoopMonitor::with_persistence(config.monitor_path()));
    let (device, classifier) = replay_file(&replay);
    let controller = Arc::new(
        DetectionLoopController::new(
            session,
            classifier,
            device,
            sink,
            ControllerConfig::from(config),
        )
        .with_monitor(Arc::clone(&monitor)),
    );

    println!("Mood Detector v{VERSION}");
    println!("  Session: {}", controller.session_id());
    println!("  Replay: {}", replay.display());
    println!("  Tick period: {}ms", config.poll_interval.as_millis());
    println!();

    let events = controller.events().clone();
    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            let stopped = matches!(event, DetectionEvent::Stopped(_));
            print_event(event);
            if stopped {
                break;
            }
        }
    });

    controller
        .start()
        .await
        .context("failed to start detection session")?;
    let schedule = controller.spawn();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Stopping...");
            controller.stop();
        }
        result = schedule => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Detection schedule aborted");
            }
        }
    }

    if controller.state() != LoopState::Stopped {
        controller.stop();
    }
    controller.wait_for_persistence().await;
    if printer.join().is_err() {
        tracing::warn!("Event printer panicked");
    }
    // Writes still in flight at stop report after the Stopped event.
    for event in controller.events().try_iter() {
        print_event(event);
    }

    println!();
    println!("Session {} distribution:", controller.session_id());
    let snapshot = controller.snapshot();
    if snapshot.is_empty() {
        println!("  no detections");
    }
    for share in snapshot {
        println!(
            "  {:<10} {:>5}  {:>5.1}%",
            share.emotion, share.count, share.percentage
        );
    }
    println!();
    println!("{}", monitor.summary());

    if let Err(e) = monitor.save() {
        eprintln!("Warning: Could not save loop counters: {e}");
    }
    Ok(())
}

fn print_event(event: DetectionEvent) {
    match event {
        DetectionEvent::Detected(sample) => println!(
            "  {} ({:.2}%) -> {}",
            sample.dominant_emotion(),
            sample.confidence_percent(),
            sample.mood()
        ),
        DetectionEvent::NoFace => println!("  (no face)"),
        DetectionEvent::TickFailed(reason) => eprintln!("  tick failed: {reason}"),
        DetectionEvent::Persisted(PersistOutcome::Stored { .. }) => {}
        DetectionEvent::Persisted(outcome) => eprintln!("  not stored: {outcome:?}"),
        DetectionEvent::Stopped(reason) => println!("Session stopped: {reason:?}"),
    }
}

fn open_store(config: &Config, store: Option<PathBuf>) -> StatsQueryEngine<JsonlStore> {
    let path = store.unwrap_or_else(|| config.store_path.clone());
    StatsQueryEngine::new(JsonlStore::new(path))
}

fn cmd_stats(
    config: &Config,
    store: Option<PathBuf>,
    session: Option<String>,
    recent: Option<f64>,
) -> anyhow::Result<()> {
    let queries = open_store(config, store);

    let json = match recent {
        Some(minutes) => serde_json::to_string_pretty(&queries.compute_recent_stats(minutes)?)?,
        None => {
            let filter = StatsFilter {
                session_id: session,
            };
            serde_json::to_string_pretty(&queries.compute_stats(&filter)?)?
        }
    };

    println!("{json}");
    Ok(())
}

fn cmd_list(
    config: &Config,
    store: Option<PathBuf>,
    session: Option<String>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let queries = open_store(config, store);

    let mut records = match session {
        Some(id) => queries.list_session(&id)?,
        None => queries.list_recent(limit.unwrap_or(config.list_limit))?,
    };
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {:<10} {:>6.2}%  {:<9} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.emotion,
            record.confidence,
            record.mood,
            record.session_id
        );
    }
    Ok(())
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}
