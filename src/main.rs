//! Harvest Engine
//!
//! Multi-source content harvesting service:
//! - Remote configuration with TTL caching and local fallbacks
//! - Per-source worker pools reconciled against remote concurrency targets
//! - Keyword selection across topic catalog and flat keyword list
//! - Single-flight batch dispatch to a downstream collaborator

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use api::{router, AppState};
use live_config::{ConfigResolver, LiveConfigSettings};
use pipeline::{
    BatchAggregator, BatchDispatcher, DispatchExecutor, HttpDispatcher, IngestionQueue,
    LogDispatcher, PipelineConfig,
};
use telemetry::{health, init_tracing_from_env};
use worker::sources::{HttpFeedSource, SourceRegistration};
use worker::{SourceRegistry, Supervisor, WorkerConfig, WorkerContext, WorkerPoolScheduler};

/// How long supervised loops get to wind down after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    live_config: LiveConfigSettings,

    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    worker: WorkerConfig,

    /// Built-in sources available to the scheduler
    #[serde(default)]
    sources: Vec<SourceRegistration>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            live_config: LiveConfigSettings::default(),
            pipeline: PipelineConfig::default(),
            worker: WorkerConfig::default(),
            sources: Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Harvest Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .live_config
        .validate()
        .map_err(|e| anyhow!("Invalid live_config: {}", e))?;

    // Static source registry; an unknown enabled id is fatal
    let mut registry = SourceRegistry::new();
    for registration in &config.sources {
        let source = HttpFeedSource::new(registration, config.worker.pull_timeout())
            .with_context(|| format!("Failed to create source {}", registration.id))?;
        registry.register(Arc::new(source));
    }
    let sources = registry
        .resolve(&config.worker.enabled)
        .context("Invalid worker.enabled")?;
    info!(
        registered = registry.len(),
        scheduled = sources.len(),
        "Loaded source registry"
    );

    let resolver = ConfigResolver::new(config.live_config.clone(), registry.ids())
        .context("Failed to create configuration resolver")?;
    live_config::health::check_connection(&resolver).await;

    let dispatcher: Arc<dyn BatchDispatcher> = match &config.pipeline.dispatch_target {
        Some(target) => Arc::new(
            HttpDispatcher::new(target.clone(), config.pipeline.dispatch_timeout())
                .context("Failed to create HTTP dispatcher")?,
        ),
        None => {
            warn!("No dispatch_target configured, batches will only be logged");
            Arc::new(LogDispatcher)
        }
    };
    health().dispatcher.set_healthy();

    let executor = if config.pipeline.dedicated_dispatch_thread {
        DispatchExecutor::dedicated("harvest-dispatch")
            .context("Failed to start dispatch thread")?
    } else {
        DispatchExecutor::in_process()
    };

    let shutdown = CancellationToken::new();
    let (queue, receiver) = IngestionQueue::new();

    // Aggregator consumer loop
    let aggregator = BatchAggregator::from_config(
        &config.pipeline,
        dispatcher,
        Arc::new(executor),
        receiver,
    );
    let aggregator_handle = {
        let token = shutdown.clone();
        Supervisor::new("aggregator", shutdown.clone()).spawn(move || {
            let aggregator = aggregator.clone();
            let token = token.clone();
            async move { aggregator.run(token).await }
        })
    };

    // Worker pool scheduler
    let ctx = Arc::new(WorkerContext::new(
        resolver.clone(),
        queue.clone(),
        config.worker.pull_timeout(),
        config.worker.pull_pause(),
    ));
    let scheduler = Arc::new(tokio::sync::Mutex::new(WorkerPoolScheduler::new(
        config.worker.clone(),
        sources,
        Arc::new(resolver),
        ctx,
        shutdown.clone(),
    )));
    let scheduler_handle = Supervisor::new("scheduler", shutdown.clone()).spawn(move || {
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.lock().await.run().await }
    });

    let app = router(AppState::new(queue));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    info!("Shutting down...");
    shutdown.cancel();

    for (name, handle) in [("aggregator", aggregator_handle), ("scheduler", scheduler_handle)] {
        match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
            Ok(Ok(restarts)) => info!(supervised = name, restarts, "Stopped"),
            Ok(Err(e)) => error!(supervised = name, error = %e, "Supervisor task failed"),
            Err(_) => warn!(supervised = name, "Did not stop within grace period"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. HARVEST_PIPELINE__BATCH_SIZE
        .add_source(
            config::Environment::default()
                .prefix("HARVEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat aliases for the settings most often set by deployments
    if let Ok(target) = std::env::var("HARVEST_DISPATCH_TARGET") {
        config.pipeline.dispatch_target = Some(target);
    }
    if let Ok(url) = std::env::var("HARVEST_SOURCES_URL") {
        config.live_config.sources_url = url;
    }
    if let Ok(enabled) = std::env::var("HARVEST_ENABLED_SOURCES") {
        config.worker.enabled = enabled
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
