use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vitalid_api::{AppState, HttpEmbeddingExtractor, RestApi};
use vitalid_core::{
    EmbeddingExtractor, Enroller, IdentifierAllocator, IdentityResolver, LinearScanMatcher,
    ResolverConfig, RetryPolicy,
};
use vitalid_storage::LmdbStore;

/// Biometric identification and emergency identifier service
#[derive(Parser, Debug)]
#[command(name = "vitalid")]
#[command(about = "Biometric identity resolution for emergency medical profiles", long_about = None)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// HTTP API port
    #[arg(long, default_value_t = 6380)]
    http_port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Minimum cosine similarity for a face match
    #[arg(long, default_value_t = vitalid_core::DEFAULT_SIMILARITY_THRESHOLD)]
    similarity_threshold: f32,

    /// Base URL of the face embedding service; enables image identification
    #[arg(long)]
    face_service_url: Option<String>,

    /// Face embedding service timeout in seconds
    #[arg(long, default_value_t = 10)]
    face_service_timeout_secs: u64,

    /// Candidate identifiers drawn before allocation gives up
    #[arg(long, default_value_t = vitalid_core::DEFAULT_MAX_ALLOCATION_ATTEMPTS)]
    max_allocation_attempts: u32,

    /// Save attempts per candidate identifier
    #[arg(long, default_value_t = vitalid_core::DEFAULT_MAX_SAVE_ATTEMPTS)]
    max_save_attempts: u32,

    /// Backoff unit between save attempts, in milliseconds
    #[arg(long, default_value_t = 100)]
    backoff_ms: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting VitalID v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);
    info!("HTTP API port: {}", args.http_port);

    let store = Arc::new(LmdbStore::open(args.data_dir.join("lmdb"))?);
    info!("Storage initialized");

    let resolver = IdentityResolver::new(
        store.clone(),
        Arc::new(LinearScanMatcher),
        ResolverConfig {
            similarity_threshold: args.similarity_threshold,
        },
    )?;
    let allocator = IdentifierAllocator::new(
        store.clone(),
        RetryPolicy {
            max_allocation_attempts: args.max_allocation_attempts,
            max_save_attempts: args.max_save_attempts,
            backoff_unit: Duration::from_millis(args.backoff_ms),
        },
    )?;

    // the blocking HTTP client is built before any async runtime exists
    let extractor: Option<Arc<dyn EmbeddingExtractor>> = match args.face_service_url.as_deref() {
        Some(url) => {
            let extractor = HttpEmbeddingExtractor::new(
                url,
                Duration::from_secs(args.face_service_timeout_secs),
            )?;
            info!("Face embedding service: {}", extractor.endpoint());
            Some(Arc::new(extractor))
        }
        None => {
            info!("No face embedding service configured, image identification disabled");
            None
        }
    };

    let state = AppState {
        resolver: Arc::new(resolver),
        allocator: Arc::new(allocator),
        enroller: Arc::new(Enroller::new(store)),
        extractor,
    };

    info!("HTTP API: http://localhost:{}/", args.http_port);
    let sys = actix_web::rt::System::new();
    sys.block_on(RestApi::start(state, args.http_port))?;

    info!("Shutting down...");
    Ok(())
}
