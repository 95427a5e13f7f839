// Module declarations for the application's core components
pub mod channels;       // Inter-component communication channels
pub mod config;         // Configuration management
pub mod coordinator;    // Poll loop orchestration
pub mod growatt;        // Growatt register protocol and serial connection
pub mod home_assistant; // Home Assistant discovery documents
pub mod mqtt;           // MQTT client and messaging
pub mod options;        // Command line options parsing
pub mod prelude;        // Common imports and types
pub mod pvoutput;       // PVOutput reporting API client
pub mod scheduler;      // Shift window scheduling

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::coordinator::Coordinator;
use crate::mqtt::Mqtt;

/// Main application entry point
///
/// Initializes logging and configuration, starts the MQTT transport task,
/// then runs the poll loop in this task until the shutdown broadcast fires.
pub async fn app(shutdown_rx: broadcast::Receiver<()>, options: Options) -> Result<()> {
    // Permissive filter at init; the effective level is capped below once
    // the config has been read
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();

    info!(
        "starting growatt-bridge {} with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );

    // Load and validate configuration
    let config = ConfigWrapper::new(options.config_file.clone()).unwrap_or_else(|err| {
        error!("Failed to load config: {:?}", err);
        std::process::exit(255);
    });

    // RUST_LOG and --test take precedence over the configured loglevel
    if std::env::var("RUST_LOG").is_err() {
        let level = if options.test {
            log::LevelFilter::Debug
        } else {
            config
                .loglevel()
                .parse()
                .unwrap_or(log::LevelFilter::Info)
        };
        log::set_max_level(level);
    }

    if options.test {
        info!("*** test mode active - MQTT and PVOutput calls will be skipped ***");
        config.set_test_mode(true);
    }

    info!("Initializing channels...");
    let channels = Channels::new();

    // MQTT transport runs on its own task; everything else is sequential
    info!("  Creating MQTT client...");
    let mqtt = Mqtt::new(config.clone(), channels.clone());
    let mqtt_clone = mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt_clone.start().await {
            error!("MQTT task failed: {}", e);
        }
    });

    info!("  Creating Coordinator...");
    let mut coordinator = Coordinator::new(config.clone(), channels.clone())?;
    let stats = coordinator.stats.clone();

    coordinator.start(shutdown_rx).await?;

    // Shutdown: availability goes offline, then the transport disconnects
    info!("Shutdown signal received, stopping components...");
    mqtt.stop().await?;
    if let Err(e) = mqtt_handle.await {
        error!("Error waiting for MQTT task: {}", e);
    }

    if let Ok(stats) = stats.lock() {
        stats.print_summary();
    }

    info!("Application shutdown complete");
    Ok(())
}
