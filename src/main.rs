use std::{net::SocketAddr, path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre::Context};
use edge_gateway::{
    adapters::{HttpClientAdapter, HttpHandler, build_router},
    config::{
        GatewayConfigValidator,
        loader::{DEFAULT_CONFIG_TEMPLATE, load_config},
    },
    core::{GatewayService, RouteTable},
    ports::http_client::HttpClient,
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "gateway.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration (file plus GATEWAY__* environment overrides)
    Validate {
        #[clap(short, long, default_value = "gateway.toml")]
        config: String,
    },
    /// Write a commented default configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "gateway.toml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        #[clap(short, long, default_value = "gateway.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    tracing_setup::init_tracing(&config.logging).context("Failed to initialize tracing")?;
    tracing::info!("Loaded configuration from {config_path}");

    GatewayConfigValidator::validate(&config).context("Configuration is invalid")?;

    let routes =
        Arc::new(RouteTable::from_services(&config.services).context("Failed to build routes")?);
    for entry in routes.entries() {
        tracing::info!(
            prefixes = ?entry.prefixes(),
            backend = entry.base_url(),
            "Route registered"
        );
    }

    let http_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(&config.timeouts).context("Failed to create HTTP client adapter")?,
    );
    let gateway_service = Arc::new(GatewayService::new(routes, http_client));
    let handler = Arc::new(HttpHandler::new(gateway_service, config.max_body_bytes));
    let app = build_router(handler, &config.cors);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to address {addr}"))?;
    tracing::info!("Gateway listening on {}", addr);

    let graceful_shutdown = GracefulShutdown::new();
    let signal_handler = graceful_shutdown.clone();
    tokio::spawn(async move { signal_handler.run_signal_handler().await });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            graceful_shutdown.wait_for_shutdown_signal().await;
        })
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate configuration and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration: {config_path}");

    if !Path::new(config_path).exists() {
        println!("ℹ️  '{config_path}' not found; checking defaults and environment overrides");
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match GatewayConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            for (name, endpoint) in config.services.iter() {
                println!("   • {name}: {}", endpoint.base_url);
            }
            println!(
                "   • Timeouts: connect {}ms, read {}ms",
                config.timeouts.connect_ms, config.timeouts.read_ms
            );
            println!("   • Extra CORS origins: {}", config.cors.allowed_origins.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure all base URLs start with http:// or https://");
            println!("   • Verify listen address format (e.g., '0.0.0.0:8080')");
            println!("   • Timeouts and max_body_bytes must be greater than zero");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    tokio::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'edge-gateway serve --config {config_path}' to start the server");
    Ok(())
}
