//! mopsd: Metal Operations Server
//!
//! Serves operational reports rendered from templates over data read from
//! the metal backend.
//!
//! ```sh
//! # Run with default config (~/.config/mops/config.toml)
//! mopsd
//!
//! # Custom config path
//! mopsd --config /etc/mops/config.toml
//!
//! # Point at another backend and template directory
//! mopsd --metal https://metal.example:9443 --templates /etc/mops/reports
//!
//! # Validate config and templates without starting
//! mopsd --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use mops::config::AppConfig;
use mops::server::{init_tracing, report_engine, ServerHandle};

/// Metal Operations Server: operational reports over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "mopsd",
    version,
    about = "Renders operational reports from metal backend data",
    long_about = "Metal Operations Server: serves GET /report/{name}, rendering the \
                  template {name}.tmpl over report data read from the metal backend.\n\n\
                  Default config: ~/.config/mops/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "MOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the metal backend URL.
    #[arg(long)]
    metal: Option<String>,

    /// Override the metal backend username.
    #[arg(long)]
    metal_user: Option<String>,

    /// Override the metal backend password.
    #[arg(long)]
    metal_pass: Option<String>,

    /// Override the report template directory.
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration and templates, then exit.
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref url) = self.metal {
            config.metal.url = url.clone();
        }
        if let Some(ref user) = self.metal_user {
            config.metal.username = user.clone();
        }
        if let Some(ref pass) = self.metal_pass {
            config.metal.password = pass.clone();
        }
        if let Some(ref dir) = self.templates {
            config.templates.dir = dir.clone();
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.clone().unwrap_or_else(mops::default_config_path);

    let loaded = AppConfig::load(&config_path);
    let mut config = match loaded {
        Ok(ref cfg) => cfg.clone(),
        Err(_) => AppConfig::default(),
    };
    cli.apply(&mut config);

    // Overrides first, so --log-level takes effect
    init_tracing(&config.logging)?;
    match loaded {
        Ok(_) => info!("Configuration loaded from {}", config_path.display()),
        Err(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        let templates = report_engine(&config.templates).template_names()?;

        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Address     : {}", config.server.address());
        println!("   Metal       : {} (user {})", config.metal.url, config.metal.username);
        println!("   Templates   : {}", config.templates.dir.display());
        for name in templates {
            println!("                 - {name}");
        }
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(config).await?;
    handle.install_signal_handler();
    handle.wait().await?;

    info!("Metal Operations Server shutdown complete");
    Ok(())
}
