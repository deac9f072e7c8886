//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use spendcast_core::config::ForecastConfig;
use spendcast_server::auth::{API_KEYS_ENV, TRUST_USER_HEADER_ENV, USER_HEADER_ENV};
use spendcast_server::ServerConfig;

use super::open_db;

/// Server settings from the environment, the forecast config and CLI flags
pub fn build_server_config(no_auth: bool, config_path: Option<&Path>) -> Result<ServerConfig> {
    let forecast = ForecastConfig::load(config_path).context("Failed to load forecast config")?;
    Ok(ServerConfig {
        require_auth: !no_auth,
        forecast,
        ..ServerConfig::from_env()
    })
}

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting Spendcast web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let config = build_server_config(no_auth, config_path)?;

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if config.api_keys.is_empty() {
        println!(
            "   🔒 Authentication: identity header '{}' ({})",
            config.user_header, USER_HEADER_ENV
        );
    } else {
        println!(
            "   🔑 API keys: {} configured ({})",
            config.api_keys.len(),
            API_KEYS_ENV
        );
        if config.trust_user_header {
            println!(
                "   🔒 Identity header '{}' also trusted ({})",
                config.user_header, TRUST_USER_HEADER_ENV
            );
        } else {
            println!(
                "   🔒 Identity header ignored; set {} to trust it",
                TRUST_USER_HEADER_ENV
            );
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("Static dir path must be valid UTF-8"))
        .transpose()?;
    spendcast_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
