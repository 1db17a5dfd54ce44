//! Server Configuration
//!
//! Environment-driven settings with development defaults.

use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub provider_base_url: String,
    pub provider_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:questline.db?mode=rwc".to_string());
        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid BIND_ADDR: {}", e))?;
        let provider_base_url = std::env::var("PROVIDER_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:9090".to_string());
        let provider_api_key = std::env::var("PROVIDER_API_KEY").unwrap_or_default();

        Ok(Self {
            database_url,
            bind_addr,
            provider_base_url,
            provider_api_key,
        })
    }
}
