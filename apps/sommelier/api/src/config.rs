//! Configuration for the wine recommender

use core_config::{server::ServerConfig, AppInfo, FromEnv};
use domain_wines::WinesConfig;

pub use core_config::Environment;

/// Name reported by the health endpoints
pub const SERVICE_NAME: &str = "wine-recommender";

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    pub wines: WinesConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // HOST=0.0.0.0, PORT=8080
        let wines = WinesConfig::from_env()?;

        Ok(Self {
            app: AppInfo {
                name: SERVICE_NAME,
                version: env!("CARGO_PKG_VERSION"),
            },
            server,
            environment,
            wines,
        })
    }
}
