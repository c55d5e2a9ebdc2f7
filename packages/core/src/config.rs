use std::env;
use std::net::SocketAddr;

use crate::cli::Cli;
use crate::db::DEFAULT_MAX_CONNECTIONS;

pub const DEFAULT_APP_NAME: &str = "AppointMe";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://appointme.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub app_env: AppEnv,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEnv {
    Local,
    Staging,
    Production,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key/value source. Unset keys fall back to
    /// their defaults; set-but-invalid keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_name = lookup("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

        let app_env = match lookup("APP_ENV").as_deref().unwrap_or("local") {
            "local" => AppEnv::Local,
            "staging" => AppEnv::Staging,
            "production" => AppEnv::Production,
            other => return Err(format!("Invalid APP_ENV: {}", other)),
        };

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if database_url.trim().is_empty() {
            return Err("DATABASE_URL must not be empty".to_string());
        }

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|_| "BIND_ADDR must be a socket address like 0.0.0.0:5000")?;

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or("DB_MAX_CONNECTIONS must be a positive number")?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            app_name,
            app_env,
            database_url,
            bind_addr,
            db_max_connections,
        })
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(bind) = cli.bind {
            self.bind_addr = bind;
        }
        if let Some(max) = cli.max_connections {
            self.db_max_connections = max.max(1);
        }
        self
    }
}
