use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow::{Result, Context};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::RwLock;

/// Environment variable that overrides the configured database path
pub const DATABASE_PATH_ENV: &str = "BLUEBANK_DB";

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
    /// Maximum number of connections in the connection pool
    pub max_connections: u32,
    /// How long a unit of work waits for the write lock, in milliseconds
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Default pool settings for a database file at `path`
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_connections: 8,
            busy_timeout_ms: 5000,
        }
    }
}

/// Interest accrual configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterestConfig {
    /// Length of one accrual period in days
    pub period_days: i64,
    /// Decimal places each period's interest is rounded to
    pub posting_scale: u32,
    /// Advance the last-applied date by whole periods instead of snapping to today
    pub preserve_remainder_days: bool,
}

/// Ledger configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Fixed prefix of every generated account number
    pub account_number_prefix: String,
    /// How many identifiers to try before reporting a duplicate key
    pub id_generation_attempts: u32,
    /// Smallest credit limit a card can be issued with
    pub min_credit_limit: Decimal,
    /// Years until a newly issued card expires
    pub card_validity_years: i32,
    /// Annual rate suggested for new savings accounts
    pub default_savings_rate: Decimal,
    /// Interest accrual settings
    pub interest: InterestConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            account_number_prefix: "9825".to_string(),
            id_generation_attempts: 5,
            min_credit_limit: dec!(2000),
            card_validity_years: 3,
            default_savings_rate: dec!(0.012),
            interest: InterestConfig {
                period_days: 30,
                posting_scale: 6,
                preserve_remainder_days: false,
            },
        }
    }
}

/// Global application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Application version
    pub version: String,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Ledger configuration
    pub ledger: LedgerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "BlueBank".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseConfig::with_path("data/bluebank.db"),
            ledger: LedgerConfig::default(),
        }
    }
}

// Global configuration instance, used by the command-line front end only
lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::default());
}

/// Load configuration from file
pub fn load_config(path: &str) -> Result<()> {
    // If the file is missing, write the defaults out so they can be edited
    if !Path::new(path).exists() {
        let default_config = Config::default();
        save_config(path, &default_config)?;
        return update_config(with_env_overrides(default_config));
    }

    let mut file = File::open(path).context(format!("Failed to open config file: {}", path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).context("Failed to read config file")?;

    let config = parse_config(path, &contents)?;
    update_config(with_env_overrides(config))
}

fn parse_config(path: &str, contents: &str) -> Result<Config> {
    let config: Config = match path.ends_with(".toml") {
        true => toml::from_str(contents).context("Failed to parse TOML config")?,
        false => serde_json::from_str(contents).context("Failed to parse JSON config")?,
    };
    Ok(config)
}

fn with_env_overrides(mut config: Config) -> Config {
    if let Ok(db_path) = std::env::var(DATABASE_PATH_ENV) {
        if !db_path.trim().is_empty() {
            config.database.path = db_path;
        }
    }
    config
}

/// Save configuration to file
pub fn save_config(path: &str, config: &Config) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    let serialized = match path.ends_with(".toml") {
        true => toml::to_string_pretty(config).context("Failed to serialize config to TOML")?,
        false => serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?,
    };

    std::fs::write(path, serialized).context(format!("Failed to write config to file: {}", path))?;

    Ok(())
}

/// Get a copy of the current config
pub fn get_config() -> Config {
    match CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Replace the current config
pub fn update_config(config: Config) -> Result<()> {
    let mut current = CONFIG
        .write()
        .map_err(|_| anyhow::anyhow!("Configuration lock poisoned"))?;
    *current = config;
    Ok(())
}
