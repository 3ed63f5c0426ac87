//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and from `SPLITLEDGER__*` environment variables,
//! e.g. `SPLITLEDGER__APP__LEVEL=debug`.
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [database]
//! sqlite = "./splitledger.db"
//! ```
use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./splitledger.db?mode=rwc";

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
    Url(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
            Database::Url(url) => url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    #[serde(default)]
    pub database: Option<Database>,
}

impl Settings {
    /// Loads `path` when given (it must exist), otherwise `settings.toml`
    /// from the working directory if present.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path),
            None => File::with_name("settings").required(false),
        };
        Self::load(file)
    }

    fn load<S>(file: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        Config::builder()
            .set_default("app.level", "info")?
            .add_source(file)
            .add_source(Environment::with_prefix("SPLITLEDGER").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// `DATABASE_URL` wins over the configured database.
    pub fn database_url(&self) -> String {
        resolve_database_url(std::env::var("DATABASE_URL").ok(), self.database.as_ref())
    }
}

fn resolve_database_url(env_url: Option<String>, configured: Option<&Database>) -> String {
    match (env_url, configured) {
        (Some(url), _) if !url.trim().is_empty() => url,
        (_, Some(database)) => database.url(),
        _ => DEFAULT_DATABASE_URL.to_string(),
    }
}
