use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

use crate::{profiles::FanoutStrategy, rooms::DispatchMode};

const DEFAULT_FIREBASE_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_FIREBASE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub base_url: String,
    /// Where refresh tokens are exchanged for new ID tokens.
    pub token_url: String,
}

#[derive(Debug, Clone)]
pub struct AlgoliaConfig {
    pub app_id: String,
    pub api_key: String,
    pub index: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub public_url: String,
    pub objects_dir: PathBuf,
    pub firebase: FirebaseConfig,
    pub algolia: Option<AlgoliaConfig>,
    pub oauth_clients: Option<PathBuf>,
    pub session_minutes: i64,
    pub remote_timeout: Duration,
    pub fanout: FanoutStrategy,
    pub dispatch: DispatchMode,
}

impl Config {
    /// Reads the process environment, including a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned());
        let public_url = get("PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_owned())
            .trim_end_matches('/')
            .to_owned();

        let firebase = FirebaseConfig {
            api_key: require("FIREBASE_API_KEY")?,
            base_url: get("FIREBASE_AUTH_URL")
                .unwrap_or_else(|| DEFAULT_FIREBASE_AUTH_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            token_url: get("FIREBASE_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_FIREBASE_TOKEN_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
        };

        let algolia = match get("ALGOLIA_APP_ID") {
            Some(app_id) => Some(AlgoliaConfig {
                base_url: get("ALGOLIA_URL")
                    .unwrap_or_else(|| format!("https://{app_id}-dsn.algolia.net"))
                    .trim_end_matches('/')
                    .to_owned(),
                api_key: require("ALGOLIA_API_KEY")?,
                index: require("ALGOLIA_INDEX")?,
                app_id,
            }),
            None => None,
        };

        Ok(Config {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://pairchat.db".to_owned()),
            bind_addr,
            public_url,
            objects_dir: get("OBJECTS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("objects")),
            firebase,
            algolia,
            oauth_clients: get("OAUTH_CLIENTS").map(PathBuf::from),
            session_minutes: parse_or(&get, "SESSION_MINUTES", 30)?,
            remote_timeout: Duration::from_secs(parse_or(&get, "REMOTE_TIMEOUT_SECS", 10)?),
            fanout: parse_or(&get, "FANOUT", FanoutStrategy::default())?,
            dispatch: parse_or(&get, "DISPATCH", DispatchMode::default())?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
