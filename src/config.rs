use crate::registry::KeySeed;
use std::collections::HashMap;
use tracing::{info, warn};
use url::Url;

const DEFAULT_VOTE_SECRET: &str = "gender-reveal";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind: String,
    pub max_connections: u32,
    pub vote_secret: String,
    pub seed: KeySeed,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).filter(|s| !s.is_empty()).cloned();

        let database_url = get("DATABASE_URL").unwrap_or_else(|| {
            // Fall back to the discrete DB_* variables older deployments set.
            let user = get("DB_USER").unwrap_or_else(|| "postgres".to_string());
            let password = get("DB_PASSWORD").unwrap_or_else(|| "postgres".to_string());
            let host = get("DB_HOST").unwrap_or_else(|| "localhost".to_string());
            let name = get("DB_NAME").unwrap_or_else(|| "gender_reveal".to_string());
            compose_database_url(&user, &password, &host, &name)
        });
        let bind = get("BIND").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let max_connections = get("DB_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let vote_secret = get("VOTE_SECRET").unwrap_or_else(|| {
            warn!("VOTE_SECRET not set, using the built-in default");
            DEFAULT_VOTE_SECRET.to_string()
        });

        let defaults = KeySeed::default();
        let users = get("USER_KEYS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.users);
        let seed = KeySeed {
            admin: get("ADMIN_KEY").unwrap_or(defaults.admin),
            doctor: get("DOCTOR_KEY").unwrap_or(defaults.doctor),
            users,
        };
        info!(bind = %bind, seed_users = seed.users.len(), "configuration loaded");

        Self {
            database_url,
            bind,
            max_connections,
            vote_secret,
            seed,
        }
    }
}

/// Credentials are percent-encoded so reserved characters in a password
/// survive the trip through the URL.
fn compose_database_url(user: &str, password: &str, host: &str, name: &str) -> String {
    let raw = format!("postgres://{host}/{name}");
    let mut url = match Url::parse(&raw) {
        Ok(url) => url,
        Err(err) => {
            warn!(%err, "DB_HOST/DB_NAME do not form a valid database URL");
            return raw;
        }
    };
    if url.set_username(user).is_err() || url.set_password(Some(password)).is_err() {
        warn!("cannot attach DB_USER/DB_PASSWORD to the database URL");
        return raw;
    }
    url.to_string()
}
