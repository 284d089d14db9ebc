//! Runtime settings read from the environment (and `.env`, via dotenvy).
//!
//! | variable              | default                        |
//! |-----------------------|--------------------------------|
//! | `DATABASE_URL`        | required                       |
//! | `PORT`                | `3000`                         |
//! | `PUBLIC_BASE_URL`     | `http://localhost:<PORT>`      |
//! | `ACCESS_TOKEN_SECRET` | random per process             |
//! | `MAX_RANGE_DAYS`      | `90`                           |
//! | `WARN_RANGE_DAYS`     | `30`                           |
//! | `SHARE_ID_RETRIES`    | `10`                           |
//! | `STATIC_DIR`          | `assets`                       |

use crate::calendar::RangePolicy;
use crate::password::AccessTokens;
use rand::Rng;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("WARN_RANGE_DAYS ({warn}) must be below MAX_RANGE_DAYS ({max})")]
    Policy { warn: i64, max: i64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub public_base_url: String,
    pub access_tokens: AccessTokens,
    pub range_policy: RangePolicy,
    pub share_id_attempts: u32,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port: u16 = parse(&lookup, "PORT", 3000)?;
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let secret = match lookup("ACCESS_TOKEN_SECRET") {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!("ACCESS_TOKEN_SECRET not set, password access tokens will not survive a restart");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill(&mut secret[..]);
                secret
            }
        };

        let range_policy = RangePolicy {
            max_days: parse(&lookup, "MAX_RANGE_DAYS", RangePolicy::default().max_days)?,
            warn_days: parse(&lookup, "WARN_RANGE_DAYS", RangePolicy::default().warn_days)?,
        };
        if range_policy.warn_days < 1 || range_policy.warn_days >= range_policy.max_days {
            return Err(ConfigError::Policy {
                warn: range_policy.warn_days,
                max: range_policy.max_days,
            });
        }

        let share_id_attempts: u32 = parse(&lookup, "SHARE_ID_RETRIES", 10)?;
        if share_id_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "SHARE_ID_RETRIES",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            port,
            public_base_url,
            access_tokens: AccessTokens::new(secret),
            range_policy,
            share_id_attempts,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets")),
        })
    }

    pub fn share_url(&self, share_id: &str) -> String {
        format!("{}/e/{share_id}", self.public_base_url)
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
