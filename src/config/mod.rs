use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::screening::DEFAULT_KEYWORDS;

const DEV_SECRET_KEY: &str = "dev-secret-key-change-me-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    secret_key: String,
    pub session_ttl_secs: u64,
    pub session_purge_interval_secs: u64,
    pub bcrypt_cost: u32,
    pub face_cascade_path: PathBuf,
    pub face_scale_factor: f64,
    pub face_min_neighbors: usize,
    pub max_upload_bytes: usize,
    pub max_image_dimension: u32,
    pub flagged_keywords: Vec<String>,
    pub cookie_secure: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("secret_key", &"[REDACTED]")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("face_cascade_path", &self.face_cascade_path)
            .field("face_scale_factor", &self.face_scale_factor)
            .field("face_min_neighbors", &self.face_min_neighbors)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("flagged_keywords", &self.flagged_keywords)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset keys fall
    /// back to their defaults; set-but-malformed keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = match lookup("SECRET_KEY") {
            Some(key) if !key.is_empty() => key,
            _ if cfg!(debug_assertions) => {
                tracing::warn!("SECRET_KEY not set, using insecure default for development");
                DEV_SECRET_KEY.to_string()
            }
            _ => return Err(ConfigError::Missing("SECRET_KEY")),
        };

        let session_ttl_secs = match lookup("SESSION_TTL") {
            Some(raw) => parse_duration_secs(&raw).ok_or(ConfigError::Invalid {
                key: "SESSION_TTL",
                value: raw,
            })?,
            None => 24 * 3600,
        };

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let face_scale_factor = parse_or(&lookup, "FACE_SCALE_FACTOR", 1.1_f64)?;
        if !(face_scale_factor > 1.0) {
            return Err(ConfigError::Invalid {
                key: "FACE_SCALE_FACTOR",
                value: face_scale_factor.to_string(),
            });
        }

        let max_image_dimension = parse_or(&lookup, "MAX_IMAGE_DIMENSION", 4096_u32)?;
        if max_image_dimension == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_IMAGE_DIMENSION",
                value: max_image_dimension.to_string(),
            });
        }

        let flagged_keywords = match lookup("FLAGGED_KEYWORDS") {
            Some(raw) => {
                let words: Vec<String> = raw
                    .split(',')
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect();
                if words.is_empty() {
                    return Err(ConfigError::Invalid {
                        key: "FLAGGED_KEYWORDS",
                        value: raw,
                    });
                }
                words
            }
            None => DEFAULT_KEYWORDS.iter().map(|w| w.to_string()).collect(),
        };

        Ok(Config {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or(&lookup, "SERVER_PORT", 5000)?,
            secret_key,
            session_ttl_secs,
            session_purge_interval_secs: parse_or(&lookup, "SESSION_PURGE_INTERVAL_SECS", 300)?,
            bcrypt_cost,
            face_cascade_path: lookup("FACE_CASCADE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/haarcascade_frontalface_default.xml")),
            face_scale_factor,
            face_min_neighbors: parse_or(&lookup, "FACE_MIN_NEIGHBORS", 4)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            max_image_dimension,
            flagged_keywords,
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
        })
    }

    pub fn secret_key_bytes(&self) -> &[u8] {
        self.secret_key.as_bytes()
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_purge_interval(&self) -> Duration {
        Duration::from_secs(self.session_purge_interval_secs.max(1))
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

// "24h" means hours, a bare number means seconds
fn parse_duration_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_suffix('h') {
        Some(hours) => hours.parse::<u64>().ok().map(|h| h * 3600),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[("SECRET_KEY", "k")])).unwrap();
        assert_eq!(config.server_port, 5000);
        assert_eq!(config.session_ttl_secs, 86_400);
        assert_eq!(config.face_min_neighbors, 4);
        assert_eq!(config.face_scale_factor, 1.1);
        assert_eq!(config.flagged_keywords, DEFAULT_KEYWORDS);
        assert_eq!(config.max_image_dimension, 4096);
        assert!(!config.cookie_secure);
    }

    #[test]
    fn session_ttl_accepts_hours_and_seconds() {
        let hours = Config::from_lookup(lookup_from(&[("SECRET_KEY", "k"), ("SESSION_TTL", "2h")]))
            .unwrap();
        assert_eq!(hours.session_ttl_secs, 7200);

        let secs = Config::from_lookup(lookup_from(&[("SECRET_KEY", "k"), ("SESSION_TTL", "90")]))
            .unwrap();
        assert_eq!(secs.session_ttl_secs, 90);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("SECRET_KEY", "k"), ("SERVER_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_PORT", .. }));

        let err = Config::from_lookup(lookup_from(&[
            ("SECRET_KEY", "k"),
            ("FACE_SCALE_FACTOR", "1.0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FACE_SCALE_FACTOR", .. }));

        let err = Config::from_lookup(lookup_from(&[("SECRET_KEY", "k"), ("BCRYPT_COST", "2")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BCRYPT_COST", .. }));

        let err = Config::from_lookup(lookup_from(&[
            ("SECRET_KEY", "k"),
            ("MAX_IMAGE_DIMENSION", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_IMAGE_DIMENSION", .. }));
    }

    #[test]
    fn keyword_override_is_normalised() {
        let config = Config::from_lookup(lookup_from(&[
            ("SECRET_KEY", "k"),
            ("FLAGGED_KEYWORDS", " Riot, ,LOOT "),
        ]))
        .unwrap();
        assert_eq!(config.flagged_keywords, vec!["riot", "loot"]);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config =
            Config::from_lookup(lookup_from(&[("SECRET_KEY", "super-secret")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
