use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Duration;

use crate::crypto::TokenTtl;

/// Application-level constants
pub const APP_NAME: &str = "Prescripto";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_ACCESS_TTL_MINUTES: i64 = 60;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;
const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Upper bounds accepted from the environment.
const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;
const MAX_REFRESH_TTL_DAYS: i64 = 365;
const MAX_UPLOAD_MB: i64 = 1024;

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "prescripto=info,tower_http=warn"
}

/// Get the application data directory.
/// ~/Prescripto/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    /// HS256 secret. `None` means a random per-process secret.
    pub jwt_secret: Option<String>,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub max_upload_bytes: usize,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Build the configuration from `PRESCRIPTO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults rooted at `data_dir`, ignoring the environment.
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            db_path: data_dir.join("prescripto.db"),
            media_dir: data_dir.join("media"),
            data_dir,
            jwt_secret: None,
            access_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            admin_email: None,
            admin_password: None,
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = get("PRESCRIPTO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);
        let mut config = Self::for_data_dir(&data_dir);

        let bind = get("PRESCRIPTO_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        config.bind = bind.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "PRESCRIPTO_BIND",
            reason: e.to_string(),
        })?;

        if let Some(path) = get("PRESCRIPTO_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(path) = get("PRESCRIPTO_MEDIA_DIR") {
            config.media_dir = PathBuf::from(path);
        }

        if let Some(secret) = get("PRESCRIPTO_JWT_SECRET") {
            if secret.len() < crate::crypto::MIN_SECRET_LENGTH {
                return Err(ConfigError::Invalid {
                    key: "PRESCRIPTO_JWT_SECRET",
                    reason: format!(
                        "must be at least {} bytes",
                        crate::crypto::MIN_SECRET_LENGTH
                    ),
                });
            }
            config.jwt_secret = Some(secret);
        }

        if let Some(v) = get("PRESCRIPTO_ACCESS_TTL_MINUTES") {
            config.access_ttl_minutes =
                parse_bounded("PRESCRIPTO_ACCESS_TTL_MINUTES", &v, MAX_ACCESS_TTL_MINUTES)?;
        }
        if let Some(v) = get("PRESCRIPTO_REFRESH_TTL_DAYS") {
            config.refresh_ttl_days =
                parse_bounded("PRESCRIPTO_REFRESH_TTL_DAYS", &v, MAX_REFRESH_TTL_DAYS)?;
        }
        if let Some(v) = get("PRESCRIPTO_MAX_UPLOAD_MB") {
            let mb = parse_bounded("PRESCRIPTO_MAX_UPLOAD_MB", &v, MAX_UPLOAD_MB)?;
            config.max_upload_bytes = (mb as usize)
                .checked_mul(1024 * 1024)
                .ok_or(ConfigError::Invalid {
                    key: "PRESCRIPTO_MAX_UPLOAD_MB",
                    reason: "too large for this platform".into(),
                })?;
        }

        config.admin_email = get("PRESCRIPTO_ADMIN_EMAIL");
        config.admin_password = get("PRESCRIPTO_ADMIN_PASSWORD");
        if config.admin_email.is_some() != config.admin_password.is_some() {
            return Err(ConfigError::Invalid {
                key: "PRESCRIPTO_ADMIN_PASSWORD",
                reason: "admin email and password must be set together".into(),
            });
        }

        Ok(config)
    }

    /// Token lifetimes, re-checked against the same bounds as the
    /// environment since callers may build `AppConfig` by hand.
    pub fn token_ttl(&self) -> Result<TokenTtl, ConfigError> {
        let access = check_bounds(
            "PRESCRIPTO_ACCESS_TTL_MINUTES",
            self.access_ttl_minutes,
            MAX_ACCESS_TTL_MINUTES,
        )?;
        let refresh = check_bounds(
            "PRESCRIPTO_REFRESH_TTL_DAYS",
            self.refresh_ttl_days,
            MAX_REFRESH_TTL_DAYS,
        )?;
        Ok(TokenTtl {
            access: Duration::minutes(access),
            refresh: Duration::days(refresh),
        })
    }
}

fn parse_bounded(key: &'static str, value: &str, max: i64) -> Result<i64, ConfigError> {
    match value.parse::<i64>() {
        Ok(n) => check_bounds(key, n, max),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

fn check_bounds(key: &'static str, value: i64, max: i64) -> Result<i64, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be positive".into(),
        });
    }
    if value > max {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be at most {max}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("Prescripto"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[("PRESCRIPTO_DATA_DIR", "/srv/rx")]).unwrap();
        assert_eq!(config.bind.to_string(), "127.0.0.1:8000");
        assert_eq!(config.db_path, PathBuf::from("/srv/rx/prescripto.db"));
        assert_eq!(config.media_dir, PathBuf::from("/srv/rx/media"));
        assert_eq!(config.access_ttl_minutes, 60);
        assert_eq!(config.refresh_ttl_days, 7);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.jwt_secret.is_none());
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = load(&[
            ("PRESCRIPTO_BIND", "0.0.0.0:9000"),
            ("PRESCRIPTO_DB_PATH", "/tmp/x.db"),
            ("PRESCRIPTO_JWT_SECRET", &"s".repeat(40)),
            ("PRESCRIPTO_ACCESS_TTL_MINUTES", "5"),
            ("PRESCRIPTO_MAX_UPLOAD_MB", "2"),
            ("PRESCRIPTO_ADMIN_EMAIL", "root@example.com"),
            ("PRESCRIPTO_ADMIN_PASSWORD", "correct horse"),
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.access_ttl_minutes, 5);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
        assert_eq!(config.admin_email.as_deref(), Some("root@example.com"));
    }

    #[test]
    fn invalid_values_name_the_key() {
        let err = load(&[("PRESCRIPTO_BIND", "not an address")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PRESCRIPTO_BIND", .. }));

        let err = load(&[("PRESCRIPTO_ACCESS_TTL_MINUTES", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "PRESCRIPTO_ACCESS_TTL_MINUTES", .. }
        ));

        let err = load(&[("PRESCRIPTO_JWT_SECRET", "short")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PRESCRIPTO_JWT_SECRET", .. }));
    }

    #[test]
    fn oversized_values_are_rejected() {
        for (key, value) in [
            ("PRESCRIPTO_REFRESH_TTL_DAYS", "9223372036854775807"),
            ("PRESCRIPTO_REFRESH_TTL_DAYS", "366"),
            ("PRESCRIPTO_ACCESS_TTL_MINUTES", "9223372036854775807"),
            ("PRESCRIPTO_ACCESS_TTL_MINUTES", "1441"),
            ("PRESCRIPTO_MAX_UPLOAD_MB", "9223372036854775807"),
            ("PRESCRIPTO_MAX_UPLOAD_MB", "1025"),
        ] {
            let err = load(&[(key, value)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: k, .. } if k == key),
                "{key}={value} accepted"
            );
        }
    }

    #[test]
    fn upper_bounds_are_inclusive() {
        let config = load(&[
            ("PRESCRIPTO_REFRESH_TTL_DAYS", "365"),
            ("PRESCRIPTO_ACCESS_TTL_MINUTES", "1440"),
            ("PRESCRIPTO_MAX_UPLOAD_MB", "1024"),
        ])
        .unwrap();
        assert_eq!(config.max_upload_bytes, 1024 * 1024 * 1024);
        let ttl = config.token_ttl().unwrap();
        assert_eq!(ttl.refresh, Duration::days(365));
        assert_eq!(ttl.access, Duration::minutes(1440));
    }

    #[test]
    fn hand_built_ttls_are_checked() {
        let mut config = AppConfig::for_data_dir("/srv/rx");
        config.refresh_ttl_days = i64::MAX;
        assert!(matches!(
            config.token_ttl(),
            Err(ConfigError::Invalid { key: "PRESCRIPTO_REFRESH_TTL_DAYS", .. })
        ));
    }

    #[test]
    fn admin_credentials_must_come_in_pairs() {
        let err = load(&[("PRESCRIPTO_ADMIN_EMAIL", "root@example.com")]).unwrap_err();
        assert!(err.to_string().contains("set together"));
    }
}
