use std::env;
use std::time::Duration;

/// Default upstream fetch timeout in seconds. Short enough to stay under
/// typical platform request-timeout ceilings.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Desktop User-Agent presented to origin servers that reject obviously
/// proxied requests.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Per upstream fetch timeout. For streamed bodies this bounds time to
    /// response headers only, so long-lived segment transfers are not capped.
    pub upstream_timeout: Duration,
    /// User-Agent sent on every outbound fetch
    pub user_agent: String,
    /// Forward the inbound Range header upstream (enables seeking)
    pub forward_range: bool,
    /// Send Referer/Origin set to the upstream origin (many CDNs reject
    /// missing-referer requests)
    pub forward_origin: bool,
    /// Allow target URLs pointing at private/reserved IP ranges.
    /// Only sensible for local development and tests.
    pub allow_private_targets: bool,
    /// Per-IP rate limit in requests per minute (0 = disabled)
    pub rate_limit_rpm: u32,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Check if running in dev mode
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let timeout_secs: u64 = env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let user_agent =
            env::var("USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        // Header forwarding policy is configurable: some origins reject
        // Range or Origin headers instead of requiring them.
        let forward_range = env::var("FORWARD_RANGE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let forward_origin = env::var("FORWARD_ORIGIN")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        // Private targets only allowed when explicitly requested or in dev
        let allow_private_targets = env::var("ALLOW_PRIVATE_TARGETS")
            .unwrap_or_else(|_| is_dev.to_string())
            .parse()
            .unwrap_or(is_dev);

        let rate_limit_rpm: u32 = env::var("RATE_LIMIT_RPM")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);

        Ok(Config {
            port,
            is_dev,
            upstream_timeout: Duration::from_secs(timeout_secs),
            user_agent,
            forward_range,
            forward_origin,
            allow_private_targets,
            rate_limit_rpm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all env-var tests to prevent races between parallel test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Set env vars, run `f`, then restore original state.
    ///
    /// `set` — vars to set; `unset` — vars to remove before running `f`.
    fn with_env(set: &[(&str, &str)], unset: &[&str], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());

        // Save state for all touched vars
        let save_set: Vec<(&str, Option<String>)> = set
            .iter()
            .map(|(k, _)| (*k, std::env::var(k).ok()))
            .collect();
        let save_unset: Vec<(&str, Option<String>)> =
            unset.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        for (k, v) in set {
            // SAFETY: serialized by ENV_LOCK — no other thread modifies env vars concurrently.
            unsafe { std::env::set_var(k, v) };
        }
        for k in unset {
            unsafe { std::env::remove_var(k) };
        }

        f();

        // Restore
        for (k, old) in save_set.into_iter().chain(save_unset) {
            match old {
                Some(v) => unsafe { std::env::set_var(k, v) },
                None => unsafe { std::env::remove_var(k) },
            }
        }
    }

    #[test]
    fn dev_mode_uses_defaults() {
        with_env(
            &[("DEV_MODE", "true")],
            &[
                "PORT",
                "UPSTREAM_TIMEOUT_SECS",
                "USER_AGENT",
                "FORWARD_RANGE",
                "FORWARD_ORIGIN",
                "ALLOW_PRIVATE_TARGETS",
                "RATE_LIMIT_RPM",
            ],
            || {
                let config = Config::from_env().expect("should succeed in dev mode");
                assert!(config.is_dev);
                assert_eq!(config.port, 3000);
                assert_eq!(config.upstream_timeout, Duration::from_secs(15));
                assert!(config.user_agent.starts_with("Mozilla/5.0"));
                assert!(config.forward_range);
                assert!(config.forward_origin);
                assert!(config.allow_private_targets, "dev mode allows local targets");
                assert_eq!(config.rate_limit_rpm, 0);
            },
        );
    }

    #[test]
    fn prod_mode_requires_port() {
        with_env(&[], &["DEV_MODE", "PORT"], || {
            let result = Config::from_env();
            assert!(result.is_err(), "Should fail without PORT in prod mode");
        });
    }

    #[test]
    fn prod_mode_blocks_private_targets_by_default() {
        with_env(
            &[("PORT", "8080")],
            &["DEV_MODE", "ALLOW_PRIVATE_TARGETS"],
            || {
                let config = Config::from_env().unwrap();
                assert!(!config.allow_private_targets);
            },
        );
    }

    #[test]
    fn timeout_parsed() {
        with_env(
            &[("DEV_MODE", "true"), ("UPSTREAM_TIMEOUT_SECS", "25")],
            &[],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.upstream_timeout, Duration::from_secs(25));
            },
        );
    }

    #[test]
    fn invalid_timeout_falls_back_to_default() {
        with_env(
            &[("DEV_MODE", "true"), ("UPSTREAM_TIMEOUT_SECS", "soon")],
            &[],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.upstream_timeout, Duration::from_secs(15));
            },
        );
    }

    #[test]
    fn header_forwarding_can_be_disabled() {
        with_env(
            &[
                ("DEV_MODE", "true"),
                ("FORWARD_RANGE", "false"),
                ("FORWARD_ORIGIN", "false"),
            ],
            &[],
            || {
                let config = Config::from_env().unwrap();
                assert!(!config.forward_range);
                assert!(!config.forward_origin);
            },
        );
    }

    #[test]
    fn rate_limit_parsed() {
        with_env(&[("DEV_MODE", "true"), ("RATE_LIMIT_RPM", "120")], &[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.rate_limit_rpm, 120);
        });
    }
}
