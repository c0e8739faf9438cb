//! Run configuration assembled from `REDMINE_*` environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::env_config::{EnvLookup, ProcessEnv, flag_with_default, non_empty, parse_with_default};
use crate::{PaginationCursor, Result, RetryPolicy, SweepError};

/// Default page size for list requests.
pub const DEFAULT_LIMIT: u32 = 10;
/// Default sort order for list requests.
pub const DEFAULT_SORT: &str = "created_on:asc";
/// Default download root.
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

/// How the browser session authenticates against the web UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// `Authorization: Basic` header injected once at session start.
    Basic,
    /// Interactive submission of the login form.
    LoginPage,
}

impl AuthMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::LoginPage => "login_page",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "login_page" => Ok(Self::LoginPage),
            other => Err(SweepError::Configuration(format!(
                "unsupported auth method '{other}' (expected 'basic' or 'login_page')"
            ))),
        }
    }
}

/// Username/password pair. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub credentials: Option<Credentials>,
    pub verify_ssl: bool,
    pub list_retry: RetryPolicy,
    pub download_retry: RetryPolicy,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("credentials", &self.credentials)
            .field("verify_ssl", &self.verify_ssl)
            .field("list_retry", &self.list_retry)
            .field("download_retry", &self.download_retry)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationSettings {
    pub limit: u32,
    pub offset_start: u32,
    /// Exclusive end offset; `None` pages until the data runs out.
    pub offset_end: Option<u32>,
    pub sort: String,
    pub request_interval: Duration,
}

impl PaginationSettings {
    #[must_use]
    pub fn cursor(&self) -> PaginationCursor {
        PaginationCursor::new(self.offset_start, self.limit, self.sort.clone(), self.offset_end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub directory: PathBuf,
    /// Wipe `directory` once before the run.
    pub clear_before_run: bool,
    /// Pause between attachment downloads and between tickets.
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub auth_method: AuthMethod,
    pub headless: bool,
    /// Default timeout for every browser operation.
    pub timeout: Duration,
    pub executable: Option<PathBuf>,
    /// Pause between attachment deletions and between tickets.
    pub delete_interval: Duration,
    pub delete_retry: RetryPolicy,
}

/// Complete configuration for one run.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub api: ApiSettings,
    pub pagination: PaginationSettings,
    pub download: DownloadSettings,
    pub browser: BrowserSettings,
    /// Skip the interactive yes/no prompt before deleting.
    pub confirm_skip: bool,
}

fn secs<L: EnvLookup + ?Sized>(env: &L, var: &str, default: f64) -> Duration {
    let value = parse_with_default(env, var, default);
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| {
        tracing::warn!(var, value, default, "negative or non-finite duration, using default");
        Duration::from_secs_f64(default)
    })
}

impl SweepConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// See [`SweepConfig::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Load from any variable source.
    ///
    /// # Errors
    /// [`SweepError::Configuration`] if `REDMINE_BASE_URL` is missing, the
    /// page size is zero, or the auth method is unknown.
    pub fn from_lookup<L: EnvLookup + ?Sized>(env: &L) -> Result<Self> {
        let base_url = non_empty(env, "REDMINE_BASE_URL")
            .ok_or_else(|| SweepError::Configuration("REDMINE_BASE_URL is not set".to_owned()))?;
        let base_url = base_url.trim_end_matches('/').to_owned();

        let credentials =
            match (non_empty(env, "REDMINE_USERNAME"), non_empty(env, "REDMINE_PASSWORD")) {
                (Some(username), Some(password)) => Some(Credentials { username, password }),
                _ => None,
            };

        let limit = parse_with_default(env, "REDMINE_LIMIT", DEFAULT_LIMIT);
        if limit == 0 {
            return Err(SweepError::Configuration("REDMINE_LIMIT must be greater than 0".to_owned()));
        }
        let offset_end = parse_with_default(env, "REDMINE_OFFSET_END", 0_u32);

        let api = ApiSettings {
            base_url: base_url.clone(),
            api_key: non_empty(env, "REDMINE_API_KEY"),
            credentials: credentials.clone(),
            verify_ssl: flag_with_default(env, "REDMINE_VERIFY_SSL", true),
            list_retry: RetryPolicy::new(
                parse_with_default(env, "REDMINE_RETRY_COUNT", 3),
                secs(env, "REDMINE_REQUEST_TIMEOUT", 15.0),
                secs(env, "REDMINE_REQUEST_TIMEOUT_INCREMENT", 15.0),
                secs(env, "REDMINE_RETRY_INTERVAL", 5.0),
            ),
            download_retry: RetryPolicy::new(
                parse_with_default(env, "REDMINE_DOWNLOAD_RETRY_COUNT", 3),
                secs(env, "REDMINE_DOWNLOAD_TIMEOUT", 60.0),
                secs(env, "REDMINE_DOWNLOAD_TIMEOUT_INCREMENT", 30.0),
                secs(env, "REDMINE_DOWNLOAD_RETRY_INTERVAL", 5.0),
            ),
        };

        let pagination = PaginationSettings {
            limit,
            offset_start: parse_with_default(env, "REDMINE_OFFSET_START", 0),
            offset_end: (offset_end > 0).then_some(offset_end),
            sort: non_empty(env, "REDMINE_SORT").unwrap_or_else(|| DEFAULT_SORT.to_owned()),
            request_interval: secs(env, "REDMINE_REQUEST_INTERVAL", 1.0),
        };

        let download = DownloadSettings {
            directory: non_empty(env, "REDMINE_DOWNLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_DIR.to_owned())
                .into(),
            clear_before_run: flag_with_default(env, "REDMINE_CLEAR_DOWNLOADS", false),
            interval: secs(env, "REDMINE_DOWNLOAD_INTERVAL", 0.5),
        };

        let timeout = secs(env, "REDMINE_BROWSER_TIMEOUT", 30.0);
        let browser = BrowserSettings {
            base_url: non_empty(env, "REDMINE_BROWSER_BASE_URL")
                .map_or_else(|| base_url.clone(), |u| u.trim_end_matches('/').to_owned()),
            credentials,
            auth_method: non_empty(env, "REDMINE_AUTH_METHOD")
                .map_or(Ok(AuthMethod::LoginPage), |m| m.parse())?,
            headless: flag_with_default(env, "REDMINE_BROWSER_HEADLESS", true),
            timeout,
            executable: non_empty(env, "REDMINE_BROWSER_EXECUTABLE").map(PathBuf::from),
            delete_interval: secs(env, "REDMINE_DELETE_INTERVAL", 1.0),
            delete_retry: RetryPolicy::new(
                parse_with_default(env, "REDMINE_DELETE_RETRY_COUNT", 3),
                timeout,
                Duration::ZERO,
                secs(env, "REDMINE_DELETE_RETRY_INTERVAL", 2.0),
            ),
        };

        Ok(Self {
            api,
            pagination,
            download,
            browser,
            confirm_skip: flag_with_default(env, "REDMINE_DELETE_CONFIRM_SKIP", false),
        })
    }

    /// Listing and downloading need an API key or a username/password pair.
    ///
    /// # Errors
    /// [`SweepError::Configuration`] when neither is configured.
    pub fn require_api_auth(&self) -> Result<()> {
        if self.api.api_key.is_none() && self.api.credentials.is_none() {
            return Err(SweepError::Configuration(
                "set REDMINE_API_KEY or REDMINE_USERNAME/REDMINE_PASSWORD".to_owned(),
            ));
        }
        if self.api.api_key.is_none() {
            tracing::warn!("REDMINE_API_KEY is not set, listing with username/password");
        }
        Ok(())
    }

    /// Deleting drives the web UI and always needs a username/password pair.
    ///
    /// # Errors
    /// [`SweepError::Configuration`] when credentials are missing.
    pub fn require_browser_auth(&self) -> Result<&Credentials> {
        self.browser.credentials.as_ref().ok_or_else(|| {
            SweepError::Configuration(
                "browser deletes need REDMINE_USERNAME and REDMINE_PASSWORD".to_owned(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<SweepConfig> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        SweepConfig::from_lookup(&move |k: &str| map.get(k).cloned())
    }

    #[test]
    fn test_missing_base_url_is_configuration_error() {
        let err = config(&[("REDMINE_API_KEY", "k")]).unwrap_err();
        assert!(matches!(err, SweepError::Configuration(_)));
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("REDMINE_BASE_URL", "https://redmine.example/")]).unwrap();
        assert_eq!(cfg.api.base_url, "https://redmine.example");
        assert_eq!(cfg.browser.base_url, "https://redmine.example");
        assert_eq!(cfg.pagination.limit, 10);
        assert_eq!(cfg.pagination.offset_end, None);
        assert_eq!(cfg.pagination.sort, "created_on:asc");
        assert_eq!(cfg.pagination.request_interval, Duration::from_secs(1));
        assert_eq!(cfg.api.list_retry.max_retries, 3);
        assert_eq!(cfg.api.list_retry.timeout_for(2), Duration::from_secs(45));
        assert_eq!(cfg.browser.auth_method, AuthMethod::LoginPage);
        assert_eq!(cfg.browser.delete_retry.interval, Duration::from_secs(2));
        assert_eq!(cfg.download.directory, PathBuf::from("downloads"));
        assert!(!cfg.download.clear_before_run);
        assert!(cfg.api.verify_ssl);
        assert!(!cfg.confirm_skip);
    }

    #[test]
    fn test_offset_range_and_overrides() {
        let cfg = config(&[
            ("REDMINE_BASE_URL", "https://r"),
            ("REDMINE_OFFSET_START", "20"),
            ("REDMINE_OFFSET_END", "100"),
            ("REDMINE_LIMIT", "25"),
            ("REDMINE_BROWSER_BASE_URL", "https://web.r/"),
            ("REDMINE_AUTH_METHOD", "BASIC"),
            ("REDMINE_VERIFY_SSL", "false"),
        ])
        .unwrap();
        let cursor = cfg.pagination.cursor();
        assert_eq!(cursor.offset(), 20);
        assert_eq!(cursor.limit(), 25);
        assert_eq!(cursor.hard_end(), Some(100));
        assert_eq!(cfg.browser.base_url, "https://web.r");
        assert_eq!(cfg.browser.auth_method, AuthMethod::Basic);
        assert!(!cfg.api.verify_ssl);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = config(&[("REDMINE_BASE_URL", "https://r"), ("REDMINE_LIMIT", "0")]).unwrap_err();
        assert!(matches!(err, SweepError::Configuration(_)));
    }

    #[test]
    fn test_unknown_auth_method_rejected() {
        let err = config(&[("REDMINE_BASE_URL", "https://r"), ("REDMINE_AUTH_METHOD", "oauth")])
            .unwrap_err();
        assert!(err.to_string().contains("oauth"));
    }

    #[test]
    fn test_negative_interval_falls_back_to_default() {
        let cfg =
            config(&[("REDMINE_BASE_URL", "https://r"), ("REDMINE_DOWNLOAD_INTERVAL", "-3")])
                .unwrap();
        assert_eq!(cfg.download.interval, Duration::from_millis(500));
    }

    #[test]
    fn test_auth_requirements() {
        let cfg = config(&[("REDMINE_BASE_URL", "https://r")]).unwrap();
        assert!(cfg.require_api_auth().is_err());
        assert!(cfg.require_browser_auth().is_err());

        let cfg = config(&[
            ("REDMINE_BASE_URL", "https://r"),
            ("REDMINE_USERNAME", "admin"),
            ("REDMINE_PASSWORD", "secret"),
        ])
        .unwrap();
        assert!(cfg.require_api_auth().is_ok());
        assert_eq!(cfg.require_browser_auth().unwrap().username, "admin");
        assert!(!format!("{:?}", cfg.api).contains("secret"));
    }
}
