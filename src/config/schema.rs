use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_CONFIG_DIR_NAME: &str = ".school-assistant";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level assistant configuration, loaded from `config.toml`.
///
/// Resolution order: `--config-dir` → `SCHOOL_ASSISTANT_CONFIG_DIR` env → `~/.school-assistant/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// IANA timezone for calendar windows and rendered dates. Default: `"Asia/Manila"`.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Webhook server settings (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Messaging platform credentials and client settings (`[messenger]`).
    #[serde(default)]
    pub messenger: MessengerConfig,

    /// Session inactivity sweep (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Lookup cache lifetimes (`[cache]`).
    #[serde(default)]
    pub cache: CacheConfig,

    /// Data backend (`[data]`).
    #[serde(default)]
    pub data: DataConfig,
}

fn default_timezone() -> String {
    "Asia/Manila".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            timezone: default_timezone(),
            gateway: GatewayConfig::default(),
            messenger: MessengerConfig::default(),
            sessions: SessionsConfig::default(),
            cache: CacheConfig::default(),
            data: DataConfig::default(),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────

/// Webhook HTTP server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind address. Default: `127.0.0.1`. Overridden by `SCHOOL_ASSISTANT_GATEWAY_HOST` or `HOST`.
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Listen port. Default: `8080`. Overridden by `SCHOOL_ASSISTANT_GATEWAY_PORT` or `PORT`.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Upper bound for `/health` and the webhook handshake. Event deliveries
    /// are never cut short.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1_048_576
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── Messenger ─────────────────────────────────────────────────────

/// Messaging platform (`[messenger]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Token echoed back during webhook subscription.
    #[serde(default)]
    pub verify_token: String,
    /// Page token used for the Send API.
    #[serde(default)]
    pub page_access_token: String,
    /// When set, `X-Hub-Signature-256` is required on webhook events.
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_messenger_timeout_secs")]
    pub timeout_secs: u64,
    /// Greeting shown before the Get Started button (`setup-profile`).
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com".into()
}

fn default_api_version() -> String {
    "v18.0".into()
}

fn default_messenger_timeout_secs() -> u64 {
    15
}

fn default_greeting() -> String {
    "Hi {{user_first_name}}! Welcome to School Assistant. Tap Get Started to begin.".into()
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            page_access_token: String::new(),
            app_secret: None,
            graph_api_base: default_graph_api_base(),
            api_version: default_api_version(),
            timeout_secs: default_messenger_timeout_secs(),
            greeting: default_greeting(),
        }
    }
}

impl MessengerConfig {
    /// App secret, if one is configured and non-blank.
    pub fn app_secret(&self) -> Option<&str> {
        self.app_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ── Sessions ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Seconds between inactivity sweeps. Default: 30 minutes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Idle seconds after which a session is dropped. Default: 24 hours.
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    1800
}

fn default_inactivity_timeout_secs() -> u64 {
    86_400
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
        }
    }
}

// ── Cache ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// User lookups. Default: 1 hour.
    #[serde(default = "default_user_ttl_secs")]
    pub user_ttl_secs: u64,
    /// Student profile lookups. Default: 12 hours.
    #[serde(default = "default_student_profile_ttl_secs")]
    pub student_profile_ttl_secs: u64,
    /// Warm the user cache with every active user at startup.
    #[serde(default = "default_true")]
    pub preload_active_users: bool,
}

fn default_user_ttl_secs() -> u64 {
    3600
}

fn default_student_profile_ttl_secs() -> u64 {
    43_200
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_ttl_secs: default_user_ttl_secs(),
            student_profile_ttl_secs: default_student_profile_ttl_secs(),
            preload_active_users: true,
        }
    }
}

// ── Data ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON dataset seeding the in-memory backend. `~` and env vars are expanded.
    #[serde(default)]
    pub fixture_path: Option<String>,
}

impl DataConfig {
    pub fn resolved_fixture_path(&self) -> Option<PathBuf> {
        let raw = self.fixture_path.as_deref().map(str::trim)?;
        if raw.is_empty() {
            return None;
        }
        let expanded = shellexpand::full(raw)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        Some(PathBuf::from(expanded))
    }
}

// ── Loading ───────────────────────────────────────────────────────

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(DEFAULT_CONFIG_DIR_NAME))
}

fn resolve_config_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    if let Ok(dir) = std::env::var("SCHOOL_ASSISTANT_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(dir.trim()).into_owned()));
        }
    }
    default_config_dir()
}

/// First non-empty value among `names`.
fn env_value(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

impl Config {
    pub async fn load_or_init(config_dir: Option<&Path>) -> Result<Self> {
        let config_dir = resolve_config_dir(config_dir)?;
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(&config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;

            // Restrict permissions on newly created config file (holds tokens)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            config
        } else {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = fs::metadata(&config_path).await {
                    if meta.permissions().mode() & 0o004 != 0 {
                        tracing::warn!(
                            "Config file {:?} is world-readable (mode {:o}). \
                             Consider restricting with: chmod 600 {:?}",
                            config_path,
                            meta.permissions().mode() & 0o777,
                            config_path,
                        );
                    }
                }
            }

            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Parsed [`Config::timezone`].
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| {
                anyhow::anyhow!("timezone {:?} is not a known IANA name: {e}", self.timezone)
            })
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            bail!("gateway.host must not be empty");
        }
        if self.gateway.max_body_bytes == 0 {
            bail!("gateway.max_body_bytes must be greater than 0");
        }
        if self.gateway.request_timeout_secs == 0 {
            bail!("gateway.request_timeout_secs must be greater than 0");
        }
        if self.messenger.timeout_secs == 0 {
            bail!("messenger.timeout_secs must be greater than 0");
        }
        if self.sessions.sweep_interval_secs == 0 {
            bail!("sessions.sweep_interval_secs must be greater than 0");
        }
        if self.sessions.inactivity_timeout_secs == 0 {
            bail!("sessions.inactivity_timeout_secs must be greater than 0");
        }
        if self.cache.user_ttl_secs == 0 || self.cache.student_profile_ttl_secs == 0 {
            bail!("cache TTLs must be greater than 0");
        }
        self.tz()?;
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = env_value(&["SCHOOL_ASSISTANT_VERIFY_TOKEN", "FB_VERIFY_TOKEN"]) {
            self.messenger.verify_token = token;
        }
        if let Some(token) =
            env_value(&["SCHOOL_ASSISTANT_PAGE_ACCESS_TOKEN", "PAGE_ACCESS_TOKEN"])
        {
            self.messenger.page_access_token = token;
        }
        if let Some(secret) = env_value(&["SCHOOL_ASSISTANT_APP_SECRET", "FB_APP_SECRET"]) {
            self.messenger.app_secret = Some(secret);
        }

        // Gateway port: SCHOOL_ASSISTANT_GATEWAY_PORT or PORT
        if let Some(port_str) = env_value(&["SCHOOL_ASSISTANT_GATEWAY_PORT", "PORT"]) {
            match port_str.parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => {
                    tracing::warn!(value = %port_str, "Ignoring invalid gateway port override");
                }
            }
        }
        if let Some(host) = env_value(&["SCHOOL_ASSISTANT_GATEWAY_HOST", "HOST"]) {
            self.gateway.host = host;
        }

        if let Some(path) = env_value(&["SCHOOL_ASSISTANT_FIXTURE_PATH"]) {
            self.data.fixture_path = Some(path);
        }
        if let Some(tz) = env_value(&["SCHOOL_ASSISTANT_TIMEZONE"]) {
            self.timezone = tz;
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE_NAME);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{Mutex, MutexGuard};

    // ── Env override helpers ─────────────────────────────────

    const ENV_KEYS: &[&str] = &[
        "SCHOOL_ASSISTANT_CONFIG_DIR",
        "SCHOOL_ASSISTANT_VERIFY_TOKEN",
        "FB_VERIFY_TOKEN",
        "SCHOOL_ASSISTANT_PAGE_ACCESS_TOKEN",
        "PAGE_ACCESS_TOKEN",
        "SCHOOL_ASSISTANT_APP_SECRET",
        "FB_APP_SECRET",
        "SCHOOL_ASSISTANT_GATEWAY_PORT",
        "PORT",
        "SCHOOL_ASSISTANT_GATEWAY_HOST",
        "HOST",
        "SCHOOL_ASSISTANT_FIXTURE_PATH",
        "SCHOOL_ASSISTANT_TIMEZONE",
    ];

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        let guard = ENV_OVERRIDE_TEST_LOCK.lock().await;
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        guard
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.sessions.sweep_interval_secs, 1800);
        assert_eq!(config.sessions.inactivity_timeout_secs, 86_400);
        assert_eq!(config.tz().unwrap(), chrono_tz::Asia::Manila);
        assert!(config.messenger.app_secret().is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
timezone = "UTC"

[gateway]
port = 9000

[messenger]
verify_token = "abc"
app_secret = "  "
"#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.messenger.verify_token, "abc");
        assert_eq!(config.messenger.api_version, "v18.0");
        assert!(config.messenger.app_secret().is_none());
        assert!(config.cache.preload_active_users);
        assert_eq!(config.tz().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.gateway.host = "  ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sessions.sweep_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.user_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timezone = "Mars/Olympus".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Mars/Olympus"));
    }

    #[test]
    fn fixture_path_expands_tilde() {
        let mut data = DataConfig::default();
        assert!(data.resolved_fixture_path().is_none());

        data.fixture_path = Some("   ".into());
        assert!(data.resolved_fixture_path().is_none());

        data.fixture_path = Some("/srv/data.json".into());
        assert_eq!(
            data.resolved_fixture_path(),
            Some(PathBuf::from("/srv/data.json"))
        );

        data.fixture_path = Some("~/data.json".into());
        let resolved = data.resolved_fixture_path().unwrap();
        assert!(!resolved.to_string_lossy().starts_with('~'));
    }

    // ── Env override tests ───────────────────────────────────

    #[tokio::test]
    async fn env_overrides_prefer_prefixed_names() {
        let _env_guard = env_override_lock().await;
        let mut config = Config::default();

        std::env::set_var("FB_VERIFY_TOKEN", "legacy");
        std::env::set_var("SCHOOL_ASSISTANT_VERIFY_TOKEN", "prefixed");
        std::env::set_var("PAGE_ACCESS_TOKEN", "page-token");
        std::env::set_var("FB_APP_SECRET", "shh");
        config.apply_env_overrides();

        assert_eq!(config.messenger.verify_token, "prefixed");
        assert_eq!(config.messenger.page_access_token, "page-token");
        assert_eq!(config.messenger.app_secret(), Some("shh"));

        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[tokio::test]
    async fn env_override_gateway_port_and_host() {
        let _env_guard = env_override_lock().await;
        let mut config = Config::default();

        std::env::set_var("PORT", "not-a-port");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 8080);

        std::env::set_var("SCHOOL_ASSISTANT_GATEWAY_PORT", "9443");
        std::env::set_var("HOST", "0.0.0.0");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 9443);
        assert_eq!(config.gateway.host, "0.0.0.0");

        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    // ── Load / save ──────────────────────────────────────────

    #[tokio::test]
    async fn load_or_init_writes_defaults_then_reads_them_back() {
        let _env_guard = env_override_lock().await;
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested");

        let created = Config::load_or_init(Some(&dir)).await.unwrap();
        assert_eq!(created.config_path, dir.join(CONFIG_FILE_NAME));
        assert!(created.config_path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&created.config_path)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let mut edited = created.clone();
        edited.gateway.port = 7001;
        edited.messenger.verify_token = "tok".into();
        edited.save().await.unwrap();

        let loaded = Config::load_or_init(Some(&dir)).await.unwrap();
        assert_eq!(loaded.gateway.port, 7001);
        assert_eq!(loaded.messenger.verify_token, "tok");

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn load_or_init_rejects_malformed_toml() {
        let _env_guard = env_override_lock().await;
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "gateway = [").unwrap();

        let err = Config::load_or_init(Some(tmp.path())).await.unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[tokio::test]
    async fn env_config_dir_is_used_without_override() {
        let _env_guard = env_override_lock().await;
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("SCHOOL_ASSISTANT_CONFIG_DIR", tmp.path());

        let config = Config::load_or_init(None).await.unwrap();
        assert_eq!(config.config_path, tmp.path().join(CONFIG_FILE_NAME));

        std::env::remove_var("SCHOOL_ASSISTANT_CONFIG_DIR");
    }
}
