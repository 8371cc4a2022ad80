use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers via `FromRef`, like every other piece of `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie defaults.
    pub env: Env,
    // Directory holding one JSON file per collection plus the commit journal.
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub session_ttl: Duration,
    // Adds the `Secure` attribute to the session cookie.
    pub session_cookie_secure: bool,
    pub ad_sweep_interval: Duration,
    pub session_sweep_interval: Duration,
    pub bcrypt_cost: u32,
    // Newest audit entries kept; older ones are dropped on append.
    pub log_retention: usize,
    // Initial headline text. The live value is held by `HeadlineState`.
    pub headline: String,
    // `None` allows any origin.
    pub allowed_origins: Option<Vec<String>>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// BootstrapAdmin
///
/// Credentials for the first admin account, created at startup when the user
/// collection is empty.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Env
///
/// Defines the runtime context: pretty logs and relaxed defaults locally, JSON logs
/// and mandatory settings in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:3000".to_string(),
            session_ttl: Duration::from_secs(86_400),
            session_cookie_secure: false,
            ad_sweep_interval: Duration::from_secs(600),
            session_sweep_interval: Duration::from_secs(300),
            // The minimum bcrypt accepts; keeps hashing fast in tests.
            bcrypt_cost: 4,
            log_retention: 10_000,
            headline: "Welcome to Wrytix".to_string(),
            allowed_origins: None,
            bootstrap_admin: None,
        }
    }
}

/// Longest accepted duration setting (one year).
const MAX_DURATION_SECS: u64 = 365 * 86_400;

/// Reads a whole number of seconds and rejects values outside `1..=max`.
fn parse_secs(name: &str, default: u64, max: u64) -> Duration {
    let secs: u64 = parse_var(name, default);
    if !(1..=max).contains(&secs) {
        panic!("FATAL: {name} must be between 1 and {max} seconds, got {secs}");
    }
    Duration::from_secs(secs)
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} has an invalid value: {raw:?}")),
        Err(_) => default,
    }
}

impl AppConfig {
    /// load
    ///
    /// The canonical function for initializing the application configuration at startup.
    /// Reads every parameter from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics if a value cannot be parsed or is out of range, or if a setting
    /// mandatory in production (`DATA_DIR`) is missing.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let data_dir = match env {
            Env::Production => env::var("DATA_DIR").expect("FATAL: DATA_DIR must be set in production."),
            Env::Local => env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
        };

        let allowed_origins = match env::var("ALLOWED_ORIGINS") {
            Ok(raw) if raw.trim() != "*" && !raw.trim().is_empty() => Some(
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            ),
            _ => None,
        };

        let bootstrap_admin = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| format!("{username}@localhost"));
                Some(BootstrapAdmin { username, password, email })
            }
            _ => None,
        };

        let bcrypt_cost: u32 = parse_var("BCRYPT_COST", 10);
        if !(4..=31).contains(&bcrypt_cost) {
            panic!("FATAL: BCRYPT_COST must be between 4 and 31, got {bcrypt_cost}");
        }

        let log_retention: usize = parse_var("LOG_RETENTION", 10_000);
        if log_retention == 0 {
            panic!("FATAL: LOG_RETENTION must be at least 1");
        }

        Self {
            session_cookie_secure: parse_var("SESSION_COOKIE_SECURE", env == Env::Production),
            env,
            data_dir: PathBuf::from(data_dir),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            session_ttl: parse_secs("SESSION_TTL_SECS", 86_400, MAX_DURATION_SECS),
            ad_sweep_interval: parse_secs("AD_SWEEP_INTERVAL_SECS", 600, MAX_DURATION_SECS),
            session_sweep_interval: parse_secs("SESSION_SWEEP_INTERVAL_SECS", 300, MAX_DURATION_SECS),
            bcrypt_cost,
            log_retention,
            headline: env::var("HEADLINE").unwrap_or_else(|_| "Welcome to Wrytix".to_string()),
            allowed_origins,
            bootstrap_admin,
        }
    }
}
