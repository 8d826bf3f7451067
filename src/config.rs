use std::path::PathBuf;

pub const DEV_SESSION_SECRET: &str = "change-this-secret-key-in-production";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PORT must be a number between 1 and 65535, got {0:?}")]
    InvalidPort(String),
    #[error("SESSION_SECRET must be set in production")]
    MissingSecret,
    #[error("SESSION_SECRET must be at least {MIN_SECRET_LEN} characters long")]
    WeakSecret,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub session_secret: String,
    /// Secure cookies, HSTS and template caching.
    pub production: bool,
    pub database_url: String,
    pub sessions_url: String,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` over an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let production = get("APP_ENV").map(|v| v.eq_ignore_ascii_case("production")).unwrap_or(false);

        let port = match get("PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(p) if p > 0 => p,
                _ => return Err(ConfigError::InvalidPort(raw)),
            },
            None => 3000,
        };

        let session_secret = match get("SESSION_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) if production && secret.len() < MIN_SECRET_LEN => return Err(ConfigError::WeakSecret),
            Some(secret) => secret,
            None if production => return Err(ConfigError::MissingSecret),
            None => DEV_SESSION_SECRET.to_string(),
        };

        Ok(Self {
            port,
            session_secret,
            production,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://database.db".into()),
            sessions_url: get("SESSIONS_DATABASE_URL").unwrap_or_else(|| "sqlite://sessions.db".into()),
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("public/uploads")),
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.session_secret == DEV_SESSION_SECRET
    }
}
