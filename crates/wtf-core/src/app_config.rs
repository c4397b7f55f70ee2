use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub env: Environment,
    pub log_level: String,
    pub menu_path: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_ttl_secs: u64,
    pub cart_token: Option<String>,
    pub cart_request_timeout_secs: u64,
    pub cart_user_agent: String,
    pub cart_max_retries: u32,
    pub cart_retry_delay_ms: u64,
    pub currency: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("store_url", &self.store_url)
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("menu_path", &self.menu_path)
            .field("backup_dir", &self.backup_dir)
            .field("backup_ttl_secs", &self.backup_ttl_secs)
            .field("cart_token", &self.cart_token.as_ref().map(|_| "[redacted]"))
            .field("cart_request_timeout_secs", &self.cart_request_timeout_secs)
            .field("cart_user_agent", &self.cart_user_agent)
            .field("cart_max_retries", &self.cart_max_retries)
            .field("cart_retry_delay_ms", &self.cart_retry_delay_ms)
            .field("currency", &self.currency)
            .finish()
    }
}
