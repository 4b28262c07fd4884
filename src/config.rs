use std::net::SocketAddr;
use std::path::PathBuf;

/// Trash entries and notifications older than this are purged on read.
pub const RETENTION: time::Duration = time::Duration::days(7);

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub addr: SocketAddr,
    pub app_name: String,
    pub seed: Option<PathBuf>,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub key: String,
    pub token_ttl: time::Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("libraryconnect"),
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            app_name: "LibraryConnect".to_string(),
            seed: None,
            auth: AuthConfig {
                key: "bGlicmFyeWNvbm5lY3QtdGVzdC1rZXk".to_string(),
                token_ttl: time::Duration::days(1),
                cookie_name: "libraryconnect_auth".to_string(),
                cookie_secure: false,
            },
        }
    }
}
