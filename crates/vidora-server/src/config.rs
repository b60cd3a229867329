//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DATABASE_PATH`
    /// Default: `./data/vidora.db`
    pub database_path: PathBuf,

    /// Filesystem path where uploaded media files are stored.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// Ed25519 seed used to sign access tokens (hex-encoded, 64 chars).
    /// Env: `TOKEN_SIGNING_KEY`
    /// Default: none (a fresh ephemeral key is generated at startup, which
    /// invalidates all tokens on restart -- fine for development).
    pub token_signing_key: Option<[u8; 32]>,

    /// Maximum upload size in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 500 MiB
    pub max_upload_size: usize,

    // -- Self-hosted instance settings --

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Vidora"`
    pub instance_name: String,

    /// Whether new accounts can be registered.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: PathBuf::from("./data/vidora.db"),
            media_storage_path: PathBuf::from("./media"),
            token_signing_key: None,
            max_upload_size: 500 * 1024 * 1024, // 500 MiB
            instance_name: "Vidora".to_string(),
            registration_open: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Ok(hex_key) = std::env::var("TOKEN_SIGNING_KEY") {
            match parse_hex_seed(&hex_key) {
                Ok(key) => config.token_signing_key = Some(key),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid TOKEN_SIGNING_KEY, generating an ephemeral key"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("MAX_UPLOAD_SIZE") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_upload_size = n;
            }
        }

        // -- Self-hosted settings --

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte seed.
fn parse_hex_seed(hex_str: &str) -> Result<[u8; 32], String> {
    let hex_str = hex_str.trim();
    if hex_str.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex_str.len()));
    }

    let bytes = hex::decode(hex_str).map_err(|e| format!("invalid hex: {e}"))?;
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes);
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.token_signing_key.is_none());
        assert!(config.registration_open);
    }

    #[test]
    fn test_parse_hex_seed() {
        let hex_str = "ab".repeat(32);
        let seed = parse_hex_seed(&hex_str).unwrap();
        assert_eq!(seed, [0xab; 32]);
    }

    #[test]
    fn test_parse_hex_seed_wrong_length() {
        assert!(parse_hex_seed("abcd").is_err());
    }
}
