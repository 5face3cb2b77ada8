use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "WebSocket push relay gateway", version)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[clap(long, env = "RELAY_PORT", help = "Port to listen on for client connections and emit commands.")]
    pub port: Option<u16>,

    #[clap(long, env = "RELAY_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "RELAY_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "RELAY_LOG_LEVEL", help = "Logging level (debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "RELAY_HEARTBEAT_INTERVAL_SECONDS", help = "Seconds between liveness probe sweeps; a client missing two consecutive sweeps is evicted.")]
    pub heartbeat_interval_seconds: Option<u64>,

    #[clap(long, env = "ALLOWED_ORIGINS", value_delimiter = ',', help = "Comma-separated Origin values permitted to call the HTTP API from outside the local network.")]
    pub allowed_origins: Option<Vec<String>>,

    #[clap(long, env = "TLS_CERT_PATH", help = "Path to the TLS certificate file.")]
    pub tls_cert_path: Option<PathBuf>,

    #[clap(long, env = "TLS_KEY_PATH", help = "Path to the TLS private key file.")]
    pub tls_key_path: Option<PathBuf>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            heartbeat_interval_seconds: other
                .heartbeat_interval_seconds
                .or(self.heartbeat_interval_seconds),
            allowed_origins: other.allowed_origins.or(self.allowed_origins),
            tls_cert_path: other.tls_cert_path.or(self.tls_cert_path),
            tls_key_path: other.tls_key_path.or(self.tls_key_path),
        }
    }
}

/// The fully resolved runtime settings handed to the rest of the server.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub heartbeat_interval: Duration,
    pub allowed_origins: Vec<String>,
    /// Certificate and key paths; `None` serves plain HTTP/WS.
    pub tls: Option<(PathBuf, PathBuf)>,
}

pub fn load() -> Settings {
    // 1. Load defaults
    let default_config = Config {
        port: Some(3001),
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        heartbeat_interval_seconds: Some(30),
        ..Default::default()
    };

    // 2. Load from config file (server_relay.conf) if present.
    //    Allow overriding the config file path with a CLI arg or env var.
    let cli_args = Config::parse();

    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_relay.conf"));

    let mut current_config = default_config;

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => eprintln!(
                    "Failed to parse config file {}: {}. Falling back to other sources.",
                    config_file_path.display(),
                    e
                ),
            },
            Err(e) => eprintln!(
                "Failed to read config file {}: {}. Falling back to other sources.",
                config_file_path.display(),
                e
            ),
        }
    }

    // 3. Override with environment variables and CLI arguments.
    //    clap::Parser already folded env vars into the parsed args.
    current_config = current_config.merge(cli_args);

    finalize(current_config)
}

// Collapse the Option-heavy merge result into concrete settings. TLS is only
// engaged when both PEM files are actually present on disk; with no explicit
// paths the standard LetsEncrypt location is probed.
fn finalize(config: Config) -> Settings {
    let explicit = config.tls_cert_path.is_some() || config.tls_key_path.is_some();
    let (cert, key) = if explicit {
        (config.tls_cert_path, config.tls_key_path)
    } else {
        default_tls_paths()
    };
    let tls = match (cert, key) {
        (Some(cert), Some(key)) if cert.exists() && key.exists() => Some((cert, key)),
        _ => {
            if explicit {
                eprintln!("TLS paths configured but not readable; serving without TLS.");
            }
            None
        }
    };

    Settings {
        port: config.port.unwrap_or(3001),
        log_dir: config.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
        log_level: config.log_level.unwrap_or_else(|| "info".to_string()),
        heartbeat_interval: Duration::from_secs(config.heartbeat_interval_seconds.unwrap_or(30)),
        allowed_origins: config.allowed_origins.unwrap_or_default(),
        tls,
    }
}

// LetsEncrypt certificates in the home directory are picked up without any
// configuration, matching how the production gateways are deployed.
fn default_tls_paths() -> (Option<PathBuf>, Option<PathBuf>) {
    match dirs::home_dir() {
        Some(home) => {
            let letsencrypt_dir = home.join(".letsencrypt");
            (
                Some(letsencrypt_dir.join("fullchain.pem")),
                Some(letsencrypt_dir.join("privkey.pem")),
            )
        }
        None => (None, None),
    }
}
