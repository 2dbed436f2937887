//! Service configuration: command-line flags with environment fallbacks.
//!
//! Parsed once at startup into an immutable [`ServiceConfig`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::{EngineConfig, SettleConfig, Viewport};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_ENGINE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_NETWORK_IDLE_MS: u64 = 500;
pub const DEFAULT_SETTLE_GRACE_MS: u64 = 500;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line arguments for the rfpdf binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "rfpdf", version, about = "HTML to PDF conversion service")]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "RFPDF_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory served for paths no route handles.
    #[arg(long = "static-dir", env = "RFPDF_STATIC_DIR", default_value = DEFAULT_STATIC_DIR)]
    pub static_dir: PathBuf,

    /// Largest accepted request body in bytes.
    #[arg(long = "max-body-bytes", env = "RFPDF_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Chrome/Chromium binary; auto-detected when omitted.
    #[arg(long = "chrome-path", env = "CHROME_PATH", value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Keep Chrome's process sandbox enabled.
    #[arg(long, env = "RFPDF_CHROME_SANDBOX")]
    pub sandbox: bool,

    /// Upper bound for any single browser call, in milliseconds.
    #[arg(long = "engine-timeout-ms", env = "RFPDF_ENGINE_TIMEOUT_MS", default_value_t = DEFAULT_ENGINE_TIMEOUT_MS)]
    pub engine_timeout_ms: u64,

    /// Quiet window with no request in flight before the page counts as loaded, in milliseconds.
    #[arg(long = "network-idle-ms", env = "RFPDF_NETWORK_IDLE_MS", default_value_t = DEFAULT_NETWORK_IDLE_MS)]
    pub network_idle_ms: u64,

    /// Delay after the readiness signals before printing, in milliseconds.
    #[arg(long = "settle-grace-ms", env = "RFPDF_SETTLE_GRACE_MS", default_value_t = DEFAULT_SETTLE_GRACE_MS)]
    pub settle_grace_ms: u64,

    /// Do not wait for web fonts before printing.
    #[arg(long = "no-wait-for-fonts", env = "RFPDF_SKIP_FONTS")]
    pub no_wait_for_fonts: bool,

    /// Base log level (trace|debug|info|warn|error); RUST_LOG takes precedence.
    #[arg(long = "log-level", env = "RFPDF_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

/// Settings the service runs with
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub static_dir: PathBuf,
    pub max_body_bytes: usize,
    pub log_level: String,
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl From<Cli> for ServiceConfig {
    fn from(cli: Cli) -> Self {
        Self {
            addr: SocketAddr::new(cli.host, cli.port),
            static_dir: cli.static_dir,
            max_body_bytes: cli.max_body_bytes,
            log_level: cli.log_level,
            engine: EngineConfig {
                chrome_path: cli.chrome_path,
                sandbox: cli.sandbox,
                timeout_ms: cli.engine_timeout_ms,
                viewport: Viewport::default(),
                settle: SettleConfig {
                    network_idle_ms: cli.network_idle_ms,
                    wait_for_fonts: !cli.no_wait_for_fonts,
                    grace_ms: cli.settle_grace_ms,
                },
            },
        }
    }
}

impl ServiceConfig {
    /// Parse the process arguments and environment.
    pub fn from_args() -> Self {
        Cli::parse().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> ServiceConfig {
        let mut argv = vec!["rfpdf"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid arguments").into()
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--static-dir",
            "/srv/www",
            "--chrome-path",
            "/usr/bin/chromium",
            "--sandbox",
            "--network-idle-ms",
            "250",
            "--settle-grace-ms",
            "0",
            "--no-wait-for-fonts",
        ]);

        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
        assert_eq!(config.engine.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(config.engine.sandbox);
        assert_eq!(
            config.engine.settle,
            SettleConfig {
                network_idle_ms: 250,
                wait_for_fonts: false,
                grace_ms: 0
            }
        );
    }

    #[test]
    fn test_engine_defaults_without_flags() {
        let config = parse(&["--port", "3000"]);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.engine.timeout_ms, DEFAULT_ENGINE_TIMEOUT_MS);
        assert!(config.engine.settle.wait_for_fonts);
        assert_eq!(config.engine.settle.grace_ms, DEFAULT_SETTLE_GRACE_MS);
        assert_eq!(config.engine.settle.network_idle_ms, DEFAULT_NETWORK_IDLE_MS);
        assert!(!config.engine.sandbox);
    }

    #[test]
    fn test_environment_variable_names() {
        let command = Cli::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .and_then(|env| env.to_str())
                .map(str::to_string)
        };

        let expected = [
            ("host", "RFPDF_HOST"),
            ("port", "PORT"),
            ("static_dir", "RFPDF_STATIC_DIR"),
            ("max_body_bytes", "RFPDF_MAX_BODY_BYTES"),
            ("chrome_path", "CHROME_PATH"),
            ("sandbox", "RFPDF_CHROME_SANDBOX"),
            ("engine_timeout_ms", "RFPDF_ENGINE_TIMEOUT_MS"),
            ("network_idle_ms", "RFPDF_NETWORK_IDLE_MS"),
            ("settle_grace_ms", "RFPDF_SETTLE_GRACE_MS"),
            ("no_wait_for_fonts", "RFPDF_SKIP_FONTS"),
            ("log_level", "RFPDF_LOG_LEVEL"),
        ];
        for (id, env) in expected {
            assert_eq!(env_of(id).as_deref(), Some(env), "argument {}", id);
        }
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["rfpdf", "--port", "http"]).is_err());
    }

    #[test]
    fn test_service_default_matches_port_default() {
        assert_eq!(ServiceConfig::default().addr.port(), DEFAULT_PORT);
    }
}
