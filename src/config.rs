use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Application-level constants
pub const APP_NAME: &str = "receipt-intake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest accepted upload (multipart overhead is added on top in the router).
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Deadline for the automation webhook POST.
pub const AUTOMATION_TIMEOUT_SECS: u64 = 10;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "receipt_intake=info,tower_http=info,warn"
}

/// Base data directory: `<platform data dir>/receipt-intake`.
/// Falls back to the working directory when the platform has no data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default root for per-request temporary upload directories.
pub fn default_upload_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

/// Default location of the persisted routing/toggle settings.
pub fn default_settings_file() -> PathBuf {
    app_data_dir().join("settings.json")
}

/// Server configuration, every flag backed by an environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "receipt-intake", version, about = "Receipt intake and fan-out service")]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[arg(long, env = "INTAKE_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Root directory for per-request temporary files.
    #[arg(long, env = "INTAKE_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// JSON file holding the routing table and sink toggles.
    #[arg(long, env = "INTAKE_SETTINGS_FILE")]
    pub settings_file: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible vision endpoint.
    #[arg(long, env = "VISION_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub vision_base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub vision_api_key: String,

    #[arg(long, env = "VISION_MODEL", default_value = "gpt-4-turbo")]
    pub vision_model: String,

    #[arg(long, env = "VISION_TIMEOUT_SECS", default_value_t = 120)]
    pub vision_timeout_secs: u64,

    /// Service-account key used for mail delegation and archive uploads.
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_FILE")]
    pub service_account_file: Option<PathBuf>,

    /// Mailbox the notification is sent on behalf of.
    #[arg(long, env = "GMAIL_SENDER_EMAIL")]
    pub sender_email: Option<String>,

    /// Drive folder receiving archived uploads.
    #[arg(long, env = "DRIVE_FOLDER_ID", default_value = "")]
    pub archive_folder_id: String,

    /// Automation webhook; automation is skipped when unset.
    #[arg(long, env = "AUTOMATION_WEBHOOK_URL")]
    pub automation_url: Option<String>,
}

impl ServerConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(default_upload_dir)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.settings_file.clone().unwrap_or_else(default_settings_file)
    }

    /// Configured automation endpoint, treating a blank value as absent.
    pub fn automation_url(&self) -> Option<&str> {
        self.automation_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["receipt-intake"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn upload_dir_under_app_data() {
        let dir = default_upload_dir();
        assert!(dir.starts_with(app_data_dir()));
        assert!(dir.ends_with("uploads"));
    }

    #[test]
    fn explicit_paths_override_defaults() {
        let config = parse(&["--upload-dir", "/tmp/up", "--settings-file", "/tmp/s.json"]);
        assert_eq!(config.upload_dir(), PathBuf::from("/tmp/up"));
        assert_eq!(config.settings_file(), PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn blank_automation_url_is_absent() {
        let config = parse(&["--automation-url", "   "]);
        assert!(config.automation_url().is_none());

        let config = parse(&["--automation-url", "https://hooks.example.com/abc"]);
        assert_eq!(config.automation_url(), Some("https://hooks.example.com/abc"));
    }

    #[test]
    fn bind_address_parses() {
        let config = parse(&["--bind", "127.0.0.1:9000"]);
        assert_eq!(config.bind.port(), 9000);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
