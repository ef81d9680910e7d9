use std::path::PathBuf;

use crate::github::GitHubConfig;
use crate::notification::DispatcherConfig;

/// Runtime configuration for `prchecklist serve`.
///
/// Built from CLI flags (with environment fallbacks) in `main.rs`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `localhost:8080`.
    pub listen: String,
    pub behind_proxy: bool,
    /// Directory whose `js/` subdirectory is served at `/js`.
    pub static_dir: PathBuf,
    pub github: GitHubConfig,
    pub notify: DispatcherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "localhost:8080".to_string(),
            behind_proxy: false,
            static_dir: PathBuf::from("static"),
            github: GitHubConfig::default(),
            notify: DispatcherConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns a list of warnings for settings that will break login or assets.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.github.client_id.is_empty() {
            warnings.push("GITHUB_CLIENT_ID is not set; login will fail".to_string());
        }
        if self.github.client_secret.is_empty() {
            warnings.push("GITHUB_CLIENT_SECRET is not set; login will fail".to_string());
        }
        if !self.static_dir.join("js").is_dir() {
            warnings.push(format!(
                "Static asset directory {} has no js/ subdirectory",
                self.static_dir.display()
            ));
        }
        if self.notify.timeout.is_zero() {
            warnings.push("Notification timeout is 0 seconds".to_string());
        }

        warnings
    }
}
