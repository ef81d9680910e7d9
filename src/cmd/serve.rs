//! Web server command: `prchecklist serve`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use clap::builder::FalseyValueParser;

use prchecklist::config::ServerConfig;
use prchecklist::github::GitHubConfig;
use prchecklist::notification::DispatcherConfig;
use prchecklist::web;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "PRCHECKLIST_LISTEN", default_value = "localhost:8080")]
    pub listen: String,

    /// Trust X-Forwarded-Proto / X-Forwarded-Host from a reverse proxy
    #[arg(long, env = "PRCHECKLIST_BEHIND_PROXY", value_parser = FalseyValueParser::new())]
    pub behind_proxy: bool,

    /// OAuth application client id
    #[arg(long, env = "GITHUB_CLIENT_ID", default_value = "")]
    pub github_client_id: String,

    /// OAuth application client secret
    #[arg(long, env = "GITHUB_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    pub github_client_secret: String,

    /// GitHub host (github.com or a GitHub Enterprise host)
    #[arg(long, env = "GITHUB_DOMAIN", default_value = "github.com")]
    pub github_domain: String,

    /// Directory holding js/bundle.js
    #[arg(long, env = "PRCHECKLIST_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Maximum concurrent webhook deliveries
    #[arg(long, default_value = "32")]
    pub notify_max_in_flight: usize,

    /// Timeout for a single webhook delivery, in seconds
    #[arg(long, default_value = "10")]
    pub notify_timeout_secs: u64,
}

impl ServeArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            listen: self.listen,
            behind_proxy: self.behind_proxy,
            static_dir: self.static_dir,
            github: GitHubConfig {
                client_id: self.github_client_id,
                client_secret: self.github_client_secret,
                domain: self.github_domain,
            },
            notify: DispatcherConfig {
                max_in_flight: self.notify_max_in_flight,
                timeout: Duration::from_secs(self.notify_timeout_secs),
            },
        }
    }
}

pub async fn cmd_serve(args: ServeArgs) -> Result<()> {
    web::start_server(args.into_config()).await
}
