//! Test doubles shared by unit tests across modules.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{Form, Path, State};
use axum::http::{StatusCode, Uri};
use axum::routing::post;
use axum::Router;

use crate::checklist::config::CONFIG_FILE;
use crate::checklist::{Commit, GitHubUser, PullRequest};
use crate::github::GitHubGateway;

// ── Fake GitHub ───────────────────────────────────────────────────────

/// In-memory GitHub with a fixed set of pull requests in `o/r`.
#[derive(Debug, Default)]
pub(crate) struct FakeGitHub {
    pulls: HashMap<u64, PullRequest>,
    config: Option<String>,
}

impl FakeGitHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_pull_request(mut self, number: u64, title: &str, commits: &[&str]) -> Self {
        self.pulls.insert(
            number,
            PullRequest {
                title: title.to_string(),
                owner: "o".to_string(),
                repo: "r".to_string(),
                number,
                head_sha: format!("sha{}", number),
                commits: commits
                    .iter()
                    .map(|m| Commit {
                        message: m.to_string(),
                    })
                    .collect(),
                ..Default::default()
            },
        );
        self
    }

    /// Contents served as `prchecklist.yml`.
    pub(crate) fn with_config(mut self, yaml: &str) -> Self {
        self.config = Some(yaml.to_string());
        self
    }
}

#[async_trait]
impl GitHubGateway for FakeGitHub {
    fn auth_code_url(&self, state: &str) -> anyhow::Result<String> {
        Ok(format!(
            "https://github.example.com/login/oauth/authorize?state={}",
            state
        ))
    }

    async fn authenticate_user(&self, code: &str) -> anyhow::Result<GitHubUser> {
        if code != "good-code" {
            anyhow::bail!("GitHub auth error: bad_verification_code");
        }
        Ok(GitHubUser {
            id: 1,
            login: "alice".to_string(),
            avatar_url: "https://avatars.example.com/alice".to_string(),
            token: Some("gho_alice".to_string()),
        })
    }

    async fn get_pull_request(
        &self,
        _token: Option<&str>,
        owner: &str,
        repo: &str,
        number: u64,
        with_commits: bool,
    ) -> anyhow::Result<PullRequest> {
        let Some(pr) = self.pulls.get(&number) else {
            anyhow::bail!("Failed to fetch {}/{}#{}: 404 Not Found", owner, repo, number);
        };
        let mut pr = pr.clone();
        if !with_commits {
            pr.commits.clear();
        }
        Ok(pr)
    }

    async fn get_file(
        &self,
        _token: Option<&str>,
        _owner: &str,
        _repo: &str,
        _git_ref: &str,
        path: &str,
    ) -> anyhow::Result<Option<String>> {
        Ok(if path == CONFIG_FILE {
            self.config.clone()
        } else {
            None
        })
    }
}

// ── Webhook receiver ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct Hit {
    pub(crate) path: String,
    /// Value of the `payload` form field.
    pub(crate) payload: String,
}

type Hits = Arc<Mutex<Vec<Hit>>>;

/// Local webhook endpoint. `/ok/{name}` answers 200, `/fail/{name}` answers
/// 500, `/slow/{name}` answers 200 after five seconds. Every request is
/// recorded once it has been answered.
pub(crate) struct WebhookReceiver {
    addr: SocketAddr,
    hits: Hits,
}

async fn receive(
    State(hits): State<Hits>,
    Path((mode, _name)): Path<(String, String)>,
    uri: Uri,
    Form(form): Form<HashMap<String, String>>,
) -> StatusCode {
    if mode == "slow" {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    hits.lock().unwrap().push(Hit {
        path: uri.path().to_string(),
        payload: form.get("payload").cloned().unwrap_or_default(),
    });
    if mode == "fail" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

impl WebhookReceiver {
    /// Bind on an ephemeral port. Returns `None` where binding is not
    /// permitted (sandboxed runs), so callers can skip.
    pub(crate) async fn start() -> Option<Self> {
        let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("Skipping webhook test (sandbox): {:?}", e);
                return None;
            }
        };
        let addr = listener.local_addr().ok()?;
        let hits = Hits::default();
        let app = Router::new()
            .route("/{mode}/{name}", post(receive))
            .with_state(hits.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Some(Self { addr, hits })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub(crate) fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    /// Poll until at least `n` requests arrived or five seconds pass.
    pub(crate) async fn wait_for(&self, n: usize) -> Vec<Hit> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let hits = self.hits();
            if hits.len() >= n || Instant::now() >= deadline {
                return hits;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Give stray deliveries a moment to land before asserting on absence.
    pub(crate) async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
