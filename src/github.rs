//! GitHub access: OAuth login and the REST calls a checklist needs.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::checklist::{Commit, GitHubUser, PullRequest};

const USER_AGENT: &str = concat!("prchecklist/", env!("CARGO_PKG_VERSION"));
const COMMITS_PER_PAGE: usize = 100;
const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";

/// OAuth application credentials and the GitHub host to talk to.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    /// `github.com` or a GitHub Enterprise host name.
    pub domain: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            domain: "github.com".to_string(),
        }
    }
}

impl GitHubConfig {
    /// Base URL for browser-facing endpoints (OAuth).
    pub fn web_base(&self) -> String {
        format!("https://{}", self.domain)
    }

    /// Base URL for the REST API.
    pub fn api_base(&self) -> String {
        if self.domain == "github.com" {
            "https://api.github.com".to_string()
        } else {
            format!("https://{}/api/v3", self.domain)
        }
    }
}

#[async_trait]
pub trait GitHubGateway: Send + Sync {
    /// URL of the OAuth consent page; GitHub echoes `state` back to the callback.
    fn auth_code_url(&self, state: &str) -> anyhow::Result<String>;

    /// Exchange an OAuth code for a token and look up the user it belongs to.
    async fn authenticate_user(&self, code: &str) -> anyhow::Result<GitHubUser>;

    /// Fetch a pull request, optionally with all of its commits.
    async fn get_pull_request(
        &self,
        token: Option<&str>,
        owner: &str,
        repo: &str,
        number: u64,
        with_commits: bool,
    ) -> anyhow::Result<PullRequest>;

    /// Raw contents of `path` at `git_ref`, or `None` if the file does not exist.
    async fn get_file(
        &self,
        token: Option<&str>,
        owner: &str,
        repo: &str,
        git_ref: &str,
        path: &str,
    ) -> anyhow::Result<Option<String>>;
}

// ── Response types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: u64,
    login: String,
    #[serde(default)]
    avatar_url: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    title: String,
    body: Option<String>,
    head: HeadRef,
    base: BaseRef,
}

#[derive(Debug, Deserialize)]
struct HeadRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BaseRef {
    repo: RepoResponse,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

impl PullRequestResponse {
    fn into_pull_request(self, owner: &str, repo: &str) -> PullRequest {
        PullRequest {
            title: self.title,
            body: self.body.unwrap_or_default(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            number: self.number,
            is_private: self.base.repo.private,
            head_sha: self.head.sha,
            commits: Vec::new(),
        }
    }
}

// ── REST client ───────────────────────────────────────────────────────

pub struct GitHubClient {
    http: reqwest::Client,
    config: GitHubConfig,
    web_base: String,
    api_base: String,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> anyhow::Result<Self> {
        let web_base = config.web_base();
        let api_base = config.api_base();
        Self::with_base_urls(config, web_base, api_base)
    }

    /// Client talking to explicit base URLs instead of the ones derived from
    /// the configured domain.
    pub fn with_base_urls(
        config: GitHubConfig,
        web_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            config,
            web_base: web_base.into(),
            api_base: api_base.into(),
        })
    }

    fn api_get(&self, token: Option<&str>, path: &str, accept: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .header("Accept", accept);
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_commits(
        &self,
        token: Option<&str>,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> anyhow::Result<Vec<Commit>> {
        let path = format!("/repos/{}/{}/pulls/{}/commits", owner, repo, number);
        let mut commits = Vec::new();
        let mut page = 1u32;

        loop {
            let resp: Vec<CommitResponse> = self
                .api_get(token, &path, ACCEPT_JSON)
                .query(&[
                    ("per_page", COMMITS_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await
                .context("Failed to send commits request to GitHub")?
                .error_for_status()
                .context("GitHub commits API returned error status")?
                .json()
                .await
                .context("Failed to parse commits response from GitHub")?;

            let count = resp.len();
            commits.extend(resp.into_iter().map(|c| Commit {
                message: c.commit.message,
            }));

            if count < COMMITS_PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(commits)
    }
}

#[async_trait]
impl GitHubGateway for GitHubClient {
    fn auth_code_url(&self, state: &str) -> anyhow::Result<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/login/oauth/authorize", self.web_base),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("scope", "repo"),
                ("state", state),
            ],
        )
        .context("Failed to build GitHub authorize URL")?;
        Ok(url.into())
    }

    async fn authenticate_user(&self, code: &str) -> anyhow::Result<GitHubUser> {
        let token: TokenResponse = self
            .http
            .post(format!("{}/login/oauth/access_token", self.web_base))
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .context("Failed to send token request to GitHub")?
            .error_for_status()
            .context("GitHub token endpoint returned error status")?
            .json()
            .await
            .context("Failed to parse token response from GitHub")?;

        let access_token = match (token.access_token, token.error) {
            (Some(t), _) if !t.is_empty() => t,
            (_, Some(err)) => anyhow::bail!(
                "GitHub auth error: {} {}",
                err,
                token.error_description.unwrap_or_default()
            ),
            _ => anyhow::bail!("Unexpected token response from GitHub"),
        };

        let user: UserResponse = self
            .api_get(Some(&access_token), "/user", ACCEPT_JSON)
            .send()
            .await
            .context("Failed to send user request to GitHub")?
            .error_for_status()
            .context("GitHub user API returned error status")?
            .json()
            .await
            .context("Failed to parse user response from GitHub")?;

        Ok(GitHubUser {
            id: user.id,
            login: user.login,
            avatar_url: user.avatar_url,
            token: Some(access_token),
        })
    }

    async fn get_pull_request(
        &self,
        token: Option<&str>,
        owner: &str,
        repo: &str,
        number: u64,
        with_commits: bool,
    ) -> anyhow::Result<PullRequest> {
        let resp: PullRequestResponse = self
            .api_get(
                token,
                &format!("/repos/{}/{}/pulls/{}", owner, repo, number),
                ACCEPT_JSON,
            )
            .send()
            .await
            .context("Failed to send pull request request to GitHub")?
            .error_for_status()
            .with_context(|| format!("Failed to fetch {}/{}#{}", owner, repo, number))?
            .json()
            .await
            .context("Failed to parse pull request response from GitHub")?;

        let mut pull_request = resp.into_pull_request(owner, repo);
        if with_commits {
            pull_request.commits = self.get_commits(token, owner, repo, number).await?;
        }
        Ok(pull_request)
    }

    async fn get_file(
        &self,
        token: Option<&str>,
        owner: &str,
        repo: &str,
        git_ref: &str,
        path: &str,
    ) -> anyhow::Result<Option<String>> {
        let resp = self
            .api_get(
                token,
                &format!("/repos/{}/{}/contents/{}", owner, repo, path),
                ACCEPT_RAW,
            )
            .query(&[("ref", git_ref)])
            .send()
            .await
            .context("Failed to send contents request to GitHub")?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let content = resp
            .error_for_status()
            .with_context(|| format!("Failed to fetch {} from {}/{}", path, owner, repo))?
            .text()
            .await
            .context("Failed to read file contents from GitHub")?;
        Ok(Some(content))
    }
}
