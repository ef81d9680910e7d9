//! Checklist domain types.
//!
//! A checklist is built from a "main" pull request (typically a release
//! branch merged into master). Every pull request merged into that branch
//! becomes a [`ChecklistItem`] that reviewers check off per stage.
//!
//! Field names serialize in PascalCase, the shape the browser client reads
//! (`{"Checklist": {"Title": ..., "Items": [...]}}`).

pub mod config;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use config::{ChannelConfig, ChecklistConfig, EventChannels, NotificationConfig};

/// Stage used when a request does not name one.
pub const DEFAULT_STAGE: &str = "default";

/// Item number → ids of the users who checked it.
pub type Checks = HashMap<u64, Vec<u64>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChecklistRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub stage: String,
}

impl ChecklistRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
            stage: DEFAULT_STAGE.to_string(),
        }
    }

    /// Set the stage; an empty stage falls back to [`DEFAULT_STAGE`].
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        let stage = stage.into();
        self.stage = if stage.is_empty() {
            DEFAULT_STAGE.to_string()
        } else {
            stage
        };
        self
    }

    /// Key identifying this checklist (including stage) in a store.
    pub fn store_key(&self) -> String {
        format!("{}/{}#{}/{}", self.owner, self.repo, self.number, self.stage)
    }
}

impl fmt::Display for ChecklistRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Commit {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PullRequest {
    pub title: String,
    pub body: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub is_private: bool,
    /// Head commit; the checklist config file is read at this revision.
    #[serde(default)]
    pub head_sha: String,
    /// Only filled for the main pull request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Login")]
    pub login: String,
    #[serde(rename = "AvatarURL")]
    pub avatar_url: String,
    /// OAuth access token. Never leaves the server.
    #[serde(skip)]
    pub token: Option<String>,
}

impl GitHubUser {
    /// Copy of this user without the access token, for persistence and display.
    pub fn without_token(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChecklistItem {
    #[serde(flatten)]
    pub pull_request: PullRequest,
    pub checked_by: Vec<GitHubUser>,
}

impl ChecklistItem {
    pub fn new(pull_request: PullRequest) -> Self {
        Self {
            pull_request,
            checked_by: Vec::new(),
        }
    }

    pub fn number(&self) -> u64 {
        self.pull_request.number
    }

    pub fn title(&self) -> &str {
        &self.pull_request.title
    }

    pub fn is_checked(&self) -> bool {
        !self.checked_by.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Checklist {
    #[serde(flatten)]
    pub pull_request: PullRequest,
    pub items: Vec<ChecklistItem>,
    pub stage: String,
    /// Parsed `prchecklist.yml`; `None` disables notifications.
    pub config: Option<ChecklistConfig>,
}

impl Checklist {
    pub fn title(&self) -> &str {
        &self.pull_request.title
    }

    pub fn reference(&self) -> ChecklistRef {
        ChecklistRef::new(
            &self.pull_request.owner,
            &self.pull_request.repo,
            self.pull_request.number,
        )
        .with_stage(&self.stage)
    }

    /// Site-relative path of this checklist's page.
    pub fn path(&self) -> String {
        let pr = &self.pull_request;
        let mut path = format!("/{}/{}/pull/{}", pr.owner, pr.repo, pr.number);
        if self.stage != DEFAULT_STAGE {
            path.push('/');
            path.push_str(&self.stage);
        }
        path
    }

    pub fn item(&self, number: u64) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| item.number() == number)
    }

    /// True when every item has at least one check.
    pub fn is_completed(&self) -> bool {
        self.items.iter().all(ChecklistItem::is_checked)
    }

    /// Replace each item's `checked_by` with the users recorded in `checks`.
    /// Ids missing from `users` are dropped.
    pub fn apply_checks(&mut self, checks: &Checks, users: &HashMap<u64, GitHubUser>) {
        for item in &mut self.items {
            item.checked_by = checks
                .get(&item.number())
                .map(|ids| ids.iter().filter_map(|id| users.get(id).cloned()).collect())
                .unwrap_or_default();
        }
    }
}

impl fmt::Display for Checklist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn pull_request(owner: &str, repo: &str, number: u64, title: &str) -> PullRequest {
        PullRequest {
            title: title.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
            ..Default::default()
        }
    }

    pub(crate) fn user(id: u64, login: &str) -> GitHubUser {
        GitHubUser {
            id,
            login: login.to_string(),
            avatar_url: format!("https://avatars.example.com/{}", login),
            token: None,
        }
    }

    pub(crate) fn checklist(items: &[(u64, &str)]) -> Checklist {
        Checklist {
            pull_request: pull_request("o", "r", 1, "T"),
            items: items
                .iter()
                .map(|(n, t)| ChecklistItem::new(pull_request("o", "r", *n, t)))
                .collect(),
            stage: DEFAULT_STAGE.to_string(),
            config: None,
        }
    }

    #[test]
    fn test_checklist_ref_display() {
        let clref = ChecklistRef::new("motemen", "test-repo", 2);
        assert_eq!(clref.to_string(), "motemen/test-repo#2");
        assert_eq!(clref.stage, DEFAULT_STAGE);
    }

    #[test]
    fn test_checklist_ref_empty_stage_is_default() {
        let clref = ChecklistRef::new("o", "r", 1).with_stage("");
        assert_eq!(clref.stage, DEFAULT_STAGE);
        let clref = ChecklistRef::new("o", "r", 1).with_stage("qa");
        assert_eq!(clref.stage, "qa");
    }

    #[test]
    fn test_store_key_distinguishes_stages() {
        let a = ChecklistRef::new("o", "r", 1);
        let b = ChecklistRef::new("o", "r", 1).with_stage("production");
        assert_ne!(a.store_key(), b.store_key());
    }

    #[test]
    fn test_path_default_stage() {
        let cl = checklist(&[]);
        assert_eq!(cl.path(), "/o/r/pull/1");
    }

    #[test]
    fn test_path_named_stage() {
        let mut cl = checklist(&[]);
        cl.stage = "production".to_string();
        assert_eq!(cl.path(), "/o/r/pull/1/production");
        assert_eq!(cl.reference().stage, "production");
    }

    #[test]
    fn test_display_uses_title() {
        assert_eq!(checklist(&[]).to_string(), "T");
    }

    #[test]
    fn test_completed_requires_every_item_checked() {
        let mut cl = checklist(&[(5, "Fix bug"), (6, "Add feature")]);
        assert!(!cl.is_completed());

        let users: HashMap<u64, GitHubUser> = [(1, user(1, "alice"))].into_iter().collect();
        let mut checks = Checks::new();
        checks.insert(5, vec![1]);
        cl.apply_checks(&checks, &users);
        assert!(!cl.is_completed());

        checks.insert(6, vec![1]);
        cl.apply_checks(&checks, &users);
        assert!(cl.is_completed());
    }

    #[test]
    fn test_apply_checks_drops_unknown_users() {
        let mut cl = checklist(&[(5, "Fix bug")]);
        let users: HashMap<u64, GitHubUser> = [(1, user(1, "alice"))].into_iter().collect();
        let checks: Checks = [(5, vec![1, 99])].into_iter().collect();
        cl.apply_checks(&checks, &users);
        let item = cl.item(5).unwrap();
        assert_eq!(item.checked_by.len(), 1);
        assert_eq!(item.checked_by[0].login, "alice");
    }

    #[test]
    fn test_apply_checks_clears_removed_checks() {
        let mut cl = checklist(&[(5, "Fix bug")]);
        let users: HashMap<u64, GitHubUser> = [(1, user(1, "alice"))].into_iter().collect();
        cl.apply_checks(&[(5, vec![1])].into_iter().collect(), &users);
        assert!(cl.item(5).unwrap().is_checked());
        cl.apply_checks(&Checks::new(), &users);
        assert!(!cl.item(5).unwrap().is_checked());
    }

    #[test]
    fn test_user_token_is_never_serialized() {
        let mut u = user(1, "alice");
        u.token = Some("gho_secret".to_string());
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("gho_secret"));
        assert!(json.contains(r#""Login":"alice""#));
        assert!(json.contains(r#""AvatarURL""#));
        assert!(u.without_token().token.is_none());
    }

    #[test]
    fn test_checklist_json_shape_flattens_pull_request() {
        let cl = checklist(&[(5, "Fix bug")]);
        let json: serde_json::Value = serde_json::to_value(&cl).unwrap();
        assert_eq!(json["Title"], "T");
        assert_eq!(json["Number"], 1);
        assert_eq!(json["Items"][0]["Number"], 5);
        assert_eq!(json["Items"][0]["CheckedBy"], serde_json::json!([]));
        assert!(json.get("Commits").is_none());
    }
}
