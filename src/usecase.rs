//! Checklist use cases: load, check, uncheck, register user.
//!
//! Checks are written to the store before any notification is dispatched;
//! notification outcomes never change the result of a use case.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use futures::future::try_join_all;
use regex::Regex;

use crate::checklist::config::CONFIG_FILE;
use crate::checklist::{
    Checklist, ChecklistConfig, ChecklistItem, ChecklistRef, Checks, GitHubUser,
};
use crate::context::RequestContext;
use crate::errors::ChecklistError;
use crate::github::GitHubGateway;
use crate::notification::{Dispatcher, NotificationEvent};
use crate::store::ChecklistStore;

static MERGE_COMMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Merge pull request #(\d+) from ").unwrap());

/// Pull request numbers merged by the given commit messages, first occurrence order.
pub fn merged_pull_request_numbers<'a>(messages: impl IntoIterator<Item = &'a str>) -> Vec<u64> {
    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter_map(|message| MERGE_COMMIT.captures(message))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .filter(|number| seen.insert(*number))
        .collect()
}

pub struct Usecase {
    github: Arc<dyn GitHubGateway>,
    store: Arc<dyn ChecklistStore>,
    dispatcher: Dispatcher,
}

impl Usecase {
    pub fn new(
        github: Arc<dyn GitHubGateway>,
        store: Arc<dyn ChecklistStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            github,
            store,
            dispatcher,
        }
    }

    /// Build the checklist for `clref` as seen by `user`.
    pub async fn get_checklist(
        &self,
        user: &GitHubUser,
        clref: &ChecklistRef,
    ) -> Result<Checklist, ChecklistError> {
        let token = user.token.as_deref();
        let main = self
            .github
            .get_pull_request(token, &clref.owner, &clref.repo, clref.number, true)
            .await
            .map_err(ChecklistError::GitHub)?;

        let config = match self
            .github
            .get_file(token, &clref.owner, &clref.repo, &main.head_sha, CONFIG_FILE)
            .await
            .map_err(ChecklistError::GitHub)?
        {
            Some(content) => Some(ChecklistConfig::from_yaml(&content)?),
            None => None,
        };

        let numbers =
            merged_pull_request_numbers(main.commits.iter().map(|c| c.message.as_str()));
        let items = try_join_all(numbers.iter().map(|number| {
            self.github
                .get_pull_request(token, &clref.owner, &clref.repo, *number, false)
        }))
        .await
        .map_err(ChecklistError::GitHub)?
        .into_iter()
        .map(ChecklistItem::new)
        .collect();

        let mut checklist = Checklist {
            pull_request: main,
            items,
            stage: clref.stage.clone(),
            config,
        };
        self.apply_checks(&mut checklist)?;

        tracing::debug!(checklist = %clref, items = checklist.items.len(), "Loaded checklist");
        Ok(checklist)
    }

    /// Record that `user` checked item `number`, then notify subscribed channels.
    pub async fn add_check(
        &self,
        ctx: &RequestContext,
        clref: &ChecklistRef,
        number: u64,
        user: &GitHubUser,
    ) -> Result<Checklist, ChecklistError> {
        let mut checklist = self.get_checklist(user, clref).await?;
        if checklist.item(number).is_none() {
            return Err(ChecklistError::ItemNotFound {
                checklist: clref.to_string(),
                number,
            });
        }

        let write = self.store.add_check(clref, number, user.id)?;
        self.fill_checked_by(&mut checklist, &write.checks)?;
        tracing::info!(checklist = %clref, stage = %clref.stage, number, user = %user.login, "Check added");

        if let Some(item) = checklist.item(number) {
            self.notify(
                ctx,
                &checklist,
                NotificationEvent::CheckAdded {
                    checklist: &checklist,
                    item,
                    user,
                },
            );
        }
        // Only the write that checked the last open item completes the list.
        let completed = write.first_check
            && checklist
                .items
                .iter()
                .all(|item| write.checks.contains_key(&item.number()));
        if completed {
            self.notify(
                ctx,
                &checklist,
                NotificationEvent::ChecklistCompleted {
                    checklist: &checklist,
                },
            );
        }

        Ok(checklist)
    }

    /// Withdraw `user`'s check on item `number`. Sends no notification.
    pub async fn remove_check(
        &self,
        clref: &ChecklistRef,
        number: u64,
        user: &GitHubUser,
    ) -> Result<Checklist, ChecklistError> {
        let mut checklist = self.get_checklist(user, clref).await?;
        if checklist.item(number).is_none() {
            return Err(ChecklistError::ItemNotFound {
                checklist: clref.to_string(),
                number,
            });
        }

        self.store.remove_check(clref, number, user.id)?;
        self.apply_checks(&mut checklist)?;
        tracing::info!(checklist = %clref, stage = %clref.stage, number, user = %user.login, "Check removed");

        Ok(checklist)
    }

    pub fn add_user(&self, user: &GitHubUser) -> Result<(), ChecklistError> {
        self.store.add_user(user)
    }

    fn apply_checks(&self, checklist: &mut Checklist) -> Result<(), ChecklistError> {
        let checks = self.store.get_checks(&checklist.reference())?;
        self.fill_checked_by(checklist, &checks)
    }

    fn fill_checked_by(
        &self,
        checklist: &mut Checklist,
        checks: &Checks,
    ) -> Result<(), ChecklistError> {
        let ids: Vec<u64> = checks
            .values()
            .flatten()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let users = self.store.get_users(&ids)?;
        checklist.apply_checks(checks, &users);
        Ok(())
    }

    fn notify(&self, ctx: &RequestContext, checklist: &Checklist, event: NotificationEvent<'_>) {
        if let Err(e) = self.dispatcher.dispatch(ctx, checklist, event) {
            tracing::warn!(checklist = %checklist.reference(), kind = %event.kind(), error = %e, "Failed to dispatch notification");
        }
    }
}
