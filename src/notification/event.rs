//! Notification events and their rendering.
//!
//! - `EventKind`: the configurable event names used in `prchecklist.yml`
//! - `NotificationEvent`: a fired event borrowing the data it renders

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checklist::{Checklist, ChecklistItem, GitHubUser};
use crate::context::RequestContext;
use crate::errors::NotifyError;

/// Event kinds a channel can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An item received a check
    OnCheck,
    /// The last unchecked item received a check
    OnComplete,
}

impl EventKind {
    pub fn all() -> &'static [EventKind] {
        &[EventKind::OnCheck, EventKind::OnComplete]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OnCheck => "on_check",
            EventKind::OnComplete => "on_complete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_check" => Ok(EventKind::OnCheck),
            "on_complete" => Ok(EventKind::OnComplete),
            _ => Err(NotifyError::UnknownEventKind(s.to_string())),
        }
    }
}

/// A domain event that may trigger notifications.
///
/// Events borrow from the checklist they describe and live only for the
/// duration of a single dispatch.
#[derive(Debug, Clone, Copy)]
pub enum NotificationEvent<'a> {
    CheckAdded {
        checklist: &'a Checklist,
        item: &'a ChecklistItem,
        user: &'a GitHubUser,
    },
    ChecklistCompleted {
        checklist: &'a Checklist,
    },
}

impl<'a> NotificationEvent<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            NotificationEvent::CheckAdded { .. } => EventKind::OnCheck,
            NotificationEvent::ChecklistCompleted { .. } => EventKind::OnComplete,
        }
    }

    pub fn checklist(&self) -> &'a Checklist {
        match *self {
            NotificationEvent::CheckAdded { checklist, .. }
            | NotificationEvent::ChecklistCompleted { checklist } => checklist,
        }
    }

    /// Single-line chat message for this event, linking to the checklist page.
    pub fn message_text(&self, ctx: &RequestContext) -> String {
        let checklist = self.checklist();
        let link = format!("[<{}|{}>]", ctx.build_url(&checklist.path()), checklist);
        match self {
            NotificationEvent::CheckAdded { item, user, .. } => format!(
                "{} #{} {} checked by {}",
                link,
                item.number(),
                quote(item.title()),
                user.login
            ),
            NotificationEvent::ChecklistCompleted { .. } => {
                format!("{} Checklist completed! \u{1F389}", link)
            }
        }
    }
}

/// Double-quote `s` for a chat message.
///
/// Only `"`, `\` and non-printable characters are escaped, as C-style
/// letters or `\xHH`, `\uHHHH` and `\UHHHHHHHH`. Emoji, variation selectors
/// and combining marks pass through untouched.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            ' ' => out.push(' '),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            // Remaining controls and non-ASCII spaces and separators.
            c if c.is_control() || c.is_whitespace() => {
                if (c as u32) < 0x10000 {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                } else {
                    out.push_str(&format!("\\U{:08x}", c as u32));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
