//! Chat notifications for checklist activity.
//!
//! - `event`: the closed set of events and how each renders into a message
//! - `dispatcher`: best-effort webhook fan-out to the channels a checklist
//!   configures in `prchecklist.yml`

pub mod dispatcher;
pub mod event;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use event::{EventKind, NotificationEvent};
