pub mod checklist;
pub mod config;
pub mod context;
pub mod errors;
pub mod github;
pub mod notification;
pub mod store;
pub mod usecase;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;
