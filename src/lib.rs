//! Thin client for the SendCloud transactional-email HTTP API.
//!
//! [`dispatch::MailDispatcher`] registers the crate's two mail templates with
//! the provider and sends templated mail, single or batched, with
//! per-recipient substitution variables. Send failures are logged and never
//! surfaced to callers.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod lang;
pub mod telemetry;
