//! media-relay library crate.
//!
//! A single-worker job queue that fetches remote media, checks it against a
//! two-stage size policy, and relays it through Telegram, recording every
//! transition in a bounded status ledger.

pub mod api;
pub mod bot;
pub mod config;
pub mod delivery;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod logging;
pub mod messages;
pub mod notify;
pub mod panic_hook;
pub mod policy;
pub mod queue;
pub mod service;
pub mod utils;

pub use error::{Error, Result};
