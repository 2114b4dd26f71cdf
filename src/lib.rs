//! Client-side session lifecycle for the Taskify task manager.
//!
//! The [`session`] module holds the reusable core (credential store, request
//! augmentation, single-flight renewal, response and route guards). The
//! [`cli`] module wraps it in the `taskify-session` command line tool.

pub mod cli;
pub mod session;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
