#![forbid(unsafe_code)]

//! UU booster panel (ubp): a status-driven controller for the UU game booster
//! service on OpenWrt routers.
//!
//! The panel fetches service status from the on-device agent over ubus,
//! derives which actions are permitted, runs one action at a time per
//! control, surfaces the result as a short-lived notice, and keeps itself
//! fresh with a fixed-interval poll.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use uu_booster_panel::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use uu_booster_panel::core::config::Config;
//! use uu_booster_panel::panel::controller::ViewController;
//! ```

pub mod prelude;

pub mod agent;
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod logger;
pub mod panel;
