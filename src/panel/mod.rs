//! Status-driven action controller.
//!
//! Leaves first: [`status`] fetches, [`gate`] derives permitted actions,
//! [`executor`] runs one action, [`notifier`] holds the transient message,
//! [`poll`] keeps status fresh, and [`controller`] composes them around the
//! pure [`update`] function over [`model`].

pub mod controller;
pub mod executor;
pub mod gate;
pub mod model;
pub mod notifier;
pub mod poll;
pub mod status;
pub mod update;
pub mod view;
