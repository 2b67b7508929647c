//! Terminal front ends over the panel controller.

pub mod render;
pub mod runtime;
pub mod signals;
pub mod terminal_guard;
pub mod watch;
