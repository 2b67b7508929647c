//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use uu_booster_panel::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, UbpError};

// Agent
pub use crate::agent::rpc::{AgentClient, AgentMethod, AgentTransport, StatusCall, UpdateCall};
pub use crate::agent::ubus::UbusTransport;

// Panel
pub use crate::panel::controller::ViewController;
pub use crate::panel::executor::{ActionExecutor, Outcome};
pub use crate::panel::gate::{ActionAvailability, ActionRequest, AvailabilityPolicy};
pub use crate::panel::model::{PanelModel, RefreshMode};
pub use crate::panel::notifier::{MessageKind, Notifier, UiMessage};
pub use crate::panel::poll::{PollHandle, PollScheduler};
pub use crate::panel::status::{Status, StatusSource};
pub use crate::panel::view::PanelView;

// Logger
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
pub use crate::logger::jsonl::{JsonlConfig, JsonlWriter};
