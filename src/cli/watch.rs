//! Line-oriented status feed: one line per completed status fetch.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;

use crate::cli::render;
use crate::cli::signals::SignalHandler;
use crate::panel::controller::ViewController;

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub json: bool,
    /// Stop after this many lines.
    pub count: Option<usize>,
    /// How long one controller step may block.
    pub tick: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            json: false,
            count: None,
            tick: Duration::from_millis(200),
        }
    }
}

/// Mount, then write a line for the mount fetch and every later fetch until
/// a signal arrives or `count` lines are written. Returns the line count.
pub fn run<W: Write>(
    controller: &mut ViewController,
    signals: &SignalHandler,
    config: &WatchConfig,
    out: &mut W,
) -> io::Result<usize> {
    controller.mount().map_err(io::Error::other)?;
    let result = feed(controller, signals, config, out);
    controller.unmount();
    result
}

fn feed<W: Write>(
    controller: &mut ViewController,
    signals: &SignalHandler,
    config: &WatchConfig,
    out: &mut W,
) -> io::Result<usize> {
    let mut written = 0;
    let mut last_seen: Option<Instant> = None;

    loop {
        if config.count.is_some_and(|n| written >= n) || signals.should_shutdown() {
            return Ok(written);
        }

        let fetched = controller.model().last_fetch;
        if fetched.is_some() && fetched != last_seen {
            last_seen = fetched;
            write_line(controller, config.json, out)?;
            written += 1;
            continue;
        }

        controller.step(config.tick);
    }
}

fn write_line<W: Write>(controller: &ViewController, json: bool, out: &mut W) -> io::Result<()> {
    let view = controller.view();
    if json {
        let payload = json!({
            "ts": Utc::now().to_rfc3339(),
            "status": controller.model().status,
            "view": view,
        });
        serde_json::to_writer(&mut *out, &payload)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{} {}",
            Utc::now().format("%H:%M:%S"),
            render::summary_line(&view)
        )?;
    }
    out.flush()
}
