//! Interactive panel: keyboard-driven controls over a live [`ViewController`].
//!
//! The loop polls the keyboard for 50 ms, pumps the controller, and redraws
//! when something changed or the redraw interval passed. Exit with q, Esc,
//! Ctrl-C, or a termination signal; the controller is unmounted on the way
//! out so the poll thread stops and late results are discarded.

#![allow(missing_docs)]

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::cli::render;
use crate::cli::signals::SignalHandler;
use crate::cli::terminal_guard::TerminalGuard;
use crate::panel::controller::ViewController;
use crate::panel::gate::ActionRequest;

const KEY_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct PanelRunConfig {
    /// ubus object shown in the header.
    pub object: String,
    /// Upper bound between redraws when nothing changes.
    pub redraw: Duration,
    pub color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Click(ActionRequest),
    Refresh,
    Quit,
}

/// Map a key press to a panel action.
#[must_use]
pub fn key_action(key: KeyEvent) -> Option<KeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Char('q') => Some(KeyAction::Quit),
        KeyCode::Char('f') => Some(KeyAction::Refresh),
        KeyCode::Char(ch) => render::action_for_key(ch).map(KeyAction::Click),
        _ => None,
    }
}

/// Mount the controller, run the panel until the user exits, then unmount.
pub fn run(
    controller: &mut ViewController,
    signals: &SignalHandler,
    config: &PanelRunConfig,
) -> io::Result<()> {
    let guard = TerminalGuard::new()?;
    let result = controller
        .mount()
        .map_err(io::Error::other)
        .and_then(|()| run_inner(controller, signals, config));
    controller.unmount();
    drop(guard);
    result
}

fn run_inner(
    controller: &mut ViewController,
    signals: &SignalHandler,
    config: &PanelRunConfig,
) -> io::Result<()> {
    let mut stdout = io::stdout();
    let mut dirty = true;
    let mut last_draw = Instant::now();

    loop {
        if signals.should_shutdown() {
            return Ok(());
        }

        if event::poll(KEY_POLL)?
            && let Event::Key(key) = event::read()?
        {
            match key_action(key) {
                Some(KeyAction::Quit) => return Ok(()),
                Some(KeyAction::Refresh) => {
                    controller.refresh();
                    dirty = true;
                }
                Some(KeyAction::Click(action)) => {
                    // Disabled controls ignore the click; redraw anyway.
                    controller.click(action);
                    dirty = true;
                }
                None => {}
            }
        }

        if controller.pump() > 0 {
            dirty = true;
        }

        if dirty || last_draw.elapsed() >= config.redraw {
            let (cols, _rows) = TerminalGuard::terminal_size();
            let lines = render::frame_lines(&controller.view(), &config.object, usize::from(cols));
            render::draw(&mut stdout, &lines, config.color)?;
            last_draw = Instant::now();
            dirty = false;
        }
    }
}
