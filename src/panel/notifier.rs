//! Single transient user-facing message with auto-dismissal.
//!
//! Every `show` bumps a generation counter. Expiry is requested by
//! generation, so a timer armed for a superseded message cannot hide its
//! replacement.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiMessage {
    pub text: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub generation: u64,
}

#[derive(Debug)]
pub struct Notifier {
    ttl: Duration,
    current: Option<(UiMessage, Instant)>,
    next_generation: u64,
}

impl Notifier {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            current: None,
            next_generation: 1,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace any visible message. Returns the new message's generation.
    pub fn show(&mut self, text: impl Into<String>, kind: MessageKind) -> u64 {
        self.show_at(text, kind, Instant::now())
    }

    /// [`Notifier::show`] with an explicit monotonic timestamp.
    pub fn show_at(&mut self, text: impl Into<String>, kind: MessageKind, now: Instant) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.current = Some((
            UiMessage {
                text: text.into(),
                kind,
                created_at: Utc::now(),
                generation,
            },
            now,
        ));
        generation
    }

    /// Hide the message of `generation` if it is still the current one.
    ///
    /// Returns whether anything was hidden.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self
            .current
            .as_ref()
            .is_some_and(|(msg, _)| msg.generation == generation)
        {
            self.current = None;
            return true;
        }
        false
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    /// The message visible at `now`, if it has not outlived its ttl.
    #[must_use]
    pub fn visible_at(&self, now: Instant) -> Option<&UiMessage> {
        self.current
            .as_ref()
            .filter(|(_, shown)| now.saturating_duration_since(*shown) < self.ttl)
            .map(|(msg, _)| msg)
    }

    #[must_use]
    pub fn visible(&self) -> Option<&UiMessage> {
        self.visible_at(Instant::now())
    }
}
