//! Recent placement feed.

#[cfg(test)]
#[path = "ticker_test.rs"]
mod ticker_test;

use std::collections::VecDeque;

use crate::consts::TICKER_CAPACITY;
use crate::event::ChannelEvent;

/// One feed line for a placement by `owner`.
#[must_use]
pub fn ticker_line(owner: Option<&str>) -> String {
    let who = owner
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map_or_else(|| "anonymous".to_owned(), str::to_lowercase);
    format!("{who} placed a pixel!")
}

/// Newest-first list of the last few placements.
#[derive(Debug, Clone)]
pub struct Ticker {
    capacity: usize,
    lines: VecDeque<String>,
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(TICKER_CAPACITY)
    }
}

impl Ticker {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, lines: VecDeque::with_capacity(capacity) }
    }

    /// Record a placement event. Returns the new line, or `None` for
    /// events that are not placements.
    pub fn observe(&mut self, event: &ChannelEvent) -> Option<&str> {
        if !event.is_placement() || self.capacity == 0 {
            return None;
        }
        self.lines.push_front(ticker_line(event.owner()));
        self.lines.truncate(self.capacity);
        self.lines.front().map(String::as_str)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
