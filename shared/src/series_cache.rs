//! Per-area cache of historical series with in-flight de-duplication.
//!
//! A fetch is started with [`SeriesCache::request`], which hands out a ticket
//! only when nothing is loaded or pending for that area. Responses carry the
//! ticket back; anything not matching the current ticket is dropped.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::series::{SeriesRow, calc_trend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub id: String,
    token: u64,
}

#[derive(Debug, Clone)]
enum Entry {
    Pending(u64),
    Loaded(Rc<Vec<SeriesRow>>),
}

#[derive(Debug, Default)]
pub struct SeriesCache {
    entries: HashMap<String, Entry>,
    next_token: u64,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch for `id` unless it is loaded or already in flight.
    pub fn request(&mut self, id: &str) -> Option<FetchTicket> {
        if self.entries.contains_key(id) {
            debug!(area = id, "series already loaded or pending");
            return None;
        }
        self.next_token += 1;
        let token = self.next_token;
        self.entries.insert(id.to_string(), Entry::Pending(token));
        Some(FetchTicket {
            id: id.to_string(),
            token,
        })
    }

    /// Apply a finished fetch. Returns `Ok(true)` when stored, `Ok(false)`
    /// for a stale ticket, and the fetch error unchanged on failure.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<SeriesRow>, String>,
    ) -> Result<bool, String> {
        let current = matches!(
            self.entries.get(&ticket.id),
            Some(Entry::Pending(token)) if *token == ticket.token
        );
        if !current {
            debug!(area = %ticket.id, "dropping stale series response");
            return Ok(false);
        }
        match result {
            Ok(mut rows) => {
                calc_trend(&mut rows);
                self.entries
                    .insert(ticket.id, Entry::Loaded(Rc::new(rows)));
                Ok(true)
            }
            Err(e) => {
                self.entries.remove(&ticket.id);
                Err(e)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Rc<Vec<SeriesRow>>> {
        match self.entries.get(id)? {
            Entry::Loaded(rows) => Some(Rc::clone(rows)),
            Entry::Pending(_) => None,
        }
    }

    /// Store rows that were loaded by other means (e.g. the city series).
    pub fn insert(&mut self, id: &str, mut rows: Vec<SeriesRow>) {
        calc_trend(&mut rows);
        self.entries
            .insert(id.to_string(), Entry::Loaded(Rc::new(rows)));
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        matches!(self.entries.get(id), Some(Entry::Loaded(_)))
    }

    pub fn in_flight(&self, id: &str) -> bool {
        matches!(self.entries.get(id), Some(Entry::Pending(_)))
    }

    /// Forget `id`; a pending response for it becomes stale.
    pub fn invalidate(&mut self, id: &str) {
        self.entries.remove(id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
