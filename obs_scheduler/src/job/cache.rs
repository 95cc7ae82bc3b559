//! Memo of next-possible-start-time searches.
//!
//! The scheduler asks every job for its next start time on each pass, usually
//! with the same bounds. Each search is remembered with its bounds so that a
//! later query over the same or a narrower interval is answered without
//! stepping through time again.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StartTimeComputation {
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    result: Option<DateTime<Utc>>,
}

/// Answer of [`StartTimeCache::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// A stored search covers the query.
    Hit {
        result: Option<DateTime<Utc>>,
        /// Start of the stored search, when earlier than the query's.
        searched_from: Option<DateTime<Utc>>,
    },
    /// Nothing covers the query.
    Miss {
        /// A stored search without result covers `[from, resume_from)`;
        /// a new search can start there.
        resume_from: Option<DateTime<Utc>>,
    },
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit { .. })
    }
}

/// Per-job search memo. Usable through `&self`.
#[derive(Debug, Default)]
pub struct StartTimeCache {
    computations: Mutex<Vec<StartTimeComputation>>,
}

impl StartTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for a stored search answering `[from, until]`.
    pub fn check(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> CacheLookup {
        let computations = self.computations.lock();
        let mut resume_from: Option<DateTime<Utc>> = None;

        for c in computations.iter() {
            if c.from <= from && c.until >= until {
                let searched_from = (c.from < from).then_some(c.from);
                match c.result {
                    None => {
                        return CacheLookup::Hit {
                            result: None,
                            searched_from,
                        }
                    }
                    Some(r) if r >= from && r <= until => {
                        return CacheLookup::Hit {
                            result: Some(r),
                            searched_from,
                        }
                    }
                    Some(r) if r > until => {
                        return CacheLookup::Hit {
                            result: None,
                            searched_from,
                        }
                    }
                    // Found before `from`: says nothing about the query.
                    Some(_) => {}
                }
            } else if c.result.is_none() && c.from <= from && c.until > from {
                resume_from = Some(resume_from.map_or(c.until, |r| r.max(c.until)));
            }
        }

        CacheLookup::Miss { resume_from }
    }

    /// Remember a search.
    pub fn add(&self, from: DateTime<Utc>, until: DateTime<Utc>, result: Option<DateTime<Utc>>) {
        self.computations
            .lock()
            .push(StartTimeComputation { from, until, result });
    }

    pub fn clear(&self) {
        self.computations.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.computations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.computations.lock().is_empty()
    }
}

impl Clone for StartTimeCache {
    fn clone(&self) -> Self {
        Self {
            computations: Mutex::new(self.computations.lock().clone()),
        }
    }
}
