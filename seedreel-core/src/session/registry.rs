//! Shared table of live sessions.
//!
//! Every insert, removal and state transition happens under one mutex, so a
//! session can never be admitted twice or drained twice.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::types::{Session, SessionState};
use crate::torrent::InfoHash;

struct Entry {
    session: Arc<Session>,
    /// Client connections attached to the session
    holders: usize,
}

/// Outcome of [`SessionRegistry::admit`].
#[derive(Debug)]
pub enum Admission {
    /// The session is now `Active` with one holder.
    Inserted,
    /// An `Active` session with the same id exists; the caller is now one of
    /// its holders.
    Joined(Arc<Session>),
    /// A session with the same id is being retired.
    Retiring(Arc<Session>),
}

/// Outcome of [`SessionRegistry::release`].
#[derive(Debug)]
pub enum Release {
    /// Other holders remain.
    Retained,
    /// Last holder left; the session is now `Draining` and the caller must
    /// retire it.
    Drain(Arc<Session>),
    /// Someone else is already retiring the session.
    InProgress(Arc<Session>),
    Missing,
}

/// Outcome of [`SessionRegistry::begin_draining`].
#[derive(Debug)]
pub enum DrainTicket {
    /// The caller moved the session to `Draining` and must retire it.
    Started(Arc<Session>),
    /// Someone else is already retiring the session.
    InProgress(Arc<Session>),
    Missing,
}

/// Sessions by id.
#[derive(Default)]
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session` as `Active` unless its id is taken.
    pub fn admit(&self, session: Arc<Session>) -> Admission {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(session.id()) {
            if entry.session.is_active() {
                entry.holders += 1;
                return Admission::Joined(entry.session.clone());
            }
            return Admission::Retiring(entry.session.clone());
        }

        session.advance(SessionState::Active);
        entries.insert(
            session.id().to_string(),
            Entry {
                session,
                holders: 1,
            },
        );
        Admission::Inserted
    }

    /// The session with `id`, if it is `Active`.
    pub fn active(&self, id: &str) -> Option<Arc<Session>> {
        self.entries
            .lock()
            .get(id)
            .filter(|entry| entry.session.is_active())
            .map(|entry| entry.session.clone())
    }

    /// Adds a holder to the `Active` session with `id`.
    pub fn attach(&self, id: &str) -> Option<Arc<Session>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(id).filter(|entry| entry.session.is_active())?;
        entry.holders += 1;
        Some(entry.session.clone())
    }

    /// Adds a holder to the `Active` session streaming `info_hash`.
    pub fn attach_by_info_hash(&self, info_hash: InfoHash) -> Option<Arc<Session>> {
        let mut entries = self.entries.lock();
        let entry = entries.values_mut().find(|entry| {
            entry.session.is_active() && entry.session.info_hash() == info_hash
        })?;
        entry.holders += 1;
        Some(entry.session.clone())
    }

    /// Drops one holder; the last one moves the session to `Draining`.
    pub fn release(&self, id: &str) -> Release {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(id) else {
            return Release::Missing;
        };
        if !entry.session.is_active() {
            return Release::InProgress(entry.session.clone());
        }

        entry.holders = entry.holders.saturating_sub(1);
        if entry.holders > 0 {
            return Release::Retained;
        }
        entry.session.advance(SessionState::Draining);
        Release::Drain(entry.session.clone())
    }

    /// Moves the session to `Draining` regardless of holders.
    pub fn begin_draining(&self, id: &str) -> DrainTicket {
        let entries = self.entries.lock();
        let Some(entry) = entries.get(id) else {
            return DrainTicket::Missing;
        };
        if entry.session.is_active() {
            entry.session.advance(SessionState::Draining);
            DrainTicket::Started(entry.session.clone())
        } else {
            DrainTicket::InProgress(entry.session.clone())
        }
    }

    /// Removes the session with `id` and marks it `Closed`.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.entries.lock().remove(id).map(|entry| entry.session);
        if let Some(session) = &removed {
            session.advance(SessionState::Closed);
        }
        removed
    }

    /// Number of client connections attached to `id`.
    pub fn holders(&self, id: &str) -> usize {
        self.entries
            .lock()
            .get(id)
            .map(|entry| entry.holders)
            .unwrap_or(0)
    }

    /// Ids of every session not yet removed, in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Sessions not yet removed, including those being retired.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Sessions currently serving reads.
    pub fn active_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.session.is_active())
            .count()
    }
}
