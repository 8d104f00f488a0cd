// Deck Gate - Session Store
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// In-memory map of session id -> open Deck, plus the "current" pointer and
// the session -> logical filename bindings used to target auto-save.
// Bounded: least recently used session is evicted past max_sessions.
// Not locked. Callers serialize requests against one session.

use crate::deck::Deck;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One open document
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub deck: Deck,
    pub opened_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// Set by mutating tools, cleared once the deck reaches storage
    pub dirty: bool,
    /// Monotonic use counter for LRU ordering (timestamps can tie)
    tick: u64,
}

/// Listing row for list_presentations
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub slide_count: usize,
    pub current: bool,
    pub dirty: bool,
    pub file: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: HashMap<String, Session>,
    current: Option<String>,
    bindings: HashMap<String, String>,
    max_sessions: usize,
    clock: u64,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            current: None,
            bindings: HashMap::new(),
            max_sessions: max_sessions.max(1),
            clock: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Next free `presentation_<n>` id
    pub fn generate_id(&self) -> String {
        let mut n = self.sessions.len() + 1;
        loop {
            let id = format!("presentation_{}", n);
            if !self.sessions.contains_key(&id) {
                return id;
            }
            n += 1;
        }
    }

    /// Store a deck under `id` (generated when None), replacing any
    /// existing session with that id. Returns the id used.
    pub fn insert(&mut self, id: Option<String>, deck: Deck) -> String {
        let id = id.unwrap_or_else(|| self.generate_id());
        let now = Utc::now();
        let tick = self.next_tick();
        self.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                deck,
                opened_at: now,
                last_used: now,
                dirty: false,
                tick,
            },
        );
        self.evict_over_capacity(&id);
        id
    }

    fn evict_over_capacity(&mut self, keep: &str) {
        while self.sessions.len() > self.max_sessions {
            let victim = self
                .sessions
                .values()
                .filter(|s| s.id != keep && Some(&s.id) != self.current.as_ref())
                .min_by_key(|s| s.tick)
                .map(|s| s.id.clone());
            let Some(victim) = victim else { break };
            if self.sessions.get(&victim).map(|s| s.dirty).unwrap_or(false) {
                log::warn!("Evicting session {} with unsaved changes", victim);
            } else {
                log::info!("Evicting idle session {}", victim);
            }
            self.remove(&victim);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Mutable access; counts as a use for LRU
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        let tick = self.next_tick();
        let session = self.sessions.get_mut(id)?;
        session.tick = tick;
        session.last_used = Utc::now();
        Some(session)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Point "current" at an existing session
    pub fn set_current(&mut self, id: &str) -> bool {
        if self.sessions.contains_key(id) {
            self.current = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Explicit id if given, else the current session. Must exist.
    pub fn resolve(&self, id: Option<&str>) -> Option<String> {
        let id = id.or(self.current.as_deref())?;
        self.sessions.contains_key(id).then(|| id.to_string())
    }

    /// Drop a session and its binding. Unsets current if it pointed here.
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        let removed = self.sessions.remove(id)?;
        self.bindings.remove(id);
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        Some(removed)
    }

    pub fn bind_filename(&mut self, id: &str, filename: &str) {
        if self.sessions.contains_key(id) {
            self.bindings.insert(id.to_string(), filename.to_string());
        }
    }

    pub fn bound_filename(&self, id: &str) -> Option<&str> {
        self.bindings.get(id).map(String::as_str)
    }

    pub fn mark_dirty(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.dirty = true;
        }
    }

    pub fn mark_clean(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.dirty = false;
        }
    }

    pub fn is_dirty(&self, id: &str) -> bool {
        self.sessions.get(id).map(|s| s.dirty).unwrap_or(false)
    }

    /// Sessions ordered by id
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut rows: Vec<SessionSummary> = self
            .sessions
            .values()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                slide_count: s.deck.slides.len(),
                current: self.current.as_deref() == Some(s.id.as_str()),
                dirty: s.dirty,
                file: self.bindings.get(&s.id).cloned(),
                opened_at: s.opened_at,
                last_used: s.last_used,
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_sequential_and_unique() {
        let mut store = SessionStore::new(8);
        assert_eq!(store.insert(None, Deck::new()), "presentation_1");
        assert_eq!(store.insert(None, Deck::new()), "presentation_2");
        store.remove("presentation_1");
        // len()+1 == 2 is taken, so the generator moves on
        assert_eq!(store.insert(None, Deck::new()), "presentation_3");
    }

    #[test]
    fn current_never_dangles() {
        let mut store = SessionStore::new(8);
        let id = store.insert(Some("deck1".into()), Deck::new());
        assert!(store.set_current(&id));
        assert!(!store.set_current("ghost"));
        assert_eq!(store.current(), Some("deck1"));
        store.remove("deck1");
        assert_eq!(store.current(), None);
        assert_eq!(store.resolve(None), None);
    }

    #[test]
    fn lru_eviction_drops_binding_and_spares_current() {
        let mut store = SessionStore::new(2);
        store.insert(Some("a".into()), Deck::new());
        store.insert(Some("b".into()), Deck::new());
        store.set_current("a");
        store.bind_filename("b", "b.pptx");
        store.insert(Some("c".into()), Deck::new());

        assert!(store.contains("a"), "current session is never evicted");
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        assert_eq!(store.bound_filename("b"), None);
    }

    #[test]
    fn get_mut_refreshes_lru_position() {
        let mut store = SessionStore::new(2);
        store.insert(Some("a".into()), Deck::new());
        store.insert(Some("b".into()), Deck::new());
        store.get_mut("a");
        store.insert(Some("c".into()), Deck::new());
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
    }

    #[test]
    fn dirty_flag_round_trip() {
        let mut store = SessionStore::new(4);
        store.insert(Some("a".into()), Deck::new());
        assert!(!store.is_dirty("a"));
        store.mark_dirty("a");
        assert!(store.is_dirty("a"));
        store.mark_clean("a");
        assert!(!store.is_dirty("a"));
    }

    #[test]
    fn bindings_only_for_known_sessions() {
        let mut store = SessionStore::new(4);
        store.bind_filename("ghost", "g.pptx");
        assert_eq!(store.bound_filename("ghost"), None);
        store.insert(Some("a".into()), Deck::new());
        store.bind_filename("a", "a.pptx");
        assert_eq!(store.bound_filename("a"), Some("a.pptx"));
        let rows = store.summaries();
        assert_eq!(rows[0].file.as_deref(), Some("a.pptx"));
    }
}
