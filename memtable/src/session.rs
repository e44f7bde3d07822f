use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::catalog::TableId;
use crate::table::TableData;

pub type SessionId = i32;

struct Overlay {
    baseline: Weak<RwLock<TableData>>,
    data: Arc<RwLock<TableData>>,
}

#[derive(Default)]
struct SessionState {
    overlays: HashMap<TableId, Overlay>,
}

/// Per-session copy-on-write views of table data. The first touch of a table
/// clones its baseline; later reads and writes see only the clone until
/// `commit` publishes it or `rollback` discards it.
pub struct Session {
    id: SessionId,
    state: Mutex<SessionState>,
    // advances on every commit and rollback
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("overlays", &self.state.lock().overlays.len())
            .finish()
    }
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState::default()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn get_or_clone(
        &self,
        table_id: TableId,
        baseline: &Arc<RwLock<TableData>>,
    ) -> Arc<RwLock<TableData>> {
        let mut guard = self.state.lock();
        if let Some(overlay) = guard.overlays.get(&table_id)
            && overlay.baseline.ptr_eq(&Arc::downgrade(baseline))
        {
            return overlay.data.clone();
        }
        let data = Arc::new(RwLock::new(baseline.read().clone()));
        guard.overlays.insert(
            table_id,
            Overlay {
                baseline: Arc::downgrade(baseline),
                data: data.clone(),
            },
        );
        data
    }

    pub fn overlay(&self, table_id: TableId) -> Option<Arc<RwLock<TableData>>> {
        self.state
            .lock()
            .overlays
            .get(&table_id)
            .map(|o| o.data.clone())
    }

    /// Replaces this session's view of the table with `data`.
    pub fn publish(&self, table_id: TableId, baseline: &Arc<RwLock<TableData>>, data: TableData) {
        let slot = self.get_or_clone(table_id, baseline);
        slot.write().install(data);
    }

    /// Makes every overlay the new baseline of its table. Tables dropped
    /// since they were touched are skipped. Returns the number published.
    pub fn commit(&self) -> usize {
        let overlays = self.take_overlays();
        let mut published = 0;
        for (table_id, overlay) in overlays {
            let Some(baseline) = overlay.baseline.upgrade() else {
                trace!(session = self.id, table_id, "skipping overlay of dropped table");
                continue;
            };
            let data = overlay.data.read().clone();
            baseline.write().install(data);
            published += 1;
        }
        trace!(session = self.id, published, "session committed");
        published
    }

    pub fn rollback(&self) -> usize {
        let discarded = self.take_overlays().len();
        trace!(session = self.id, discarded, "session rolled back");
        discarded
    }

    pub fn overlay_count(&self) -> usize {
        self.state.lock().overlays.len()
    }

    /// The current overlay generation, for editors that must notice when
    /// the overlays they write into are committed or rolled back.
    pub(crate) fn epoch(&self) -> OverlayEpoch {
        OverlayEpoch {
            counter: self.generation.clone(),
            seen: self.generation.load(Ordering::Acquire),
        }
    }

    fn take_overlays(&self) -> HashMap<TableId, Overlay> {
        let mut guard = self.state.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        std::mem::take(&mut guard.overlays)
    }
}

/// A session's overlay generation as seen when an edit started.
#[derive(Clone, Debug)]
pub(crate) struct OverlayEpoch {
    counter: Arc<AtomicU64>,
    seen: u64,
}

impl OverlayEpoch {
    pub(crate) fn is_current(&self) -> bool {
        self.counter.load(Ordering::Acquire) == self.seen
    }
}

#[derive(Debug)]
pub struct SessionManager {
    next_id: AtomicI32,
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            sessions: DashMap::new(),
        }
    }

    pub fn create_session(&self) -> Arc<Session> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(Session::new(id));
        self.sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    /// Ends a session, discarding any uncommitted overlays.
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&id)?;
        session.rollback();
        Some(session)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
