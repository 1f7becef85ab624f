//! In-process entity store.
//!
//! All tables live behind one async mutex. A [`Transaction`] holds that lock
//! for its whole lifetime and stages writes on a private copy of the entity
//! tables; [`Transaction::commit`] publishes the copy, and dropping the
//! transaction without committing discards it. Readers therefore never
//! observe a partially applied mutation.
//!
//! `history` and `bin_moves` are append-only and are not copied. Inside a
//! transaction they start empty and hold only the rows that transaction
//! appends; commit moves those rows onto the committed logs.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::bin::{Bin, BinMoveRecord};
use crate::models::history::HistoryEntry;
use crate::models::move_request::MoveRequest;
use crate::models::shift::{Shift, StopEntry};
use crate::models::user::User;

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub bins: HashMap<Uuid, Bin>,
    pub shifts: HashMap<Uuid, Shift>,
    pub stops: HashMap<Uuid, StopEntry>,
    pub move_requests: HashMap<Uuid, MoveRequest>,
    pub users: HashMap<Uuid, User>,
    pub history: Vec<HistoryEntry>,
    pub bin_moves: Vec<BinMoveRecord>,
}

impl Tables {
    pub fn bin(&self, id: Uuid) -> Result<&Bin, AppError> {
        self.bins
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("bin {id} not found")))
    }

    pub fn bin_mut(&mut self, id: Uuid) -> Result<&mut Bin, AppError> {
        self.bins
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("bin {id} not found")))
    }

    pub fn shift(&self, id: Uuid) -> Result<&Shift, AppError> {
        self.shifts
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("shift {id} not found")))
    }

    pub fn shift_mut(&mut self, id: Uuid) -> Result<&mut Shift, AppError> {
        self.shifts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("shift {id} not found")))
    }

    pub fn user(&self, id: Uuid) -> Result<&User, AppError> {
        self.users
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub fn move_request(&self, id: Uuid) -> Result<&MoveRequest, AppError> {
        self.move_requests
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("move request {id} not found")))
    }

    pub fn move_request_mut(&mut self, id: Uuid) -> Result<&mut MoveRequest, AppError> {
        self.move_requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("move request {id} not found")))
    }

    /// The shift's stops ordered by `sequence_order`.
    pub fn stops_for_shift(&self, shift_id: Uuid) -> Vec<StopEntry> {
        let mut stops: Vec<StopEntry> = self
            .stops
            .values()
            .filter(|stop| stop.shift_id == shift_id)
            .cloned()
            .collect();
        stops.sort_by_key(|stop| stop.sequence_order);
        stops
    }

    /// Replaces every stop row of `shift_id` with `stops`.
    pub fn replace_shift_stops(&mut self, shift_id: Uuid, stops: Vec<StopEntry>) {
        self.stops.retain(|_, stop| stop.shift_id != shift_id);
        for stop in stops {
            self.stops.insert(stop.id, stop);
        }
    }

    /// Deletes the stops generated for a move request and returns them.
    pub fn remove_stops_for_move(&mut self, move_request_id: Uuid) -> Vec<StopEntry> {
        let ids: Vec<Uuid> = self
            .stops
            .values()
            .filter(|stop| stop.move_request_id == Some(move_request_id))
            .map(|stop| stop.id)
            .collect();

        let mut removed: Vec<StopEntry> = ids
            .into_iter()
            .filter_map(|id| self.stops.remove(&id))
            .collect();
        removed.sort_by_key(|stop| stop.sequence_order);
        removed
    }

    pub fn open_move_for_bin(&self, bin_id: Uuid) -> Option<&MoveRequest> {
        self.move_requests
            .values()
            .find(|request| request.bin_id == bin_id && request.status.is_open())
    }

    pub fn history_for_bin(&self, bin_id: Uuid) -> Vec<HistoryEntry> {
        self.history
            .iter()
            .filter(|entry| entry.bin_id == bin_id)
            .cloned()
            .collect()
    }

    /// Copy of the entity tables with empty append-only logs.
    fn stage(&self) -> Tables {
        Tables {
            bins: self.bins.clone(),
            shifts: self.shifts.clone(),
            stops: self.stops.clone(),
            move_requests: self.move_requests.clone(),
            users: self.users.clone(),
            history: Vec::new(),
            bin_moves: Vec::new(),
        }
    }

    pub fn moves_for_bin(&self, bin_id: Uuid) -> Vec<BinMoveRecord> {
        self.bin_moves
            .iter()
            .filter(|record| record.bin_id == bin_id)
            .cloned()
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct Store {
    tables: Arc<Mutex<Tables>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to committed state. Do not hold across an `.await`.
    pub async fn read(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().await
    }

    pub async fn begin(&self) -> Transaction<'_> {
        let guard = self.tables.lock().await;
        let staged = guard.stage();
        Transaction { guard, staged }
    }

    /// Appends one history row directly to the committed log.
    pub async fn append_history(&self, entry: HistoryEntry) {
        self.tables.lock().await.history.push(entry);
    }
}

pub struct Transaction<'a> {
    guard: MutexGuard<'a, Tables>,
    staged: Tables,
}

impl Transaction<'_> {
    pub fn commit(self) {
        let Transaction { mut guard, staged } = self;
        let Tables {
            bins,
            shifts,
            stops,
            move_requests,
            users,
            mut history,
            mut bin_moves,
        } = staged;

        guard.bins = bins;
        guard.shifts = shifts;
        guard.stops = stops;
        guard.move_requests = move_requests;
        guard.users = users;
        guard.history.append(&mut history);
        guard.bin_moves.append(&mut bin_moves);
        debug!("transaction committed");
    }
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Self::Target {
        &self.staged
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.staged
    }
}
