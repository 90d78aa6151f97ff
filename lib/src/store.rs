//! Note store.
//!
//! Owns the lifecycle state of every known note. Status changes are atomic
//! per note: the map is sharded and each transition runs under the lock of
//! the shard holding that note only, so unrelated notes never contend.

use alloy::primitives::{Address, B256};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, warn};

use crate::crypto::{point_from_bytes, point_to_bytes, scalar_from_bytes, scalar_to_bytes};
use crate::error::StoreError;
use crate::note::{Note, NoteStatus};

#[derive(Debug, Default)]
pub struct NoteStore {
    notes: DashMap<B256, Note>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a note. A commitment can only be recorded once.
    pub fn record(&self, note: Note) -> Result<(), StoreError> {
        match self.notes.entry(note.commitment()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyRecorded(note.commitment())),
            Entry::Vacant(slot) => {
                debug!(commitment = %note.commitment(), owner = %note.owner(), "recorded note");
                slot.insert(note);
                Ok(())
            }
        }
    }

    pub fn find(&self, commitment: &B256) -> Result<Note, StoreError> {
        self.notes
            .get(commitment)
            .map(|note| note.clone())
            .ok_or(StoreError::NotFound(*commitment))
    }

    /// Claims an unspent note for an in-flight transaction.
    ///
    /// Check-and-set under the note's shard lock: of several concurrent
    /// claims exactly one succeeds, the rest get `AlreadyClaimed`.
    pub fn mark_pending_spend(&self, commitment: &B256) -> Result<Note, StoreError> {
        let mut note = self
            .notes
            .get_mut(commitment)
            .ok_or(StoreError::NotFound(*commitment))?;
        if note.status() != NoteStatus::Unspent {
            return Err(StoreError::AlreadyClaimed(*commitment));
        }
        note.set_status(NoteStatus::PendingSpend);
        Ok(note.clone())
    }

    /// Finalises a claimed note once its transaction confirmed.
    pub fn mark_spent(&self, commitment: &B256) -> Result<(), StoreError> {
        self.transition(commitment, NoteStatus::PendingSpend, NoteStatus::Spent)
    }

    /// Releases a claimed note after a cancel or a revert.
    pub fn revert_pending_spend(&self, commitment: &B256) -> Result<(), StoreError> {
        self.transition(commitment, NoteStatus::PendingSpend, NoteStatus::Unspent)
    }

    /// Claims every note or none of them.
    pub fn claim_all(&self, commitments: &[B256]) -> Result<Vec<Note>, StoreError> {
        let mut claimed = Vec::with_capacity(commitments.len());
        for commitment in commitments {
            match self.mark_pending_spend(commitment) {
                Ok(note) => claimed.push(note),
                Err(err) => {
                    for note in &claimed {
                        if let Err(revert_err) = self.revert_pending_spend(&note.commitment()) {
                            warn!(
                                commitment = %note.commitment(),
                                %revert_err,
                                "failed to release claim"
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(claimed)
    }

    /// Unspent notes of `owner` whose opening this store knows.
    pub fn unspent_for(&self, owner: Address) -> Vec<Note> {
        self.notes
            .iter()
            .filter(|note| {
                note.owner() == owner
                    && note.status() == NoteStatus::Unspent
                    && note.opening().is_some()
            })
            .map(|note| note.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn transition(
        &self,
        commitment: &B256,
        from: NoteStatus,
        to: NoteStatus,
    ) -> Result<(), StoreError> {
        let mut note = self
            .notes
            .get_mut(commitment)
            .ok_or(StoreError::NotFound(*commitment))?;
        if note.status() != from {
            return Err(StoreError::InvalidTransition {
                commitment: *commitment,
                from: note.status(),
                to,
            });
        }
        note.set_status(to);
        debug!(%commitment, ?to, "note status changed");
        Ok(())
    }

    /// Save the store to a JSON file.
    ///
    /// The file holds note openings in clear; protect it like a key file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let records: Vec<NoteRecord> =
            self.notes.iter().map(|note| NoteRecord::from(&*note)).collect();
        fs::write(path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }

    /// Load a store previously written by [`NoteStore::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)?;
        let records: Vec<NoteRecord> = serde_json::from_str(&content)?;
        let store = Self::new();
        for record in records {
            store.record(record.into_note()?)?;
        }
        Ok(store)
    }
}

/// On-disk form of a note.
#[derive(Debug, Serialize, Deserialize)]
struct NoteRecord {
    commitment: B256,
    /// Hex-encoded Pedersen point
    point: String,
    owner: Address,
    value: Option<u64>,
    /// Hex-encoded blinding factor
    blinding: Option<String>,
    status: NoteStatus,
}

impl From<&Note> for NoteRecord {
    fn from(note: &Note) -> Self {
        Self {
            commitment: note.commitment(),
            point: hex::encode(point_to_bytes(note.point())),
            owner: note.owner(),
            value: note.opening().map(|o| o.value),
            blinding: note.opening().map(|o| hex::encode(scalar_to_bytes(&o.blinding))),
            status: note.status(),
        }
    }
}

impl NoteRecord {
    fn into_note(self) -> Result<Note, StoreError> {
        let corrupt = || StoreError::Corrupt(self.commitment);
        let point_bytes = hex::decode(&self.point).map_err(|_| corrupt())?;
        let point = point_from_bytes(&point_bytes).map_err(|_| corrupt())?;

        let mut note = match (self.value, &self.blinding) {
            (Some(value), Some(blinding)) => {
                let bytes = hex::decode(blinding).map_err(|_| corrupt())?;
                let blinding = scalar_from_bytes(&bytes).map_err(|_| corrupt())?;
                let note = Note::from_opening(self.owner, value, blinding);
                if note.point() != &point {
                    return Err(corrupt());
                }
                note
            }
            (None, None) => Note::watch_only(point, self.owner),
            _ => return Err(corrupt()),
        };
        if note.commitment() != self.commitment {
            return Err(corrupt());
        }
        note.set_status(self.status);
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment;
    use std::sync::{Arc, Barrier};

    fn note(value: u64) -> Note {
        commitment::create(Address::repeat_byte(7), value).unwrap()
    }

    #[test]
    fn test_record_and_find() {
        let store = NoteStore::new();
        let n = note(10);
        store.record(n.clone()).unwrap();
        assert_eq!(store.find(&n.commitment()).unwrap(), n);
        assert!(matches!(
            store.record(n.clone()),
            Err(StoreError::AlreadyRecorded(_))
        ));
        assert!(matches!(
            store.find(&B256::ZERO),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_lifecycle() {
        let store = NoteStore::new();
        let n = note(10);
        let c = n.commitment();
        store.record(n).unwrap();

        assert!(matches!(
            store.mark_spent(&c),
            Err(StoreError::InvalidTransition { .. })
        ));

        store.mark_pending_spend(&c).unwrap();
        assert!(matches!(
            store.mark_pending_spend(&c),
            Err(StoreError::AlreadyClaimed(_))
        ));
        store.revert_pending_spend(&c).unwrap();
        assert_eq!(store.find(&c).unwrap().status(), NoteStatus::Unspent);

        store.mark_pending_spend(&c).unwrap();
        store.mark_spent(&c).unwrap();
        assert_eq!(store.find(&c).unwrap().status(), NoteStatus::Spent);
        assert!(matches!(
            store.revert_pending_spend(&c),
            Err(StoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.mark_pending_spend(&c),
            Err(StoreError::AlreadyClaimed(_))
        ));
    }

    #[test]
    fn test_claim_all_is_all_or_nothing() {
        let store = NoteStore::new();
        let a = note(1);
        let b = note(2);
        store.record(a.clone()).unwrap();
        store.record(b.clone()).unwrap();
        store.mark_pending_spend(&b.commitment()).unwrap();

        let err = store.claim_all(&[a.commitment(), b.commitment()]).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClaimed(_)));
        assert_eq!(store.find(&a.commitment()).unwrap().status(), NoteStatus::Unspent);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let store = Arc::new(NoteStore::new());
        let n = note(100);
        let c = n.commitment();
        store.record(n).unwrap();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.mark_pending_spend(&c).is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_unspent_for_filters() {
        let store = NoteStore::new();
        let owner = Address::repeat_byte(7);
        let a = note(1);
        let b = note(2);
        let other = commitment::create(Address::repeat_byte(8), 3).unwrap();
        let watched = Note::watch_only(*note(4).point(), owner);
        for n in [a.clone(), b.clone(), other, watched] {
            store.record(n).unwrap();
        }
        store.mark_pending_spend(&b.commitment()).unwrap();

        let unspent = store.unspent_for(owner);
        assert_eq!(unspent.len(), 1);
        assert_eq!(unspent[0].commitment(), a.commitment());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let store = NoteStore::new();
        let a = note(42);
        let watched = Note::watch_only(*note(5).point(), Address::repeat_byte(9));
        store.record(a.clone()).unwrap();
        store.record(watched.clone()).unwrap();
        store.mark_pending_spend(&a.commitment()).unwrap();
        store.save(&path).unwrap();

        let loaded = NoteStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        let restored = loaded.find(&a.commitment()).unwrap();
        assert_eq!(restored.value(), Some(42));
        assert_eq!(restored.status(), NoteStatus::PendingSpend);
        assert!(loaded.find(&watched.commitment()).unwrap().opening().is_none());
    }

    #[test]
    fn test_load_rejects_tampered_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let store = NoteStore::new();
        store.record(note(42)).unwrap();
        store.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap().replace("\"value\": 42", "\"value\": 43");
        fs::write(&path, content).unwrap();
        assert!(matches!(NoteStore::load(&path), Err(StoreError::Corrupt(_))));
    }
}
