//! Stamp-based transposition table.
//!
//! Positions are keyed by their full 64-bit hash. The top `num_bits` of the
//! hash select a bucket, and every entry in a bucket keeps the full hash so
//! that distinct positions sharing a bucket never alias. Entries carry a
//! stamp copied from a shared search counter; [`TranspositionTable::sweep`]
//! drops entries whose stamp has fallen too far behind, so positions still
//! reachable from the current root survive across consecutive searches while
//! stale lines age out.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many searches an untouched entry survives by default.
pub const DEFAULT_RETENTION_OFFSET: u32 = 3;

/// Default bucket-index width in bits.
pub const DEFAULT_NUM_BITS: u32 = 12;

#[derive(Debug, Clone)]
struct StampedEntry<P> {
    full_hash: u64,
    stamp: u32,
    payload: P,
}

/// Concurrent transposition table with generation-stamped eviction.
///
/// Buckets are individually locked; the stamp and the hit counters are
/// atomics, so lookups on different buckets never contend.
pub struct TranspositionTable<P> {
    buckets: Box<[Mutex<Vec<StampedEntry<P>>>]>,
    num_bits: u32,
    retention_offset: u32,
    stamp: AtomicU32,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: Clone> TranspositionTable<P> {
    /// Allocates a table with `2^num_bits` buckets, all empty, stamp zero.
    ///
    /// `num_bits` must be in `1..=32`; the bucket index is the top
    /// `num_bits` bits of the full hash.
    pub fn new(num_bits: u32, retention_offset: u32) -> Self {
        assert!((1..=32).contains(&num_bits), "num_bits must be in 1..=32");
        assert!(retention_offset >= 1, "retention_offset must be at least 1");
        let buckets = (0..1usize << num_bits)
            .map(|_| Mutex::new(Vec::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buckets,
            num_bits,
            retention_offset,
            stamp: AtomicU32::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn bucket_index(&self, full_hash: u64) -> usize {
        (full_hash >> (64 - self.num_bits)) as usize
    }

    /// Looks up `full_hash`, refreshing the entry's stamp on a hit so that
    /// recently consulted positions are not swept.
    pub fn retrieve(&self, full_hash: u64) -> Option<P> {
        let mut bucket = self.buckets[self.bucket_index(full_hash)].lock().unwrap();
        for entry in bucket.iter_mut() {
            if entry.full_hash == full_hash {
                entry.stamp = self.stamp.load(Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.payload.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Inserts or replaces the payload for `full_hash` and stamps it current.
    ///
    /// Two distinct positions can only collide by sharing the full 64-bit
    /// hash, in which case the later store wins.
    pub fn store(&self, full_hash: u64, payload: P) {
        let stamp = self.stamp.load(Ordering::Relaxed);
        let mut bucket = self.buckets[self.bucket_index(full_hash)].lock().unwrap();
        for entry in bucket.iter_mut() {
            if entry.full_hash == full_hash {
                entry.payload = payload;
                entry.stamp = stamp;
                return;
            }
        }
        bucket.push(StampedEntry { full_hash, stamp, payload });
    }

    /// Advances the generation stamp. Call exactly once per completed search.
    pub fn update_stamp(&self) {
        self.stamp.fetch_add(1, Ordering::Relaxed);
    }

    /// Current generation stamp.
    pub fn stamp(&self) -> u32 {
        self.stamp.load(Ordering::Relaxed)
    }

    /// Removes every entry whose stamp is at least `retention_offset` behind
    /// the current stamp. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let stamp = self.stamp.load(Ordering::Relaxed);
        let cutoff = i64::from(stamp) - i64::from(self.retention_offset);
        let mut removed = 0;
        let mut retained = 0;
        for bucket in self.buckets.iter() {
            let mut bucket = bucket.lock().unwrap();
            let before = bucket.len();
            bucket.retain(|entry| i64::from(entry.stamp) > cutoff);
            removed += before - bucket.len();
            retained += bucket.len();
        }
        debug!(removed, retained, stamp = self.stamp(), "swept transposition table");
        removed
    }

    /// Drops all entries and resets the stamp and counters.
    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            bucket.lock().unwrap().clear();
        }
        self.stamp.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that hit, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}

impl<P: Clone> std::fmt::Debug for TranspositionTable<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("num_bits", &self.num_bits)
            .field("retention_offset", &self.retention_offset)
            .field("stamp", &self.stamp())
            .field("len", &self.len())
            .finish()
    }
}

/// Payload recording what a finished search learned about one position,
/// serializable so tables can be handed to a training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedEntry {
    /// Expected score from the perspective of the agent to move.
    pub value: f64,
    /// Depth below the position that the estimate is based on.
    pub depth: u32,
    /// Per-move scores in legal-move order.
    pub move_values: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_retrieve() {
        let tt: TranspositionTable<f64> = TranspositionTable::new(4, DEFAULT_RETENTION_OFFSET);
        assert_eq!(tt.num_buckets(), 16);
        assert!(tt.retrieve(0xDEAD_BEEF).is_none());
        tt.store(0xDEAD_BEEF, 0.5);
        assert_eq!(tt.retrieve(0xDEAD_BEEF), Some(0.5));
        assert_eq!(tt.len(), 1);
    }

    #[test]
    fn test_store_overwrites_in_place() {
        let tt: TranspositionTable<f64> = TranspositionTable::new(4, DEFAULT_RETENTION_OFFSET);
        tt.store(42, 0.1);
        tt.store(42, 0.9);
        assert_eq!(tt.len(), 1, "same hash must not grow the bucket");
        assert_eq!(tt.retrieve(42), Some(0.9));
    }

    #[test]
    fn test_bucket_index_uses_top_bits() {
        let tt: TranspositionTable<u32> = TranspositionTable::new(8, DEFAULT_RETENTION_OFFSET);
        // Hashes differing only in low bits share a bucket but stay distinct.
        let a = 0xAB00_0000_0000_0001;
        let b = 0xAB00_0000_0000_0002;
        tt.store(a, 1);
        tt.store(b, 2);
        assert_eq!(tt.retrieve(a), Some(1));
        assert_eq!(tt.retrieve(b), Some(2));
        assert_eq!(tt.len(), 2);
    }

    #[test]
    fn test_full_hash_collision_overwrites() {
        // Distinct positions with identical 64-bit hashes are treated as the
        // same position; the most recent store wins.
        let tt: TranspositionTable<&str> = TranspositionTable::new(4, DEFAULT_RETENTION_OFFSET);
        tt.store(7, "first");
        tt.store(7, "second");
        assert_eq!(tt.retrieve(7), Some("second"));
    }

    #[test]
    fn test_sweep_eviction_window() {
        let tt: TranspositionTable<u32> = TranspositionTable::new(4, 3);
        // Entries stored at stamp 0.
        for hash in 0..10u64 {
            tt.store(hash << 60 | hash, hash as u32);
        }
        // Advance through five searches, touching one entry at stamp 4.
        for _ in 0..4 {
            tt.update_stamp();
        }
        assert_eq!(tt.stamp(), 4);
        assert!(tt.retrieve(0).is_some(), "refreshes entry 0 at stamp 4");
        tt.update_stamp();
        assert_eq!(tt.stamp(), 5);

        // Retention 3 at stamp 5 removes everything stamped 2 or older.
        let removed = tt.sweep();
        assert_eq!(removed, 9);
        assert_eq!(tt.len(), 1);
        assert!(tt.retrieve(0).is_some());
    }

    #[test]
    fn test_sweep_before_wraparound_keeps_young_entries() {
        let tt: TranspositionTable<u32> = TranspositionTable::new(4, 3);
        tt.store(1, 1);
        tt.update_stamp();
        // Stamp 1, retention 3: cutoff is negative, nothing qualifies.
        assert_eq!(tt.sweep(), 0);
        assert_eq!(tt.len(), 1);
    }

    #[test]
    fn test_retrieve_refreshes_stamp() {
        let tt: TranspositionTable<u32> = TranspositionTable::new(4, 1);
        tt.store(99, 7);
        tt.update_stamp();
        assert!(tt.retrieve(99).is_some());
        tt.update_stamp();
        // Entry was refreshed to stamp 1; cutoff at stamp 2 is 1, so a
        // retention of 1 removes it only because 1 <= 1.
        assert_eq!(tt.sweep(), 1);
        assert!(tt.is_empty());
    }

    #[test]
    fn test_hit_rate_counters() {
        let tt: TranspositionTable<u32> = TranspositionTable::new(4, DEFAULT_RETENTION_OFFSET);
        assert_eq!(tt.hit_rate(), 0.0);
        tt.store(5, 5);
        assert!(tt.retrieve(5).is_some());
        assert!(tt.retrieve(6).is_none());
        assert_eq!(tt.hits(), 1);
        assert_eq!(tt.misses(), 1);
        assert!((tt.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_clear_resets_everything() {
        let tt: TranspositionTable<u32> = TranspositionTable::new(4, DEFAULT_RETENTION_OFFSET);
        tt.store(1, 1);
        tt.update_stamp();
        assert!(tt.retrieve(1).is_some());
        tt.clear();
        assert!(tt.is_empty());
        assert_eq!(tt.stamp(), 0);
        assert_eq!(tt.hits(), 0);
        assert_eq!(tt.misses(), 0);
    }

    #[test]
    fn test_concurrent_store_retrieve() {
        use std::sync::Arc;

        let tt: Arc<TranspositionTable<u64>> =
            Arc::new(TranspositionTable::new(6, DEFAULT_RETENTION_OFFSET));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let tt = Arc::clone(&tt);
            handles.push(std::thread::spawn(move || {
                for i in 0..256u64 {
                    let hash = (t << 62) | (i << 8) | t;
                    tt.store(hash, hash);
                    assert_eq!(tt.retrieve(hash), Some(hash));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tt.len(), 4 * 256);
    }

    #[test]
    fn test_learned_entry_roundtrip() {
        let entry = LearnedEntry { value: 0.25, depth: 3, move_values: vec![0.1, -0.2, 0.25] };
        let text = toml::to_string(&entry).unwrap();
        let back: LearnedEntry = toml::from_str(&text).unwrap();
        assert_eq!(back, entry);
    }
}
