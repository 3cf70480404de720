// Run-scoped interning of categorical dimension values.
//
// Each dimension (division, club, nationality) gets a value→id table seeded
// from a configurable starting offset, so independently ingested batches can
// be merged later without renumbering anything. Ids are strictly increasing
// and never reassigned within a run.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ingest::IngestError;

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// A categorical dimension with its own lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Division,
    Club,
    Nat,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Division, Dimension::Club, Dimension::Nat];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Division => "division",
            Dimension::Club => "club",
            Dimension::Nat => "nat",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Starting id per dimension. Defaults to zero everywhere; a merge run seeds
/// these past the ids already persisted downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOffsets {
    pub division: i64,
    pub club: i64,
    pub nat: i64,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// One newly assigned (dimension, value, id) row, emitted downstream exactly
/// once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub dimension: Dimension,
    pub value: String,
    pub id: i64,
}

#[derive(Debug)]
struct LookupTable {
    next_id: i64,
    ids: HashMap<String, i64>,
}

impl LookupTable {
    fn new(offset: i64) -> Self {
        Self {
            next_id: offset,
            ids: HashMap::new(),
        }
    }
}

/// Value→id interner for all dimensions of one ingestion run.
///
/// This is the run's only mutable shared state; it is owned by the session
/// and threaded through every normalization call. Never a process-wide
/// singleton, so multiple runs can coexist in tests.
#[derive(Debug)]
pub struct Interner {
    tables: HashMap<Dimension, LookupTable>,
    fresh: Vec<LookupEntry>,
}

impl Interner {
    pub fn new(offsets: LookupOffsets) -> Self {
        let mut tables = HashMap::new();
        tables.insert(Dimension::Division, LookupTable::new(offsets.division));
        tables.insert(Dimension::Club, LookupTable::new(offsets.club));
        tables.insert(Dimension::Nat, LookupTable::new(offsets.nat));
        Self {
            tables,
            fresh: Vec::new(),
        }
    }

    /// Return the id for `value`, assigning the next sequential id on first
    /// sight. A first occurrence is also pushed onto the fresh-entry buffer.
    pub fn intern(&mut self, dimension: Dimension, value: &str) -> i64 {
        let table = self
            .tables
            .get_mut(&dimension)
            .expect("interner has a table per dimension");
        if let Some(&id) = table.ids.get(value) {
            return id;
        }
        let id = table.next_id;
        table.next_id += 1;
        table.ids.insert(value.to_string(), id);
        self.fresh.push(LookupEntry {
            dimension,
            value: value.to_string(),
            id,
        });
        id
    }

    /// Look up an id without assigning one.
    pub fn get(&self, dimension: Dimension, value: &str) -> Option<i64> {
        self.tables[&dimension].ids.get(value).copied()
    }

    /// Seed a known (value, id) pair, typically loaded from the store before
    /// a merge run. Preloaded pairs are not fresh. A value that already maps
    /// to a different id means two incompatible runs are sharing an interner.
    pub fn preload(
        &mut self,
        dimension: Dimension,
        value: &str,
        id: i64,
    ) -> Result<(), IngestError> {
        let table = self
            .tables
            .get_mut(&dimension)
            .expect("interner has a table per dimension");
        if let Some(&existing) = table.ids.get(value) {
            if existing != id {
                return Err(IngestError::LookupInconsistency {
                    dimension,
                    value: value.to_string(),
                    existing,
                    incoming: id,
                });
            }
            return Ok(());
        }
        table.ids.insert(value.to_string(), id);
        table.next_id = table.next_id.max(id + 1);
        Ok(())
    }

    /// Drain the entries assigned since the last drain. Called once per
    /// record so only the incremental lookup rows travel downstream.
    pub fn take_fresh(&mut self) -> Vec<LookupEntry> {
        std::mem::take(&mut self.fresh)
    }

    /// Number of distinct values interned for a dimension.
    pub fn len(&self, dimension: Dimension) -> usize {
        self.tables[&dimension].ids.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent_by_value() {
        let mut interner = Interner::new(LookupOffsets::default());
        let a = interner.intern(Dimension::Club, "FC Test");
        let b = interner.intern(Dimension::Club, "FC Test");
        assert_eq!(a, b);
        assert_eq!(interner.len(Dimension::Club), 1);
    }

    #[test]
    fn distinct_values_get_strictly_increasing_ids() {
        let mut interner = Interner::new(LookupOffsets::default());
        let a = interner.intern(Dimension::Nat, "ENG");
        let b = interner.intern(Dimension::Nat, "SWE");
        let c = interner.intern(Dimension::Nat, "GER");
        assert!(a < b && b < c);
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn offsets_shift_the_id_sequence() {
        let offsets = LookupOffsets {
            division: 100,
            club: 2000,
            nat: 0,
        };
        let mut interner = Interner::new(offsets);
        assert_eq!(interner.intern(Dimension::Division, "Premier"), 100);
        assert_eq!(interner.intern(Dimension::Division, "Championship"), 101);
        assert_eq!(interner.intern(Dimension::Club, "FC Test"), 2000);
        assert_eq!(interner.intern(Dimension::Nat, "ENG"), 0);
    }

    #[test]
    fn fresh_entries_drain_per_record() {
        let mut interner = Interner::new(LookupOffsets::default());
        interner.intern(Dimension::Club, "FC Test");
        interner.intern(Dimension::Nat, "ENG");
        let fresh = interner.take_fresh();
        assert_eq!(fresh.len(), 2);

        // Repeats are not fresh; only the genuinely new value is emitted.
        interner.intern(Dimension::Club, "FC Test");
        interner.intern(Dimension::Club, "AIK");
        let fresh = interner.take_fresh();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].value, "AIK");
        assert_eq!(fresh[0].dimension, Dimension::Club);
    }

    #[test]
    fn preload_conflict_is_an_inconsistency_error() {
        let mut interner = Interner::new(LookupOffsets::default());
        interner.preload(Dimension::Club, "FC Test", 7).unwrap();
        assert_eq!(interner.get(Dimension::Club, "FC Test"), Some(7));

        // Same pair again is fine.
        interner.preload(Dimension::Club, "FC Test", 7).unwrap();

        let err = interner.preload(Dimension::Club, "FC Test", 8).unwrap_err();
        assert!(matches!(err, IngestError::LookupInconsistency { .. }));

        // New assignments continue past the preloaded id.
        assert_eq!(interner.intern(Dimension::Club, "AIK"), 8);
    }
}
