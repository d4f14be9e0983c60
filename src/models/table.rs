use crate::error::{ProcessingError, Result};
use crate::models::{StationAggregate, StationRecord};
use crate::utils::constants::EXPECTED_STATIONS;
use rustc_hash::FxBuildHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;

/// Station name to running aggregate.
///
/// Used both as a worker's partial table and as the merged global table. Keys
/// are copied out of the chunk only when a station is first seen; lookups
/// borrow the row's name slice, so the hot path hashes once and never
/// allocates. The hash strategy is the `S` parameter; Fx is the default.
#[derive(Clone)]
pub struct StationTable<S = FxBuildHasher> {
    stations: HashMap<Box<[u8]>, StationAggregate, S>,
    rows: u64,
}

pub type PartialTable = StationTable;
pub type GlobalTable = StationTable;

impl StationTable {
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }
}

impl Default for StationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> StationTable<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            stations: HashMap::with_capacity_and_hasher(EXPECTED_STATIONS, hasher),
            rows: 0,
        }
    }

    /// Fold one observation into the table.
    ///
    /// `offset` is only used to locate the row if its name is rejected.
    #[inline]
    pub fn observe(&mut self, record: StationRecord<'_>, offset: usize) -> Result<()> {
        if let Some(aggregate) = self.stations.get_mut(record.name) {
            aggregate.observe(record.value);
        } else {
            if std::str::from_utf8(record.name).is_err() {
                return Err(ProcessingError::malformed(
                    offset,
                    record.name,
                    "station name is not valid UTF-8",
                ));
            }
            self.stations
                .insert(record.name.into(), StationAggregate::new(record.value));
        }
        self.rows += 1;
        Ok(())
    }

    /// Combine an aggregate for `name` produced elsewhere.
    pub fn merge_aggregate(&mut self, name: &[u8], aggregate: &StationAggregate) {
        if let Some(existing) = self.stations.get_mut(name) {
            existing.merge(aggregate);
        } else {
            self.stations.insert(name.into(), *aggregate);
        }
        self.rows += aggregate.count;
    }

    /// Merge every station of `other` into this table.
    pub fn absorb<T>(&mut self, other: StationTable<T>) {
        for (name, aggregate) in other.stations {
            if let Some(existing) = self.stations.get_mut(&name) {
                existing.merge(&aggregate);
            } else {
                self.stations.insert(name, aggregate);
            }
        }
        self.rows += other.rows;
    }

    pub fn get(&self, name: &[u8]) -> Option<&StationAggregate> {
        self.stations.get(name)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Number of rows observed, equal to the sum of all station counts
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &StationAggregate)> {
        self.stations.iter().map(|(name, aggregate)| (&**name, aggregate))
    }

    /// Stations in ascending byte-wise name order
    pub fn sorted(&self) -> Vec<(&[u8], &StationAggregate)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl<S> fmt::Debug for StationTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationTable")
            .field("stations", &self.stations)
            .field("rows", &self.rows)
            .finish()
    }
}

impl<S: BuildHasher> PartialEq for StationTable<S> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.stations == other.stations
    }
}
