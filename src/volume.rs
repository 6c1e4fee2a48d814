//! Track how packages are distributed across volumes.
//!
//! An entry in the table of contents can declare how many of its parts
//! are stored in each volume. For example, `SUNWfoo 5 2048 3 2` means
//! that the package has 5 parts: 3 in the volume where it starts, and
//! 2 in the next one. Entries without counts are stored in a single
//! volume.

use std::{collections::VecDeque, fmt};

use crate::toc::TocEntry;

/// Number of parts of a package stored in each volume.
///
/// The first count is the number of parts in the volume where the
/// package starts. It can be `0`, when the package begins exactly at the
/// start of the next volume.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct VolumeCounts(Vec<u32>);

impl VolumeCounts {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Check if the counts are enough to store `parts` parts.
    ///
    /// Empty counts are always valid.
    pub fn covers(&self, parts: u32) -> bool {
        let total: u64 = self.0.iter().map(|&c| u64::from(c)).sum();
        self.0.is_empty() || total >= u64::from(parts)
    }
}

impl From<Vec<u32>> for VolumeCounts {
    fn from(counts: Vec<u32>) -> Self {
        VolumeCounts(counts)
    }
}

impl fmt::Display for VolumeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, count) in self.0.iter().enumerate() {
            if n > 0 {
                f.write_str(" ")?;
            }

            write!(f, "{count}")?;
        }

        Ok(())
    }
}

/// Compute how many additional volumes are needed for `entry`.
///
/// `volume_parts` is the number of parts already placed in the current
/// volume. It is updated to the number of parts in the volume where
/// `entry` ends.
pub fn span(entry: &TocEntry, volume_parts: &mut u32) -> u32 {
    let counts = entry.volume_counts().as_slice();

    let Some((&first, rest)) = counts.split_first() else {
        *volume_parts = volume_parts.saturating_add(entry.part_count());
        return 0;
    };

    let mut sum = first;
    let mut volumes = 0;
    let mut last = None;

    for &count in rest {
        if sum >= entry.part_count() {
            break;
        }

        sum = sum.saturating_add(count);
        volumes += 1;
        last = Some(count);
    }

    *volume_parts = match last {
        Some(last) => last,
        None => volume_parts.saturating_add(first),
    };

    volumes
}

/// Parts of the active package that can be read before the next
/// volume is required.
#[derive(Clone, Debug, Default)]
pub(crate) struct Budget {
    /// `None` if the package does not declare its volume counts.
    limit: Option<u32>,

    /// Counts for the next volumes.
    pending: VecDeque<u32>,
}

impl Budget {
    pub fn for_entry(entry: &TocEntry) -> Self {
        match entry.volume_counts().as_slice().split_first() {
            Some((&first, rest)) => Budget {
                limit: Some(first),
                pending: rest.iter().copied().collect(),
            },

            None => Budget::default(),
        }
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Check if reading the next part, after `parts_read` parts, needs
    /// a new volume.
    pub fn is_exhausted(&self, parts_read: u32) -> bool {
        matches!(self.limit, Some(limit) if parts_read >= limit)
    }

    /// Add the count of the next volume to the limit.
    ///
    /// Return `None` if there are no more counts.
    pub fn extend(&mut self) -> Option<u32> {
        let limit = self.limit?;
        let next = self.pending.pop_front()?;
        self.limit = Some(limit.saturating_add(next));
        Some(next)
    }

    /// Extend the limit for a package where `parts_read` parts were
    /// already read.
    pub fn catch_up(&mut self, parts_read: u32) {
        while matches!(self.limit, Some(limit) if limit < parts_read) {
            if self.extend().is_none() {
                break;
            }
        }
    }
}

#[cfg(test)]
fn entry(parts: u32, counts: &[u32]) -> TocEntry {
    TocEntry::new("pkg", parts, 0, counts.to_vec())
}

#[test]
fn span_without_counts() {
    let mut volume_parts = 3;
    assert_eq!(span(&entry(4, &[]), &mut volume_parts), 0);
    assert_eq!(volume_parts, 7);
}

#[test]
fn span_across_volumes() {
    // 2 parts in the current volume, 3 in the next, 1 in the last.
    let mut volume_parts = 5;
    assert_eq!(span(&entry(6, &[2, 3, 1]), &mut volume_parts), 2);
    assert_eq!(volume_parts, 1);

    // Fits in the current volume.
    let mut volume_parts = 1;
    assert_eq!(span(&entry(3, &[3]), &mut volume_parts), 0);
    assert_eq!(volume_parts, 4);

    // Counts after the required ones are ignored.
    let mut volume_parts = 0;
    assert_eq!(span(&entry(3, &[1, 2, 9]), &mut volume_parts), 1);
    assert_eq!(volume_parts, 2);
}

#[test]
fn span_from_volume_boundary() {
    // The package starts at the beginning of the next volume. The `0`
    // is not the same as a missing count.
    let mut volume_parts = 4;
    assert_eq!(span(&entry(2, &[0, 2]), &mut volume_parts), 1);
    assert_eq!(volume_parts, 2);

    let mut volume_parts = 4;
    assert_eq!(span(&entry(3, &[0, 2, 1]), &mut volume_parts), 2);
    assert_eq!(volume_parts, 1);
}

#[test]
fn count_volumes_in_table() {
    // Volume layout:
    //
    //   1: a a b
    //   2: b b
    //   3: c
    //   4: c d
    let entries = [
        entry(2, &[]),
        entry(3, &[1, 2]),
        entry(2, &[0, 1, 1]),
        entry(1, &[1]),
    ];

    let mut volume_parts = 0;
    let volumes = entries
        .iter()
        .fold(1, |v, e| v + span(e, &mut volume_parts));

    assert_eq!(volumes, 4);
    assert_eq!(volume_parts, 2);
}

#[test]
fn budget_extends_per_volume() {
    let mut budget = Budget::for_entry(&entry(6, &[2, 3, 1]));
    assert_eq!(budget.limit(), Some(2));
    assert!(!budget.is_exhausted(1));
    assert!(budget.is_exhausted(2));

    assert_eq!(budget.extend(), Some(3));
    assert_eq!(budget.limit(), Some(5));
    assert_eq!(budget.extend(), Some(1));
    assert_eq!(budget.extend(), None);
    assert_eq!(budget.limit(), Some(6));

    let mut budget = Budget::for_entry(&entry(6, &[2, 3, 1]));
    budget.catch_up(4);
    assert_eq!(budget.limit(), Some(5));

    let budget = Budget::for_entry(&entry(6, &[]));
    assert_eq!(budget.limit(), None);
    assert!(!budget.is_exhausted(100));
}

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Compare `span` with a computation based on prefix sums.
        #[test]
        fn span_matches_prefix_sums(
            counts in prop::collection::vec(0u32..20, 1..8),
            parts_seed in 0u32..1000,
            start in 0u32..50,
        ) {
            let total: u32 = counts.iter().sum();
            let parts = if total == 0 { 0 } else { parts_seed % (total + 1) };

            let mut sum = 0;
            let needed = counts
                .iter()
                .position(|&c| {
                    sum += c;
                    sum >= parts
                })
                .unwrap_or(counts.len() - 1);

            let mut volume_parts = start;
            let volumes = span(&entry(parts, &counts), &mut volume_parts);

            prop_assert_eq!(volumes as usize, needed);

            let expected_parts = if needed == 0 { start + counts[0] } else { counts[needed] };
            prop_assert_eq!(volume_parts, expected_parts);
        }
    }
}
