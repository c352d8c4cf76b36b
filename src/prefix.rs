//! Candidate prefixes and aggregation parameters.

use std::collections::BTreeSet;

use crate::Error;

/// The set of candidate prefixes evaluated at one level of the prefix tree.
///
/// A prefix at level `level` is a `level + 1`-bit integer, read MSB-first. Prefixes are unique
/// and kept in ascending numeric order, which is also the lexicographic order of their bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidatePrefixes {
    level: usize,
    prefixes: Vec<u128>,
}

impl CandidatePrefixes {
    /// Collect `prefixes` for `level`, removing duplicates.
    pub fn new(level: usize, prefixes: impl IntoIterator<Item = u128>) -> Result<Self, Error> {
        if level >= 128 {
            return Err(Error::LevelOutOfRange { level, bits: 128 });
        }

        let prefixes = prefixes.into_iter().collect::<BTreeSet<_>>();
        if let Some(&prefix) = prefixes.last() {
            if level < 127 && prefix >> (level + 1) != 0 {
                return Err(Error::PrefixOutOfRange { prefix, level });
            }
        }

        Ok(Self {
            level,
            prefixes: prefixes.into_iter().collect(),
        })
    }

    /// Both one-bit prefixes, `0` and `1`.
    pub fn root() -> Self {
        Self {
            level: 0,
            prefixes: vec![0, 1],
        }
    }

    /// The tree level of this set. Each prefix has `level + 1` bits.
    pub fn level(&self) -> usize {
        self.level
    }

    /// The number of prefixes.
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Whether no prefix is left.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// The prefixes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u128> + '_ {
        self.prefixes.iter().copied()
    }

    /// Return a reference to the sorted prefixes.
    pub fn as_slice(&self) -> &[u128] {
        &self.prefixes
    }

    /// The prefixes of the next level that extend one of `survivors` by a single bit.
    ///
    /// The caller keeps `level + 1` below the bit width of the search.
    pub(crate) fn children(level: usize, survivors: impl IntoIterator<Item = u128>) -> Self {
        let prefixes = survivors
            .into_iter()
            .flat_map(|prefix| [prefix << 1, prefix << 1 | 1])
            .collect::<BTreeSet<_>>();
        Self {
            level: level + 1,
            prefixes: prefixes.into_iter().collect(),
        }
    }

    /// The prefix as a big-endian bit string of length `level + 1`.
    pub(crate) fn to_bools(&self, prefix: u128) -> Vec<bool> {
        (0..=self.level).rev().map(|i| prefix >> i & 1 == 1).collect()
    }
}

/// The parameter for one round of aggregation: a level and the candidate prefixes at that level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregationParam {
    prefixes: CandidatePrefixes,
}

impl AggregationParam {
    /// Construct a new aggregation parameter from the candidates of one level.
    pub fn new(prefixes: CandidatePrefixes) -> Self {
        Self { prefixes }
    }

    /// The tree level under evaluation.
    pub fn level(&self) -> usize {
        self.prefixes.level()
    }

    /// Return a reference to the candidate prefixes.
    pub fn prefixes(&self) -> &CandidatePrefixes {
        &self.prefixes
    }
}

impl From<CandidatePrefixes> for AggregationParam {
    fn from(prefixes: CandidatePrefixes) -> Self {
        Self::new(prefixes)
    }
}
