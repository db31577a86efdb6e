//! Frequency maps and the reducer.
//!
//! Every worker fills its own [`FrequencyMap`]; nothing is shared during
//! extraction. After the barrier the coordinator folds the maps with [`reduce`]
//! or [`reduce_tree`]. Merging is a key-wise sum, so it is associative and
//! commutative: a flat fold, a pairwise tree, and any input order all give the
//! same map.

use rayon::prelude::*;
use std::collections::hash_map::{Entry, Iter};
use std::collections::{BTreeMap, HashMap};

/// A partial result that can absorb another of the same kind.
///
/// `Default` is the identity: merging it into anything changes nothing.
pub trait Merge: Default {
    fn merge(&mut self, other: Self);
}

/// Indicator key -> occurrence count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyMap {
    counts: HashMap<String, u64>,
}

impl FrequencyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `key`.
    pub fn increment(&mut self, key: impl Into<String>) {
        self.add(key, 1);
    }

    /// Count `n` occurrences of `key`. Adding zero still records the key.
    pub fn add(&mut self, key: impl Into<String>, n: u64) {
        *self.counts.entry(key.into()).or_insert(0) += n;
    }

    /// Count for `key`; absent keys count zero.
    #[must_use]
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> Iter<'_, String, u64> {
        self.counts.iter()
    }

    /// Key-ordered copy, for stable output.
    #[must_use]
    pub fn to_sorted(&self) -> BTreeMap<String, u64> {
        self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

impl Merge for FrequencyMap {
    fn merge(&mut self, other: Self) {
        // Fold the smaller map into the larger one.
        let (mut into, from) = if other.counts.len() > self.counts.len() {
            (other.counts, std::mem::take(&mut self.counts))
        } else {
            (std::mem::take(&mut self.counts), other.counts)
        };
        for (k, v) in from {
            match into.entry(k) {
                Entry::Occupied(mut e) => *e.get_mut() += v,
                Entry::Vacant(e) => {
                    e.insert(v);
                }
            }
        }
        self.counts = into;
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for FrequencyMap {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut m = Self::new();
        for (k, n) in iter {
            m.add(k, n);
        }
        m
    }
}

impl<K: Into<String>> Extend<K> for FrequencyMap {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for k in iter {
            self.increment(k);
        }
    }
}

impl IntoIterator for FrequencyMap {
    type Item = (String, u64);
    type IntoIter = std::collections::hash_map::IntoIter<String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

/// Flat left fold of `parts` in iteration order.
pub fn reduce<M, I>(parts: I) -> M
where
    M: Merge,
    I: IntoIterator<Item = M>,
{
    parts.into_iter().fold(M::default(), |mut acc, m| {
        acc.merge(m);
        acc
    })
}

/// Pairwise tree merge on the current rayon pool.
///
/// Produces the same result as [`reduce`] for any input order.
pub fn reduce_tree<M>(parts: Vec<M>) -> M
where
    M: Merge + Send,
{
    parts.into_par_iter().reduce(M::default, |mut a, b| {
        a.merge(b);
        a
    })
}
