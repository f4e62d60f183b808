//! Grouping and merging of per-relation partial sums.
//!
//! Every report reduces each source relation independently into a `BTreeMap` keyed by its
//! reporting dimensions, then combines the partial maps with [`outer_merge`]. A key present
//! in only one relation still appears in the result, with the other side's measures at
//! their zero value.

use std::collections::BTreeMap;
use std::ops::AddAssign;

/// Implements field-wise `AddAssign` for a plain struct of `f64` (or other `AddAssign`)
/// measures, so it can be accumulated by [`Aggregator`].
#[macro_export]
macro_rules! impl_measures {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl ::std::ops::AddAssign for $ty {
            fn add_assign(&mut self, other: Self) {
                $( self.$field += other.$field; )+
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct Aggregator<K, M> {
    groups: BTreeMap<K, M>,
}

impl<K: Ord, M: Default + AddAssign> Default for Aggregator<K, M> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Ord, M: Default + AddAssign> Aggregator<K, M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, measure: M) {
        *self.groups.entry(key).or_default() += measure;
    }

    /// Registers a key without contributing to it, so it shows up zero-filled.
    pub fn touch(&mut self, key: K) {
        self.groups.entry(key).or_default();
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&M> {
        self.groups.get(key)
    }

    pub fn into_map(self) -> BTreeMap<K, M> {
        self.groups
    }
}

impl<K: Ord, M: Default + AddAssign> Extend<(K, M)> for Aggregator<K, M> {
    fn extend<I: IntoIterator<Item = (K, M)>>(&mut self, iter: I) {
        for (key, measure) in iter {
            self.add(key, measure);
        }
    }
}

impl<K: Ord, M: Default + AddAssign> FromIterator<(K, M)> for Aggregator<K, M> {
    fn from_iter<I: IntoIterator<Item = (K, M)>>(iter: I) -> Self {
        let mut aggregator = Self::new();
        aggregator.extend(iter);
        aggregator
    }
}

/// Reduces rows into partial sums. Rows whose key function returns `None` are filtered out
/// (this is where the branch-inclusion filter is applied).
pub fn aggregate<T, K, M>(
    rows: impl IntoIterator<Item = T>,
    mut key_fn: impl FnMut(&T) -> Option<K>,
    mut measure_fn: impl FnMut(&T) -> M,
) -> BTreeMap<K, M>
where
    K: Ord,
    M: Default + AddAssign,
{
    let mut aggregator = Aggregator::new();
    for row in rows {
        if let Some(key) = key_fn(&row) {
            let measure = measure_fn(&row);
            aggregator.add(key, measure);
        }
    }
    aggregator.into_map()
}

/// Full outer join of two partial aggregates over their key union.
pub fn outer_merge<K, A, B>(left: BTreeMap<K, A>, right: BTreeMap<K, B>) -> BTreeMap<K, (A, B)>
where
    K: Ord,
    A: Default,
    B: Default,
{
    let mut merged: BTreeMap<K, (A, B)> = left
        .into_iter()
        .map(|(key, a)| (key, (a, B::default())))
        .collect();

    for (key, b) in right {
        merged.entry(key).or_insert_with(|| (A::default(), B::default())).1 = b;
    }

    merged
}

/// Stock at the start of the day, derived from the day's movements:
/// `ending - purchase + sales - net_transfer`.
pub fn beginning_inventory(ending: f64, purchase: f64, sales: f64, net_transfer: f64) -> f64 {
    ending - purchase + sales - net_transfer
}

/// Final report ordering: descending by total, ties broken by key ascending.
pub fn rank_by_total<T>(rows: &mut [T], total: impl Fn(&T) -> f64, key: impl Fn(&T) -> &str) {
    rows.sort_by(|a, b| {
        total(b)
            .total_cmp(&total(a))
            .then_with(|| key(a).cmp(key(b)))
    });
}
