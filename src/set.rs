//! Concurrent string set with set-algebra operations

use std::collections::HashSet;

use parking_lot::RwLock;

/// An unordered set of unique strings, safe for concurrent use.
///
/// Mutations (`add`, `remove`, `clear`) take the write lock; queries take the
/// read lock, so any number of readers may run concurrently. The lock is a
/// [`parking_lot::RwLock`], which keeps a stream of readers from starving a
/// pending writer.
///
/// `union`, `minus` and `intersect` return new, independently owned sets. They
/// snapshot the receiver first and then visit each argument under that
/// argument's own lock, never holding two locks at once. Under concurrent
/// mutation of an argument the result is a best-effort snapshot rather than a
/// linearizable view.
#[derive(Debug, Default)]
pub struct StringSet {
    items: RwLock<HashSet<String>>,
}

impl StringSet {
    /// Build a set from the given members. Duplicates collapse silently.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: RwLock::new(items.into_iter().map(Into::into).collect()),
        }
    }

    /// Insert members. Adding an existing member is a no-op.
    pub fn add<I, S>(&self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.items.write();
        for item in items {
            guard.insert(item.into());
        }
    }

    /// Delete members. Removing a non-member is a no-op.
    pub fn remove<I, S>(&self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = self.items.write();
        for item in items {
            guard.remove(item.as_ref());
        }
    }

    /// Whether `item` is a member.
    pub fn contains(&self, item: &str) -> bool {
        self.items.read().contains(item)
    }

    /// Whether every supplied item is a member. Vacuously true for empty
    /// input; stops at the first miss.
    pub fn contains_all<I, S>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let guard = self.items.read();
        items.into_iter().all(|item| guard.contains(item.as_ref()))
    }

    /// Current member count, consistent with concurrent writers.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all members.
    pub fn clear(&self) {
        self.items.write().clear();
    }

    /// Members in unspecified order. The order is not stable across calls.
    pub fn to_vec(&self) -> Vec<String> {
        self.items.read().iter().cloned().collect()
    }

    /// Members in ascending lexicographic order.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut members = self.to_vec();
        members.sort();
        members
    }

    /// New set holding every member of `self` and of each set in `others`.
    pub fn union<'a, I>(&self, others: I) -> StringSet
    where
        I: IntoIterator<Item = &'a StringSet>,
    {
        let mut result = self.items.read().clone();
        for other in others {
            result.extend(other.items.read().iter().cloned());
        }
        StringSet {
            items: RwLock::new(result),
        }
    }

    /// New set holding every member of `self` except those that also appear
    /// in at least one of `others`. Members of `others` that are not in
    /// `self` are irrelevant.
    pub fn minus<'a, I>(&self, others: I) -> StringSet
    where
        I: IntoIterator<Item = &'a StringSet>,
    {
        let base = self.items.read().clone();
        let mut result = base.clone();
        for other in others {
            let guard = other.items.read();
            for item in guard.iter() {
                if base.contains(item) {
                    result.remove(item);
                }
            }
        }
        StringSet {
            items: RwLock::new(result),
        }
    }

    /// New set holding each member of `self` that appears in at least one of
    /// `others` — the receiver intersected with the union of the arguments,
    /// not a pairwise fold over them.
    pub fn intersect<'a, I>(&self, others: I) -> StringSet
    where
        I: IntoIterator<Item = &'a StringSet>,
    {
        let base = self.items.read().clone();
        let mut result = HashSet::new();
        for other in others {
            let guard = other.items.read();
            for item in guard.iter() {
                if base.contains(item) {
                    result.insert(item.clone());
                }
            }
        }
        StringSet {
            items: RwLock::new(result),
        }
    }
}

impl PartialEq for StringSet {
    fn eq(&self, other: &Self) -> bool {
        // Snapshot one side first so comparing a set with itself (or two
        // sets from different threads) never holds both locks at once.
        let mine = self.items.read().clone();
        mine == *other.items.read()
    }
}

impl Eq for StringSet {}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        StringSet::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_collapses_duplicates() {
        let set = StringSet::new(["a", "a", "b"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains_all(["a", "b"]));
    }

    #[test]
    fn add_and_remove_track_net_membership() {
        let set = StringSet::new(["a"]);
        set.add(["b", "c"]);
        set.remove(["a", "missing"]);
        set.add(["a"]);
        set.remove(["c"]);
        assert!(set.contains_all(["a", "b"]));
        assert!(!set.contains("c"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn contains_all_is_vacuously_true_on_empty_input() {
        let set = StringSet::new(["a"]);
        assert!(set.contains_all(Vec::<String>::new()));
        assert!(StringSet::default().contains_all(Vec::<String>::new()));
    }

    #[test]
    fn contains_all_fails_on_any_missing_member() {
        let set = StringSet::new(["a", "b"]);
        assert!(set.contains_all(["a", "b"]));
        assert!(!set.contains_all(["a", "z"]));
    }

    #[test]
    fn union_merges_all_arguments() {
        let set = StringSet::new(["a"]);
        let merged = set.union([&StringSet::new(["b", "c"]), &StringSet::new(["d"])]);
        assert_eq!(merged.to_sorted_vec(), ["a", "b", "c", "d"]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn union_is_commutative() {
        let a = StringSet::new(["a", "b"]);
        let b = StringSet::new(["b", "c"]);
        assert_eq!(a.union([&b]), b.union([&a]));
    }

    #[test]
    fn minus_ignores_argument_members_outside_the_receiver() {
        let set = StringSet::new(["a"]);
        let result = set.minus([&StringSet::new(["b", "c", "d"])]);
        assert_eq!(result.to_sorted_vec(), ["a"]);
    }

    #[test]
    fn minus_removes_shared_members() {
        let set = StringSet::new(["a", "b", "c", "d"]);
        let result = set.minus([&StringSet::new(["b", "c", "d"])]);
        assert_eq!(result.to_sorted_vec(), ["a"]);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn minus_boundaries() {
        let a = StringSet::new(["a", "b"]);
        assert!(a.minus([&a]).is_empty());
        assert_eq!(a.minus([&StringSet::default()]), a);
    }

    #[test]
    fn intersect_keeps_shared_members() {
        let set = StringSet::new(["a", "b", "c", "d"]);
        let result = set.intersect([&StringSet::new(["b", "c", "d", "e"])]);
        assert_eq!(result.to_sorted_vec(), ["b", "c", "d"]);
    }

    #[test]
    fn intersect_boundaries() {
        let a = StringSet::new(["a", "b"]);
        assert_eq!(a.intersect([&a]), a);
        assert!(a.intersect([&StringSet::default()]).is_empty());
    }

    #[test]
    fn intersect_unions_the_arguments_before_intersecting() {
        let a = StringSet::new(["a", "b"]);
        let b = StringSet::new(["a"]);
        let c = StringSet::new(["b"]);
        // a member qualifies if it is in the receiver and in ANY argument,
        // so {a,b} ∩ ({a} ∪ {b}) = {a,b}, not the pairwise fold's {}.
        assert_eq!(a.intersect([&b, &c]).to_sorted_vec(), ["a", "b"]);
    }

    #[test]
    fn sorted_vec_is_deterministic_and_ascending() {
        let set = StringSet::new(["c", "a", "b"]);
        assert_eq!(set.to_sorted_vec(), ["a", "b", "c"]);
        assert_eq!(set.to_sorted_vec(), ["a", "b", "c"]);
    }

    #[test]
    fn clear_always_leaves_the_set_empty() {
        let set = StringSet::new(["a", "b", "c"]);
        set.clear();
        assert!(set.is_empty());
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn concurrent_disjoint_writers_lose_no_updates() {
        let seeded: Vec<String> = (0..100).map(|i| format!("seed-{i}")).collect();
        let set = StringSet::new(seeded.iter().cloned());

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let set = &set;
                scope.spawn(move || {
                    for i in 0..100 {
                        set.add([format!("w{writer}-{i}")]);
                    }
                });
            }
            for half in 0..2 {
                let set = &set;
                let doomed = &seeded[half * 50..(half + 1) * 50];
                scope.spawn(move || {
                    set.remove(doomed.iter());
                });
            }
        });

        let expected: Vec<String> = (0..4)
            .flat_map(|writer| (0..100).map(move |i| format!("w{writer}-{i}")))
            .collect();
        assert!(set.contains_all(expected.iter()));
        assert!(!seeded.iter().any(|key| set.contains(key)));
        assert_eq!(set.len(), 400);
    }
}
