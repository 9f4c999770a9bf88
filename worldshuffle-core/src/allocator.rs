use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::pool::IdentifierPool;

/// Hands out ids for a single document. Ids are unique within the scope
/// until every catalog entry has been used once; after that the scope is
/// cleared, the shared pool is reshuffled and picking starts over.
pub struct ScopedAllocator<'p, R: Rng> {
    pool: &'p IdentifierPool,
    used: HashSet<String>,
    rng: R,
    exhaustions: u64,
}

impl<'p, R: Rng> ScopedAllocator<'p, R> {
    pub fn new(pool: &'p IdentifierPool, rng: R) -> Self {
        Self {
            pool,
            used: HashSet::new(),
            rng,
            exhaustions: 0,
        }
    }

    /// Returns a namespaced id not yet emitted in this scope (or since the
    /// last exhaustion event).
    pub fn next_id(&mut self) -> String {
        let snapshot = self.pool.snapshot();
        let reshuffled;
        let mut available: Vec<&String> =
            snapshot.iter().filter(|id| !self.used.contains(*id)).collect();

        if available.is_empty() {
            self.used.clear();
            self.exhaustions += 1;
            let resets = self.pool.reshuffle();
            log::warn!("identifier pool exhausted, reshuffling (reset #{resets})");
            reshuffled = self.pool.snapshot();
            available = reshuffled.iter().collect();
        }

        // The pool is never empty, so neither is `available`.
        let chosen = match available.choose(&mut self.rng) {
            Some(id) => (*id).clone(),
            None => unreachable!("identifier pool cannot be empty"),
        };

        let formatted = format!("{}:{}", self.pool.namespace(), chosen);
        self.used.insert(chosen);
        formatted
    }

    pub fn exhaustions(&self) -> u64 {
        self.exhaustions
    }

    pub fn used_in_scope(&self) -> usize {
        self.used.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{BTreeMap, HashMap};

    fn pool_of(ids: &[&str]) -> IdentifierPool {
        IdentifierPool::build(
            ids.iter().copied(),
            &HashSet::new(),
            &BTreeMap::new(),
            "minecraft",
            42,
        )
        .unwrap()
    }

    #[test]
    fn ids_are_unique_until_the_catalog_runs_out() {
        let ids: Vec<String> = (0..20).map(|i| format!("b{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let pool = pool_of(&refs);
        let mut alloc = ScopedAllocator::new(&pool, StdRng::seed_from_u64(1));

        let emitted: Vec<String> = (0..19).map(|_| alloc.next_id()).collect();
        let distinct: HashSet<&String> = emitted.iter().collect();
        assert_eq!(distinct.len(), 19);
        assert!(emitted.iter().all(|id| id.starts_with("minecraft:b")));
        assert_eq!(alloc.exhaustions(), 0);
        assert_eq!(pool.reset_count(), 0);
    }

    #[test]
    fn exhaustion_resets_and_keeps_going() {
        let pool = pool_of(&["stone", "dirt"]);
        let mut alloc = ScopedAllocator::new(&pool, StdRng::seed_from_u64(5));

        let emitted: Vec<String> = (0..5).map(|_| alloc.next_id()).collect();

        assert!(alloc.exhaustions() >= 2);
        assert_eq!(pool.reset_count(), alloc.exhaustions());
        for id in &emitted {
            assert!(id == "minecraft:stone" || id == "minecraft:dirt", "{id}");
        }
        // Each pass over the catalog is itself duplicate free.
        assert_ne!(emitted[0], emitted[1]);
        assert_ne!(emitted[2], emitted[3]);
    }

    #[test]
    fn weighted_duplicates_stay_available_after_one_use() {
        let weights: BTreeMap<String, usize> = [("chest".to_string(), 3)].into_iter().collect();
        let pool = IdentifierPool::build(
            ["chest", "stone"],
            &HashSet::new(),
            &weights,
            "minecraft",
            0,
        )
        .unwrap();
        let mut alloc = ScopedAllocator::new(&pool, StdRng::seed_from_u64(0));

        // Once chosen, every copy of an id is considered used.
        let a = alloc.next_id();
        let b = alloc.next_id();
        assert_ne!(a, b);
        assert_eq!(alloc.exhaustions(), 0);
        alloc.next_id();
        assert_eq!(alloc.exhaustions(), 1);
    }

    #[test]
    fn first_pick_is_spread_over_the_catalog() {
        let pool = pool_of(&["a", "b", "c", "d"]);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..4000 {
            let mut alloc = ScopedAllocator::new(&pool, &mut rng);
            *counts.entry(alloc.next_id()).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        for (id, n) in &counts {
            assert!((800..1200).contains(n), "{id} picked {n} times");
        }
    }

    #[test]
    fn scopes_do_not_share_used_ids() {
        let pool = pool_of(&["only"]);
        let mut first = ScopedAllocator::new(&pool, StdRng::seed_from_u64(1));
        let mut second = ScopedAllocator::new(&pool, StdRng::seed_from_u64(2));

        assert_eq!(first.next_id(), "minecraft:only");
        assert_eq!(second.next_id(), "minecraft:only");
        assert_eq!(first.exhaustions(), 0);
        assert_eq!(second.exhaustions(), 0);
        assert_eq!(first.used_in_scope(), 1);
    }
}
