use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};

use crate::{Result, ShuffleError};

struct PoolState {
    catalog: Vec<String>,
    rng: StdRng,
    reset_count: u64,
}

/// The run-wide catalog of replacement ids, shared by every worker.
///
/// Weighted ids are stored as repeated entries, so picking uniformly from
/// the flattened list honours the weights. All mutable state sits behind a
/// single lock: concurrent scopes can hit exhaustion at the same time and
/// each of them reshuffles.
pub struct IdentifierPool {
    namespace: String,
    state: Mutex<PoolState>,
}

impl IdentifierPool {
    pub fn build<I, S>(
        records: I,
        exclusions: &HashSet<String>,
        weights: &BTreeMap<String, usize>,
        namespace: &str,
        seed: u64,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Vec::new();
        for record in records {
            let id: String = record.into();
            if exclusions.contains(&id) {
                continue;
            }
            let repeat = weights.get(&id).copied().unwrap_or(1);
            for _ in 0..repeat {
                catalog.push(id.clone());
            }
        }

        if catalog.is_empty() {
            return Err(ShuffleError::EmptySource);
        }

        let mut rng = StdRng::seed_from_u64(seed ^ 0x5EED_B10C_u64);
        catalog.shuffle(&mut rng);

        log::info!(
            "identifier pool ready: {} entries ({} distinct)",
            catalog.len(),
            catalog.iter().collect::<HashSet<_>>().len()
        );

        Ok(IdentifierPool {
            namespace: namespace.to_string(),
            state: Mutex::new(PoolState {
                catalog,
                rng,
                reset_count: 0,
            }),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// A copy of the current ordering.
    pub fn snapshot(&self) -> Vec<String> {
        self.state.lock().catalog.clone()
    }

    /// Re-permutes the catalog after an exhaustion event and returns the
    /// new reset count.
    pub fn reshuffle(&self) -> u64 {
        let mut state = self.state.lock();
        let PoolState {
            catalog,
            rng,
            reset_count,
        } = &mut *state;
        catalog.shuffle(rng);
        *reset_count += 1;
        *reset_count
    }

    pub fn reset_count(&self) -> u64 {
        self.state.lock().reset_count
    }
}
