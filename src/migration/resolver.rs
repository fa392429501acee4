use std::collections::HashMap;

use crate::core::{Result, StoreError};
use crate::migration::{MigrationPlan, MigrationStep};

/// Precomputed migration chains for one entity type.
///
/// Built once at store construction: for every version below the declared
/// current version, the shortest ordered chain of steps reaching current.
/// Versions with no chain map to the empty chain and are treated as
/// already-current by the store. The table is immutable afterwards, so
/// concurrent readers need no synchronization.
pub(crate) struct MigrationResolver<T> {
    chains: HashMap<u32, Vec<MigrationStep<T>>>,
}

impl<T> MigrationResolver<T> {
    /// Resolves chains for every version in `[0, current)`.
    ///
    /// Any cycle in the declared `(from, to)` graph reachable from one of
    /// those versions is a configuration error, detected by tracking the
    /// versions on the active descent.
    pub fn new(current: u32, plan: &MigrationPlan<T>) -> Result<Self> {
        let mut chains = HashMap::new();
        for from in 0..current {
            let mut visiting = Vec::new();
            let chain = resolve(current, plan.steps(), from, &mut visiting)?;
            chains.insert(from, chain.unwrap_or_default());
        }
        Ok(Self { chains })
    }

    /// The chain for a stored version; empty when none was resolvable.
    pub fn chain(&self, from: u32) -> &[MigrationStep<T>] {
        self.chains.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl<T> std::fmt::Debug for MigrationResolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationResolver")
            .field("chains", &self.chains)
            .finish()
    }
}

fn resolve<T>(
    current: u32,
    steps: &[MigrationStep<T>],
    from: u32,
    visiting: &mut Vec<u32>,
) -> Result<Option<Vec<MigrationStep<T>>>> {
    if visiting.contains(&from) {
        return Err(StoreError::MigrationCycle {
            from: visiting.first().copied().unwrap_or(from),
            version: from,
        });
    }
    visiting.push(from);

    let mut best: Option<Vec<MigrationStep<T>>> = None;
    for step in steps.iter().filter(|s| s.from_version() == from) {
        if step.to_version() == current {
            // Landing exactly on current cannot be beaten from this version.
            visiting.pop();
            return Ok(Some(vec![*step]));
        }
        let Some(mut tail) = resolve(current, steps, step.to_version(), visiting)? else {
            continue;
        };
        let mut chain = Vec::with_capacity(tail.len() + 1);
        chain.push(*step);
        chain.append(&mut tail);
        // Strict comparison keeps the earlier-declared chain on ties.
        if best.as_ref().is_none_or(|b| chain.len() < b.len()) {
            best = Some(chain);
        }
    }

    visiting.pop();
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::PropertyBag;

    struct Doc;

    fn noop(_: &mut Doc, _: &PropertyBag) {}

    fn transitions(chain: &[MigrationStep<Doc>]) -> Vec<(u32, u32)> {
        chain
            .iter()
            .map(|s| (s.from_version(), s.to_version()))
            .collect()
    }

    #[test]
    fn resolves_skip_level_chain() {
        let plan = MigrationPlan::new()
            .step(0, 1, noop)
            .step(1, 2, noop)
            .step(2, 5, noop);
        let resolver = MigrationResolver::new(5, &plan).unwrap();

        assert_eq!(transitions(resolver.chain(0)), vec![(0, 1), (1, 2), (2, 5)]);
        assert_eq!(transitions(resolver.chain(1)), vec![(1, 2), (2, 5)]);
        assert_eq!(transitions(resolver.chain(2)), vec![(2, 5)]);
        assert!(resolver.chain(3).is_empty());
        assert!(resolver.chain(4).is_empty());
    }

    #[test]
    fn prefers_fewest_steps() {
        let plan = MigrationPlan::new()
            .step(0, 1, noop)
            .step(1, 3, noop)
            .step(0, 3, noop);
        let resolver = MigrationResolver::new(3, &plan).unwrap();

        assert_eq!(transitions(resolver.chain(0)), vec![(0, 3)]);
    }

    #[test]
    fn equal_length_keeps_declaration_order() {
        let plan = MigrationPlan::new()
            .step(0, 1, noop)
            .step(0, 2, noop)
            .step(1, 3, noop)
            .step(2, 3, noop);
        let resolver = MigrationResolver::new(3, &plan).unwrap();

        assert_eq!(transitions(resolver.chain(0)), vec![(0, 1), (1, 3)]);
    }

    #[test]
    fn unreachable_version_gets_empty_chain() {
        let plan = MigrationPlan::new().step(1, 2, noop);
        let resolver = MigrationResolver::new(2, &plan).unwrap();

        assert!(resolver.chain(0).is_empty());
        assert_eq!(transitions(resolver.chain(1)), vec![(1, 2)]);
    }

    #[test]
    fn step_past_current_is_not_a_chain() {
        let plan = MigrationPlan::new().step(0, 7, noop);
        let resolver = MigrationResolver::new(5, &plan).unwrap();

        assert!(resolver.chain(0).is_empty());
    }

    #[test]
    fn two_step_cycle_fails_construction() {
        let plan = MigrationPlan::new().step(0, 1, noop).step(1, 0, noop);
        let err = MigrationResolver::new(2, &plan).unwrap_err();

        assert!(matches!(
            err,
            StoreError::MigrationCycle { from: 0, version: 0 }
        ));
    }

    #[test]
    fn self_cycle_fails_construction() {
        let plan = MigrationPlan::new().step(1, 1, noop);
        let err = MigrationResolver::new(3, &plan).unwrap_err();

        assert!(matches!(
            err,
            StoreError::MigrationCycle { version: 1, .. }
        ));
    }

    #[test]
    fn empty_plan_resolves_to_empty_chains() {
        let plan: MigrationPlan<Doc> = MigrationPlan::new();
        let resolver = MigrationResolver::new(4, &plan).unwrap();

        for v in 0..4 {
            assert!(resolver.chain(v).is_empty());
        }
    }
}
