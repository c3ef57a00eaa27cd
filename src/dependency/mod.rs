//! Dependency resolution for named artefacts
//!
//! Orders services, components, stacks and pipelines so that every artefact
//! comes after the artefacts it depends on. The ordering is computed in three
//! passes over positions:
//!
//! 1. right shift: while some artefact precedes one of its dependencies,
//!    move that dependency one slot to the left and rescan
//! 2. tighten: pull artefacts that sit far behind their last dependency up
//!    to the slot right after it
//! 3. right shift again to repair anything left
//!
//! Each pass is bounded; exceeding the bound means the input has a cycle.
//! After ordering, every dependency learns which artefacts require it.

use ahash::{AHashMap, AHashSet};
use thiserror::Error;

/// Minimum iteration bound of a single pass
pub const MAX_ITERATIONS: usize = 1000;

/// Errors raised by the dependency resolver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// A `dependsOn` entry names an artefact that does not exist
    #[error("'{artefact}' depends on unknown artefact '{dependency}'")]
    Missing {
        /// Artefact declaring the dependency
        artefact: String,
        /// Unknown name
        dependency: String,
    },

    /// Two artefacts share a name
    #[error("Duplicate artefact name '{name}'")]
    Duplicate {
        /// Repeated name
        name: String,
    },

    /// A pass did not settle; the dependencies form a cycle
    #[error("Dependency resolution did not settle after {iterations} iterations (cycle?)")]
    Diverged {
        /// Iterations performed
        iterations: usize,
    },

    /// The requested artefact does not exist
    #[error("Unknown artefact '{name}'")]
    NotFound {
        /// Requested name
        name: String,
    },
}

/// An artefact taking part in dependency resolution
pub trait Dependable {
    /// Unique name
    fn name(&self) -> &str;

    /// Names this artefact depends on
    fn depends_on(&self) -> &[String];

    /// Records the artefacts that depend on this one, in resolved order
    fn set_required_by(&mut self, required_by: Vec<String>);
}

/// Orders `items` so that dependencies come first
///
/// # Errors
///
/// Fails on duplicate names, unknown dependencies and cycles.
pub fn resolve<T: Dependable>(items: Vec<T>) -> Result<Vec<T>, DependencyError> {
    let index = index_names(&items)?;
    let deps = dependency_indices(&items, &index)?;
    if deps.iter().enumerate().any(|(i, d)| d.contains(&i)) {
        return Err(DependencyError::Diverged { iterations: 0 });
    }

    let mut order: Vec<usize> = (0..items.len()).collect();
    let limit = MAX_ITERATIONS.max(items.len() * items.len());

    let shifted = right_shift(&mut order, &deps, limit)?;
    tighten(&mut order, &deps);
    let repaired = right_shift(&mut order, &deps, limit)?;
    tracing::debug!(
        artefacts = items.len(),
        shifts = shifted + repaired,
        "Dependencies resolved"
    );

    let mut required_by: Vec<Vec<String>> = vec![Vec::new(); items.len()];
    for &item in &order {
        for &dep in &deps[item] {
            let name = items[item].name().to_string();
            if !required_by[dep].contains(&name) {
                required_by[dep].push(name);
            }
        }
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut resolved = Vec::with_capacity(slots.len());
    for item in order {
        if let Some(mut artefact) = slots[item].take() {
            artefact.set_required_by(std::mem::take(&mut required_by[item]));
            resolved.push(artefact);
        }
    }
    Ok(resolved)
}

/// Resolves `items` and keeps only `target` and its transitive dependencies
///
/// # Errors
///
/// Fails like [`resolve`], or with [`DependencyError::NotFound`] when the
/// target does not exist.
pub fn closure<T: Dependable>(items: Vec<T>, target: &str) -> Result<Vec<T>, DependencyError> {
    let resolved = resolve(items)?;
    let by_name: AHashMap<&str, &T> = resolved.iter().map(|a| (a.name(), a)).collect();
    if !by_name.contains_key(target) {
        return Err(DependencyError::NotFound {
            name: target.to_string(),
        });
    }

    let mut wanted: AHashSet<String> = AHashSet::new();
    let mut pending = vec![target.to_string()];
    while let Some(name) = pending.pop() {
        if !wanted.insert(name.clone()) {
            continue;
        }
        if let Some(artefact) = by_name.get(name.as_str()) {
            pending.extend(artefact.depends_on().iter().cloned());
        }
    }

    Ok(resolved
        .into_iter()
        .filter(|a| wanted.contains(a.name()))
        .collect())
}

fn index_names<T: Dependable>(items: &[T]) -> Result<AHashMap<&str, usize>, DependencyError> {
    let mut index = AHashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if index.insert(item.name(), i).is_some() {
            return Err(DependencyError::Duplicate {
                name: item.name().to_string(),
            });
        }
    }
    Ok(index)
}

fn dependency_indices<T: Dependable>(
    items: &[T],
    index: &AHashMap<&str, usize>,
) -> Result<Vec<Vec<usize>>, DependencyError> {
    items
        .iter()
        .map(|item| {
            item.depends_on()
                .iter()
                .map(|dep| {
                    index
                        .get(dep.as_str())
                        .copied()
                        .ok_or_else(|| DependencyError::Missing {
                            artefact: item.name().to_string(),
                            dependency: dep.clone(),
                        })
                })
                .collect()
        })
        .collect()
}

fn positions(order: &[usize]) -> Vec<usize> {
    let mut pos = vec![0; order.len()];
    for (p, &item) in order.iter().enumerate() {
        pos[item] = p;
    }
    pos
}

/// Moves dependencies leftwards one slot at a time until no artefact
/// precedes one of its dependencies. Returns the number of shifts.
fn right_shift(
    order: &mut [usize],
    deps: &[Vec<usize>],
    limit: usize,
) -> Result<usize, DependencyError> {
    let mut iterations = 0;
    loop {
        let pos = positions(order);
        let violation = order.iter().enumerate().find_map(|(p, &item)| {
            deps[item]
                .iter()
                .map(|&d| pos[d])
                .find(|&q| q > p)
        });

        let Some(q) = violation else {
            return Ok(iterations);
        };

        order.swap(q - 1, q);
        iterations += 1;
        if iterations > limit {
            return Err(DependencyError::Diverged { iterations });
        }
    }
}

/// Pulls artefacts up to the slot right after their last dependency, unless
/// that slot already holds an artefact anchored on the same dependency.
fn tighten(order: &mut Vec<usize>, deps: &[Vec<usize>]) {
    let snapshot = order.clone();
    for item in snapshot {
        if deps[item].is_empty() {
            continue;
        }
        let pos = positions(order);
        let current = pos[item];
        let highest = deps[item].iter().map(|&d| pos[d]).max().unwrap_or(0);
        if current <= highest + 1 {
            continue;
        }

        let neighbour = order[highest + 1];
        let neighbour_highest = deps[neighbour].iter().map(|&d| pos[d]).max();
        if neighbour_highest == Some(highest) {
            continue;
        }

        order.remove(current);
        order.insert(highest + 1, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node {
        name: String,
        depends_on: Vec<String>,
        required_by: Vec<String>,
    }

    fn node(name: &str, depends_on: &[&str]) -> Node {
        Node {
            name: name.to_string(),
            depends_on: depends_on.iter().map(|s| (*s).to_string()).collect(),
            required_by: Vec::new(),
        }
    }

    impl Dependable for Node {
        fn name(&self) -> &str {
            &self.name
        }

        fn depends_on(&self) -> &[String] {
            &self.depends_on
        }

        fn set_required_by(&mut self, required_by: Vec<String>) {
            self.required_by = required_by;
        }
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    fn is_valid(nodes: &[Node]) -> bool {
        let pos: AHashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.as_str(), i))
            .collect();
        nodes
            .iter()
            .enumerate()
            .all(|(i, n)| n.depends_on.iter().all(|d| pos[d.as_str()] < i))
    }

    #[test]
    fn test_chain_is_ordered() {
        let resolved =
            resolve(vec![node("C", &["B"]), node("A", &[]), node("B", &["A"])]).unwrap();

        assert_eq!(names(&resolved), vec!["A", "B", "C"]);
        assert_eq!(resolved[0].required_by, vec!["B".to_string()]);
        assert_eq!(resolved[1].required_by, vec!["C".to_string()]);
        assert!(resolved[2].required_by.is_empty());
    }

    #[test]
    fn test_already_ordered_input_is_unchanged() {
        let input = vec![node("db", &[]), node("api", &["db"]), node("web", &["api"])];
        let resolved = resolve(input.clone()).unwrap();
        assert_eq!(names(&resolved), names(&input));
    }

    #[test]
    fn test_tighten_pulls_dependent_next_to_dependency() {
        let resolved = resolve(vec![
            node("db", &[]),
            node("cache", &[]),
            node("queue", &[]),
            node("api", &["db"]),
        ])
        .unwrap();
        assert_eq!(names(&resolved), vec!["db", "api", "cache", "queue"]);
    }

    #[test]
    fn test_missing_dependency() {
        let err = resolve(vec![node("api", &["db"])]).unwrap_err();
        assert_eq!(
            err,
            DependencyError::Missing {
                artefact: "api".to_string(),
                dependency: "db".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_name() {
        let err = resolve(vec![node("api", &[]), node("api", &[])]).unwrap_err();
        assert!(matches!(err, DependencyError::Duplicate { .. }));
    }

    #[test]
    fn test_cycle_diverges() {
        let err = resolve(vec![node("a", &["b"]), node("b", &["a"])]).unwrap_err();
        assert!(matches!(err, DependencyError::Diverged { .. }));
    }

    #[test]
    fn test_self_dependency_diverges() {
        let err = resolve(vec![node("a", &["a"])]).unwrap_err();
        assert!(matches!(err, DependencyError::Diverged { .. }));
    }

    #[test]
    fn test_empty_input() {
        let resolved = resolve(Vec::<Node>::new()).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_closure_keeps_transitive_dependencies() {
        let items = vec![
            node("web", &["api"]),
            node("api", &["db"]),
            node("db", &[]),
            node("docs", &[]),
        ];
        let closure = closure(items, "web").unwrap();
        assert_eq!(names(&closure), vec!["db", "api", "web"]);
    }

    #[test]
    fn test_closure_unknown_target() {
        let err = closure(vec![node("db", &[])], "api").unwrap_err();
        assert_eq!(
            err,
            DependencyError::NotFound {
                name: "api".to_string()
            }
        );
    }

    fn dag() -> impl Strategy<Value = Vec<Node>> {
        (1usize..=8)
            .prop_flat_map(|n| {
                let edges = proptest::collection::vec(
                    proptest::collection::vec(any::<bool>(), n),
                    n,
                );
                (edges, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
            })
            .prop_map(|(edges, order)| {
                order
                    .into_iter()
                    .map(|i| Node {
                        name: format!("n{i}"),
                        depends_on: (0..i)
                            .filter(|&j| edges[i][j])
                            .map(|j| format!("n{j}"))
                            .collect(),
                        required_by: Vec::new(),
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn prop_dependencies_come_first(input in dag()) {
            let resolved = resolve(input).unwrap();
            prop_assert!(is_valid(&resolved));
        }

        #[test]
        fn prop_required_by_mirrors_depends_on(input in dag()) {
            let resolved = resolve(input).unwrap();
            for artefact in &resolved {
                for dep in &artefact.depends_on {
                    let dep = resolved.iter().find(|n| &n.name == dep).unwrap();
                    prop_assert!(dep.required_by.contains(&artefact.name));
                }
            }
        }

        #[test]
        fn prop_isolated_artefacts_keep_input_order(input in dag()) {
            let isolated: Vec<String> = input
                .iter()
                .filter(|n| n.depends_on.is_empty())
                .filter(|n| !input.iter().any(|m| m.depends_on.contains(&n.name)))
                .map(|n| n.name.clone())
                .collect();
            let resolved = resolve(input).unwrap();
            let kept: Vec<String> = resolved
                .iter()
                .map(|n| n.name.clone())
                .filter(|n| isolated.contains(n))
                .collect();
            prop_assert_eq!(kept, isolated);
        }

        #[test]
        fn prop_resolution_is_deterministic(input in dag()) {
            let first = resolve(input.clone()).unwrap();
            let second = resolve(input).unwrap();
            prop_assert_eq!(names(&first), names(&second));
        }
    }
}
