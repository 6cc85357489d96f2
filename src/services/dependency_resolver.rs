use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::errors::{DomainError, DomainResult};

/// Validator id -> ids it depends on.
pub type DependencyMap = HashMap<String, Vec<String>>;

/// Service for ordering validators by their declared dependencies and
/// detecting circular dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                // Cycle detected
                if let Some(cycle_start) = path.iter().position(|&id| id == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

/// Dependencies of `id` that are members of `ids`, in declared order.
fn in_set_deps<'a>(
    id: &str,
    dependencies: &'a DependencyMap,
    members: &HashSet<&str>,
) -> Vec<&'a str> {
    dependencies
        .get(id)
        .map(|deps| {
            deps.iter()
                .map(String::as_str)
                .filter(|d| members.contains(d) && *d != id)
                .collect()
        })
        .unwrap_or_default()
}

impl DependencyResolver {
    pub const fn new() -> Self {
        Self
    }

    /// Validate that every dependency names a known validator
    pub fn validate_dependencies(
        &self,
        dependencies: &DependencyMap,
        known: &HashSet<&str>,
    ) -> DomainResult<()> {
        let mut owners: Vec<&String> = dependencies.keys().collect();
        owners.sort();

        for owner in owners {
            for dep in &dependencies[owner] {
                if !known.contains(dep.as_str()) {
                    return Err(DomainError::UnknownValidator {
                        id: dep.clone(),
                        context: format!("dependencies of '{owner}'"),
                    });
                }
                if dep == owner {
                    return Err(DomainError::DependencyCycle(vec![owner.clone()]));
                }
            }
        }
        Ok(())
    }

    /// Detect a circular dependency among `ids`.
    ///
    /// Walks nodes and edges in declaration order so the reported path is
    /// stable between runs.
    pub fn detect_cycle(&self, ids: &[String], dependencies: &DependencyMap) -> Option<Vec<String>> {
        let members: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let graph: HashMap<&str, Vec<&str>> = ids
            .iter()
            .map(|id| (id.as_str(), in_set_deps(id, dependencies, &members)))
            .collect();

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for id in ids {
            if !visited.contains(id.as_str())
                && detect_cycle_util(id, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.into_iter().map(str::to_string).collect());
            }
        }

        None
    }

    /// Linear execution order in which every validator follows all of its
    /// dependencies.
    ///
    /// Kahn's algorithm; when several validators are ready at once the one
    /// declared first wins. Dependencies outside `ids` are treated as already
    /// satisfied.
    pub fn execution_order(
        &self,
        ids: &[String],
        dependencies: &DependencyMap,
    ) -> DomainResult<Vec<String>> {
        let members: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let position: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; ids.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];

        for (i, id) in ids.iter().enumerate() {
            for dep in in_set_deps(id, dependencies, &members) {
                let dep_idx = position[dep];
                dependents[dep_idx].push(i);
                in_degree[i] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(i, _)| i)
            .collect();

        let mut sorted = Vec::with_capacity(ids.len());

        while let Some(idx) = ready.pop_first() {
            sorted.push(ids[idx].clone());
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if sorted.len() != ids.len() {
            let remaining: Vec<String> = ids
                .iter()
                .filter(|id| !sorted.contains(id))
                .cloned()
                .collect();
            let cycle = self
                .detect_cycle(&remaining, dependencies)
                .unwrap_or(remaining);
            return Err(DomainError::DependencyCycle(cycle));
        }

        Ok(sorted)
    }

    /// Calculate the dependency depth of a validator.
    /// Returns the maximum depth in the dependency chain
    pub fn calculate_depth(&self, id: &str, dependencies: &DependencyMap) -> DomainResult<u32> {
        let mut visited = HashSet::new();
        calculate_depth_recursive(id, dependencies, &mut visited)
    }
}

// Standalone helper for depth calculation
fn calculate_depth_recursive<'a>(
    id: &'a str,
    dependencies: &'a DependencyMap,
    visited: &mut HashSet<&'a str>,
) -> DomainResult<u32> {
    if visited.contains(id) {
        return Err(DomainError::DependencyCycle(
            visited.iter().map(|s| (*s).to_string()).collect(),
        ));
    }

    visited.insert(id);

    let max_depth = match dependencies.get(id) {
        Some(deps) if !deps.is_empty() => {
            let mut depth = 0;
            for dep in deps {
                depth = depth.max(calculate_depth_recursive(dep, dependencies, visited)?);
            }
            depth + 1
        }
        _ => 0,
    };

    visited.remove(id);
    Ok(max_depth)
}
