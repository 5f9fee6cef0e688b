//! Supervisor graph over employees.
//!
//! # Responsibility
//! - Hold the employee -> supervisor edges as an id-indexed map.
//! - Answer whether a proposed supervisor would close a loop.
//! - Detect cycles over the whole graph before replaying a version.
//!
//! # Invariants
//! - Edges are optional ids looked up on demand, never shared references.
//! - Every walk is bounded by a visited set, so corrupted input with an
//!   existing cycle still terminates.
//! - Ids absent from the map behave as chain roots.

use crate::model::employee::EmployeeId;
use std::collections::{HashMap, HashSet};

/// Employee -> supervisor edge map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyGraph {
    supervisors: HashMap<EmployeeId, Option<EmployeeId>>,
}

impl HierarchyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from `(employee, supervisor)` pairs.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (EmployeeId, Option<EmployeeId>)>,
    {
        Self {
            supervisors: edges.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    pub fn contains(&self, employee_id: EmployeeId) -> bool {
        self.supervisors.contains_key(&employee_id)
    }

    /// Current supervisor, `None` for roots and unknown ids.
    pub fn supervisor_of(&self, employee_id: EmployeeId) -> Option<EmployeeId> {
        self.supervisors.get(&employee_id).copied().flatten()
    }

    /// Sets (or inserts) one edge without any validation.
    pub fn set_supervisor(&mut self, employee_id: EmployeeId, supervisor_id: Option<EmployeeId>) {
        self.supervisors.insert(employee_id, supervisor_id);
    }

    /// Direct reports of `employee_id`, ascending by id.
    pub fn subordinates_of(&self, employee_id: EmployeeId) -> Vec<EmployeeId> {
        let mut ids: Vec<EmployeeId> = self
            .supervisors
            .iter()
            .filter(|(_, supervisor)| **supervisor == Some(employee_id))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Supervisor chain above `employee_id`, nearest first.
    ///
    /// Stops at the first repeated node if the stored graph is corrupted.
    pub fn chain_of(&self, employee_id: EmployeeId) -> Vec<EmployeeId> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([employee_id]);
        let mut cursor = self.supervisor_of(employee_id);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                break;
            }
            chain.push(current);
            cursor = self.supervisor_of(current);
        }
        chain
    }

    /// Returns whether making `proposed_supervisor` the supervisor of
    /// `employee_id` would make `employee_id` reachable from itself.
    ///
    /// `None` never creates a cycle. Proposing the employee itself always
    /// does. A walk that revisits a node also reports `true`, so an already
    /// corrupted chain can not be extended.
    pub fn would_create_cycle(
        &self,
        employee_id: EmployeeId,
        proposed_supervisor: Option<EmployeeId>,
    ) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = proposed_supervisor;
        while let Some(current) = cursor {
            if current == employee_id {
                return true;
            }
            if !visited.insert(current) {
                return true;
            }
            cursor = self.supervisor_of(current);
        }
        false
    }

    /// Finds one cycle in the graph, if any.
    ///
    /// Returns the nodes of the cycle in supervisor order starting from the
    /// smallest id reached first by an ascending scan. Runs in linear time.
    pub fn find_cycle(&self) -> Option<Vec<EmployeeId>> {
        let mut starts: Vec<EmployeeId> = self.supervisors.keys().copied().collect();
        starts.sort_unstable();

        let mut settled: HashSet<EmployeeId> = HashSet::new();
        for start in starts {
            if settled.contains(&start) {
                continue;
            }

            let mut path: Vec<EmployeeId> = Vec::new();
            let mut position: HashMap<EmployeeId, usize> = HashMap::new();
            let mut cursor = Some(start);
            while let Some(current) = cursor {
                if settled.contains(&current) {
                    break;
                }
                if let Some(&index) = position.get(&current) {
                    return Some(path[index..].to_vec());
                }
                position.insert(current, path.len());
                path.push(current);
                cursor = self.supervisor_of(current);
            }
            settled.extend(path);
        }
        None
    }

    /// Returns whether no employee can reach itself.
    pub fn is_acyclic(&self) -> bool {
        self.find_cycle().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::HierarchyGraph;
    use proptest::prelude::*;

    // 1 <- 2 <- 3, 1 <- 4
    fn sample() -> HierarchyGraph {
        HierarchyGraph::from_edges([(1, None), (2, Some(1)), (3, Some(2)), (4, Some(1))])
    }

    #[test]
    fn self_supervision_is_a_cycle() {
        let graph = sample();
        for id in 1..=4 {
            assert!(graph.would_create_cycle(id, Some(id)));
        }
    }

    #[test]
    fn clearing_supervisor_never_creates_cycle() {
        let graph = sample();
        for id in 1..=4 {
            assert!(!graph.would_create_cycle(id, None));
        }
    }

    #[test]
    fn promoting_descendant_over_ancestor_is_rejected() {
        let graph = sample();
        assert!(graph.would_create_cycle(1, Some(3)));
        assert!(graph.would_create_cycle(2, Some(3)));
        assert!(!graph.would_create_cycle(3, Some(4)));
        assert!(!graph.would_create_cycle(4, Some(3)));
    }

    #[test]
    fn unknown_supervisor_ends_the_walk() {
        let graph = sample();
        assert!(!graph.would_create_cycle(3, Some(99)));
    }

    #[test]
    fn corrupted_chain_reports_cycle() {
        let graph = HierarchyGraph::from_edges([(1, Some(2)), (2, Some(1)), (3, None)]);
        assert!(graph.would_create_cycle(3, Some(1)));
        assert_eq!(graph.find_cycle(), Some(vec![1, 2]));
        assert_eq!(graph.chain_of(1), vec![2]);
    }

    #[test]
    fn chain_and_subordinates_follow_edges() {
        let graph = sample();
        assert_eq!(graph.chain_of(3), vec![2, 1]);
        assert!(graph.chain_of(1).is_empty());
        assert_eq!(graph.subordinates_of(1), vec![2, 4]);
        assert!(graph.subordinates_of(3).is_empty());
    }

    #[test]
    fn find_cycle_ignores_tails_leading_into_cycle() {
        let graph =
            HierarchyGraph::from_edges([(1, Some(5)), (5, Some(6)), (6, Some(7)), (7, Some(5))]);
        assert_eq!(graph.find_cycle(), Some(vec![5, 6, 7]));
        assert!(sample().is_acyclic());
    }

    proptest! {
        #[test]
        fn prop_guarded_mutations_keep_graph_acyclic(
            edits in prop::collection::vec((0i64..12, prop::option::of(0i64..12)), 0..80)
        ) {
            let mut graph = HierarchyGraph::from_edges((0i64..12).map(|id| (id, None)));
            for (employee, supervisor) in edits {
                if !graph.would_create_cycle(employee, supervisor) {
                    graph.set_supervisor(employee, supervisor);
                }
                prop_assert!(graph.is_acyclic());
            }
            for id in 0i64..12 {
                let chain = graph.chain_of(id);
                prop_assert!(!chain.contains(&id));
            }
        }
    }
}
