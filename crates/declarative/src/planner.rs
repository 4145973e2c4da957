//! Execution planner - orders materialized resources

use crate::error::{Error, Result};
use crate::materialize::MaterializedResource;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Materialized resources plus the order to evaluate them in
#[derive(Debug)]
pub struct ExecutionPlan {
    resources: Vec<MaterializedResource>,
    order: Vec<usize>,
}

impl ExecutionPlan {
    /// Order `resources` so every prerequisite comes first.
    ///
    /// Among resources that are ready at the same time, the one declared
    /// first goes first. A cycle is an error and nothing is evaluated.
    pub fn new(resources: Vec<MaterializedResource>) -> Result<Self> {
        let count = resources.len();
        let mut indegree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (index, resource) in resources.iter().enumerate() {
            for &prerequisite in &resource.prerequisites {
                indegree[index] += 1;
                dependents[prerequisite].push(index);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
            .filter(|&i| indegree[i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for &dependent in &dependents[index] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < count {
            let members = cycle_members(&indegree, &dependents);
            return Err(Error::DependencyCycle {
                resources: members
                    .into_iter()
                    .map(|i| resources[i].key.to_string())
                    .collect(),
            });
        }

        Ok(Self { resources, order })
    }

    /// Indices into [`ExecutionPlan::resources`], in evaluation order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn resources(&self) -> &[MaterializedResource] {
        &self.resources
    }

    /// Resources in evaluation order
    pub fn ordered(&self) -> impl Iterator<Item = &MaterializedResource> {
        self.order.iter().map(|&i| &self.resources[i])
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Resources left unordered include the cycle itself and everything
/// downstream of it. Peel off those with no remaining dependents until only
/// the cycle is left.
fn cycle_members(indegree: &[usize], dependents: &[Vec<usize>]) -> Vec<usize> {
    let mut remaining: Vec<bool> = indegree.iter().map(|&d| d > 0).collect();
    loop {
        let peeled: Vec<usize> = (0..remaining.len())
            .filter(|&i| remaining[i] && !dependents[i].iter().any(|&d| remaining[d]))
            .collect();
        if peeled.is_empty() {
            break;
        }
        for i in peeled {
            remaining[i] = false;
        }
    }
    (0..remaining.len()).filter(|&i| remaining[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::ResourceKey;

    fn resource(index: usize, prerequisites: Vec<usize>) -> MaterializedResource {
        MaterializedResource {
            key: ResourceKey::new("stub", format!("r{index}")),
            index,
            instance: Err("not needed".into()),
            noop: false,
            prerequisites,
            notify: Vec::new(),
        }
    }

    #[test]
    fn test_declaration_order_without_edges() {
        let plan = ExecutionPlan::new((0..4).map(|i| resource(i, vec![])).collect()).unwrap();
        assert_eq!(plan.order(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_prerequisites_come_first_with_index_tie_break() {
        // r0 requires r3, r2 requires r1
        let plan = ExecutionPlan::new(vec![
            resource(0, vec![3]),
            resource(1, vec![]),
            resource(2, vec![1]),
            resource(3, vec![]),
        ])
        .unwrap();
        assert_eq!(plan.order(), &[1, 2, 3, 0]);
        let titles: Vec<String> = plan.ordered().map(|r| r.key.title.clone()).collect();
        assert_eq!(titles, vec!["r1", "r2", "r3", "r0"]);
    }

    #[test]
    fn test_cycle_is_reported_without_downstream_resources() {
        // r0 <-> r1 cycle, r2 depends on r1, r3 is independent
        let err = ExecutionPlan::new(vec![
            resource(0, vec![1]),
            resource(1, vec![0]),
            resource(2, vec![1]),
            resource(3, vec![]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            Error::DependencyCycle {
                resources: vec!["Stub[r0]".into(), "Stub[r1]".into()],
            }
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = ExecutionPlan::new(vec![resource(0, vec![0])]).unwrap_err();
        assert!(matches!(err, Error::DependencyCycle { .. }));
    }
}
