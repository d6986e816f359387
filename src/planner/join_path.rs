//! Join path resolution between catalog entities.
//!
//! Two strategies are available:
//!
//! - [`JoinStrategy::Priority`] (default): a depth-first search that tries,
//!   in order, the direct forward relationship, the direct reverse
//!   relationship, multi-hop through forward relationships, then multi-hop
//!   through reverse relationships. Deterministic, but not guaranteed to
//!   return the shortest path when several routes exist.
//! - [`JoinStrategy::ShortestPath`]: breadth-first search over the
//!   bidirectional [`RelationshipGraph`](crate::catalog::RelationshipGraph),
//!   returning a minimal-hop path.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::debug;

use super::error::{CompileError, CompileResult};
use super::JoinStrategy;
use crate::catalog::{Cardinality, EntityRegistry, JoinKind, Relationship};

/// One hop of a join path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub from_entity: String,
    pub to_entity: String,
    pub from_field: String,
    pub to_field: String,
    pub join: JoinKind,
    pub cardinality: Cardinality,
}

impl JoinStep {
    fn forward(from: &str, rel: &Relationship) -> Self {
        Self {
            from_entity: from.to_string(),
            to_entity: rel.target.clone(),
            from_field: rel.source_field.clone(),
            to_field: rel.target_field.clone(),
            join: rel.join,
            cardinality: rel.cardinality,
        }
    }

    /// Walk `rel` (declared by `owner`) from its target back to `owner`.
    fn reverse(owner: &str, rel: &Relationship) -> Self {
        Self {
            from_entity: rel.target.clone(),
            to_entity: owner.to_string(),
            from_field: rel.target_field.clone(),
            to_field: rel.source_field.clone(),
            join: rel.join,
            cardinality: rel.cardinality.reverse(),
        }
    }
}

/// Parent pointer for BFS path reconstruction.
struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
}

/// Finds join paths over a registry.
#[derive(Debug, Clone, Copy)]
pub struct JoinPathResolver<'a> {
    registry: &'a EntityRegistry,
    strategy: JoinStrategy,
}

impl<'a> JoinPathResolver<'a> {
    pub fn new(registry: &'a EntityRegistry, strategy: JoinStrategy) -> Self {
        Self { registry, strategy }
    }

    /// Find a path from `from` to `to`.
    pub fn resolve(&self, from: &str, to: &str) -> CompileResult<Vec<JoinStep>> {
        self.resolve_excluding(from, to, &HashSet::new())
    }

    /// Find a path that never passes through an entity in `exclude`.
    ///
    /// Fails with [`CompileError::NoJoinPath`] when no path exists. Both
    /// endpoints must be declared in the registry; relationships pointing at
    /// undeclared entities are dead ends.
    pub fn resolve_excluding(
        &self,
        from: &str,
        to: &str,
        exclude: &HashSet<String>,
    ) -> CompileResult<Vec<JoinStep>> {
        let undeclared = |id: &str| self.registry.lookup(id).is_none();
        let path = if undeclared(from) || undeclared(to) {
            None
        } else {
            match self.strategy {
                JoinStrategy::Priority => self.priority_search(from, to, exclude.clone()),
                JoinStrategy::ShortestPath => self.shortest_path(from, to, exclude),
            }
        };

        match path {
            Some(steps) => {
                debug!(
                    from,
                    to,
                    hops = steps.len(),
                    strategy = ?self.strategy,
                    "resolved join path"
                );
                Ok(steps)
            }
            None => Err(CompileError::NoJoinPath {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    fn priority_search(
        &self,
        from: &str,
        to: &str,
        mut visited: HashSet<String>,
    ) -> Option<Vec<JoinStep>> {
        if from == to {
            return Some(Vec::new());
        }
        if !visited.insert(from.to_string()) {
            return None;
        }
        let entity = self.registry.lookup(from)?;

        // Direct forward
        if let Some(rel) = entity.relationships.iter().find(|r| r.target == to) {
            return Some(vec![JoinStep::forward(from, rel)]);
        }

        // Direct reverse
        if let Some((owner, rel)) = self
            .registry
            .inbound(from)
            .find(|(owner, _)| owner.id == to && !visited.contains(&owner.id))
        {
            return Some(vec![JoinStep::reverse(&owner.id, rel)]);
        }

        // Multi-hop forward
        for rel in &entity.relationships {
            if visited.contains(&rel.target) {
                continue;
            }
            if let Some(rest) = self.priority_search(&rel.target, to, visited.clone()) {
                return Some(prepend(JoinStep::forward(from, rel), rest));
            }
        }

        // Multi-hop reverse
        for (owner, rel) in self.registry.inbound(from) {
            if visited.contains(&owner.id) {
                continue;
            }
            if let Some(rest) = self.priority_search(&owner.id, to, visited.clone()) {
                return Some(prepend(JoinStep::reverse(&owner.id, rel), rest));
            }
        }

        None
    }

    fn shortest_path(
        &self,
        from: &str,
        to: &str,
        exclude: &HashSet<String>,
    ) -> Option<Vec<JoinStep>> {
        if from == to {
            return Some(Vec::new());
        }
        if exclude.contains(from) {
            return None;
        }

        let graph = self.registry.graph();
        let from_idx = graph.node(from)?;
        let to_idx = graph.node(to)?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        visited.insert(from_idx);
        queue.push_back(from_idx);

        while let Some(current) = queue.pop_front() {
            for edge in graph.edges_from(current) {
                let neighbor = edge.target();
                if visited.contains(&neighbor) || exclude.contains(graph.entity_id(neighbor)) {
                    continue;
                }

                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx: edge.id(),
                    },
                );

                if neighbor == to_idx {
                    return Some(self.reconstruct_path(from_idx, to_idx, &parents));
                }

                visited.insert(neighbor);
                queue.push_back(neighbor);
            }
        }

        None
    }

    fn reconstruct_path(
        &self,
        from_idx: NodeIndex,
        to_idx: NodeIndex,
        parents: &HashMap<NodeIndex, ParentInfo>,
    ) -> Vec<JoinStep> {
        let graph = self.registry.graph();
        let mut steps = Vec::new();
        let mut current = to_idx;

        while current != from_idx {
            let info = &parents[&current];
            let edge = graph.edge(info.edge_idx);
            steps.push(JoinStep {
                from_entity: graph.entity_id(info.parent).to_string(),
                to_entity: graph.entity_id(current).to_string(),
                from_field: edge.from_field.clone(),
                to_field: edge.to_field.clone(),
                join: edge.join,
                cardinality: edge.cardinality,
            });
            current = info.parent;
        }

        steps.reverse();
        steps
    }
}

fn prepend(step: JoinStep, mut rest: Vec<JoinStep>) -> Vec<JoinStep> {
    rest.insert(0, step);
    rest
}
