//! Relationship graph over the catalog.
//!
//! Every declared relationship becomes two edges: the declared (forward)
//! direction and its reverse, with fields swapped and cardinality reversed.
//! Forward edges are added first, in registry and declaration order, then
//! the reverse edges in the same order, so edge indices give a stable
//! traversal priority.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;

use super::types::{Cardinality, Entity, JoinKind};

/// Which way an edge walks its declaring relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Edge data for relationships in the graph.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// Field on the edge's source entity
    pub from_field: String,
    /// Field on the edge's target entity
    pub to_field: String,
    pub join: JoinKind,
    pub cardinality: Cardinality,
    pub direction: Direction,
}

/// Bidirectional entity graph derived from relationship declarations.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    graph: DiGraph<String, EdgeData>,
    node_indices: HashMap<String, NodeIndex>,
}

impl RelationshipGraph {
    /// Build the graph for a set of entities.
    ///
    /// Relationships whose target is not among `entities` are left out.
    pub fn build(entities: &[Entity]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for entity in entities {
            let idx = graph.add_node(entity.id.clone());
            node_indices.insert(entity.id.clone(), idx);
        }

        for direction in [Direction::Forward, Direction::Reverse] {
            for entity in entities {
                let owner = node_indices[&entity.id];
                for rel in &entity.relationships {
                    let Some(&target) = node_indices.get(&rel.target) else {
                        continue;
                    };
                    match direction {
                        Direction::Forward => graph.add_edge(
                            owner,
                            target,
                            EdgeData {
                                from_field: rel.source_field.clone(),
                                to_field: rel.target_field.clone(),
                                join: rel.join,
                                cardinality: rel.cardinality,
                                direction,
                            },
                        ),
                        Direction::Reverse => graph.add_edge(
                            target,
                            owner,
                            EdgeData {
                                from_field: rel.target_field.clone(),
                                to_field: rel.source_field.clone(),
                                join: rel.join,
                                cardinality: rel.cardinality.reverse(),
                                direction,
                            },
                        ),
                    };
                }
            }
        }

        Self {
            graph,
            node_indices,
        }
    }

    pub fn node(&self, entity_id: &str) -> Option<NodeIndex> {
        self.node_indices.get(entity_id).copied()
    }

    /// Entity id stored at a node.
    pub fn entity_id(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    /// Outgoing edges of a node in insertion order.
    ///
    /// petgraph walks adjacency lists newest-first, so sort by edge index
    /// to get declaration order back.
    pub fn edges_from(&self, idx: NodeIndex) -> Vec<EdgeReference<'_, EdgeData>> {
        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.sort_by_key(|e| e.id());
        edges
    }

    pub fn edge(&self, idx: EdgeIndex) -> &EdgeData {
        &self.graph[idx]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
