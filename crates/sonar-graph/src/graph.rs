//! Resource dependency graph using `petgraph`.
//!
//! Declarations are added one at a time. A declaration may only reference
//! resources that are already in the graph, so a forward reference is
//! rejected at the point it is made instead of surfacing at deploy time.
//! Edges point from a dependency to its dependent so that a topological
//! sort yields dependencies first.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use sonar_common::error::{Result, SonarError};
use sonar_common::types::{LogicalId, ResourceKind};

use crate::resource::{Declaration, Declared, EdgeKind, Reference};
use crate::token::Token;

/// Typed handle to a declared resource.
///
/// Handles are only handed out by [`ResourceGraph::declare`], so holding one
/// proves the resource exists in the graph that issued it.
pub struct Handle<R> {
    id: LogicalId,
    index: NodeIndex,
    _kind: PhantomData<fn() -> R>,
}

impl<R> Handle<R> {
    /// Logical id of the resource.
    #[must_use]
    pub const fn id(&self) -> &LogicalId {
        &self.id
    }

    /// Deferred token for the resource's provisioned identifier.
    #[must_use]
    pub fn reference(&self) -> Token {
        Token::Ref(self.id.clone())
    }

    /// Deferred token for one of the resource's attributes.
    #[must_use]
    pub fn attribute(&self, attribute: impl Into<String>) -> Token {
        Token::attribute(self.id.clone(), attribute)
    }
}

impl<R> Clone for Handle<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            index: self.index,
            _kind: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("index", &self.index.index())
            .finish()
    }
}

/// A declared resource stored in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Logical id of the resource.
    pub id: LogicalId,
    /// The declaration itself.
    pub declaration: Declaration,
}

impl Node {
    /// Kind of the declared resource.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.declaration.kind()
    }
}

/// A directed acyclic graph of resource declarations.
#[derive(Debug, Default)]
pub struct ResourceGraph {
    graph: DiGraph<Node, EdgeKind>,
    index: HashMap<LogicalId, NodeIndex>,
}

impl ResourceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a resource under `construct_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the logical id is already taken or if the
    /// declaration references a resource that has not been declared yet.
    pub fn declare<R: Declared>(&mut self, construct_id: &str, resource: R) -> Result<Handle<R>> {
        let id = LogicalId::from_construct_id(construct_id)?;
        if self.index.contains_key(&id) {
            return Err(SonarError::Config {
                message: format!(
                    "duplicate logical id: \"{id}\" (from construct \"{construct_id}\")"
                ),
            });
        }

        let references = resource.references();
        let targets = self.resolve_references(&id, &references)?;

        let index = self.graph.add_node(Node {
            id: id.clone(),
            declaration: resource.into(),
        });
        let _ = self.index.insert(id.clone(), index);
        for (target, edge) in &targets {
            let _ = self.graph.add_edge(*target, index, *edge);
        }

        tracing::debug!(
            id = %id,
            kind = %R::KIND,
            dependencies = targets.len(),
            "declared resource"
        );

        Ok(Handle {
            id,
            index,
            _kind: PhantomData,
        })
    }

    /// Amends a declared resource in place.
    ///
    /// Only resources nothing depends on yet may be amended: once a dependent
    /// is declared it has been configured from this declaration, which is
    /// therefore sealed. New references introduced by the amendment become
    /// edges, subject to the same rules as in [`declare`](Self::declare).
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is sealed, if the handle does not
    /// belong to this graph, or if the amendment references an undeclared
    /// resource.
    pub fn amend<R: Declared>(
        &mut self,
        handle: &Handle<R>,
        amend: impl FnOnce(&mut R),
    ) -> Result<()> {
        let index = self.checked_index(handle)?;
        let dependents = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .count();
        if dependents > 0 {
            return Err(SonarError::Sealed {
                id: handle.id.to_string(),
                dependents,
            });
        }

        let mut updated = self
            .get(handle)
            .cloned()
            .ok_or_else(|| not_found(R::KIND, &handle.id))?;
        amend(&mut updated);

        let targets = self.resolve_references(&handle.id, &updated.references())?;
        let existing: BTreeSet<(NodeIndex, EdgeKind)> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect();
        for (target, edge) in targets {
            if !existing.contains(&(target, edge)) {
                let _ = self.graph.add_edge(target, index, edge);
            }
        }

        if let Some(node) = self.graph.node_weight_mut(index) {
            node.declaration = updated.into();
        }
        tracing::debug!(id = %handle.id, kind = %R::KIND, "amended resource");
        Ok(())
    }

    /// Borrows a declared resource through its handle.
    #[must_use]
    pub fn get<R: Declared>(&self, handle: &Handle<R>) -> Option<&R> {
        self.graph
            .node_weight(handle.index)
            .filter(|node| node.id == handle.id)
            .and_then(|node| R::downcast(&node.declaration))
    }

    /// Looks up a node by logical id.
    #[must_use]
    pub fn node(&self, id: &LogicalId) -> Option<&Node> {
        self.index
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Returns `true` if a resource with this logical id is declared.
    #[must_use]
    pub fn contains(&self, id: &LogicalId) -> bool {
        self.index.contains_key(id)
    }

    /// Iterates over all nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Iterates over all declarations of type `R` in declaration order.
    pub fn declarations<'a, R: Declared + 'a>(
        &'a self,
    ) -> impl Iterator<Item = (&'a LogicalId, &'a R)> {
        self.graph
            .node_weights()
            .filter_map(|node| R::downcast(&node.declaration).map(|r| (&node.id, r)))
    }

    /// Number of declared resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of declared resources of `kind`.
    #[must_use]
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.nodes().filter(|n| n.kind() == kind).count()
    }

    /// Direct dependencies of `id` with the nature of each edge, sorted.
    #[must_use]
    pub fn dependencies(&self, id: &LogicalId) -> Vec<(&LogicalId, EdgeKind)> {
        let Some(&index) = self.index.get(id) else {
            return Vec::new();
        };
        let mut deps: Vec<(&LogicalId, EdgeKind)> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .map(|e| (&self.graph[e.source()].id, *e.weight()))
            .collect();
        deps.sort();
        deps
    }

    /// Direct dependents of `id`, sorted.
    #[must_use]
    pub fn dependents(&self, id: &LogicalId) -> Vec<&LogicalId> {
        let Some(&index) = self.index.get(id) else {
            return Vec::new();
        };
        let mut deps: Vec<&LogicalId> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .map(|n| &self.graph[n].id)
            .collect();
        deps.sort();
        deps.dedup();
        deps
    }

    /// Number of edges of `edge` kind from `dependent` to `dependency`.
    #[must_use]
    pub fn edge_count(
        &self,
        dependent: &LogicalId,
        dependency: &LogicalId,
        edge: EdgeKind,
    ) -> usize {
        self.dependencies(dependent)
            .into_iter()
            .filter(|(id, kind)| *id == dependency && *kind == edge)
            .count()
    }

    /// Returns a topological ordering of resources for deployment.
    ///
    /// Dependencies appear before the resources that depend on them. Among
    /// resources that are ready at the same time, the one declared first
    /// comes first, so the order is stable across runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn deployment_order(&self) -> Result<Vec<LogicalId>> {
        let mut pending: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .collect();
        let mut ready: BTreeSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| pending[idx.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(idx) = ready.pop_first() {
            order.push(self.graph[idx].id.clone());
            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let remaining = &mut pending[dependent.index()];
                *remaining -= 1;
                if *remaining == 0 {
                    let _ = ready.insert(dependent);
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let stuck = self
                .graph
                .node_indices()
                .find(|idx| pending[idx.index()] > 0)
                .map_or_else(String::new, |idx| self.graph[idx].id.to_string());
            return Err(SonarError::Config {
                message: format!("cyclic dependency detected in resource graph at \"{stuck}\""),
            });
        }
        Ok(order)
    }

    fn checked_index<R>(&self, handle: &Handle<R>) -> Result<NodeIndex>
    where
        R: Declared,
    {
        match self.index.get(&handle.id) {
            Some(&idx) if idx == handle.index => Ok(idx),
            _ => Err(not_found(R::KIND, &handle.id)),
        }
    }

    fn resolve_references(
        &self,
        id: &LogicalId,
        references: &[Reference],
    ) -> Result<Vec<(NodeIndex, EdgeKind)>> {
        let mut targets: Vec<(NodeIndex, EdgeKind)> = Vec::new();
        for reference in references {
            if &reference.target == id {
                return Err(SonarError::Config {
                    message: format!("resource \"{id}\" references itself"),
                });
            }
            let target = self
                .index
                .get(&reference.target)
                .copied()
                .ok_or_else(|| SonarError::NotFound {
                    kind: "resource",
                    id: format!("\"{}\" (referenced by \"{id}\")", reference.target),
                })?;
            if !targets.contains(&(target, reference.edge)) {
                targets.push((target, reference.edge));
            }
        }
        Ok(targets)
    }

    /// Inserts an edge without any checks, for exercising cycle detection.
    #[cfg(test)]
    fn force_edge(&mut self, dependency: &LogicalId, dependent: &LogicalId) {
        let from = self.index[dependency];
        let to = self.index[dependent];
        let _ = self.graph.add_edge(from, to, EdgeKind::Reference);
    }
}

fn not_found(kind: ResourceKind, id: &LogicalId) -> SonarError {
    SonarError::NotFound {
        kind: kind.label(),
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{
        ComputeCluster, Credential, ExecutionIdentity, Grant, Network, SecurityPolicy,
    };

    fn network_graph() -> (ResourceGraph, Handle<Network>) {
        let mut graph = ResourceGraph::new();
        let vpc = graph
            .declare("SonarVPC", Network::new("10.0.0.0/16"))
            .expect("declare network");
        (graph, vpc)
    }

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = ResourceGraph::new();
        let order = graph.deployment_order().expect("should resolve");
        assert!(order.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn declare_returns_typed_handle() {
        let (graph, vpc) = network_graph();
        assert_eq!(vpc.id().as_str(), "SonarVPC");
        let network = graph.get(&vpc).expect("network");
        assert_eq!(network.cidr(), "10.0.0.0/16");
        assert_eq!(graph.count(ResourceKind::Network), 1);
    }

    #[test]
    fn duplicate_logical_id_is_rejected() {
        let (mut graph, _) = network_graph();
        let err = graph
            .declare("Sonar/VPC", Network::new("10.1.0.0/16"))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate logical id"), "got: {err}");
    }

    #[test]
    fn dependency_edges_point_at_references() {
        let (mut graph, vpc) = network_graph();
        let sg = graph
            .declare("SG", SecurityPolicy::new(&vpc, "db"))
            .expect("declare sg");
        assert_eq!(
            graph.dependencies(sg.id()),
            vec![(vpc.id(), EdgeKind::Reference)]
        );
        assert_eq!(graph.dependents(vpc.id()), vec![sg.id()]);
    }

    #[test]
    fn dependencies_come_first_in_order() {
        let (mut graph, vpc) = network_graph();
        let cluster = graph
            .declare("Cluster", ComputeCluster::new(&vpc, "m5.large"))
            .expect("cluster");
        let order = graph.deployment_order().expect("should resolve");
        let pos = |id: &LogicalId| order.iter().position(|n| n == id).expect("present");
        assert!(pos(vpc.id()) < pos(cluster.id()));
    }

    #[test]
    fn ready_resources_keep_declaration_order() {
        let (mut graph, vpc) = network_graph();
        let secret = graph
            .declare("Secret", Credential::new("sonar"))
            .expect("secret");
        let cluster = graph
            .declare("Cluster", ComputeCluster::new(&vpc, "m5.large"))
            .expect("cluster");
        let role = graph
            .declare("Role", ExecutionIdentity::new("ecs-tasks.amazonaws.com"))
            .expect("role");
        graph
            .amend(&role, |r| r.grant(Grant::secret_read(&secret)))
            .expect("grant");

        let order = graph.deployment_order().expect("should resolve");
        assert_eq!(
            order,
            [vpc.id(), secret.id(), cluster.id(), role.id()].map(Clone::clone)
        );
    }

    #[test]
    fn forward_reference_is_rejected() {
        let mut foreign = ResourceGraph::new();
        let vpc = foreign
            .declare("OtherVPC", Network::new("10.0.0.0/16"))
            .expect("declare");

        let mut graph = ResourceGraph::new();
        let err = graph
            .declare("SG", SecurityPolicy::new(&vpc, "db"))
            .unwrap_err();
        assert!(matches!(err, SonarError::NotFound { .. }), "got: {err}");
        assert!(graph.is_empty());
    }

    #[test]
    fn amend_adds_new_edges() {
        let mut graph = ResourceGraph::new();
        let secret = graph
            .declare("Secret", Credential::new("sonar"))
            .expect("secret");
        let role = graph
            .declare("Role", ExecutionIdentity::new("ecs-tasks.amazonaws.com"))
            .expect("role");
        assert!(graph.dependencies(role.id()).is_empty());

        graph
            .amend(&role, |r| r.grant(Grant::secret_read(&secret)))
            .expect("amend");
        assert_eq!(
            graph.dependencies(role.id()),
            vec![(secret.id(), EdgeKind::Grant)]
        );
    }

    #[test]
    fn amend_appends_bootstrap_commands_before_use() {
        let (mut graph, vpc) = network_graph();
        let cluster = graph
            .declare("Cluster", ComputeCluster::new(&vpc, "m5.large"))
            .expect("cluster");
        graph
            .amend(&cluster, |c| c.user_data_mut().add_command("echo ready"))
            .expect("amend");
        assert_eq!(
            graph.get(&cluster).expect("cluster").bootstrap_commands(),
            ["echo ready"]
        );
    }

    #[test]
    fn amend_rejects_undeclared_reference() {
        let mut foreign = ResourceGraph::new();
        let secret = foreign
            .declare("Secret", Credential::new("sonar"))
            .expect("secret");

        let mut graph = ResourceGraph::new();
        let role = graph
            .declare("Role", ExecutionIdentity::new("ecs-tasks.amazonaws.com"))
            .expect("role");
        let err = graph
            .amend(&role, |r| r.grant(Grant::secret_read(&secret)))
            .unwrap_err();
        assert!(matches!(err, SonarError::NotFound { .. }), "got: {err}");
        assert!(graph.get(&role).expect("role").grants().is_empty());
    }

    #[test]
    fn amend_after_dependent_is_sealed() {
        let (mut graph, vpc) = network_graph();
        let _sg = graph
            .declare("SG", SecurityPolicy::new(&vpc, "db"))
            .expect("sg");
        let err = graph
            .amend(&vpc, |n| {
                let _ = n;
            })
            .unwrap_err();
        assert!(matches!(err, SonarError::Sealed { dependents: 1, .. }), "got: {err}");
    }

    #[test]
    fn handle_from_other_graph_cannot_amend() {
        let (_, vpc) = network_graph();
        let mut other = ResourceGraph::new();
        let _ = other
            .declare("Unrelated", Credential::new("x"))
            .expect("declare");
        assert!(other.amend(&vpc, |_| {}).is_err());
        assert!(other.get(&vpc).is_none());
    }

    #[test]
    fn cycle_detection() {
        let (mut graph, vpc) = network_graph();
        let sg = graph
            .declare("SG", SecurityPolicy::new(&vpc, "db"))
            .expect("sg");
        graph.force_edge(sg.id(), vpc.id());

        let err = graph.deployment_order().unwrap_err();
        assert!(err.to_string().contains("cyclic"), "got: {err}");
    }

    #[test]
    fn declarations_filters_by_type() {
        let (mut graph, vpc) = network_graph();
        let _ = graph
            .declare("SG", SecurityPolicy::new(&vpc, "db"))
            .expect("sg");
        assert_eq!(graph.declarations::<SecurityPolicy>().count(), 1);
        assert_eq!(graph.declarations::<Credential>().count(), 0);
        assert_eq!(graph.len(), 2);
    }
}
