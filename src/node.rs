//! Mesh nodes, their values and the hanging node constraints attached to them.
use generational_arena::{Arena, Index};
use nalgebra::Point;
use std::collections::BTreeMap;
use std::fmt;

/// Handle to a node in a [`NodeStore`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) Index);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "{}:{}", index, generation)
    }
}

/// Equation classification of a single value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Eqn {
    /// Not yet seen by the current numbering pass.
    Unassigned,
    /// Fixed by a boundary condition, no equation.
    Pinned,
    /// Constrained by the masters of its node, no equation of its own.
    Hanging,
    /// A free value with its global equation number.
    Free(usize),
}

impl Eqn {
    pub fn free_index(&self) -> Option<usize> {
        match self {
            Eqn::Free(index) => Some(*index),
            _ => None,
        }
    }
}

/// A scalar value stored at a node or inside an element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Value {
    value: f64,
    pinned: bool,
    eqn: Eqn,
}

impl Default for Value {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Value {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            pinned: false,
            eqn: Eqn::Unassigned,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn pin(&mut self) {
        self.pinned = true;
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
    }

    pub fn eqn(&self) -> Eqn {
        self.eqn
    }

    pub(crate) fn set_eqn(&mut self, eqn: Eqn) {
        self.eqn = eqn;
    }
}

/// The constraint of a hanging node: its values are the weighted sum of the values of its masters.
///
/// Values that were pinned when the constraint was set up keep their prescribed value and are
/// exempt from the constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct HangInfo {
    masters: Vec<(NodeId, f64)>,
    pinned_values: Vec<usize>,
}

impl HangInfo {
    pub fn new(masters: Vec<(NodeId, f64)>) -> Self {
        Self::with_pinned_values(masters, Vec::new())
    }

    pub fn with_pinned_values(masters: Vec<(NodeId, f64)>, mut pinned_values: Vec<usize>) -> Self {
        pinned_values.sort_unstable();
        pinned_values.dedup();
        Self { masters, pinned_values }
    }

    pub fn masters(&self) -> &[(NodeId, f64)] {
        &self.masters
    }

    /// Indices of the values exempt from the constraint, in increasing order.
    pub fn pinned_values(&self) -> &[usize] {
        &self.pinned_values
    }

    /// Whether value `value` of the node is determined by the masters.
    pub fn constrains(&self, value: usize) -> bool {
        self.pinned_values.binary_search(&value).is_err()
    }

    pub fn nmaster(&self) -> usize {
        self.masters.len()
    }

    pub fn weight_sum(&self) -> f64 {
        self.masters.iter().map(|(_, w)| w).sum()
    }
}

/// Position of a node on the integer lattice of a root.
///
/// Each root is covered by a lattice fine enough to hold the nodes of elements at any
/// admissible refinement level. Nodes on the boundary of a root have one representation per
/// root they touch; the key stored in a node is the smallest of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey<const D: usize> {
    pub root: usize,
    pub lattice: [i64; D],
}

#[derive(Debug, Clone)]
pub struct Node<const D: usize> {
    position: Point<f64, D>,
    values: Vec<Value>,
    hang: Option<HangInfo>,
    boundaries: Vec<usize>,
    obsolete: bool,
    key: NodeKey<D>,
}

impl<const D: usize> Node<D> {
    pub(crate) fn new(position: Point<f64, D>, values: Vec<Value>, boundaries: Vec<usize>, key: NodeKey<D>) -> Self {
        Self {
            position,
            values,
            hang: None,
            boundaries,
            obsolete: false,
            key,
        }
    }

    pub fn position(&self) -> &Point<f64, D> {
        &self.position
    }

    pub fn nvalue(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    pub fn value(&self, i: usize) -> f64 {
        self.values[i].value()
    }

    pub fn set_value(&mut self, i: usize, value: f64) {
        self.values[i].set_value(value);
    }

    pub fn is_hanging(&self) -> bool {
        self.hang.is_some()
    }

    /// Whether value `value` is constrained by the masters of the node.
    pub fn is_value_hanging(&self, value: usize) -> bool {
        self.hang.as_ref().map_or(false, |hang| hang.constrains(value))
    }

    pub fn hang_info(&self) -> Option<&HangInfo> {
        self.hang.as_ref()
    }

    pub(crate) fn set_hang_info(&mut self, hang: Option<HangInfo>) {
        self.hang = hang;
    }

    /// Whether any value of the node is pinned.
    pub fn has_pinned_value(&self) -> bool {
        self.values.iter().any(Value::is_pinned)
    }

    /// Identifiers of the outer boundaries the node lies on, in increasing order.
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn is_on_boundary(&self, boundary: usize) -> bool {
        self.boundaries.binary_search(&boundary).is_ok()
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete
    }

    pub fn set_obsolete(&mut self, obsolete: bool) {
        self.obsolete = obsolete;
    }

    pub fn key(&self) -> &NodeKey<D> {
        &self.key
    }
}

/// Owner of all nodes of a mesh.
///
/// Nodes are registered under their lattice key, so that elements sharing a node position
/// share the node itself.
#[derive(Debug)]
pub struct NodeStore<const D: usize> {
    nodes: Arena<Node<D>>,
    registry: BTreeMap<NodeKey<D>, NodeId>,
}

impl<const D: usize> Default for NodeStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> NodeStore<D> {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            registry: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<D>> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<D>> {
        self.nodes.get_mut(id.0)
    }

    /// Panics if the node does not exist.
    pub fn node(&self, id: NodeId) -> &Node<D> {
        self.get(id)
            .unwrap_or_else(|| panic!("Node {} does not exist", id))
    }

    /// Panics if the node does not exist.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<D> {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("Node {} does not exist", id))
    }

    pub fn find(&self, key: &NodeKey<D>) -> Option<NodeId> {
        self.registry.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node<D>)> {
        self.nodes.iter().map(|(index, node)| (NodeId(index), node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node<D>)> {
        self.nodes.iter_mut().map(|(index, node)| (NodeId(index), node))
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Inserts a node. Panics if a node with the same key already exists.
    pub(crate) fn insert(&mut self, node: Node<D>) -> NodeId {
        let key = node.key;
        assert!(
            !self.registry.contains_key(&key),
            "A node is already registered at {:?}",
            key
        );
        let id = NodeId(self.nodes.insert(node));
        self.registry.insert(key, id);
        id
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node<D>> {
        let node = self.nodes.remove(id.0)?;
        self.registry.remove(&node.key);
        Some(node)
    }

    /// Removes all nodes flagged obsolete and returns how many were removed.
    pub fn prune_obsolete(&mut self) -> usize {
        let obsolete: Vec<_> = self
            .iter()
            .filter(|(_, node)| node.is_obsolete())
            .map(|(id, _)| id)
            .collect();
        for &id in &obsolete {
            self.remove(id);
        }
        obsolete.len()
    }

    /// The nodes that currently carry a hanging node constraint.
    pub fn hanging_nodes(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.is_hanging())
            .map(|(id, _)| id)
            .collect()
    }
}
