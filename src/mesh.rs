//! Refineable meshes: a forest of refinement trees together with the nodes of its leaves.
use crate::element::{lagrange, NodalElement, QElement, RefineableElement};
use crate::forest::{ForestError, RootCell, TreeForest};
use crate::node::{Node, NodeId, NodeKey, NodeStore, Value};
use crate::settings::{AdaptivitySettings, InvalidSettings, LATTICE_UNIT, MAX_LATTICE_LEVEL, MAX_NNODE_1D};
use crate::tree::TreeId;
use log::info;
use nalgebra::Point;
use std::error::Error;
use std::fmt;

mod adapt;
mod hanging;
mod p_adapt;
pub mod procedural;

pub use adapt::AdaptationSummary;
pub use hanging::HangingNodeError;

pub type RefineableLineMesh = RefineableMesh<QElement<1>, 1>;
pub type RefineableQuadMesh = RefineableMesh<QElement<2>, 2>;
pub type RefineableBrickMesh = RefineableMesh<QElement<3>, 3>;

#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    Forest(ForestError),
    Settings(InvalidSettings),
    /// The element of a root has more nodes per axis than the node lattice can resolve.
    UnsupportedNodeCount { root: usize, nnode_1d: usize },
    VertexOutOfBounds { cell: usize, vertex: usize },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Forest(err) => write!(f, "Failed to assemble forest: {}", err),
            Self::Settings(err) => write!(f, "{}", err),
            Self::UnsupportedNodeCount { root, nnode_1d } => write!(
                f,
                "Element of root {} has {} nodes per axis, at most {} are supported",
                root, nnode_1d, MAX_NNODE_1D
            ),
            Self::VertexOutOfBounds { cell, vertex } => {
                write!(f, "Cell {} refers to non-existent vertex {}", cell, vertex)
            }
        }
    }
}

impl Error for MeshError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Forest(err) => Some(err),
            Self::Settings(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ForestError> for MeshError {
    fn from(err: ForestError) -> Self {
        Self::Forest(err)
    }
}

impl From<InvalidSettings> for MeshError {
    fn from(err: InvalidSettings) -> Self {
        Self::Settings(err)
    }
}

/// Nodal values of an element, captured before its nodes change.
struct NodalSource {
    element: TreeId,
    nnode_1d: usize,
    /// One vector of nodal values per value index.
    values: Vec<Vec<f64>>,
}

/// A mesh whose elements can be refined and unrefined hierarchically.
///
/// Elements live in the trees of a [`TreeForest`]; the leaves of the forest are the active
/// elements. Nodes are owned by the mesh and shared between all elements that touch them.
#[derive(Debug)]
pub struct RefineableMesh<E, const D: usize> {
    forest: TreeForest<E, D>,
    nodes: NodeStore<D>,
    nvalue: usize,
    settings: AdaptivitySettings,
    /// Pairs of (boundary, value index) that are pinned on every node of the boundary.
    pinned_boundaries: Vec<(usize, usize)>,
    first_eqn: usize,
    neqn: usize,
}

impl<E, const D: usize> RefineableMesh<E, D>
where
    E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
{
    /// Builds a mesh with one tree per root cell and `nvalue` values at every node.
    ///
    /// The elements of different roots may have different numbers of nodes per axis.
    pub fn from_root_cells(
        cells: Vec<RootCell<E, D>>,
        nvalue: usize,
        settings: AdaptivitySettings,
    ) -> Result<Self, MeshError> {
        settings.validate()?;
        for (root, cell) in cells.iter().enumerate() {
            let nnode_1d = cell.object.nnode_1d();
            if nnode_1d > MAX_NNODE_1D {
                return Err(MeshError::UnsupportedNodeCount { root, nnode_1d });
            }
        }

        let mut forest = TreeForest::new(cells)?;
        forest.set_tolerance(settings.neighbour_tolerance);
        let mut mesh = Self {
            forest,
            nodes: NodeStore::new(),
            nvalue,
            settings,
            pinned_boundaries: Vec::new(),
            first_eqn: 0,
            neqn: 0,
        };
        let roots: Vec<_> = mesh.forest.root_trees().collect();
        for root in roots {
            mesh.build_element_nodes(root);
        }
        info!(
            "Built refineable mesh with {} roots and {} nodes",
            mesh.forest.nroot(),
            mesh.nodes.len()
        );
        Ok(mesh)
    }

    /// Builds a mesh from shared vertices and cells given as lists of corner vertex indices.
    ///
    /// Corners are ordered lexicographically with the first axis varying fastest. The element
    /// of each cell is produced by `element_factory`, which receives the cell index.
    pub fn from_vertices_and_cells(
        vertices: &[Point<f64, D>],
        cells: &[Vec<usize>],
        nvalue: usize,
        settings: AdaptivitySettings,
        mut element_factory: impl FnMut(usize) -> E,
    ) -> Result<Self, MeshError> {
        let mut root_cells = Vec::with_capacity(cells.len());
        for (cell_index, cell) in cells.iter().enumerate() {
            let mut corner_positions = Vec::with_capacity(cell.len());
            for &vertex in cell {
                let position = vertices.get(vertex).ok_or(MeshError::VertexOutOfBounds {
                    cell: cell_index,
                    vertex,
                })?;
                corner_positions.push(*position);
            }
            root_cells.push(RootCell {
                object: element_factory(cell_index),
                corner_vertices: cell.clone(),
                corner_positions,
            });
        }
        Self::from_root_cells(root_cells, nvalue, settings)
    }

    pub fn forest(&self) -> &TreeForest<E, D> {
        &self.forest
    }

    pub fn nodes(&self) -> &NodeStore<D> {
        &self.nodes
    }

    pub(crate) fn forest_mut(&mut self) -> &mut TreeForest<E, D> {
        &mut self.forest
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut NodeStore<D> {
        &mut self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node<D> {
        self.nodes.node(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<D> {
        self.nodes.node_mut(id)
    }

    pub fn settings(&self) -> &AdaptivitySettings {
        &self.settings
    }

    pub fn nvalue(&self) -> usize {
        self.nvalue
    }

    /// Number of equations assigned by the last numbering pass.
    pub fn neqn(&self) -> usize {
        self.neqn
    }

    /// The first equation number assigned by the last numbering pass.
    pub fn first_eqn(&self) -> usize {
        self.first_eqn
    }

    pub(crate) fn set_numbering(&mut self, first_eqn: usize, neqn: usize) {
        self.first_eqn = first_eqn;
        self.neqn = neqn;
    }

    /// The active elements, roots in order, each tree in preorder.
    pub fn leaves(&self) -> Vec<TreeId> {
        self.forest.leaves()
    }

    pub fn nleaf(&self) -> usize {
        self.forest.nleaf()
    }

    pub fn element(&self, id: TreeId) -> &E {
        self.forest.arena().object(id)
    }

    pub fn element_mut(&mut self, id: TreeId) -> &mut E {
        self.forest.arena_mut().object_mut(id)
    }

    pub fn level(&self, id: TreeId) -> usize {
        self.forest.arena().node(id).level()
    }

    /// Number of lattice intervals per axis of a root.
    pub fn lattice_extent(&self) -> i64 {
        LATTICE_UNIT << MAX_LATTICE_LEVEL
    }

    /// The lattice position of a local node of the element at tree node `id`, within its root.
    fn raw_node_key(&self, id: TreeId, local_node: usize) -> NodeKey<D> {
        let node = self.forest.arena().node(id);
        let nnode_1d = self.element(id).nnode_1d();
        let index = lagrange::multi_index::<D>(nnode_1d, local_node);
        let spacing = LATTICE_UNIT / (nnode_1d - 1) as i64;
        let scale = 1i64 << (MAX_LATTICE_LEVEL - node.level());
        let mut lattice = [0; D];
        for i in 0..D {
            lattice[i] = (node.index()[i] * LATTICE_UNIT + index[i] as i64 * spacing) * scale;
        }
        NodeKey {
            root: node.root(),
            lattice,
        }
    }

    /// The current nodal values of the element at `id`, as a source for new nodes.
    fn nodal_source(&self, id: TreeId) -> NodalSource {
        let element = self.element(id);
        let values = (0..self.nvalue)
            .map(|k| {
                element
                    .node_ids()
                    .iter()
                    .map(|&n| self.nodes.node(n).value(k))
                    .collect()
            })
            .collect();
        NodalSource {
            element: id,
            nnode_1d: element.nnode_1d(),
            values,
        }
    }

    /// Attaches nodes to the element at `id`, reusing nodes that already exist at the same
    /// position.
    ///
    /// New nodes take their values by interpolation from the father element and are pinned
    /// according to the boundary conditions registered with [`RefineableMesh::pin_boundary`].
    pub(crate) fn build_element_nodes(&mut self, id: TreeId) {
        let father = self.forest.arena().node(id).father();
        let source = father.map(|father| self.nodal_source(father));
        self.build_element_nodes_from(id, source);
    }

    /// Attaches nodes to the element at `id` like [`RefineableMesh::build_element_nodes`],
    /// interpolating the values of new nodes from `source`.
    fn build_element_nodes_from(&mut self, id: TreeId, source: Option<NodalSource>) {
        let extent = self.lattice_extent();
        let nnode_1d = self.element(id).nnode_1d();
        let nnode = nnode_1d.pow(D as u32);
        let mut node_ids = Vec::with_capacity(nnode);

        for local_node in 0..nnode {
            let raw_key = self.raw_node_key(id, local_node);
            let representations = self.forest.lattice_representations(raw_key, extent);
            let key = representations.iter().min().copied().unwrap_or(raw_key);
            if let Some(existing) = self.nodes.find(&key) {
                self.nodes.node_mut(existing).set_obsolete(false);
                node_ids.push(existing);
                continue;
            }

            let s = lagrange::node_coordinates::<D>(nnode_1d, local_node);
            let position = self.forest.global_position(id, &s);
            let values = match &source {
                Some(source) => {
                    let arena = self.forest.arena();
                    let x = arena.node(id).to_root_local(&s);
                    let s_source = arena.node(source.element).from_root_local(&x);
                    source
                        .values
                        .iter()
                        .map(|nodal| Value::new(lagrange::interpolate::<D>(source.nnode_1d, nodal, &s_source)))
                        .collect()
                }
                None => vec![Value::default(); self.nvalue],
            };
            let boundaries = self.forest.boundaries_of(&representations, extent);
            let mut node = Node::new(position, values, boundaries, key);
            for &(boundary, value) in &self.pinned_boundaries {
                if node.is_on_boundary(boundary) {
                    node.values_mut()[value].pin();
                }
            }
            node_ids.push(self.nodes.insert(node));
        }

        self.element_mut(id).set_node_ids(node_ids);
    }

    /// Pins value `value` on all current and future nodes of the given boundary.
    pub fn pin_boundary(&mut self, boundary: usize, value: usize) {
        assert!(value < self.nvalue, "Value index {} out of bounds", value);
        if !self.pinned_boundaries.contains(&(boundary, value)) {
            self.pinned_boundaries.push((boundary, value));
        }
        for (_, node) in self.nodes.iter_mut() {
            if node.is_on_boundary(boundary) {
                node.values_mut()[value].pin();
            }
        }
    }

    pub fn pin_value(&mut self, node: NodeId, value: usize) {
        self.nodes.node_mut(node).values_mut()[value].pin();
    }

    pub fn unpin_value(&mut self, node: NodeId, value: usize) {
        self.nodes.node_mut(node).values_mut()[value].unpin();
    }

    /// Sets value `value` of every node from a function of the node position.
    pub fn set_values_from_function(&mut self, value: usize, f: impl Fn(&Point<f64, D>) -> f64) {
        for (_, node) in self.nodes.iter_mut() {
            let v = f(node.position());
            node.set_value(value, v);
        }
    }

    /// The nodes of all active elements, each listed once, in order of first appearance.
    pub fn active_nodes(&self) -> Vec<NodeId> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut active = Vec::new();
        for leaf in self.leaves() {
            for &id in self.element(leaf).node_ids() {
                if seen.insert(id) {
                    active.push(id);
                }
            }
        }
        active
    }
}
