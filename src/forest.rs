//! Forests of refinement trees covering unstructured meshes.
//!
//! Each root of a forest carries one coarse element together with the vertex connectivity and
//! corner positions it was built from. Neighbouring roots are discovered from shared faces of
//! the vertex connectivity, and the relative orientation of their local frames is derived from
//! the order in which the shared vertices appear on either side.
use crate::element::RefineableElement;
use crate::node::NodeKey;
use crate::topology::{corner_coordinates, corner_weight, Face, Orientation, SonType};
use crate::tree::{TreeArena, TreeId};
use itertools::Itertools;
use log::debug;
use nalgebra::{Point, SVector};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::error::Error;
use std::fmt;

/// The description of one root element, as handed to [`TreeForest::new`].
///
/// Corners are ordered lexicographically with the first axis varying fastest, i.e.
/// `SW, SE, NW, NE` for quadrilaterals.
#[derive(Debug, Clone)]
pub struct RootCell<E, const D: usize> {
    pub object: E,
    pub corner_vertices: Vec<usize>,
    pub corner_positions: Vec<Point<f64, D>>,
}

/// The neighbour of a root across one of its faces.
#[derive(Debug, Clone, PartialEq)]
pub struct RootNeighbour<const D: usize> {
    root: usize,
    face: Face<D>,
    orientation: Orientation<D>,
    offset: SVector<f64, D>,
}

impl<const D: usize> RootNeighbour<D> {
    /// Index of the neighbouring root.
    pub fn root(&self) -> usize {
        self.root
    }

    /// The shared face, as seen from the neighbouring root.
    pub fn face(&self) -> Face<D> {
        self.face
    }

    /// Maps the local frame of this root into the frame of the neighbour.
    pub fn orientation(&self) -> &Orientation<D> {
        &self.orientation
    }

    /// Translation from this side of the shared face to the neighbour's side.
    ///
    /// Zero unless the connection is periodic.
    pub fn offset(&self) -> &SVector<f64, D> {
        &self.offset
    }
}

#[derive(Debug, Clone)]
pub struct TreeRoot<const D: usize> {
    tree: TreeId,
    corner_vertices: Vec<usize>,
    corner_positions: Vec<Point<f64, D>>,
    neighbours: Vec<Option<RootNeighbour<D>>>,
}

impl<const D: usize> TreeRoot<D> {
    /// The root node of the tree anchored at this root.
    pub fn tree(&self) -> TreeId {
        self.tree
    }

    pub fn corner_vertices(&self) -> &[usize] {
        &self.corner_vertices
    }

    pub fn corner_positions(&self) -> &[Point<f64, D>] {
        &self.corner_positions
    }

    pub fn neighbour(&self, face: Face<D>) -> Option<&RootNeighbour<D>> {
        self.neighbours[face.index()].as_ref()
    }

    /// The faces of this root that lie on the outer boundary of the forest.
    pub fn boundary_faces(&self) -> impl Iterator<Item = Face<D>> + '_ {
        Face::all().filter(move |&face| self.neighbour(face).is_none())
    }

    /// Sorted vertex indices of the given face.
    pub fn face_vertices(&self, face: Face<D>) -> Vec<usize> {
        face.corners()
            .map(|c| self.corner_vertices[c])
            .sorted_unstable()
            .collect()
    }

    /// Maps local root coordinates to physical coordinates by multilinear interpolation of the
    /// corner positions.
    pub fn global_position(&self, x: &[f64; D]) -> Point<f64, D> {
        let mut coords = SVector::<f64, D>::zeros();
        for (corner, position) in self.corner_positions.iter().enumerate() {
            coords += corner_weight(corner, x) * position.coords;
        }
        Point::from(coords)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForestError {
    /// A root was described by the wrong number of corners.
    WrongCornerCount { root: usize, expected: usize, actual: usize },
    /// More than two root faces share the same vertices.
    NonManifoldFace { vertices: Vec<usize>, count: usize },
    /// The vertices of a shared face cannot be matched by a signed axis permutation, or the two
    /// sides disagree about it.
    InconsistentOrientation { root: usize, face: usize },
}

impl fmt::Display for ForestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WrongCornerCount { root, expected, actual } => write!(
                f,
                "Root {} has {} corners, expected {}",
                root, actual, expected
            ),
            Self::NonManifoldFace { vertices, count } => write!(
                f,
                "Face with vertices {:?} is shared by {} roots, at most two are allowed",
                vertices, count
            ),
            Self::InconsistentOrientation { root, face } => write!(
                f,
                "Cannot determine a consistent orientation across face {} of root {}",
                face, root
            ),
        }
    }
}

impl Error for ForestError {}

/// A collection of trees whose roots form a connected unstructured mesh.
#[derive(Debug)]
pub struct TreeForest<E, const D: usize> {
    arena: TreeArena<E, D>,
    roots: Vec<TreeRoot<D>>,
    tolerance: f64,
}

impl<E, const D: usize> TreeForest<E, D>
where
    E: RefineableElement,
{
    /// Default tolerance for the neighbour self-test.
    pub const DEFAULT_TOLERANCE: f64 = 1e-14;

    /// Builds a forest with one root per cell and sets up the connectivity between the roots.
    pub fn new(cells: Vec<RootCell<E, D>>) -> Result<Self, ForestError> {
        let ncorner = SonType::<D>::COUNT;
        let mut arena = TreeArena::new();
        let mut roots = Vec::with_capacity(cells.len());
        for (root_index, cell) in cells.into_iter().enumerate() {
            for actual in [cell.corner_vertices.len(), cell.corner_positions.len()] {
                if actual != ncorner {
                    return Err(ForestError::WrongCornerCount {
                        root: root_index,
                        expected: ncorner,
                        actual,
                    });
                }
            }
            let tree = arena.construct_root(cell.object, root_index);
            roots.push(TreeRoot {
                tree,
                corner_vertices: cell.corner_vertices,
                corner_positions: cell.corner_positions,
                neighbours: vec![None; Face::<D>::COUNT],
            });
        }

        let mut forest = Self {
            arena,
            roots,
            tolerance: Self::DEFAULT_TOLERANCE,
        };
        forest.find_neighbours()?;
        forest.construct_orientations()?;
        Ok(forest)
    }

    pub fn arena(&self) -> &TreeArena<E, D> {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut TreeArena<E, D> {
        &mut self.arena
    }

    pub fn roots(&self) -> &[TreeRoot<D>] {
        &self.roots
    }

    pub fn root(&self, index: usize) -> &TreeRoot<D> {
        &self.roots[index]
    }

    pub fn nroot(&self) -> usize {
        self.roots.len()
    }

    /// Tolerance used by the neighbour self-test.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// The root tree nodes, in root order.
    pub fn root_trees(&self) -> impl Iterator<Item = TreeId> + '_ {
        self.roots.iter().map(TreeRoot::tree)
    }

    /// Appends the leaves of all trees to `leaves`, roots in order, each tree in preorder.
    pub fn stick_leaves_into_vector(&self, leaves: &mut Vec<TreeId>) {
        for root in &self.roots {
            self.arena.stick_leaves_into_vector(root.tree, leaves);
        }
    }

    /// Appends all nodes of all trees to `nodes`, roots in order, each tree in preorder.
    pub fn stick_all_tree_nodes_into_vector(&self, nodes: &mut Vec<TreeId>) {
        for root in &self.roots {
            self.arena.stick_all_tree_nodes_into_vector(root.tree, nodes);
        }
    }

    pub fn leaves(&self) -> Vec<TreeId> {
        let mut leaves = Vec::new();
        self.stick_leaves_into_vector(&mut leaves);
        leaves
    }

    pub fn nleaf(&self) -> usize {
        self.leaves().len()
    }

    /// Physical position of the point with local coordinates `s` in the element of tree node `id`.
    pub fn global_position(&self, id: TreeId, s: &[f64; D]) -> Point<f64, D> {
        let node = self.arena.node(id);
        self.roots[node.root()].global_position(&node.to_root_local(s))
    }

    /// Matches root faces through their vertices and records which roots are neighbours.
    ///
    /// A face shared by exactly two root faces connects them. This includes the case of a root
    /// sharing two of its own faces, which makes the root its own (periodic) neighbour.
    /// Orientations are reset to the identity; see [`TreeForest::construct_orientations`].
    pub fn find_neighbours(&mut self) -> Result<(), ForestError> {
        let mut faces: BTreeMap<Vec<usize>, Vec<(usize, Face<D>)>> = BTreeMap::new();
        for (root_index, root) in self.roots.iter().enumerate() {
            for face in Face::<D>::all() {
                faces
                    .entry(root.face_vertices(face))
                    .or_default()
                    .push((root_index, face));
            }
        }

        for root in &mut self.roots {
            root.neighbours.iter_mut().for_each(|n| *n = None);
        }

        let mut ninterface = 0;
        for (vertices, sharing) in faces {
            match sharing.as_slice() {
                [_] => {}
                &[(root_a, face_a), (root_b, face_b)] => {
                    self.roots[root_a].neighbours[face_a.index()] = Some(RootNeighbour {
                        root: root_b,
                        face: face_b,
                        orientation: Orientation::identity(),
                        offset: SVector::zeros(),
                    });
                    self.roots[root_b].neighbours[face_b.index()] = Some(RootNeighbour {
                        root: root_a,
                        face: face_a,
                        orientation: Orientation::identity(),
                        offset: SVector::zeros(),
                    });
                    ninterface += 1;
                }
                _ => {
                    return Err(ForestError::NonManifoldFace {
                        vertices,
                        count: sharing.len(),
                    })
                }
            }
        }
        debug!(
            "Found {} interfaces between {} roots",
            ninterface,
            self.roots.len()
        );
        Ok(())
    }

    /// Determines, for every pair of neighbouring roots, the signed axis permutation that maps
    /// one local frame into the other, and checks that both sides agree.
    pub fn construct_orientations(&mut self) -> Result<(), ForestError> {
        for root_index in 0..self.roots.len() {
            for face in Face::<D>::all() {
                let Some(neighbour) = self.roots[root_index].neighbour(face).cloned() else {
                    continue;
                };
                let (orientation, offset) = self.orientation_across(root_index, face, &neighbour)?;
                if let Some(n) = self.roots[root_index].neighbours[face.index()].as_mut() {
                    n.orientation = orientation;
                    n.offset = offset;
                }
            }
        }

        for (root_index, root) in self.roots.iter().enumerate() {
            for face in Face::<D>::all() {
                let Some(neighbour) = root.neighbour(face) else {
                    continue;
                };
                let consistent = self.roots[neighbour.root]
                    .neighbour(neighbour.face)
                    .map(|back| {
                        back.root == root_index
                            && back.face == face
                            && back.orientation == neighbour.orientation.inverse()
                    })
                    .unwrap_or(false);
                if !consistent {
                    return Err(ForestError::InconsistentOrientation {
                        root: root_index,
                        face: face.index(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Alias of [`TreeForest::construct_orientations`] in the terms used for quadtrees.
    pub fn construct_north_equivalents(&mut self) -> Result<(), ForestError> {
        self.construct_orientations()
    }

    fn orientation_across(
        &self,
        root_index: usize,
        face: Face<D>,
        neighbour: &RootNeighbour<D>,
    ) -> Result<(Orientation<D>, SVector<f64, D>), ForestError> {
        let inconsistent = || ForestError::InconsistentOrientation {
            root: root_index,
            face: face.index(),
        };
        let root = &self.roots[root_index];
        let other = &self.roots[neighbour.root];

        // Corner of the neighbour that carries the same vertex as corner `c` of this root
        let matching_corner = |c: usize| -> Option<usize> {
            let vertex = root.corner_vertices[c];
            neighbour
                .face
                .corners()
                .find(|&c_other| other.corner_vertices[c_other] == vertex)
        };

        let a = face.axis();
        let mut perm = [0; D];
        let mut flip = [false; D];
        perm[a] = neighbour.face.axis();
        flip[a] = face.is_positive() == neighbour.face.is_positive();

        let base = if face.is_positive() { 1 << a } else { 0 };
        let base_other = matching_corner(base).ok_or_else(inconsistent)?;
        for i in (0..D).filter(|&i| i != a) {
            let c_other = matching_corner(base | (1 << i)).ok_or_else(inconsistent)?;
            let diff = base_other ^ c_other;
            if diff.count_ones() != 1 {
                return Err(inconsistent());
            }
            let j = diff.trailing_zeros() as usize;
            perm[i] = j;
            flip[i] = (base_other >> j) & 1 == 1;
        }
        let orientation = Orientation::try_from_parts(perm, flip).ok_or_else(inconsistent)?;

        // Every corner of the face must land on the corner with the same vertex
        for c in face.corners() {
            let y = orientation.map_local(&corner_coordinates::<D>(c), face);
            let image = (0..D)
                .filter(|&i| y[i] > 0.0)
                .fold(0, |acc, i| acc | (1 << i));
            if Some(image) != matching_corner(c) {
                return Err(inconsistent());
            }
        }

        let offset = other.corner_positions[base_other] - root.corner_positions[base];
        Ok((orientation, offset))
    }

    /// All representations of a lattice position, one per root face chain it can be reached
    /// through, including the given one.
    ///
    /// `extent` is the number of lattice intervals per axis of a root.
    pub fn lattice_representations(&self, key: NodeKey<D>, extent: i64) -> Vec<NodeKey<D>> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(key);
        queue.push_back(key);
        while let Some(current) = queue.pop_front() {
            let root = &self.roots[current.root];
            for face in Face::<D>::all() {
                let on_face = if face.is_positive() {
                    current.lattice[face.axis()] == extent
                } else {
                    current.lattice[face.axis()] == 0
                };
                if !on_face {
                    continue;
                }
                if let Some(neighbour) = root.neighbour(face) {
                    let image = NodeKey {
                        root: neighbour.root,
                        lattice: neighbour
                            .orientation
                            .map_lattice(&current.lattice, face, extent),
                    };
                    if seen.insert(image) {
                        queue.push_back(image);
                    }
                }
            }
        }
        seen.into_iter().collect()
    }

    /// The canonical key of a lattice position: the smallest of its representations.
    pub fn canonical_key(&self, key: NodeKey<D>, extent: i64) -> NodeKey<D> {
        self.lattice_representations(key, extent)
            .into_iter()
            .min()
            .unwrap_or(key)
    }

    /// Identifiers of the outer boundaries that the given lattice positions lie on.
    ///
    /// The boundary identifier of a root face without a neighbour is the face index in the
    /// frame of that root.
    pub fn boundaries_of(&self, representations: &[NodeKey<D>], extent: i64) -> Vec<usize> {
        let mut boundaries = BTreeSet::new();
        for key in representations {
            for face in self.roots[key.root].boundary_faces() {
                let layer = if face.is_positive() { extent } else { 0 };
                if key.lattice[face.axis()] == layer {
                    boundaries.insert(face.index());
                }
            }
        }
        boundaries.into_iter().collect()
    }
}
