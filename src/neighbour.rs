//! Neighbour finding across faces of tree nodes, within a tree and across roots.
use crate::element::RefineableElement;
use crate::forest::TreeForest;
use crate::topology::{corner_coordinates, Face, Orientation};
use crate::tree::{TreeId, TreeNode};
use log::warn;
use nalgebra::SVector;
use std::error::Error;
use std::fmt;

/// The result of a neighbour query across one face of a tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourInfo<const D: usize> {
    pub neighbour: TreeId,
    /// Axis `i` of the querying node corresponds to axis `translate_s[i]` of the neighbour.
    pub translate_s: [usize; D],
    /// The face corner of the querying node with all tangential coordinates at `-1`, in the
    /// local coordinates of the neighbour.
    pub s_lo: [f64; D],
    /// The face corner of the querying node with all tangential coordinates at `+1`, in the
    /// local coordinates of the neighbour.
    pub s_hi: [f64; D],
    /// The shared face as seen from the neighbour.
    pub face: Face<D>,
    /// Level of the neighbour minus level of the querying node.
    pub diff_level: i32,
    /// Whether the search crossed into another root, which for periodic connections may be
    /// the root of the querying node itself.
    pub in_neighbouring_tree: bool,
    /// Translation from the querying side to the neighbour's side of the face.
    pub offset: SVector<f64, D>,
    crossing: Option<(Face<D>, Orientation<D>)>,
}

impl<const D: usize> NeighbourInfo<D> {
    /// The orientation mapping the root frame of the querying node to the root frame of the
    /// neighbour.
    pub fn orientation(&self) -> Orientation<D> {
        self.crossing
            .map(|(_, orientation)| orientation)
            .unwrap_or_else(Orientation::identity)
    }
}

/// A failed neighbour consistency check.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourFailure<const D: usize> {
    pub node: TreeId,
    pub face: Face<D>,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelfTestError<const D: usize> {
    pub max_error: f64,
    pub tolerance: f64,
    pub failures: Vec<NeighbourFailure<D>>,
}

impl<const D: usize> fmt::Display for SelfTestError<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Neighbour self-test failed for {} node faces: max error {:e} exceeds tolerance {:e}",
            self.failures.len(),
            self.max_error,
            self.tolerance
        )?;
        for failure in &self.failures {
            write!(f, "\n  {} face {}: error {:e}", failure.node, failure.face, failure.error)?;
        }
        Ok(())
    }
}

impl<const D: usize> Error for SelfTestError<D> {}

impl<E, const D: usize> TreeForest<E, D>
where
    E: RefineableElement,
{
    /// Finds the neighbour of `id` across `face` whose size is greater than or equal to the
    /// size of `id`.
    ///
    /// The neighbour is the node at the same level covering the box adjacent to `id`, or the
    /// leaf covering it if the tree is not refined that far. Returns `None` on the outer
    /// boundary of the forest.
    pub fn gteq_face_neighbour(&self, id: TreeId, face: Face<D>) -> Option<NeighbourInfo<D>> {
        let arena = self.arena();
        let node = arena.node(id);
        let level = node.level();
        let n = node.cells_per_axis();
        let a = face.axis();

        let mut target = *node.index();
        target[a] += if face.is_positive() { 1 } else { -1 };

        let (start, crossing, offset) = if (0..n).contains(&target[a]) {
            // Walk up until the ancestor covers the target box
            let mut ancestor = id;
            loop {
                let anc = arena.node(ancestor);
                let shift = level - anc.level();
                if (0..D).all(|i| target[i] >> shift == anc.index()[i]) {
                    break;
                }
                match anc.father() {
                    Some(father) => ancestor = father,
                    None => break,
                }
            }
            (ancestor, None, SVector::zeros())
        } else {
            let neighbour = self.root(node.root()).neighbour(face)?;
            target = neighbour.orientation().map_cell_index(&target, face, n);
            (
                self.root(neighbour.root()).tree(),
                Some((face, *neighbour.orientation())),
                *neighbour.offset(),
            )
        };

        // Walk down towards the target box
        let mut current = start;
        loop {
            let cn = arena.node(current);
            if cn.is_leaf() || cn.level() == level {
                break;
            }
            let shift = level - cn.level() - 1;
            let bits = (0..D)
                .filter(|&i| (target[i] >> shift) & 1 == 1)
                .fold(0, |acc, i| acc | (1 << i));
            current = cn.sons()[bits];
        }

        Some(self.neighbour_info(id, current, face, crossing, offset))
    }

    fn neighbour_info(
        &self,
        id: TreeId,
        neighbour: TreeId,
        face: Face<D>,
        crossing: Option<(Face<D>, Orientation<D>)>,
        offset: SVector<f64, D>,
    ) -> NeighbourInfo<D> {
        let arena = self.arena();
        let node = arena.node(id);
        let nb = arena.node(neighbour);
        let orientation = crossing
            .map(|(_, orientation)| orientation)
            .unwrap_or_else(Orientation::identity);

        let mut lo = [0.0; D];
        let mut hi = [0.0; D];
        for i in 0..D {
            lo[i] = face.s_base(i);
            hi[i] = face.s_base(i) + face.s_step(i);
        }

        NeighbourInfo {
            neighbour,
            translate_s: *orientation.perm(),
            s_lo: map_into(node, nb, crossing, &lo),
            s_hi: map_into(node, nb, crossing, &hi),
            face: orientation.map_face(face.opposite()),
            diff_level: nb.level() as i32 - node.level() as i32,
            in_neighbouring_tree: crossing.is_some(),
            offset,
            crossing,
        }
    }

    /// Maps local coordinates of `id` into the local coordinates of the neighbour described by
    /// `info`.
    pub fn map_to_neighbour(&self, id: TreeId, info: &NeighbourInfo<D>, s: &[f64; D]) -> [f64; D] {
        let arena = self.arena();
        map_into(arena.node(id), arena.node(info.neighbour), info.crossing, s)
    }

    /// The leaves adjacent to `id` across `face`.
    ///
    /// If the greater-or-equal neighbour is itself refined, its leaves touching the shared
    /// face are returned, each with a positive level difference. Coordinates `s_lo` and `s_hi`
    /// always refer to the face corners of `id`.
    pub fn neighbouring_leaves(&self, id: TreeId, face: Face<D>) -> Vec<NeighbourInfo<D>> {
        let Some(info) = self.gteq_face_neighbour(id, face) else {
            return Vec::new();
        };
        let mut leaves = Vec::new();
        self.stick_face_leaves(info.neighbour, info.face, &mut leaves);
        leaves
            .into_iter()
            .map(|leaf| self.neighbour_info(id, leaf, face, info.crossing, info.offset))
            .collect()
    }

    fn stick_face_leaves(&self, id: TreeId, face: Face<D>, leaves: &mut Vec<TreeId>) {
        let node = self.arena().node(id);
        if node.is_leaf() {
            leaves.push(id);
        } else {
            for &son in node.sons() {
                let touches = self
                    .arena()
                    .node(son)
                    .son_type()
                    .map(|st| st.touches(face))
                    .unwrap_or(false);
                if touches {
                    self.stick_face_leaves(son, face, leaves);
                }
            }
        }
    }

    /// Checks the neighbours of `id` in all directions and returns the largest discrepancy.
    ///
    /// For every face with a neighbour, the face corners of `id` are mapped into the neighbour
    /// and their physical positions are computed from both sides. A face corner that falls
    /// outside a greater-or-equal neighbour, or a neighbour that does not find `id` (or one
    /// of its ancestors) in return, counts as an infinite error.
    pub fn node_self_test(&self, id: TreeId) -> Vec<(Face<D>, f64)> {
        Face::<D>::all()
            .filter_map(|face| {
                let info = self.gteq_face_neighbour(id, face)?;
                Some((face, self.face_error(id, face, &info)))
            })
            .collect()
    }

    pub(crate) fn face_error(&self, id: TreeId, face: Face<D>, info: &NeighbourInfo<D>) -> f64 {
        let mut max_error: f64 = 0.0;
        for corner in face.corners() {
            let s = corner_coordinates::<D>(corner);
            let s_nb = self.map_to_neighbour(id, info, &s);
            let outside = s_nb
                .iter()
                .map(|s_i| (s_i.abs() - 1.0).max(0.0))
                .fold(0.0, f64::max);
            let here = self.global_position(id, &s);
            let there = self.global_position(info.neighbour, &s_nb) - info.offset;
            max_error = max_error.max((here - there).norm()).max(outside);
        }

        let recognised = self
            .gteq_face_neighbour(info.neighbour, info.face)
            .map(|back| self.is_ancestor_or_self(back.neighbour, id))
            .unwrap_or(false);
        if !recognised {
            max_error = f64::INFINITY;
        }
        max_error
    }

    fn is_ancestor_or_self(&self, ancestor: TreeId, id: TreeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.arena().node(c).father();
        }
        false
    }

    /// Runs the neighbour self-test on every node of the forest.
    ///
    /// Returns the largest discrepancy found if it does not exceed the tolerance of the forest.
    pub fn self_test(&self) -> Result<f64, SelfTestError<D>> {
        let mut nodes = Vec::new();
        self.stick_all_tree_nodes_into_vector(&mut nodes);

        let mut max_error: f64 = 0.0;
        let mut failures = Vec::new();
        for node in nodes {
            for (face, error) in self.node_self_test(node) {
                max_error = max_error.max(error);
                if error > self.tolerance() {
                    warn!("Neighbour self-test failed for node {} across face {}: error {:e}", node, face, error);
                    failures.push(NeighbourFailure { node, face, error });
                }
            }
        }

        if failures.is_empty() {
            Ok(max_error)
        } else {
            Err(SelfTestError {
                max_error,
                tolerance: self.tolerance(),
                failures,
            })
        }
    }
}

fn map_into<E, const D: usize>(
    node: &TreeNode<E, D>,
    neighbour: &TreeNode<E, D>,
    crossing: Option<(Face<D>, Orientation<D>)>,
    s: &[f64; D],
) -> [f64; D] {
    let x = node.to_root_local(s);
    let y = match crossing {
        Some((face, orientation)) => orientation.map_local(&x, face),
        None => x,
    };
    neighbour.from_root_local(&y)
}
