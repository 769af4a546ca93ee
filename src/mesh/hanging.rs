use crate::element::{lagrange, NodalElement, RefineableElement};
use crate::mesh::RefineableMesh;
use crate::node::{HangInfo, NodeId, NodeStore};
use crate::topology::Face;
use crate::tree::TreeId;
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum HangingNodeError {
    /// No node of the coarser neighbour contributes to the hanging node.
    EmptyMasterList { node: NodeId },
    /// Resolving the masters of the node leads back to the node itself.
    CyclicConstraint { node: NodeId },
    /// A leaf borders a coarser leaf of higher order, whose face cannot be matched by the
    /// lower order sons on the other side.
    IncompatibleOrders {
        leaf: TreeId,
        nnode_1d: usize,
        neighbour: TreeId,
        neighbour_nnode_1d: usize,
    },
}

impl fmt::Display for HangingNodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EmptyMasterList { node } => write!(f, "Hanging node {} has no masters", node),
            Self::CyclicConstraint { node } => {
                write!(f, "Hanging node {} depends on itself through its masters", node)
            }
            Self::IncompatibleOrders {
                leaf,
                nnode_1d,
                neighbour,
                neighbour_nnode_1d,
            } => write!(
                f,
                "Element {} with {} nodes per axis borders the coarser element {} with {} nodes per axis",
                leaf, nnode_1d, neighbour, neighbour_nnode_1d
            ),
        }
    }
}

impl Error for HangingNodeError {}

type Masters = Vec<(NodeId, f64)>;

fn accumulate(masters: &mut Masters, node: NodeId, weight: f64) {
    match masters.iter_mut().find(|(id, _)| *id == node) {
        Some((_, w)) => *w += weight,
        None => masters.push((node, weight)),
    }
}

impl<E, const D: usize> RefineableMesh<E, D>
where
    E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
{
    /// Determines the hanging nodes of the mesh and their masters from scratch.
    ///
    /// A node on a face of an active element hangs if the element across that face is coarser,
    /// or of the same size and lower order, and does not have the node itself. Its masters are
    /// the nodes of that element, weighted by its basis at the node. Masters that hang
    /// themselves are replaced by their own masters, so every constraint refers to non-hanging
    /// nodes only. Values that are pinned at this point keep their prescribed values; the
    /// remaining values of the node are constrained.
    ///
    /// Afterwards every active element gets the chance to set up its own constraint data.
    /// Returns the number of hanging nodes.
    pub fn setup_hanging_nodes(&mut self) -> Result<usize, HangingNodeError> {
        for (_, node) in self.nodes.iter_mut() {
            node.set_hang_info(None);
        }

        let tolerance = self.settings().hanging_weight_tolerance;
        let leaves = self.leaves();
        let mut order = Vec::new();
        let mut direct: FxHashMap<NodeId, Masters> = FxHashMap::default();

        for &leaf in &leaves {
            let nnode_1d = self.element(leaf).nnode_1d();
            for face in Face::<D>::all() {
                let Some(info) = self.forest.gteq_face_neighbour(leaf, face) else {
                    continue;
                };
                if info.diff_level > 0 || !self.forest.arena().node(info.neighbour).is_leaf() {
                    continue;
                }
                let master_nnode_1d = self.element(info.neighbour).nnode_1d();
                if info.diff_level == 0 && master_nnode_1d >= nnode_1d {
                    continue;
                }
                if info.diff_level < 0 && master_nnode_1d > nnode_1d {
                    return Err(HangingNodeError::IncompatibleOrders {
                        leaf,
                        nnode_1d,
                        neighbour: info.neighbour,
                        neighbour_nnode_1d: master_nnode_1d,
                    });
                }

                let own_nodes = self.element(leaf).node_ids();
                let master_nodes = self.element(info.neighbour).node_ids();
                let master_set: FxHashSet<NodeId> = master_nodes.iter().copied().collect();
                for local in lagrange::face_nodes::<D>(nnode_1d, face) {
                    let id = own_nodes[local];
                    if master_set.contains(&id) || direct.contains_key(&id) {
                        continue;
                    }
                    let s = lagrange::node_coordinates::<D>(nnode_1d, local);
                    let s_master = self.forest.map_to_neighbour(leaf, &info, &s);
                    let masters: Masters = lagrange::shape::<D>(master_nnode_1d, &s_master)
                        .into_iter()
                        .zip(master_nodes.iter())
                        .filter(|(w, _)| w.abs() > tolerance)
                        .map(|(w, &master)| (master, w))
                        .collect();
                    if masters.is_empty() {
                        return Err(HangingNodeError::EmptyMasterList { node: id });
                    }
                    order.push(id);
                    direct.insert(id, masters);
                }
            }
        }

        let mut resolved: FxHashMap<NodeId, Masters> = FxHashMap::default();
        for &id in &order {
            let mut visiting = Vec::new();
            resolve(id, &direct, &mut resolved, &mut visiting, tolerance)?;
        }
        for &id in &order {
            let masters = resolved.remove(&id).unwrap_or_default();
            if masters.is_empty() {
                return Err(HangingNodeError::EmptyMasterList { node: id });
            }
            let node = self.nodes.node_mut(id);
            let pinned: Vec<usize> = (0..node.nvalue())
                .filter(|&k| node.values()[k].is_pinned())
                .collect();
            if !pinned.is_empty() {
                debug!("Pinned values {:?} of hanging node {} keep their values", pinned, id);
            }
            node.set_hang_info(Some(HangInfo::with_pinned_values(masters, pinned)));
        }

        for leaf in leaves {
            self.forest
                .arena_mut()
                .object_mut(leaf)
                .further_setup_hanging_nodes(&mut self.nodes);
        }

        info!("Set up {} hanging nodes", order.len());
        Ok(order.len())
    }

    /// The nodes that currently carry a hanging node constraint.
    pub fn hanging_nodes(&self) -> Vec<NodeId> {
        self.nodes.hanging_nodes()
    }

    /// Sets the constrained values of all hanging nodes from the values of their masters.
    pub fn update_hanging_values(&mut self) {
        let updates: Vec<(NodeId, Vec<(usize, f64)>)> = self
            .nodes
            .iter()
            .filter_map(|(id, node)| {
                let hang = node.hang_info()?;
                let values: Vec<(usize, f64)> = (0..node.nvalue())
                    .filter(|&k| hang.constrains(k))
                    .map(|k| {
                        let value = hang
                            .masters()
                            .iter()
                            .map(|&(master, w)| w * self.nodes.node(master).value(k))
                            .sum();
                        (k, value)
                    })
                    .collect();
                Some((id, values))
            })
            .collect();
        for (id, values) in updates {
            let node = self.nodes.node_mut(id);
            for (k, v) in values {
                node.set_value(k, v);
            }
        }
    }
}

fn resolve(
    id: NodeId,
    direct: &FxHashMap<NodeId, Masters>,
    resolved: &mut FxHashMap<NodeId, Masters>,
    visiting: &mut Vec<NodeId>,
    tolerance: f64,
) -> Result<Masters, HangingNodeError> {
    if let Some(masters) = resolved.get(&id) {
        return Ok(masters.clone());
    }
    if visiting.contains(&id) {
        return Err(HangingNodeError::CyclicConstraint { node: id });
    }
    visiting.push(id);

    let mut masters = Masters::new();
    for &(master, weight) in direct.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
        if direct.contains_key(&master) {
            for (m, w) in resolve(master, direct, resolved, visiting, tolerance)? {
                accumulate(&mut masters, m, weight * w);
            }
        } else {
            accumulate(&mut masters, master, weight);
        }
    }
    masters.retain(|(_, w)| w.abs() > tolerance);

    visiting.pop();
    resolved.insert(id, masters.clone());
    Ok(masters)
}
