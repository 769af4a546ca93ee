//! Strategies for generating random adaptation histories.
use crate::element::{NodalElement, RefineableElement};
use crate::mesh::{AdaptationSummary, HangingNodeError, RefineableMesh};
use crate::node::NodeStore;
use crate::tree::TreeId;
use ::proptest::collection::vec;
use ::proptest::prelude::*;

/// A single adaptation of a mesh.
///
/// Elements are addressed by position rather than by handle, since handles depend on the
/// history of the mesh. An index `i` selects entry `i % n` of the current candidates: the
/// active elements for refinement, and the fathers whose sons are all active for
/// unrefinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdaptationStep {
    Refine(Vec<usize>),
    Unrefine(Vec<usize>),
}

impl AdaptationStep {
    /// Selects the addressed elements and adapts the mesh.
    ///
    /// A step without candidates leaves the selection untouched, but the mesh is adapted
    /// nonetheless.
    pub fn apply<E, const D: usize>(
        &self,
        mesh: &mut RefineableMesh<E, D>,
    ) -> Result<AdaptationSummary, HangingNodeError>
    where
        E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
    {
        match self {
            AdaptationStep::Refine(indices) => {
                let leaves = mesh.leaves();
                if !leaves.is_empty() {
                    for &i in indices {
                        mesh.select_for_refinement(leaves[i % leaves.len()]);
                    }
                }
            }
            AdaptationStep::Unrefine(indices) => {
                let fathers = mergeable_fathers(mesh);
                if !fathers.is_empty() {
                    for &i in indices {
                        mesh.select_sons_for_unrefinement(fathers[i % fathers.len()]);
                    }
                }
            }
        }
        mesh.adapt()
    }
}

/// Tree nodes whose sons are all leaves, in preorder.
pub fn mergeable_fathers<E, const D: usize>(mesh: &RefineableMesh<E, D>) -> Vec<TreeId>
where
    E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
{
    let arena = mesh.forest().arena();
    let mut nodes = Vec::new();
    mesh.forest().stick_all_tree_nodes_into_vector(&mut nodes);
    nodes
        .into_iter()
        .filter(|&id| {
            let node = arena.node(id);
            !node.is_leaf() && node.sons().iter().all(|&son| arena.node(son).is_leaf())
        })
        .collect()
}

pub fn adaptation_step() -> impl Strategy<Value = AdaptationStep> {
    // Refinement is picked more often than unrefinement so that meshes actually grow
    let indices = || vec(0..64usize, 1..4);
    prop_oneof![
        3 => indices().prop_map(AdaptationStep::Refine),
        1 => indices().prop_map(AdaptationStep::Unrefine),
    ]
}

pub fn adaptation_sequence(max_len: usize) -> impl Strategy<Value = Vec<AdaptationStep>> {
    vec(adaptation_step(), 0..=max_len)
}
