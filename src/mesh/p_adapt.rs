use crate::element::{NodalElement, PRefineableElement, RefineableElement};
use crate::mesh::{AdaptationSummary, HangingNodeError, RefineableMesh};
use crate::node::NodeStore;
use crate::settings::MAX_NNODE_1D;
use crate::tree::TreeId;
use log::{info, warn};

impl<E, const D: usize> RefineableMesh<E, D>
where
    E: RefineableElement<Context = NodeStore<D>> + PRefineableElement<D>,
{
    pub fn select_for_p_refinement(&mut self, leaf: TreeId) {
        self.element_mut(leaf).select_for_p_refinement();
    }

    pub fn select_for_p_unrefinement(&mut self, leaf: TreeId) {
        self.element_mut(leaf).select_for_p_unrefinement();
    }

    /// Changes the number of nodes per axis of the leaf `leaf` by `inc` and rebuilds its nodes.
    ///
    /// Nodes the element keeps are reused, new nodes interpolate the field of the element at
    /// its previous order. The order is limited to between two and [`MAX_NNODE_1D`] nodes per
    /// axis. Returns whether the order changed.
    ///
    /// The hanging nodes are not updated; call [`RefineableMesh::setup_hanging_nodes`] or use
    /// [`RefineableMesh::p_adapt`] afterwards.
    pub fn p_refine(&mut self, leaf: TreeId, inc: isize) -> bool {
        assert!(
            self.forest.arena().node(leaf).is_leaf(),
            "Only leaves can change their order, but {} has sons",
            leaf
        );
        let old = self.element(leaf).nnode_1d();
        let new = (old as isize + inc).clamp(2, MAX_NNODE_1D as isize) as usize;
        if new == old {
            warn!(
                "Not changing the order of element {} with {} nodes per axis by {}",
                leaf, old, inc
            );
            return false;
        }

        let source = self.nodal_source(leaf);
        let element = self.forest.arena_mut().object_mut(leaf);
        element.unbuild(&mut self.nodes);
        element.set_p_order(new);
        self.build_element_nodes_from(leaf, Some(source));
        true
    }

    /// Raises the order of every leaf selected for p-refinement by one. Returns how many
    /// leaves changed.
    pub fn p_refine_selected_elements(&mut self) -> usize {
        let mut nrefined = 0;
        for leaf in self.leaves() {
            if !self.element(leaf).to_be_p_refined() {
                continue;
            }
            self.element_mut(leaf).deselect_for_p_refinement();
            if self.p_refine(leaf, 1) {
                nrefined += 1;
            }
        }
        nrefined
    }

    /// Lowers the order of every leaf selected for p-unrefinement by one. Returns how many
    /// leaves changed.
    pub fn p_unrefine_selected_elements(&mut self) -> usize {
        let mut nunrefined = 0;
        for leaf in self.leaves() {
            if !self.element(leaf).to_be_p_unrefined() {
                continue;
            }
            self.element_mut(leaf).deselect_for_p_unrefinement();
            if self.p_refine(leaf, -1) {
                nunrefined += 1;
            }
        }
        nunrefined
    }

    /// Performs one p-adaptation pass: changes the order of the selected leaves, removes dead
    /// nodes and re-establishes the hanging node constraints.
    pub fn p_adapt(&mut self) -> Result<AdaptationSummary, HangingNodeError> {
        let np_unrefined = self.p_unrefine_selected_elements();
        let np_refined = self.p_refine_selected_elements();
        let npruned = self.prune_dead_nodes();
        let nhanging = self.setup_hanging_nodes()?;
        self.update_hanging_values();

        let summary = AdaptationSummary {
            np_refined,
            np_unrefined,
            npruned,
            nhanging,
            nleaf: self.nleaf(),
            ..AdaptationSummary::default()
        };
        info!(
            "p-adapted mesh: {} elements raised, {} lowered, {} nodes pruned, {} hanging nodes",
            summary.np_refined, summary.np_unrefined, summary.npruned, summary.nhanging
        );
        Ok(summary)
    }
}
