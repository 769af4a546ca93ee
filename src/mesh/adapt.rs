use crate::element::{NodalElement, RefineableElement};
use crate::mesh::{HangingNodeError, RefineableMesh};
use crate::node::NodeStore;
use crate::tree::TreeId;
use log::{debug, info, warn};

/// What happened during one adaptation pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AdaptationSummary {
    /// Number of leaves that were split.
    pub nrefined: usize,
    /// Number of fathers whose sons were merged.
    pub nunrefined: usize,
    /// Number of leaves whose order was raised.
    pub np_refined: usize,
    /// Number of leaves whose order was lowered.
    pub np_unrefined: usize,
    /// Number of nodes removed because no active element used them anymore.
    pub npruned: usize,
    /// Number of hanging nodes after the pass.
    pub nhanging: usize,
    /// Number of active elements after the pass.
    pub nleaf: usize,
}

impl<E, const D: usize> RefineableMesh<E, D>
where
    E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
{
    pub fn select_for_refinement(&mut self, leaf: TreeId) {
        self.element_mut(leaf).select_for_refinement();
    }

    /// Marks the sons of `father` to be merged back into it at the next adaptation.
    pub fn select_sons_for_unrefinement(&mut self, father: TreeId) {
        self.element_mut(father).select_sons_for_unrefinement();
    }

    /// Splits every leaf whose element is selected for refinement and builds the nodes of the
    /// new sons. Returns the number of leaves that were split.
    ///
    /// Leaves at the maximum refinement level are not split; their selection is dropped.
    pub fn refine_selected_elements(&mut self) -> usize {
        let max_level = self.settings().max_refinement_level;
        let mut nrefined = 0;
        for leaf in self.leaves() {
            if !self.element(leaf).to_be_refined() {
                continue;
            }
            let level = self.level(leaf);
            if level >= max_level {
                warn!(
                    "Not refining element {} at level {}: maximum refinement level is {}",
                    leaf, level, max_level
                );
                self.element_mut(leaf).deselect_for_refinement();
                continue;
            }
            let sons = self.forest.arena_mut().split(leaf);
            for son in sons {
                self.build_element_nodes(son);
            }
            nrefined += 1;
        }
        nrefined
    }

    /// Merges the sons of every father whose element asks for it. Returns the number of merges.
    ///
    /// Fathers are visited bottom-up, so that a whole subtree can collapse in a single pass.
    /// Merges that would leave a leaf below the minimum refinement level are refused.
    pub fn unrefine_selected_elements(&mut self) -> usize {
        let min_level = self.settings().min_refinement_level;
        let mut tree_nodes = Vec::new();
        self.forest.stick_all_tree_nodes_into_vector(&mut tree_nodes);

        let mut nunrefined = 0;
        for id in tree_nodes.into_iter().rev() {
            let Some(node) = self.forest.arena().get(id) else {
                continue;
            };
            if node.is_leaf() || !node.object().sons_to_be_unrefined() {
                continue;
            }
            let level = node.level();
            if level < min_level {
                warn!(
                    "Not merging the sons of element {} at level {}: minimum refinement level is {}",
                    id, level, min_level
                );
                self.element_mut(id).deselect_sons_for_unrefinement();
                continue;
            }
            if self.forest.arena_mut().merge_sons_if_required(id, &mut self.nodes) {
                nunrefined += 1;
            }
        }
        nunrefined
    }

    /// Removes the nodes that merged or reordered elements have marked obsolete, unless an
    /// element of the forest still uses them. Returns how many were removed.
    ///
    /// Nodes of inactive elements are kept, since a merge brings them back into use.
    pub fn prune_dead_nodes(&mut self) -> usize {
        let mut tree_nodes = Vec::new();
        self.forest.stick_all_tree_nodes_into_vector(&mut tree_nodes);
        for tree_node in tree_nodes {
            let node_ids = self.element(tree_node).node_ids().to_vec();
            for id in node_ids {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.set_obsolete(false);
                }
            }
        }
        let npruned = self.nodes.prune_obsolete();
        debug!("Pruned {} dead nodes, {} nodes remain", npruned, self.nodes.len());
        npruned
    }

    /// Performs one adaptation pass: merges and splits selected elements, removes dead nodes
    /// and re-establishes the hanging node constraints.
    pub fn adapt(&mut self) -> Result<AdaptationSummary, HangingNodeError> {
        let nunrefined = self.unrefine_selected_elements();
        let nrefined = self.refine_selected_elements();
        let npruned = self.prune_dead_nodes();
        let nhanging = self.setup_hanging_nodes()?;
        self.update_hanging_values();

        let summary = AdaptationSummary {
            nrefined,
            nunrefined,
            np_refined: 0,
            np_unrefined: 0,
            npruned,
            nhanging,
            nleaf: self.nleaf(),
        };
        info!(
            "Adapted mesh: {} elements refined, {} unrefined, {} nodes pruned, {} hanging nodes, {} active elements",
            summary.nrefined, summary.nunrefined, summary.npruned, summary.nhanging, summary.nleaf
        );
        Ok(summary)
    }

    /// Selects every active element for refinement and adapts the mesh.
    pub fn refine_uniformly(&mut self) -> Result<AdaptationSummary, HangingNodeError> {
        for leaf in self.leaves() {
            self.select_for_refinement(leaf);
        }
        self.adapt()
    }
}
