//! The element side of the refinement protocol.
//!
//! A tree drives refinement and unrefinement through [`RefineableElement`]; the mesh additionally
//! needs to know which nodes an element uses, which is the concern of [`NodalElement`].
//! Elements whose polynomial order can change in place implement [`PRefineableElement`].
use crate::node::{NodeId, Value};
use crate::tree::TreeId;

pub mod lagrange;
mod q_element;

pub use q_element::*;

/// Contract between a refinement tree and the element it carries.
///
/// The associated `Context` is the state an element needs while it is being rebuilt or torn
/// down, for mesh elements the store that owns their nodes.
pub trait RefineableElement: Sized {
    type Context;

    /// The tree node that carries this element, once it has been attached to a tree.
    fn tree_id(&self) -> Option<TreeId>;

    fn set_tree_id(&mut self, id: TreeId);

    fn to_be_refined(&self) -> bool;

    fn select_for_refinement(&mut self);

    fn deselect_for_refinement(&mut self);

    /// Whether the sons of this element have collectively been marked for merging.
    fn sons_to_be_unrefined(&self) -> bool;

    fn select_sons_for_unrefinement(&mut self);

    fn deselect_sons_for_unrefinement(&mut self);

    /// Produces the son objects of this element, one per son type, in son type order.
    ///
    /// Element-internal data is prolonged to the sons. Nodes are not part of the split: the
    /// mesh attaches nodes to the sons once they have been placed in the tree.
    fn split(&self) -> Vec<Self>;

    /// Reconstructs the state of this element from its sons right before they are destroyed.
    ///
    /// Calling this more than once with the same sons yields the same state.
    fn rebuild_from_sons(&mut self, sons: &[&Self], context: &mut Self::Context);

    /// Marks the nodes of this element as no longer required.
    ///
    /// Nodes are never deleted here. The mesh removes obsolete nodes once no remaining
    /// element claims them.
    fn unbuild(&mut self, context: &mut Self::Context);

    /// Called once when the element stops being a leaf.
    fn deactivate_element(&mut self);

    /// Sets up element-specific constraint data after the hanging nodes of the mesh have been
    /// determined.
    ///
    /// Called for every leaf on every hanging node setup, so implementations must rebuild
    /// their data from scratch.
    fn further_setup_hanging_nodes(&mut self, _context: &mut Self::Context) {}
}

/// An element with tensor product Lagrange nodes on the reference box `[-1, 1]^D`.
pub trait NodalElement<const D: usize> {
    /// Number of nodes along each axis.
    fn nnode_1d(&self) -> usize;

    fn nnode(&self) -> usize {
        self.nnode_1d().pow(D as u32)
    }

    /// The nodes of the element, in lexicographic order with the first axis varying fastest.
    ///
    /// Empty until the mesh has built the nodes of the element.
    fn node_ids(&self) -> &[NodeId];

    fn set_node_ids(&mut self, node_ids: Vec<NodeId>);

    /// Values stored in the element rather than at its nodes.
    fn internal_values(&self) -> &[Value];

    fn internal_values_mut(&mut self) -> &mut [Value];

    fn local_coordinate_of_node(&self, local_node: usize) -> [f64; D] {
        lagrange::node_coordinates(self.nnode_1d(), local_node)
    }
}

/// An element whose order can be raised or lowered without splitting it.
///
/// The order is counted in nodes per axis, like [`NodalElement::nnode_1d`].
pub trait PRefineableElement<const D: usize>: NodalElement<D> {
    /// The order the element was created with.
    fn initial_p_order(&self) -> usize;

    fn p_order(&self) -> usize {
        self.nnode_1d()
    }

    /// Changes the number of nodes per axis. The node list is cleared and must be rebuilt by
    /// the mesh.
    fn set_p_order(&mut self, nnode_1d: usize);

    fn to_be_p_refined(&self) -> bool;

    fn select_for_p_refinement(&mut self);

    fn deselect_for_p_refinement(&mut self);

    fn to_be_p_unrefined(&self) -> bool;

    fn select_for_p_unrefinement(&mut self);

    fn deselect_for_p_unrefinement(&mut self);
}
