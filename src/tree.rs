//! Generic refinement trees stored in a generational arena.
//!
//! Every [`TreeNode`] represents exactly one (possibly refined) element. A node owns the
//! handles of its sons and refers back to its father and to the index of its root in the
//! enclosing [`TreeForest`](crate::forest::TreeForest). Nodes are never created directly:
//! roots are created when the forest is assembled and all other nodes come from
//! [`TreeArena::split`], which in turn uses [`TreeArena::construct_son`].
use crate::element::RefineableElement;
use crate::topology::SonType;
use generational_arena::{Arena, Index};
use log::warn;
use std::fmt;

/// Handle to a node in a [`TreeArena`].
///
/// Handles are generational: a handle to a node that has been destroyed never refers to a
/// node created later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Index);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "{}:{}", index, generation)
    }
}

/// One node of a refinement tree.
#[derive(Debug)]
pub struct TreeNode<E, const D: usize> {
    object: E,
    level: usize,
    son_type: Option<SonType<D>>,
    /// Integer position of the node's box among the `2^level` boxes per axis of its root.
    index: [i64; D],
    sons: Vec<TreeId>,
    father: Option<TreeId>,
    root: usize,
}

impl<E, const D: usize> TreeNode<E, D> {
    pub fn object(&self) -> &E {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut E {
        &mut self.object
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// The son type of the node, or `None` for a root.
    pub fn son_type(&self) -> Option<SonType<D>> {
        self.son_type
    }

    pub fn index(&self) -> &[i64; D] {
        &self.index
    }

    pub fn sons(&self) -> &[TreeId] {
        &self.sons
    }

    pub fn son(&self, son_type: SonType<D>) -> Option<TreeId> {
        self.sons.get(son_type.index()).copied()
    }

    pub fn father(&self) -> Option<TreeId> {
        self.father
    }

    /// Index of the root of this node in the forest.
    pub fn root(&self) -> usize {
        self.root
    }

    pub fn is_leaf(&self) -> bool {
        self.sons.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.father.is_none()
    }

    /// Number of boxes per axis at the level of this node.
    pub fn cells_per_axis(&self) -> i64 {
        1 << self.level
    }

    /// Centre and half-width of the node's box in the local coordinates of its root.
    pub fn root_local_box(&self) -> ([f64; D], f64) {
        let n = self.cells_per_axis() as f64;
        let mut centre = [0.0; D];
        for (c, &u) in centre.iter_mut().zip(self.index.iter()) {
            *c = -1.0 + (2 * u + 1) as f64 / n;
        }
        (centre, 1.0 / n)
    }

    /// Maps local coordinates of this node to local coordinates of its root.
    pub fn to_root_local(&self, s: &[f64; D]) -> [f64; D] {
        let (centre, half) = self.root_local_box();
        let mut x = [0.0; D];
        for i in 0..D {
            x[i] = centre[i] + half * s[i];
        }
        x
    }

    /// Maps local coordinates of the root to local coordinates of this node.
    pub fn from_root_local(&self, x: &[f64; D]) -> [f64; D] {
        let (centre, half) = self.root_local_box();
        let mut s = [0.0; D];
        for i in 0..D {
            s[i] = (x[i] - centre[i]) / half;
        }
        s
    }
}

/// Storage for all nodes of all trees of a forest.
#[derive(Debug)]
pub struct TreeArena<E, const D: usize> {
    nodes: Arena<TreeNode<E, D>>,
}

impl<E, const D: usize> TreeArena<E, D>
where
    E: RefineableElement,
{
    pub(crate) fn new() -> Self {
        Self { nodes: Arena::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TreeId) -> bool {
        self.nodes.contains(id.0)
    }

    pub fn get(&self, id: TreeId) -> Option<&TreeNode<E, D>> {
        self.nodes.get(id.0)
    }

    /// Panics if the node does not exist.
    pub fn node(&self, id: TreeId) -> &TreeNode<E, D> {
        self.nodes
            .get(id.0)
            .unwrap_or_else(|| panic!("Tree node {} does not exist", id))
    }

    /// Panics if the node does not exist.
    pub fn node_mut(&mut self, id: TreeId) -> &mut TreeNode<E, D> {
        self.nodes
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("Tree node {} does not exist", id))
    }

    pub fn object(&self, id: TreeId) -> &E {
        &self.node(id).object
    }

    pub fn object_mut(&mut self, id: TreeId) -> &mut E {
        &mut self.node_mut(id).object
    }

    /// Creates the root node of a new tree.
    pub(crate) fn construct_root(&mut self, object: E, root: usize) -> TreeId {
        let node = TreeNode {
            object,
            level: 0,
            son_type: None,
            index: [0; D],
            sons: Vec::new(),
            father: None,
            root,
        };
        let id = TreeId(self.nodes.insert(node));
        self.object_mut(id).set_tree_id(id);
        id
    }

    /// Attaches a new son of the given type to `father`.
    ///
    /// Sons must be constructed in son type order, so that the son list of a node is always
    /// indexed by son type. Panics otherwise.
    pub fn construct_son(&mut self, object: E, father: TreeId, son_type: SonType<D>) -> TreeId {
        let (level, index, root) = {
            let f = self.node(father);
            assert_eq!(
                f.sons.len(),
                son_type.index(),
                "Sons of tree node {} must be constructed in son type order",
                father
            );
            let mut index = [0; D];
            for i in 0..D {
                index[i] = 2 * f.index[i] + son_type.is_high(i) as i64;
            }
            (f.level + 1, index, f.root)
        };
        let node = TreeNode {
            object,
            level,
            son_type: Some(son_type),
            index,
            sons: Vec::new(),
            father: Some(father),
            root,
        };
        let id = TreeId(self.nodes.insert(node));
        self.node_mut(father).sons.push(id);
        self.object_mut(id).set_tree_id(id);
        id
    }

    /// Splits the leaf `id` into `2^D` sons and returns their handles in son type order.
    ///
    /// The element of `id` produces the son objects. Afterwards the element is deactivated
    /// and its refinement flag is cleared.
    pub fn split(&mut self, id: TreeId) -> Vec<TreeId> {
        assert!(self.node(id).is_leaf(), "Only leaves can be split, but {} has sons", id);
        let son_objects = self.object(id).split();
        assert_eq!(
            son_objects.len(),
            SonType::<D>::COUNT,
            "Splitting an element must produce exactly {} sons",
            SonType::<D>::COUNT
        );
        let sons = son_objects
            .into_iter()
            .zip(SonType::<D>::all())
            .map(|(object, son_type)| self.construct_son(object, id, son_type))
            .collect();
        self.deactivate_object(id);
        self.object_mut(id).deselect_for_refinement();
        sons
    }

    /// Tells the element of `id` that it is no longer an active leaf.
    pub fn deactivate_object(&mut self, id: TreeId) {
        self.object_mut(id).deactivate_element();
    }

    /// Visits `id` and all its descendants in preorder.
    pub fn traverse_all(&self, id: TreeId, mut f: impl FnMut(TreeId, &TreeNode<E, D>)) {
        self.traverse_all_impl(id, &mut f);
    }

    fn traverse_all_impl(&self, id: TreeId, f: &mut impl FnMut(TreeId, &TreeNode<E, D>)) {
        let node = self.node(id);
        f(id, node);
        for &son in &node.sons {
            self.traverse_all_impl(son, f);
        }
    }

    /// Visits `id` and all its descendants in preorder, with mutable access to their elements.
    pub fn traverse_all_mut(&mut self, id: TreeId, mut f: impl FnMut(TreeId, &mut E)) {
        self.traverse_all_mut_impl(id, &mut f);
    }

    fn traverse_all_mut_impl(&mut self, id: TreeId, f: &mut impl FnMut(TreeId, &mut E)) {
        f(id, self.object_mut(id));
        let sons = self.node(id).sons.clone();
        for son in sons {
            self.traverse_all_mut_impl(son, f);
        }
    }

    /// Visits, in preorder, only the nodes in the subtree of `id` that have sons.
    pub fn traverse_all_but_leaves(&self, id: TreeId, mut f: impl FnMut(TreeId, &TreeNode<E, D>)) {
        self.traverse_all_but_leaves_impl(id, &mut f);
    }

    fn traverse_all_but_leaves_impl(&self, id: TreeId, f: &mut impl FnMut(TreeId, &TreeNode<E, D>)) {
        let node = self.node(id);
        if !node.is_leaf() {
            f(id, node);
            for &son in &node.sons {
                self.traverse_all_but_leaves_impl(son, f);
            }
        }
    }

    /// Visits the leaves in the subtree of `id`, in preorder.
    pub fn traverse_leaves(&self, id: TreeId, mut f: impl FnMut(TreeId, &TreeNode<E, D>)) {
        self.traverse_leaves_impl(id, &mut f);
    }

    fn traverse_leaves_impl(&self, id: TreeId, f: &mut impl FnMut(TreeId, &TreeNode<E, D>)) {
        let node = self.node(id);
        if node.is_leaf() {
            f(id, node);
        } else {
            for &son in &node.sons {
                self.traverse_leaves_impl(son, f);
            }
        }
    }

    /// Visits the leaves in the subtree of `id`, in preorder, with mutable access to their elements.
    pub fn traverse_leaves_mut(&mut self, id: TreeId, mut f: impl FnMut(TreeId, &mut E)) {
        let mut leaves = Vec::new();
        self.stick_leaves_into_vector(id, &mut leaves);
        for leaf in leaves {
            f(leaf, self.object_mut(leaf));
        }
    }

    /// Appends the leaves of the subtree of `id` to `leaves`, in preorder.
    pub fn stick_leaves_into_vector(&self, id: TreeId, leaves: &mut Vec<TreeId>) {
        self.traverse_leaves(id, |leaf, _| leaves.push(leaf));
    }

    /// Appends all nodes of the subtree of `id` to `nodes`, in preorder.
    pub fn stick_all_tree_nodes_into_vector(&self, id: TreeId, nodes: &mut Vec<TreeId>) {
        self.traverse_all(id, |node, _| nodes.push(node));
    }

    /// Merges the sons of `id` back into it if its element asks for it.
    ///
    /// The sons are unbuilt first, then the father element is rebuilt from them, so nodes the
    /// father shares with its sons remain required.
    /// Only sons that are themselves leaves can be merged; if any son has been refined
    /// further, the request is dropped with a warning. Returns whether a merge took place.
    pub fn merge_sons_if_required(&mut self, id: TreeId, context: &mut E::Context) -> bool {
        let node = self.node(id);
        if node.is_leaf() || !node.object.sons_to_be_unrefined() {
            return false;
        }

        if node.sons.iter().any(|&son| !self.node(son).is_leaf()) {
            warn!(
                "Cannot merge the sons of tree node {} at level {}: not all sons are leaves",
                id, node.level
            );
            self.object_mut(id).deselect_sons_for_unrefinement();
            return false;
        }

        let son_ids = node.sons.clone();
        let mut sons: Vec<E> = son_ids
            .into_iter()
            .flat_map(|son| self.destroy(son))
            .collect();

        for son in &mut sons {
            son.unbuild(context);
        }
        let father = self.object_mut(id);
        let son_refs: Vec<&E> = sons.iter().collect();
        father.rebuild_from_sons(&son_refs, context);
        father.deselect_sons_for_unrefinement();
        true
    }

    /// Removes the subtree of `id` from the arena, sons first and `id` last.
    ///
    /// The node is detached from its father. Returns the elements of the removed nodes in
    /// removal order.
    pub(crate) fn destroy(&mut self, id: TreeId) -> Vec<E> {
        let mut removed = Vec::new();
        self.destroy_impl(id, &mut removed);
        if let Some(father) = removed_father(&removed) {
            if let Some(father_node) = self.nodes.get_mut(father.0) {
                father_node.sons.retain(|&son| son != id);
            }
        }
        removed.into_iter().map(|(_, node)| node.object).collect()
    }

    fn destroy_impl(&mut self, id: TreeId, removed: &mut Vec<(TreeId, TreeNode<E, D>)>) {
        let sons = self.node(id).sons.clone();
        for son in sons {
            self.destroy_impl(son, removed);
        }
        let node = self
            .nodes
            .remove(id.0)
            .unwrap_or_else(|| panic!("Tree node {} does not exist", id));
        removed.push((id, node));
    }
}

/// The father of the last removed node, which is the top of the destroyed subtree.
fn removed_father<E, const D: usize>(removed: &[(TreeId, TreeNode<E, D>)]) -> Option<TreeId> {
    removed.last().and_then(|(_, node)| node.father)
}
