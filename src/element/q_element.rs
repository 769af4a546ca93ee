use crate::element::{lagrange, NodalElement, PRefineableElement, RefineableElement};
use crate::node::{NodeId, NodeStore, Value};
use crate::topology::SonType;
use crate::tree::TreeId;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ElementState {
    /// A leaf of its tree, part of the computational mesh.
    Active,
    /// Replaced by its sons.
    Inactive,
}

/// A refineable Lagrange element on a box with piecewise constant internal data.
///
/// Internal data is prolonged to the sons by copying and restricted from the sons by
/// averaging, so data that is constant on the father survives a split followed by a merge
/// exactly. Sons inherit the order of their father; the order of a leaf can be changed
/// through [`PRefineableElement`].
#[derive(Debug, Clone)]
pub struct QElement<const D: usize> {
    tree_id: Option<TreeId>,
    nnode_1d: usize,
    initial_nnode_1d: usize,
    node_ids: Vec<NodeId>,
    internal: Vec<Value>,
    state: ElementState,
    refine: bool,
    unrefine_sons: bool,
    p_refine: bool,
    p_unrefine: bool,
}

impl<const D: usize> QElement<D> {
    /// An element with `nnode_1d` nodes per axis and `ninternal` internal values.
    pub fn new(nnode_1d: usize, ninternal: usize) -> Self {
        assert!(nnode_1d >= 2, "Lagrange elements need at least two nodes per axis");
        Self {
            tree_id: None,
            nnode_1d,
            initial_nnode_1d: nnode_1d,
            node_ids: Vec::new(),
            internal: vec![Value::default(); ninternal],
            state: ElementState::Active,
            refine: false,
            unrefine_sons: false,
            p_refine: false,
            p_unrefine: false,
        }
    }

    /// Bilinear (2D) or trilinear (3D) element without internal data.
    pub fn linear() -> Self {
        Self::new(2, 0)
    }

    pub fn state(&self) -> ElementState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ElementState::Active
    }

    pub fn internal_value(&self, i: usize) -> f64 {
        self.internal[i].value()
    }

    pub fn set_internal_value(&mut self, i: usize, value: f64) {
        self.internal[i].set_value(value);
    }
}

impl<const D: usize> QElement<D> {
    /// Interpolates the nodal values of the element at the local coordinate `s`, one entry per
    /// value index. `None` if the nodes of the element are not available.
    fn interpolate_values(&self, s: &[f64; D], nodes: &NodeStore<D>) -> Option<Vec<f64>> {
        if self.node_ids.len() != self.nnode() {
            return None;
        }
        let element_nodes: Vec<_> = self
            .node_ids
            .iter()
            .map(|&id| nodes.get(id))
            .collect::<Option<_>>()?;
        let nvalue = element_nodes.first()?.nvalue();
        let phi = lagrange::shape::<D>(self.nnode_1d, s);
        let values = (0..nvalue)
            .map(|k| {
                phi.iter()
                    .zip(&element_nodes)
                    .map(|(p, node)| p * node.value(k))
                    .sum()
            })
            .collect();
        Some(values)
    }
}

/// The son covering the father coordinate `s`, together with `s` in the son's coordinates.
fn son_containing<'a, const D: usize>(sons: &[&'a QElement<D>], s: &[f64; D]) -> Option<(&'a QElement<D>, [f64; D])> {
    let index = (0..D)
        .filter(|&i| s[i] > 0.0)
        .fold(0, |acc, i| acc | (1 << i));
    let son_type = SonType::<D>::from_index(index);
    let son = *sons.get(son_type.index())?;
    let centre = son_type.centre_in_father();
    let mut s_son = [0.0; D];
    for i in 0..D {
        s_son[i] = 2.0 * (s[i] - centre[i]);
    }
    Some((son, s_son))
}

impl<const D: usize> RefineableElement for QElement<D> {
    type Context = NodeStore<D>;

    fn tree_id(&self) -> Option<TreeId> {
        self.tree_id
    }

    fn set_tree_id(&mut self, id: TreeId) {
        self.tree_id = Some(id);
    }

    fn to_be_refined(&self) -> bool {
        self.refine
    }

    fn select_for_refinement(&mut self) {
        self.refine = true;
    }

    fn deselect_for_refinement(&mut self) {
        self.refine = false;
    }

    fn sons_to_be_unrefined(&self) -> bool {
        self.unrefine_sons
    }

    fn select_sons_for_unrefinement(&mut self) {
        self.unrefine_sons = true;
    }

    fn deselect_sons_for_unrefinement(&mut self) {
        self.unrefine_sons = false;
    }

    fn split(&self) -> Vec<Self> {
        let internal: Vec<Value> = self
            .internal
            .iter()
            .map(|v| {
                let mut son_value = Value::new(v.value());
                if v.is_pinned() {
                    son_value.pin();
                }
                son_value
            })
            .collect();
        SonType::<D>::all()
            .map(|_| Self {
                tree_id: None,
                nnode_1d: self.nnode_1d,
                initial_nnode_1d: self.initial_nnode_1d,
                node_ids: Vec::new(),
                internal: internal.clone(),
                state: ElementState::Active,
                refine: false,
                unrefine_sons: false,
                p_refine: false,
                p_unrefine: false,
            })
            .collect()
    }

    fn rebuild_from_sons(&mut self, sons: &[&Self], nodes: &mut NodeStore<D>) {
        if !sons.is_empty() {
            for (i, value) in self.internal.iter_mut().enumerate() {
                let sum: f64 = sons.iter().map(|son| son.internal[i].value()).sum();
                value.set_value(sum / sons.len() as f64);
            }
        }
        for (local, &id) in self.node_ids.iter().enumerate() {
            // Nodes the sons did not share may have missed changes made to the sons
            let shared = sons.iter().any(|son| son.node_ids.contains(&id));
            let restored = if shared {
                None
            } else {
                let s = lagrange::node_coordinates::<D>(self.nnode_1d, local);
                son_containing(sons, &s).and_then(|(son, s_son)| son.interpolate_values(&s_son, nodes))
            };
            if let Some(node) = nodes.get_mut(id) {
                node.set_obsolete(false);
                if let Some(values) = restored {
                    for (value, v) in node.values_mut().iter_mut().zip(values) {
                        if !value.is_pinned() {
                            value.set_value(v);
                        }
                    }
                }
            }
        }
        self.state = ElementState::Active;
    }

    fn unbuild(&mut self, nodes: &mut NodeStore<D>) {
        for &id in &self.node_ids {
            if let Some(node) = nodes.get_mut(id) {
                node.set_obsolete(true);
            }
        }
    }

    fn deactivate_element(&mut self) {
        self.state = ElementState::Inactive;
    }
}

impl<const D: usize> NodalElement<D> for QElement<D> {
    fn nnode_1d(&self) -> usize {
        self.nnode_1d
    }

    fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    fn set_node_ids(&mut self, node_ids: Vec<NodeId>) {
        self.node_ids = node_ids;
    }

    fn internal_values(&self) -> &[Value] {
        &self.internal
    }

    fn internal_values_mut(&mut self) -> &mut [Value] {
        &mut self.internal
    }
}

impl<const D: usize> PRefineableElement<D> for QElement<D> {
    fn initial_p_order(&self) -> usize {
        self.initial_nnode_1d
    }

    fn set_p_order(&mut self, nnode_1d: usize) {
        assert!(nnode_1d >= 2, "Lagrange elements need at least two nodes per axis");
        self.nnode_1d = nnode_1d;
        self.node_ids.clear();
    }

    fn to_be_p_refined(&self) -> bool {
        self.p_refine
    }

    fn select_for_p_refinement(&mut self) {
        self.p_refine = true;
    }

    fn deselect_for_p_refinement(&mut self) {
        self.p_refine = false;
    }

    fn to_be_p_unrefined(&self) -> bool {
        self.p_unrefine
    }

    fn select_for_p_unrefinement(&mut self) {
        self.p_unrefine = true;
    }

    fn deselect_for_p_unrefinement(&mut self) {
        self.p_unrefine = false;
    }
}
