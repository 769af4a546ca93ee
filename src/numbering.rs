//! Global equation numbering of free values.
//!
//! Every value of an active element is classified once per numbering pass: pinned values and
//! constrained values of hanging nodes get no equation of their own, all other values are
//! numbered consecutively. The order follows the leaves of the forest (roots in order, each tree in
//! preorder), within each leaf the nodes in local order followed by the internal values, so
//! repeated passes over an unchanged mesh produce identical numberings.
use crate::element::{NodalElement, RefineableElement};
use crate::mesh::RefineableMesh;
use crate::node::{Eqn, NodeId, NodeStore, Value};
use crate::tree::TreeId;
use log::info;
use nalgebra::DVector;
use std::error::Error;
use std::fmt;

/// Source of consecutive equation numbers.
///
/// A counter can be shared between several numbering passes, e.g. to number several meshes
/// into one global system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EqnCounter {
    next: usize,
}

impl EqnCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter that hands out numbers starting at `first`.
    pub fn starting_at(first: usize) -> Self {
        Self { next: first }
    }

    pub fn next_eqn(&mut self) -> usize {
        let eqn = self.next;
        self.next += 1;
        eqn
    }

    /// The number the counter will hand out next, i.e. the number of equations so far.
    pub fn count(&self) -> usize {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumberingError {
    PinnedAndHanging { node: NodeId, value: usize },
    EmptyMasterList { node: NodeId },
    /// A master of a hanging node no longer exists.
    MissingMaster { node: NodeId, master: NodeId },
    /// A master of a hanging node is itself hanging.
    UnresolvedMaster { node: NodeId, master: NodeId },
}

impl fmt::Display for NumberingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PinnedAndHanging { node, value } => {
                write!(f, "Value {} of node {} is both pinned and hanging", value, node)
            }
            Self::EmptyMasterList { node } => write!(f, "Hanging node {} has no masters", node),
            Self::MissingMaster { node, master } => write!(
                f,
                "Hanging node {} refers to master {} which does not exist",
                node, master
            ),
            Self::UnresolvedMaster { node, master } => write!(
                f,
                "Hanging node {} refers to master {} which is itself hanging",
                node, master
            ),
        }
    }
}

impl Error for NumberingError {}

fn classify(value: &mut Value, hanging: bool, counter: &mut EqnCounter) {
    if value.eqn() != Eqn::Unassigned {
        return;
    }
    let eqn = if value.is_pinned() {
        Eqn::Pinned
    } else if hanging {
        Eqn::Hanging
    } else {
        Eqn::Free(counter.next_eqn())
    };
    value.set_eqn(eqn);
}

impl<E, const D: usize> RefineableMesh<E, D>
where
    E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
{
    /// Numbers the free values of the mesh from zero. Returns the number of equations.
    pub fn assign_eqn_numbers(&mut self) -> Result<usize, NumberingError> {
        let mut counter = EqnCounter::new();
        self.assign_eqn_numbers_with(&mut counter)
    }

    /// Numbers the free values of the mesh with numbers drawn from `counter`.
    /// Returns the number of equations of this mesh.
    pub fn assign_eqn_numbers_with(&mut self, counter: &mut EqnCounter) -> Result<usize, NumberingError> {
        self.check_hanging_constraints()?;

        for (_, node) in self.nodes_mut().iter_mut() {
            for value in node.values_mut() {
                value.set_eqn(Eqn::Unassigned);
            }
        }

        // Inactive elements lose their numbers too, so a later merge starts unnumbered
        let roots: Vec<TreeId> = self.forest().root_trees().collect();
        for root in roots {
            self.forest_mut().arena_mut().traverse_all_mut(root, |_, element| {
                for value in element.internal_values_mut() {
                    value.set_eqn(Eqn::Unassigned);
                }
            });
        }

        let first = counter.count();
        let leaves = self.leaves();
        for &leaf in &leaves {
            let node_ids = self.element(leaf).node_ids().to_vec();
            for id in node_ids {
                let node = self.node_mut(id);
                let hanging: Vec<bool> = (0..node.nvalue()).map(|k| node.is_value_hanging(k)).collect();
                for (value, hanging) in node.values_mut().iter_mut().zip(hanging) {
                    classify(value, hanging, counter);
                }
            }
            for value in self.element_mut(leaf).internal_values_mut() {
                classify(value, false, counter);
            }
        }

        let neqn = counter.count() - first;
        self.set_numbering(first, neqn);
        info!("Assigned {} equation numbers over {} active elements", neqn, leaves.len());
        Ok(neqn)
    }

    /// Checks that every hanging node has existing, non-hanging masters, and that no value is
    /// both pinned and constrained by its masters.
    ///
    /// Values pinned before the hanging nodes were set up are exempt from the constraint.
    /// Pinning a constrained value afterwards is an error until the constraints are set up again.
    pub fn check_hanging_constraints(&self) -> Result<(), NumberingError> {
        for (id, node) in self.nodes().iter() {
            let Some(hang) = node.hang_info() else {
                continue;
            };
            let pinned_and_hanging = (0..node.nvalue()).find(|&k| node.values()[k].is_pinned() && hang.constrains(k));
            if let Some(value) = pinned_and_hanging {
                return Err(NumberingError::PinnedAndHanging { node: id, value });
            }
            if hang.masters().is_empty() {
                return Err(NumberingError::EmptyMasterList { node: id });
            }
            for &(master, _) in hang.masters() {
                match self.nodes().get(master) {
                    None => return Err(NumberingError::MissingMaster { node: id, master }),
                    Some(m) if m.is_hanging() => {
                        return Err(NumberingError::UnresolvedMaster { node: id, master })
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    /// The equations a nodal value contributes to, with their weights.
    ///
    /// A free value contributes to its own equation, a hanging value to the equations of its
    /// masters and a pinned value to none.
    pub fn value_equations(&self, node: NodeId, value: usize) -> Vec<(usize, f64)> {
        let n = self.node(node);
        match n.values()[value].eqn() {
            Eqn::Free(eqn) => vec![(eqn, 1.0)],
            Eqn::Hanging => n
                .hang_info()
                .map(|hang| {
                    hang.masters()
                        .iter()
                        .filter_map(|&(master, w)| {
                            self.nodes()
                                .get(master)
                                .and_then(|m| m.values()[value].eqn().free_index())
                                .map(|eqn| (eqn, w))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            Eqn::Pinned | Eqn::Unassigned => Vec::new(),
        }
    }

    /// The equations of all local values of an active element: the nodal values node by node,
    /// followed by the internal values.
    pub fn element_equations(&self, leaf: TreeId) -> Vec<Vec<(usize, f64)>> {
        let element = self.element(leaf);
        let mut equations = Vec::new();
        for &id in element.node_ids() {
            for value in 0..self.node(id).nvalue() {
                equations.push(self.value_equations(id, value));
            }
        }
        for value in element.internal_values() {
            equations.push(value.eqn().free_index().map(|eqn| vec![(eqn, 1.0)]).unwrap_or_default());
        }
        equations
    }

    /// Collects the free values into a vector indexed by equation number relative to
    /// [`RefineableMesh::first_eqn`].
    pub fn gather_dofs(&self) -> DVector<f64> {
        let first = self.first_eqn();
        let mut dofs = DVector::zeros(self.neqn());
        let mut gather = |value: &Value| {
            if let Some(eqn) = value.eqn().free_index() {
                dofs[eqn - first] = value.value();
            }
        };
        for (_, node) in self.nodes().iter() {
            node.values().iter().for_each(&mut gather);
        }
        for leaf in self.leaves() {
            self.element(leaf).internal_values().iter().for_each(&mut gather);
        }
        dofs
    }

    /// Writes the free values from a vector laid out as by [`RefineableMesh::gather_dofs`] and
    /// updates the hanging values accordingly.
    pub fn scatter_dofs(&mut self, dofs: &DVector<f64>) {
        assert_eq!(dofs.len(), self.neqn(), "Need one entry per equation");
        let first = self.first_eqn();
        let scatter = |value: &mut Value| {
            if let Some(eqn) = value.eqn().free_index() {
                value.set_value(dofs[eqn - first]);
            }
        };
        for (_, node) in self.nodes_mut().iter_mut() {
            node.values_mut().iter_mut().for_each(scatter);
        }
        for leaf in self.leaves() {
            self.element_mut(leaf).internal_values_mut().iter_mut().for_each(scatter);
        }
        self.update_hanging_values();
    }
}
