//! Hierarchical h-adaptivity for finite element meshes.
//!
//! Every element of the initial (coarse) mesh is the root of a refinement tree: binary trees
//! for lines, quadtrees for quadrilaterals and octrees for hexahedra. The trees together form
//! a [`forest::TreeForest`], whose leaves are the active elements. Neighbours are found
//! across element and root boundaries, also when neighbouring roots use rotated local frames.
//! A [`mesh::RefineableMesh`] additionally owns the nodes of the elements, constrains the
//! hanging nodes that arise where refinement levels differ, and numbers the free values.
pub mod binary_tree;
pub mod doc;
pub mod element;
pub mod forest;
pub mod io;
pub mod mesh;
pub mod neighbour;
pub mod node;
pub mod numbering;
pub mod octree;
pub mod quadtree;
pub mod settings;
pub mod topology;
pub mod tree;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate vtkio;
