//! Tensor product Lagrange interpolation on equispaced nodes.
//!
//! Local nodes of an element with `n` nodes per axis are numbered lexicographically, the first
//! axis varying fastest.
use crate::topology::Face;

/// The reference coordinate of node `j` of `nnode_1d` equispaced nodes on `[-1, 1]`.
pub fn node_position_1d(nnode_1d: usize, j: usize) -> f64 {
    assert!(nnode_1d >= 2, "Lagrange elements need at least two nodes per axis");
    -1.0 + 2.0 * j as f64 / (nnode_1d - 1) as f64
}

/// Value of the `j`-th 1D Lagrange polynomial at `s`.
pub fn basis_1d(nnode_1d: usize, j: usize, s: f64) -> f64 {
    let s_j = node_position_1d(nnode_1d, j);
    (0..nnode_1d)
        .filter(|&m| m != j)
        .map(|m| {
            let s_m = node_position_1d(nnode_1d, m);
            (s - s_m) / (s_j - s_m)
        })
        .product()
}

pub fn multi_index<const D: usize>(nnode_1d: usize, local_node: usize) -> [usize; D] {
    let mut index = [0; D];
    let mut rest = local_node;
    for j in index.iter_mut() {
        *j = rest % nnode_1d;
        rest /= nnode_1d;
    }
    debug_assert_eq!(rest, 0, "Local node {} out of bounds", local_node);
    index
}

pub fn linear_index<const D: usize>(nnode_1d: usize, index: &[usize; D]) -> usize {
    index.iter().rev().fold(0, |acc, &j| acc * nnode_1d + j)
}

pub fn node_coordinates<const D: usize>(nnode_1d: usize, local_node: usize) -> [f64; D] {
    let index = multi_index::<D>(nnode_1d, local_node);
    let mut s = [0.0; D];
    for (s_i, &j) in s.iter_mut().zip(index.iter()) {
        *s_i = node_position_1d(nnode_1d, j);
    }
    s
}

/// Values of all `nnode_1d^D` basis functions at `s`.
pub fn shape<const D: usize>(nnode_1d: usize, s: &[f64; D]) -> Vec<f64> {
    let nnode = nnode_1d.pow(D as u32);
    (0..nnode)
        .map(|n| {
            multi_index::<D>(nnode_1d, n)
                .iter()
                .zip(s.iter())
                .map(|(&j, &s_i)| basis_1d(nnode_1d, j, s_i))
                .product()
        })
        .collect()
}

/// The local nodes that lie on the given face, in increasing order.
pub fn face_nodes<const D: usize>(nnode_1d: usize, face: Face<D>) -> Vec<usize> {
    let layer = if face.is_positive() { nnode_1d - 1 } else { 0 };
    (0..nnode_1d.pow(D as u32))
        .filter(|&n| multi_index::<D>(nnode_1d, n)[face.axis()] == layer)
        .collect()
}

/// Interpolates nodal data with the given basis at `s`.
pub fn interpolate<const D: usize>(nnode_1d: usize, nodal_values: &[f64], s: &[f64; D]) -> f64 {
    let phi = shape::<D>(nnode_1d, s);
    assert_eq!(phi.len(), nodal_values.len(), "Need one nodal value per basis function");
    phi.iter().zip(nodal_values).map(|(p, v)| p * v).sum()
}
