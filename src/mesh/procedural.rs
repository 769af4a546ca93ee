//! Generators for simple refineable meshes.
use crate::element::{NodalElement, QElement, RefineableElement};
use crate::forest::RootCell;
use crate::mesh::{MeshError, RefineableBrickMesh, RefineableLineMesh, RefineableMesh, RefineableQuadMesh};
use crate::node::NodeStore;
use crate::settings::AdaptivitySettings;
use nalgebra::{Point, Point1, Point2, Point3};

/// Generates an axis-aligned box mesh given a unit length, dimensions as multipliers of the
/// unit length and the number of cells per unit length.
///
/// The box has its lower corner at the origin. Vertices are numbered lexicographically with
/// the first axis varying fastest, and so are the cells.
pub fn create_rectangular_uniform_box_mesh<E, const D: usize>(
    unit_length: f64,
    units: [usize; D],
    cells_per_unit: usize,
    nvalue: usize,
    settings: AdaptivitySettings,
    element_factory: impl FnMut(usize) -> E,
) -> Result<RefineableMesh<E, D>, MeshError>
where
    E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
{
    let cell_size = unit_length / cells_per_unit as f64;
    let mut num_cells = [0; D];
    for i in 0..D {
        num_cells[i] = units[i] * cells_per_unit;
    }
    let mut num_vertices = num_cells;
    for n in num_vertices.iter_mut() {
        *n += 1;
    }

    let total_vertices: usize = if num_cells.contains(&0) {
        0
    } else {
        num_vertices.iter().product()
    };
    let total_cells: usize = num_cells.iter().product();

    let vertices: Vec<Point<f64, D>> = (0..total_vertices)
        .map(|v| {
            let index = unravel(v, &num_vertices);
            let mut p = Point::<f64, D>::origin();
            for i in 0..D {
                p[i] = index[i] as f64 * cell_size;
            }
            p
        })
        .collect();

    let cells: Vec<Vec<usize>> = (0..total_cells)
        .map(|c| {
            let index = unravel(c, &num_cells);
            (0..(1usize << D))
                .map(|corner| {
                    let mut vertex_index = index;
                    for (i, v) in vertex_index.iter_mut().enumerate() {
                        *v += (corner >> i) & 1;
                    }
                    ravel(&vertex_index, &num_vertices)
                })
                .collect()
        })
        .collect();

    RefineableMesh::from_vertices_and_cells(&vertices, &cells, nvalue, settings, element_factory)
}

fn unravel<const D: usize>(mut linear: usize, dims: &[usize; D]) -> [usize; D] {
    let mut index = [0; D];
    for i in 0..D {
        index[i] = linear % dims[i];
        linear /= dims[i];
    }
    index
}

fn ravel<const D: usize>(index: &[usize; D], dims: &[usize; D]) -> usize {
    (0..D).rev().fold(0, |acc, i| acc * dims[i] + index[i])
}

pub fn create_unit_line_refineable_mesh(cells: usize, nnode_1d: usize) -> Result<RefineableLineMesh, MeshError> {
    create_rectangular_uniform_box_mesh(1.0, [1], cells, 1, AdaptivitySettings::default(), |_| {
        QElement::new(nnode_1d, 0)
    })
}

pub fn create_unit_square_refineable_quad_mesh(
    cells_per_dim: usize,
    nnode_1d: usize,
) -> Result<RefineableQuadMesh, MeshError> {
    create_rectangular_uniform_box_mesh(1.0, [1, 1], cells_per_dim, 1, AdaptivitySettings::default(), |_| {
        QElement::new(nnode_1d, 1)
    })
}

pub fn create_unit_box_refineable_brick_mesh(
    cells_per_dim: usize,
    nnode_1d: usize,
) -> Result<RefineableBrickMesh, MeshError> {
    create_rectangular_uniform_box_mesh(1.0, [1, 1, 1], cells_per_dim, 1, AdaptivitySettings::default(), |_| {
        QElement::new(nnode_1d, 1)
    })
}

/// Two unit squares side by side, `[0, 1]^2` and `[1, 2] x [0, 1]`, where the local frame of
/// the second square is rotated by a quarter turn.
///
/// The east edge of the first square is the north edge of the second, so the north of the
/// first square corresponds to the east of the second.
pub fn create_rotated_quad_pair(nnode_1d: usize) -> Result<RefineableQuadMesh, MeshError> {
    let vertices = [
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(0.0, 1.0),
        Point2::new(1.0, 1.0),
        Point2::new(2.0, 0.0),
        Point2::new(2.0, 1.0),
    ];
    let cells = vec![vec![0, 1, 2, 3], vec![4, 5, 1, 3]];
    RefineableMesh::from_vertices_and_cells(&vertices, &cells, 1, AdaptivitySettings::default(), |_| {
        QElement::new(nnode_1d, 1)
    })
}

/// Two unit cubes side by side along `x`, where the local frame of the second cube is rotated
/// by a quarter turn about the `z` axis.
pub fn create_rotated_brick_pair(nnode_1d: usize) -> Result<RefineableBrickMesh, MeshError> {
    let mut vertices = Vec::new();
    for z in [0.0, 1.0] {
        vertices.extend([
            Point3::new(0.0, 0.0, z),
            Point3::new(1.0, 0.0, z),
            Point3::new(0.0, 1.0, z),
            Point3::new(1.0, 1.0, z),
            Point3::new(2.0, 0.0, z),
            Point3::new(2.0, 1.0, z),
        ]);
    }
    // Vertex `v` of the bottom layer sits below vertex `v + 6` of the top layer
    let cells = vec![
        vec![0, 1, 2, 3, 6, 7, 8, 9],
        vec![4, 5, 1, 3, 10, 11, 7, 9],
    ];
    RefineableMesh::from_vertices_and_cells(&vertices, &cells, 1, AdaptivitySettings::default(), |_| {
        QElement::new(nnode_1d, 1)
    })
}

/// A strip of `ncells` unit squares along `x` whose left and right ends are identified.
///
/// With a single cell, the root is its own neighbour across its west and east edges.
pub fn create_periodic_quad_strip(ncells: usize, nnode_1d: usize) -> Result<RefineableQuadMesh, MeshError> {
    assert!(ncells > 0, "A periodic strip needs at least one cell");
    let bottom = |i: usize| i % ncells;
    let top = |i: usize| ncells + i % ncells;
    let cells = (0..ncells)
        .map(|i| RootCell {
            object: QElement::new(nnode_1d, 1),
            corner_vertices: vec![bottom(i), bottom(i + 1), top(i), top(i + 1)],
            corner_positions: vec![
                Point2::new(i as f64, 0.0),
                Point2::new((i + 1) as f64, 0.0),
                Point2::new(i as f64, 1.0),
                Point2::new((i + 1) as f64, 1.0),
            ],
        })
        .collect();
    RefineableMesh::from_root_cells(cells, 1, AdaptivitySettings::default())
}

/// Two unit lines glued head to head at `x = 1`, so that the second line runs backwards.
pub fn create_reversed_line_pair(nnode_1d: usize) -> Result<RefineableLineMesh, MeshError> {
    let vertices = [Point1::new(0.0), Point1::new(1.0), Point1::new(2.0)];
    let cells = vec![vec![0, 1], vec![2, 1]];
    RefineableMesh::from_vertices_and_cells(&vertices, &cells, 1, AdaptivitySettings::default(), |_| {
        QElement::new(nnode_1d, 0)
    })
}
