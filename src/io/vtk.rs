//! Export of the active elements of a forest to legacy VTK files.
use crate::element::RefineableElement;
use crate::forest::TreeForest;
use crate::topology::corner_coordinates;
use crate::tree::TreeId;
use eyre::eyre;
use std::path::Path;
use vtkio::model::{
    ByteOrder, CellType, Cells, DataSet, Piece, UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

/// VTK cell type of a leaf of a `D`-dimensional forest.
fn cell_type(dim: usize) -> CellType {
    match dim {
        1 => CellType::Line,
        2 => CellType::Quad,
        3 => CellType::Hexahedron,
        _ => panic!("Unable to export {}-dimensional cells to VTK", dim),
    }
}

/// Corner `i` of the VTK cell is corner `order[i]` of the leaf.
///
/// Leaf corners are lexicographic, VTK quads and hexahedra are counter-clockwise.
fn vtk_corner_order(dim: usize) -> &'static [usize] {
    match dim {
        1 => &[0, 1],
        2 => &[0, 1, 3, 2],
        3 => &[0, 1, 3, 2, 4, 5, 7, 6],
        _ => panic!("Unable to export {}-dimensional cells to VTK", dim),
    }
}

/// Builds a VTK data set with one cell per leaf of a forest.
///
/// Leaves do not share points, so that the output shows the elements as they are, including
/// hanging nodes and mismatched faces.
pub struct LeafDataSetBuilder<'a, E, const D: usize> {
    forest: &'a TreeForest<E, D>,

    // Only used for exporting directly to file
    title: Option<String>,
}

impl<'a, E, const D: usize> LeafDataSetBuilder<'a, E, D>
where
    E: RefineableElement,
{
    pub fn from_forest(forest: &'a TreeForest<E, D>) -> Self {
        Self { forest, title: None }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            forest: self.forest,
            title: Some(title.into()),
        }
    }

    pub fn try_build(&self) -> eyre::Result<DataSet> {
        assert!(D <= 3, "Unable to support dimensions larger than 3.");
        let leaves: Vec<TreeId> = self.forest.leaves();
        let order = vtk_corner_order(D);

        let mut points = Vec::with_capacity(3 * order.len() * leaves.len());
        // Vertices is laid out as follows: N, i_1, i_2, ... i_N,
        // so for e.g. quads this becomes 4 followed by the four indices making up the quad
        let mut vertices = Vec::with_capacity((order.len() + 1) * leaves.len());
        let mut cell_types = Vec::with_capacity(leaves.len());
        for &leaf in &leaves {
            vertices.push(u32::try_from(order.len())?);
            for &corner in order {
                let x = self.forest.global_position(leaf, &corner_coordinates::<D>(corner));
                let index = points.len() / 3;
                points.extend_from_slice(x.coords.as_slice());
                points.resize(points.len() + 3 - D, 0.0);
                vertices.push(
                    u32::try_from(index).map_err(|_| eyre!("Too many points for a VTK file: {}", index))?,
                );
            }
            cell_types.push(cell_type(D));
        }

        let piece = UnstructuredGridPiece {
            points: points.into(),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: u32::try_from(leaves.len())?,
                    vertices,
                },
                types: cell_types,
            },
            data: Default::default(),
        };

        Ok(DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        })
    }

    /// Convenience function for directly exporting the dataset to a file.
    pub fn try_export(&self, filename: impl AsRef<Path>) -> eyre::Result<()> {
        let filepath = filename.as_ref();
        let fallback_title = filepath
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        let dataset = self.try_build()?;
        Vtk {
            version: Version { major: 4, minor: 1 },
            // If we don't have a title then just make the filepath the title
            title: self.title.clone().unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(filepath)
        .map_err(|err| eyre!("Failed to export VTK file {}: {:?}", filepath.display(), err))?;
        Ok(())
    }
}
