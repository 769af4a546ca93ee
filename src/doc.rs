//! Diagnostic output: neighbour and hanging node reports.
//!
//! Reports are plain text and meant for humans. Whether anything is written is controlled by
//! a [`DocInfo`], so that diagnostics can stay in place in production code and be switched on
//! when needed.
use crate::element::{NodalElement, RefineableElement};
use crate::forest::TreeForest;
use crate::io::vtk::LeafDataSetBuilder;
use crate::mesh::RefineableMesh;
use crate::node::NodeStore;
use crate::topology::Face;
use eyre::{eyre, WrapErr};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where and whether to write diagnostic output.
///
/// Output files are numbered, so that a sequence of adaptation steps can be documented into
/// the same directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocInfo {
    directory: PathBuf,
    number: usize,
    doc_enabled: bool,
}

impl DocInfo {
    /// Documentation into `directory`, enabled, starting at number zero.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            number: 0,
            doc_enabled: true,
        }
    }

    /// A `DocInfo` that suppresses all output.
    pub fn disabled() -> Self {
        Self {
            directory: PathBuf::from("."),
            number: 0,
            doc_enabled: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn set_number(&mut self, number: usize) {
        self.number = number;
    }

    pub fn increment_number(&mut self) {
        self.number += 1;
    }

    pub fn is_doc_enabled(&self) -> bool {
        self.doc_enabled
    }

    pub fn enable_doc(&mut self) {
        self.doc_enabled = true;
    }

    pub fn disable_doc(&mut self) {
        self.doc_enabled = false;
    }

    /// The path `<directory>/<stem><number>.<extension>`.
    pub fn file_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}.{}", stem, self.number, extension))
    }

    fn create_file(&self, stem: &str, extension: &str) -> eyre::Result<(PathBuf, BufWriter<File>)> {
        create_dir_all(&self.directory)
            .wrap_err_with(|| format!("Failed to create output directory {}", self.directory.display()))?;
        let path = self.file_path(stem, extension);
        let file = File::create(&path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        Ok((path, BufWriter::new(file)))
    }
}

impl<E, const D: usize> TreeForest<E, D>
where
    E: RefineableElement,
{
    /// Writes one line per tree node and face: the neighbour found, the level difference,
    /// the neighbour's face, the corners of the shared face in the neighbour's coordinates and
    /// the self-test error of the face. Faces whose error exceeds the tolerance of the forest
    /// are marked `FAILED`.
    pub fn doc_neighbours<W: Write>(&self, writer: &mut W) -> eyre::Result<()> {
        let mut nodes = Vec::new();
        self.stick_all_tree_nodes_into_vector(&mut nodes);
        for id in nodes {
            let node = self.arena().node(id);
            for face in Face::<D>::all() {
                match self.gteq_face_neighbour(id, face) {
                    Some(info) => {
                        let error = self.face_error(id, face, &info);
                        let status = if error > self.tolerance() { " FAILED" } else { "" };
                        writeln!(
                            writer,
                            "{} root {} level {} face {}: neighbour {} face {} diff_level {} \
                             other_tree {} s_lo {:?} s_hi {:?} translate_s {:?} error {:e}{}",
                            id,
                            node.root(),
                            node.level(),
                            face,
                            info.neighbour,
                            info.face,
                            info.diff_level,
                            info.in_neighbouring_tree,
                            info.s_lo,
                            info.s_hi,
                            info.translate_s,
                            error,
                            status
                        )?
                    }
                    None => writeln!(
                        writer,
                        "{} root {} level {} face {}: boundary",
                        id,
                        node.root(),
                        node.level(),
                        face
                    )?,
                }
            }
        }
        Ok(())
    }

    /// Runs the neighbour self-test on the whole forest and returns the largest discrepancy.
    ///
    /// If documentation is enabled, the neighbour report is written to `neighbours<N>.txt`
    /// and the active elements to `neighbours<N>.vtk`. Fails if the discrepancy exceeds the
    /// tolerance of the forest, after the files have been written.
    pub fn check_all_neighbours(&self, doc_info: &DocInfo) -> eyre::Result<f64> {
        if doc_info.is_doc_enabled() {
            let (path, mut writer) = doc_info.create_file("neighbours", "txt")?;
            self.doc_neighbours(&mut writer)
                .wrap_err_with(|| format!("Failed to write neighbour report to {}", path.display()))?;
            writer.flush()?;

            let vtk_path = doc_info.file_path("neighbours", "vtk");
            LeafDataSetBuilder::from_forest(self)
                .with_title(format!("neighbours{}", doc_info.number()))
                .try_export(&vtk_path)?;
            info!("Wrote neighbour report to {}", path.display());
        }

        match self.self_test() {
            Ok(max_error) => Ok(max_error),
            Err(err) => {
                warn!("{}", err);
                Err(eyre!(err))
            }
        }
    }
}

impl<E, const D: usize> RefineableMesh<E, D>
where
    E: RefineableElement<Context = NodeStore<D>> + NodalElement<D>,
{
    /// Writes one line per hanging node: its position followed by its masters and weights.
    pub fn doc_hanging_nodes<W: Write>(&self, writer: &mut W) -> eyre::Result<()> {
        for id in self.hanging_nodes() {
            let node = self.node(id);
            write!(writer, "{} at {:?}:", id, node.position().coords.as_slice())?;
            if let Some(hang) = node.hang_info() {
                for &(master, weight) in hang.masters() {
                    write!(writer, " {} ({:.6})", master, weight)?;
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Writes the hanging node report to `hanging_nodes<N>.txt` if documentation is enabled.
    pub fn doc_hanging_nodes_to_file(&self, doc_info: &DocInfo) -> eyre::Result<()> {
        if !doc_info.is_doc_enabled() {
            return Ok(());
        }
        let (path, mut writer) = doc_info.create_file("hanging_nodes", "txt")?;
        self.doc_hanging_nodes(&mut writer)
            .wrap_err_with(|| format!("Failed to write hanging node report to {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}
