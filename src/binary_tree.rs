//! Names for one-dimensional trees: the two ends of a line element are `L` and `R`.
use crate::element::RefineableElement;
use crate::forest::{TreeForest, TreeRoot};
use crate::neighbour::NeighbourInfo;
use crate::topology::{Face, SonType};
use crate::tree::TreeId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryDirection {
    L,
    R,
}

impl BinaryDirection {
    pub const ALL: [BinaryDirection; 2] = [BinaryDirection::L, BinaryDirection::R];

    pub fn face(self) -> Face<1> {
        Face::from_index(self as usize)
    }

    pub fn from_face(face: Face<1>) -> Self {
        Self::ALL[face.index()]
    }

    pub fn reflect(self) -> Self {
        match self {
            BinaryDirection::L => BinaryDirection::R,
            BinaryDirection::R => BinaryDirection::L,
        }
    }

    /// The son of a father that touches this end of it.
    pub fn son_type(self) -> SonType<1> {
        SonType::from_index(self as usize)
    }
}

impl TreeRoot<1> {
    /// The direction of the neighbour across `direction` that corresponds to my right.
    ///
    /// Neighbouring lines can be glued head to head, in which case my right points to the
    /// left of the neighbour.
    pub fn right_equivalent(&self, direction: BinaryDirection) -> BinaryDirection {
        self.neighbour(direction.face())
            .map(|n| BinaryDirection::from_face(n.orientation().map_face(BinaryDirection::R.face())))
            .unwrap_or(BinaryDirection::R)
    }
}

impl<E> TreeForest<E, 1>
where
    E: RefineableElement,
{
    pub fn gteq_end_neighbour(&self, id: TreeId, direction: BinaryDirection) -> Option<NeighbourInfo<1>> {
        self.gteq_face_neighbour(id, direction.face())
    }
}
