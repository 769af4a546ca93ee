//! Names for three-dimensional trees.
//!
//! Faces are `L`/`R` along `x`, `D`/`U` along `y` and `B`/`F` along `z`. Sons are named by the
//! three faces of the father they touch, from `LDB` to `RUF`.
use crate::element::RefineableElement;
use crate::forest::{TreeForest, TreeRoot};
use crate::neighbour::NeighbourInfo;
use crate::topology::{Face, SonType};
use crate::tree::TreeId;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OctDirection {
    L,
    R,
    D,
    U,
    B,
    F,
}

impl OctDirection {
    /// Directions in face index order.
    pub const ALL: [OctDirection; 6] = [
        OctDirection::L,
        OctDirection::R,
        OctDirection::D,
        OctDirection::U,
        OctDirection::B,
        OctDirection::F,
    ];

    pub fn face(self) -> Face<3> {
        Face::from_index(self as usize)
    }

    pub fn from_face(face: Face<3>) -> Self {
        Self::ALL[face.index()]
    }

    pub fn reflect(self) -> Self {
        Self::from_face(self.face().opposite())
    }

    pub fn name(self) -> &'static str {
        ["L", "R", "D", "U", "B", "F"][self as usize]
    }
}

impl fmt::Display for OctDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OctSonType {
    LDB,
    RDB,
    LUB,
    RUB,
    LDF,
    RDF,
    LUF,
    RUF,
}

impl OctSonType {
    pub const ALL: [OctSonType; 8] = [
        OctSonType::LDB,
        OctSonType::RDB,
        OctSonType::LUB,
        OctSonType::RUB,
        OctSonType::LDF,
        OctSonType::RDF,
        OctSonType::LUF,
        OctSonType::RUF,
    ];

    pub fn son_type(self) -> SonType<3> {
        SonType::from_index(self as usize)
    }

    pub fn from_son_type(son_type: SonType<3>) -> Self {
        Self::ALL[son_type.index()]
    }

    /// The faces of the father that the son touches.
    pub fn faces(self) -> [OctDirection; 3] {
        let st = self.son_type();
        let pick = |axis: usize| OctDirection::from_face(Face::new(axis, st.is_high(axis)));
        [pick(0), pick(1), pick(2)]
    }
}

impl TreeRoot<3> {
    /// The face of the neighbour across `direction` that corresponds to my up direction.
    ///
    /// Returns `U` if there is no neighbour in that direction.
    pub fn up_equivalent(&self, direction: OctDirection) -> OctDirection {
        self.equivalent(direction, OctDirection::U)
    }

    /// The face of the neighbour across `direction` that corresponds to my right direction.
    ///
    /// Returns `R` if there is no neighbour in that direction.
    pub fn right_equivalent(&self, direction: OctDirection) -> OctDirection {
        self.equivalent(direction, OctDirection::R)
    }

    fn equivalent(&self, direction: OctDirection, mine: OctDirection) -> OctDirection {
        self.neighbour(direction.face())
            .map(|n| OctDirection::from_face(n.orientation().map_face(mine.face())))
            .unwrap_or(mine)
    }

    pub fn direction_of_neighbour(&self, other: usize) -> Option<OctDirection> {
        OctDirection::ALL.into_iter().find(|&direction| {
            self.neighbour(direction.face())
                .map(|n| n.root() == other)
                .unwrap_or(false)
        })
    }
}

impl<E> TreeForest<E, 3>
where
    E: RefineableElement,
{
    pub fn gteq_oct_face_neighbour(&self, id: TreeId, direction: OctDirection) -> Option<NeighbourInfo<3>> {
        self.gteq_face_neighbour(id, direction.face())
    }

    pub fn oct_son_type(&self, id: TreeId) -> Option<OctSonType> {
        self.arena()
            .node(id)
            .son_type()
            .map(OctSonType::from_son_type)
    }
}
