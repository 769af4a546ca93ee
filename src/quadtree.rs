//! Compass names for two-dimensional trees.
//!
//! Edges are named `N`, `E`, `S`, `W` and sons `SW`, `SE`, `NW`, `NE`, with `x` pointing east
//! and `y` pointing north in the local frame of every root.
use crate::element::RefineableElement;
use crate::forest::{TreeForest, TreeRoot};
use crate::neighbour::NeighbourInfo;
use crate::topology::{Face, SonType};
use crate::tree::TreeId;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QuadDirection {
    N,
    E,
    S,
    W,
}

/// `ROTATE[k][d]` is direction `d` turned clockwise by `k` quarter turns, with both indices in
/// the order of [`QuadDirection::ALL`].
const ROTATE: [[QuadDirection; 4]; 4] = {
    use QuadDirection::{E, N, S, W};
    [[N, E, S, W], [E, S, W, N], [S, W, N, E], [W, N, E, S]]
};

impl QuadDirection {
    /// Directions in clockwise order, starting at north.
    pub const ALL: [QuadDirection; 4] = [Self::N, Self::E, Self::S, Self::W];

    fn clockwise_index(self) -> usize {
        match self {
            Self::N => 0,
            Self::E => 1,
            Self::S => 2,
            Self::W => 3,
        }
    }

    pub fn face(self) -> Face<2> {
        match self {
            Self::N => Face::new(1, true),
            Self::E => Face::new(0, true),
            Self::S => Face::new(1, false),
            Self::W => Face::new(0, false),
        }
    }

    pub fn from_face(face: Face<2>) -> Self {
        match (face.axis(), face.is_positive()) {
            (0, true) => Self::E,
            (0, false) => Self::W,
            (_, true) => Self::N,
            (_, false) => Self::S,
        }
    }

    pub fn reflect(self) -> Self {
        match self {
            Self::N => Self::S,
            Self::E => Self::W,
            Self::S => Self::N,
            Self::W => Self::E,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::N => "N",
            Self::E => "E",
            Self::S => "S",
            Self::W => "W",
        }
    }
}

impl fmt::Display for QuadDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QuadSonType {
    SW,
    SE,
    NW,
    NE,
}

impl QuadSonType {
    pub const ALL: [QuadSonType; 4] = [QuadSonType::SW, QuadSonType::SE, QuadSonType::NW, QuadSonType::NE];

    pub fn son_type(self) -> SonType<2> {
        SonType::from_index(self as usize)
    }

    pub fn from_son_type(son_type: SonType<2>) -> Self {
        Self::ALL[son_type.index()]
    }

    pub fn name(self) -> &'static str {
        match self {
            QuadSonType::SW => "SW",
            QuadSonType::SE => "SE",
            QuadSonType::NW => "NW",
            QuadSonType::NE => "NE",
        }
    }
}

/// Turns `direction` as prescribed by the north equivalent of a neighbouring root.
///
/// If the neighbour's north equivalent of my north is `new_north`, then `rotate(new_north, d)`
/// is the neighbour's name for my direction `d`. Only valid for connections that do not
/// reflect, which is the case for consistently oriented quadrilaterals.
pub fn rotate(new_north: QuadDirection, direction: QuadDirection) -> QuadDirection {
    ROTATE[new_north.clockwise_index()][direction.clockwise_index()]
}

impl TreeRoot<2> {
    /// The direction of the neighbour across `direction` that corresponds to my north.
    ///
    /// Returns `N` if there is no neighbour in that direction.
    pub fn north_equivalent(&self, direction: QuadDirection) -> QuadDirection {
        self.neighbour(direction.face())
            .map(|n| QuadDirection::from_face(n.orientation().map_face(QuadDirection::N.face())))
            .unwrap_or(QuadDirection::N)
    }

    /// The clockwise angle in degrees by which the north equivalent across `direction` is
    /// turned away from my north.
    pub fn rotation_angle(&self, direction: QuadDirection) -> usize {
        90 * self.north_equivalent(direction).clockwise_index()
    }

    /// The direction in which the root with index `other` is a neighbour, if it is one.
    pub fn direction_of_neighbour(&self, other: usize) -> Option<QuadDirection> {
        QuadDirection::ALL.into_iter().find(|&direction| {
            self.neighbour(direction.face())
                .map(|n| n.root() == other)
                .unwrap_or(false)
        })
    }
}

impl<E> TreeForest<E, 2>
where
    E: RefineableElement,
{
    /// The greater-or-equal-sized neighbour across the edge in the given direction.
    pub fn gteq_edge_neighbour(&self, id: TreeId, direction: QuadDirection) -> Option<NeighbourInfo<2>> {
        self.gteq_face_neighbour(id, direction.face())
    }

    pub fn quad_son_type(&self, id: TreeId) -> Option<QuadSonType> {
        self.arena()
            .node(id)
            .son_type()
            .map(QuadSonType::from_son_type)
    }
}
