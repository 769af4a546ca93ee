//! Dimension-generic direction algebra for hierarchical trees.
//!
//! A tree of dimension `D` subdivides the reference box `[-1, 1]^D`. Its faces are identified
//! by an axis and a side, its sons by a bit mask whose bit `i` is set when the son occupies the
//! upper half of the box along axis `i`. The relative orientation of two neighbouring roots is a
//! signed permutation of the coordinate axes. All of this is plain arithmetic, so the
//! direction tables that drive the neighbour search are compile-time constants.
use std::fmt;

/// A face of the reference box `[-1, 1]^D`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Face<const D: usize> {
    axis: usize,
    positive: bool,
}

impl<const D: usize> Face<D> {
    /// The number of faces of the reference box.
    pub const COUNT: usize = 2 * D;

    pub fn new(axis: usize, positive: bool) -> Self {
        assert!(axis < D, "Axis {} out of bounds for dimension {}", axis, D);
        Self { axis, positive }
    }

    /// Faces are numbered `2 * axis + side`, with the negative side first.
    pub fn from_index(index: usize) -> Self {
        assert!(index < Self::COUNT, "Face index {} out of bounds for dimension {}", index, D);
        Self {
            axis: index / 2,
            positive: index % 2 == 1,
        }
    }

    pub fn index(&self) -> usize {
        2 * self.axis + self.positive as usize
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// `1.0` for the positive side, `-1.0` for the negative side.
    pub fn sign(&self) -> f64 {
        if self.positive {
            1.0
        } else {
            -1.0
        }
    }

    pub fn opposite(&self) -> Self {
        Self {
            axis: self.axis,
            positive: !self.positive,
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self::from_index)
    }

    /// The reference coordinate of the face along its normal axis.
    pub fn normal_coordinate(&self) -> f64 {
        self.sign()
    }

    /// Local coordinate where the face starts along axis `i`.
    ///
    /// Along the normal axis the face is degenerate, so the base is the face coordinate
    /// and the step is zero. Along tangential axes the face spans the full interval.
    pub fn s_base(&self, i: usize) -> f64 {
        if i == self.axis {
            self.sign()
        } else {
            -1.0
        }
    }

    /// Extent of the face along axis `i`, see [`Face::s_base`].
    pub fn s_step(&self, i: usize) -> f64 {
        if i == self.axis {
            0.0
        } else {
            2.0
        }
    }

    /// Indices of the box corners that lie on this face, in increasing order.
    pub fn corners(&self) -> impl Iterator<Item = usize> {
        let face = *self;
        (0..(1usize << D)).filter(move |&c| ((c >> face.axis) & 1 == 1) == face.positive)
    }
}

impl<const D: usize> fmt::Display for Face<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let side = if self.positive { '+' } else { '-' };
        write!(f, "{}{}", side, self.axis)
    }
}

/// The slot a son occupies within its father.
///
/// Bit `i` of the son type is set when the son covers the upper half of its father along
/// axis `i`. The son types are therefore ordered lexicographically with the first axis
/// varying fastest, which is also the order in which sons are stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SonType<const D: usize>(u8);

impl<const D: usize> SonType<D> {
    /// The number of sons of a node.
    pub const COUNT: usize = 1 << D;

    pub fn from_index(index: usize) -> Self {
        assert!(index < Self::COUNT, "Son type {} out of bounds for dimension {}", index, D);
        Self(index as u8)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self::from_index)
    }

    /// Whether the son covers the upper half of the father along the given axis.
    pub fn is_high(&self, axis: usize) -> bool {
        (self.0 >> axis) & 1 == 1
    }

    /// The son type mirrored across the father's mid-plane normal to `axis`.
    pub fn reflect(&self, axis: usize) -> Self {
        Self(self.0 ^ (1 << axis))
    }

    /// Whether the given face of the son lies on the boundary of the father.
    pub fn touches(&self, face: Face<D>) -> bool {
        self.is_high(face.axis()) == face.is_positive()
    }

    /// Whether the given face of the son is interior to the father, i.e. shared with a sibling.
    pub fn is_inner_face(&self, face: Face<D>) -> bool {
        !self.touches(face)
    }

    /// The centre of the son's box in the local coordinates of its father.
    pub fn centre_in_father(&self) -> [f64; D] {
        let mut centre = [0.0; D];
        for (i, c) in centre.iter_mut().enumerate() {
            *c = if self.is_high(i) { 0.5 } else { -0.5 };
        }
        centre
    }
}

/// A signed permutation of coordinate axes relating the local frames of two neighbouring roots.
///
/// Axis `i` of the source frame is mapped to axis `perm[i]` of the target frame, reversed if
/// `flip[i]` is set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Orientation<const D: usize> {
    perm: [usize; D],
    flip: [bool; D],
}

impl<const D: usize> Orientation<D> {
    pub fn identity() -> Self {
        let mut perm = [0; D];
        for (i, p) in perm.iter_mut().enumerate() {
            *p = i;
        }
        Self { perm, flip: [false; D] }
    }

    /// Returns `None` if `perm` is not a permutation of `0 .. D`.
    pub fn try_from_parts(perm: [usize; D], flip: [bool; D]) -> Option<Self> {
        let mut visited = [false; D];
        for &p in &perm {
            if p >= D || visited[p] {
                return None;
            }
            visited[p] = true;
        }
        Some(Self { perm, flip })
    }

    pub fn perm(&self) -> &[usize; D] {
        &self.perm
    }

    pub fn flip(&self) -> &[bool; D] {
        &self.flip
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn inverse(&self) -> Self {
        let mut perm = [0; D];
        let mut flip = [false; D];
        for i in 0..D {
            perm[self.perm[i]] = i;
            flip[self.perm[i]] = self.flip[i];
        }
        Self { perm, flip }
    }

    /// Composition `other ∘ self`: first apply `self`, then `other`.
    pub fn then(&self, other: &Self) -> Self {
        let mut perm = [0; D];
        let mut flip = [false; D];
        for i in 0..D {
            perm[i] = other.perm[self.perm[i]];
            flip[i] = self.flip[i] ^ other.flip[self.perm[i]];
        }
        Self { perm, flip }
    }

    pub fn map_face(&self, face: Face<D>) -> Face<D> {
        let a = face.axis();
        Face::new(self.perm[a], face.is_positive() ^ self.flip[a])
    }

    pub fn map_son_type(&self, son_type: SonType<D>) -> SonType<D> {
        let mut bits = 0u8;
        for i in 0..D {
            if son_type.is_high(i) ^ self.flip[i] {
                bits |= 1 << self.perm[i];
            }
        }
        SonType(bits)
    }

    /// Maps a direction vector (no translation) from the source frame to the target frame.
    pub fn map_vector(&self, x: &[f64; D]) -> [f64; D] {
        let mut y = [0.0; D];
        for i in 0..D {
            y[self.perm[i]] = if self.flip[i] { -x[i] } else { x[i] };
        }
        y
    }

    /// Maps local root coordinates across the face `across` into the neighbouring root's frame.
    ///
    /// The source root occupies `[-1, 1]^D`, so a point beyond the face `across` is first
    /// translated by two units back into the reference box before the axes are permuted.
    pub fn map_local(&self, x: &[f64; D], across: Face<D>) -> [f64; D] {
        let mut shifted = *x;
        shifted[across.axis()] -= 2.0 * across.sign();
        self.map_vector(&shifted)
    }

    /// Maps integer lattice coordinates in `[0, extent]^D` across the face `across`.
    pub fn map_lattice(&self, u: &[i64; D], across: Face<D>, extent: i64) -> [i64; D] {
        let mut shifted = *u;
        if across.is_positive() {
            shifted[across.axis()] -= extent;
        } else {
            shifted[across.axis()] += extent;
        }
        let mut v = [0; D];
        for i in 0..D {
            v[self.perm[i]] = if self.flip[i] { extent - shifted[i] } else { shifted[i] };
        }
        v
    }

    /// Maps the integer index of a cell at some level across the face `across`.
    ///
    /// `n` is the number of cells per axis at that level. Cell indices are offsets of the
    /// lower cell corner, so a reversed axis maps `u` to `n - 1 - u`.
    pub fn map_cell_index(&self, u: &[i64; D], across: Face<D>, n: i64) -> [i64; D] {
        let mut shifted = *u;
        if across.is_positive() {
            shifted[across.axis()] -= n;
        } else {
            shifted[across.axis()] += n;
        }
        let mut v = [0; D];
        for i in 0..D {
            v[self.perm[i]] = if self.flip[i] { n - 1 - shifted[i] } else { shifted[i] };
        }
        v
    }
}

impl<const D: usize> Default for Orientation<D> {
    fn default() -> Self {
        Self::identity()
    }
}

/// The basis function of the multilinear map associated with box corner `corner`,
/// evaluated at the local coordinate `x`.
pub fn corner_weight<const D: usize>(corner: usize, x: &[f64; D]) -> f64 {
    (0..D)
        .map(|i| {
            if (corner >> i) & 1 == 1 {
                0.5 * (1.0 + x[i])
            } else {
                0.5 * (1.0 - x[i])
            }
        })
        .product()
}

/// The local coordinates of box corner `corner`.
pub fn corner_coordinates<const D: usize>(corner: usize) -> [f64; D] {
    let mut x = [0.0; D];
    for (i, xi) in x.iter_mut().enumerate() {
        *xi = if (corner >> i) & 1 == 1 { 1.0 } else { -1.0 };
    }
    x
}
