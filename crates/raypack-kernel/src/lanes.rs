//! Fixed-width lane containers and lane masks.
//!
//! A packet is `PACKET_WIDTH` rays stored as structure-of-arrays. All lane
//! arithmetic is written as plain per-lane loops over `[T; PACKET_WIDTH]`
//! so the compiler is free to vectorize it.

use raypack_math::Vec3;

/// Number of rays in a packet.
pub const PACKET_WIDTH: usize = 16;

const _: () = assert!(PACKET_WIDTH >= 1 && PACKET_WIDTH <= 32);

/// One value per lane.
pub type Lanes<T> = [T; PACKET_WIDTH];

/// A set of lanes, one bit per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LaneMask(u32);

impl LaneMask {
    /// No lane set.
    pub const NONE: Self = Self(0);

    /// Every lane set.
    pub const ALL: Self = Self(if PACKET_WIDTH == 32 {
        u32::MAX
    } else {
        (1u32 << PACKET_WIDTH) - 1
    });

    /// Mask containing only `lane`.
    #[inline]
    pub fn single(lane: usize) -> Self {
        debug_assert!(lane < PACKET_WIDTH);
        Self(1 << lane)
    }

    /// Build a mask from a per-lane predicate.
    #[inline]
    pub fn from_fn(mut f: impl FnMut(usize) -> bool) -> Self {
        let mut bits = 0u32;
        for lane in 0..PACKET_WIDTH {
            if f(lane) {
                bits |= 1 << lane;
            }
        }
        Self(bits)
    }

    /// Build a mask from per-lane flags.
    pub fn from_bools(flags: &Lanes<bool>) -> Self {
        Self::from_fn(|lane| flags[lane])
    }

    /// Raw bits; lane `i` is bit `i`.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// At least one lane set.
    #[inline]
    pub fn any(self) -> bool {
        self.0 != 0
    }

    /// No lane set.
    #[inline]
    pub fn none(self) -> bool {
        self.0 == 0
    }

    /// Every lane set.
    #[inline]
    pub fn all(self) -> bool {
        self.0 == Self::ALL.0
    }

    /// Number of lanes set.
    #[inline]
    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether `lane` is set.
    #[inline]
    pub fn contains(self, lane: usize) -> bool {
        self.0 & (1 << lane) != 0
    }

    /// Set `lane`.
    #[inline]
    pub fn insert(&mut self, lane: usize) {
        self.0 |= 1 << lane;
    }

    /// Clear `lane`.
    #[inline]
    pub fn remove(&mut self, lane: usize) {
        self.0 &= !(1 << lane);
    }

    /// Lanes in `self` but not in `other`.
    #[inline]
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterate set lanes in ascending order.
    #[inline]
    pub fn iter(self) -> LaneIter {
        LaneIter(self.0)
    }
}

impl std::ops::BitAnd for LaneMask {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::ops::BitOr for LaneMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for LaneMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAndAssign for LaneMask {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl std::ops::Not for LaneMask {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl IntoIterator for LaneMask {
    type Item = usize;
    type IntoIter = LaneIter;

    fn into_iter(self) -> LaneIter {
        self.iter()
    }
}

/// Iterator over the set lanes of a [`LaneMask`], lowest lane first.
#[derive(Debug, Clone)]
pub struct LaneIter(u32);

impl Iterator for LaneIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let lane = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(lane)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for LaneIter {}

/// Per-lane comparison `a > b`, restricted to `within`.
#[inline]
pub(crate) fn gt(within: LaneMask, a: &Lanes<f32>, b: &Lanes<f32>) -> LaneMask {
    LaneMask::from_fn(|lane| within.contains(lane) && a[lane] > b[lane])
}

/// Lanes of `within` whose finite entry distance `dist` is at most `tfar`.
///
/// Missed lanes carry `+inf` and never reach, even with an unbounded `tfar`.
#[inline]
pub(crate) fn reaches(within: LaneMask, dist: &Lanes<f32>, tfar: &Lanes<f32>) -> LaneMask {
    LaneMask::from_fn(|lane| {
        within.contains(lane) && dist[lane] <= tfar[lane] && dist[lane] < f32::INFINITY
    })
}

/// Three-component vectors stored as one lane array per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3Lanes {
    /// X components.
    pub x: Lanes<f32>,
    /// Y components.
    pub y: Lanes<f32>,
    /// Z components.
    pub z: Lanes<f32>,
}

impl Vec3Lanes {
    /// Every lane set to `v`.
    pub fn splat(v: Vec3) -> Self {
        Self {
            x: [v.x; PACKET_WIDTH],
            y: [v.y; PACKET_WIDTH],
            z: [v.z; PACKET_WIDTH],
        }
    }

    /// Read one lane.
    #[inline]
    pub fn get(&self, lane: usize) -> Vec3 {
        Vec3::new(self.x[lane], self.y[lane], self.z[lane])
    }

    /// Write one lane.
    #[inline]
    pub fn set(&mut self, lane: usize, v: Vec3) {
        self.x[lane] = v.x;
        self.y[lane] = v.y;
        self.z[lane] = v.z;
    }
}

impl Default for Vec3Lanes {
    fn default() -> Self {
        Self::splat(Vec3::zeros())
    }
}
