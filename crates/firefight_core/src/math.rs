//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation arithmetic uses fixed-point numbers so that identical
//! inputs produce identical results on every platform. Floating-point
//! operations can differ between CPUs, which would break replay and
//! determinism testing.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// 32 bits of integer part, 32 bits of fractional part.
pub type Fixed = I32F32;

/// Build a fixed-point constant from a rational `num / den`.
///
/// Usable in `const` contexts, unlike `Fixed::from_num` on floats.
/// `num << 32` must not overflow `i64`, which holds for every tuning
/// constant in this crate.
#[must_use]
pub const fn fixed_ratio(num: i64, den: i64) -> Fixed {
    Fixed::from_bits((num << 32) / den)
}

/// Square root of two, used as the diagonal step cost in pathfinding.
pub const SQRT_2: Fixed = fixed_ratio(141_421_356, 100_000_000);

/// Serde support for fixed-point numbers.
///
/// Serializes the raw bit representation (i64) to preserve exact
/// precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Fixed-point 2D vector.
///
/// Positions are in world pixels with the origin at the map's top-left
/// corner; agent positions refer to the agent's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Unit vector pointing "down" the map; the default facing for
    /// squads and the player before any movement has happened.
    pub const SOUTH: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ONE,
    };

    /// Squared distance to another point (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize to unit length; the zero vector stays zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Rotate this offset by a unit orientation vector.
    ///
    /// The orientation vector is treated as the "forward" direction:
    /// (1, 0) is the identity, and formation offset tables are authored
    /// with forward along +x.
    #[must_use]
    pub fn rotated_by(self, orientation: Self) -> Self {
        Self {
            x: self.x * orientation.x - self.y * orientation.y,
            y: self.x * orientation.y + self.y * orientation.x,
        }
    }
}

/// Computes the square root of a fixed-point number using binary search.
///
/// 32 iterations give sub-epsilon precision for the coordinate ranges
/// this crate works with (maps up to a few thousand pixels across).
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..32 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    // `high` converges from above; it only still satisfies high² <= value
    // when it sits exactly on the root. Preferring it keeps perfect
    // squares exact (unit vectors must have length exactly one).
    if high.saturating_mul(high) <= value {
        high
    } else {
        low
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<Fixed> for Vec2Fixed {
    type Output = Self;

    fn mul(self, rhs: Fixed) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Axis-aligned rectangle: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left corner.
    pub pos: Vec2Fixed,
    /// Width and height.
    pub size: Vec2Fixed,
}

impl Rect {
    /// Create a rectangle from a top-left corner and a size.
    #[must_use]
    pub const fn new(pos: Vec2Fixed, size: Vec2Fixed) -> Self {
        Self { pos, size }
    }

    /// Center point of the rectangle.
    #[must_use]
    pub fn center(self) -> Vec2Fixed {
        let two = Fixed::from_num(2);
        Vec2Fixed::new(self.pos.x + self.size.x / two, self.pos.y + self.size.y / two)
    }

    /// Grow the rectangle outward by `buffer` on every side.
    #[must_use]
    pub fn inflated(self, buffer: Fixed) -> Self {
        let two = Fixed::from_num(2);
        Self {
            pos: Vec2Fixed::new(self.pos.x - buffer, self.pos.y - buffer),
            size: Vec2Fixed::new(self.size.x + buffer * two, self.size.y + buffer * two),
        }
    }

    /// Check overlap with another rectangle (exclusive edges).
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.pos.x < other.pos.x + other.size.x
            && self.pos.x + self.size.x > other.pos.x
            && self.pos.y < other.pos.y + other.size.y
            && self.pos.y + self.size.y > other.pos.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    #[test]
    fn test_distance_squared() {
        let a = v(3, 0);
        let b = v(0, 4);
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_distance_is_sqrt_of_squared() {
        let a = v(0, 0);
        let b = v(3, 4);
        let epsilon = fixed_ratio(1, 10_000);
        assert!((a.distance(b) - Fixed::from_num(5)).abs() < epsilon);
    }

    #[test]
    fn test_fixed_ratio_exact_halves() {
        assert_eq!(fixed_ratio(1, 2), Fixed::from_num(1) / Fixed::from_num(2));
        assert_eq!(fixed_ratio(7, 1), Fixed::from_num(7));
    }

    #[test]
    fn test_sqrt_unit_is_exact() {
        // Axis-aligned unit vectors must measure exactly one, or
        // summed step lengths drift below integer travel budgets.
        assert_eq!(fixed_sqrt(Fixed::ONE), Fixed::ONE);
        assert_eq!(fixed_sqrt(Fixed::from_num(4)), Fixed::from_num(2));
    }

    #[test]
    fn test_sqrt_error_bound() {
        let epsilon = fixed_ratio(1, 100_000);
        for n in [3i32, 5, 10, 77] {
            let root = fixed_sqrt(Fixed::from_num(n * n));
            assert!((root - Fixed::from_num(n)).abs() < epsilon, "sqrt({})", n * n);
        }
    }

    #[test]
    fn test_sqrt_2_constant() {
        let epsilon = fixed_ratio(1, 1_000_000);
        let computed = fixed_sqrt(Fixed::from_num(2));
        assert!((SQRT_2 - computed).abs() < epsilon);
    }

    #[test]
    fn test_normalize_preserves_direction() {
        let n = v(3, 4).normalize();
        let epsilon = fixed_ratio(1, 10_000);
        assert!((n.dot(n) - Fixed::ONE).abs() < epsilon);
        // 3-4-5 triangle: x/y ratio must survive normalization
        assert!((n.x * Fixed::from_num(4) - n.y * Fixed::from_num(3)).abs() < epsilon);
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_rotation_by_south_swings_offsets() {
        // Forward (0, 1): an offset trailing on -x swings to -y.
        let offset = v(-42, 0);
        let rotated = offset.rotated_by(Vec2Fixed::SOUTH);
        assert_eq!(rotated, Vec2Fixed::new(Fixed::ZERO, Fixed::from_num(-42)));
    }

    #[test]
    fn test_rotation_by_east_unit() {
        let east = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
        let offset = v(5, 7);
        assert_eq!(offset.rotated_by(east), offset);
    }

    #[test]
    fn test_rect_center_and_intersect() {
        let a = Rect::new(v(0, 0), v(10, 10));
        let b = Rect::new(v(9, 9), v(4, 4));
        let c = Rect::new(v(20, 20), v(2, 2));
        assert_eq!(a.center(), v(5, 5));
        assert!(a.intersects(b));
        assert!(!a.intersects(c));
    }

    #[test]
    fn test_rect_inflated_buffer() {
        let a = Rect::new(v(5, 5), v(2, 2));
        let grown = a.inflated(Fixed::from_num(2));
        assert_eq!(grown.pos, v(3, 3));
        assert_eq!(grown.size, v(6, 6));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Normalizing any non-zero vector yields unit length
            /// within fixed-point precision.
            #[test]
            fn prop_normalize_unit_length(x in -2000i32..2000, y in -2000i32..2000) {
                prop_assume!(x != 0 || y != 0);
                let n = v(x, y).normalize();
                let epsilon = fixed_ratio(1, 1000);
                prop_assert!((n.dot(n) - Fixed::ONE).abs() < epsilon);
            }

            /// Rotation by a cardinal unit vector preserves length.
            #[test]
            fn prop_cardinal_rotation_preserves_length(x in -500i32..500, y in -500i32..500) {
                let vec = v(x, y);
                for orientation in [
                    Vec2Fixed::new(Fixed::ONE, Fixed::ZERO),
                    Vec2Fixed::new(Fixed::from_num(-1), Fixed::ZERO),
                    Vec2Fixed::SOUTH,
                    Vec2Fixed::new(Fixed::ZERO, Fixed::from_num(-1)),
                ] {
                    let rotated = vec.rotated_by(orientation);
                    prop_assert_eq!(rotated.dot(rotated), vec.dot(vec));
                }
            }

            /// Distance is symmetric.
            #[test]
            fn prop_distance_symmetric(
                ax in -1000i32..1000, ay in -1000i32..1000,
                bx in -1000i32..1000, by in -1000i32..1000,
            ) {
                let a = v(ax, ay);
                let b = v(bx, by);
                prop_assert_eq!(a.distance(b), b.distance(a));
            }
        }
    }
}
