//! Geometry primitives: points, axis-aligned rectangles and 2×3 affine
//! matrices in page coordinates (y increases upward).
//!
//! A glyph stream reports two matrices per span: the current transformation
//! matrix (ctm, user space → device space) and the text rendering matrix
//! (trm, font units → user space). The join engine only ever needs the
//! handful of operations collected here.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Planar position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// 2D affine transform `(a, b, c, d, e, f)`.
///
/// Transforming a point computes `(a·x + b·y + e, c·x + d·y + f)`. Reading
/// order and span compatibility only ever compare the 2×2 linear part
/// (a, b, c, d), called "ctm4" throughout: the upstream interpreter emits
/// per-glyph translations that differ by accumulated advances within a single
/// logical run, so `e` and `f` are never meaningful for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Apply the full transform (linear part plus translation) to a point.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.b * p.y + self.e,
            y: self.c * p.x + self.d * p.y + self.f,
        }
    }

    /// Apply only the linear part to a vector (no translation).
    #[inline]
    #[must_use]
    pub fn transform_vector(&self, v: Point) -> Point {
        Point {
            x: self.a * v.x + self.b * v.y,
            y: self.c * v.x + self.d * v.y,
        }
    }

    /// Concatenate with another matrix: the result applies `self` first,
    /// then `other`.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.e * other.a + self.f * other.b + other.e,
            f: self.e * other.c + self.f * other.d + other.f,
        }
    }

    /// Scalar expansion of the linear part: `sqrt(|a·d − b·c|)`.
    ///
    /// Multiplying the trm and ctm expansions yields the effective font size
    /// of a span.
    #[inline]
    #[must_use]
    pub fn expansion(&self) -> f64 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }

    /// Bitwise equality of the linear parts (a, b, c, d).
    #[inline]
    #[must_use]
    pub fn eq4(&self, other: &Self) -> bool {
        self.a.to_bits() == other.a.to_bits()
            && self.b.to_bits() == other.b.to_bits()
            && self.c.to_bits() == other.c.to_bits()
            && self.d.to_bits() == other.d.to_bits()
    }

    /// Lexicographic ordering on the linear parts (a, b, c, d).
    ///
    /// Used by the paragraph comparator to keep paragraphs of different
    /// rotations grouped in a deterministic order.
    #[must_use]
    pub fn cmp4(&self, other: &Self) -> Ordering {
        for (l, r) in [
            (self.a, other.a),
            (self.b, other.b),
            (self.c, other.c),
            (self.d, other.d),
        ] {
            match l.partial_cmp(&r) {
                Some(Ordering::Equal) | None => continue,
                Some(ord) => return ord,
            }
        }
        Ordering::Equal
    }

    /// Inverse of the linear part, with zeroed translation.
    ///
    /// Returns `None` when the determinant is zero; callers fall back to the
    /// identity, which treats the affected text as axis-aligned.
    #[must_use]
    pub fn invert4(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det == 0.0 {
            return None;
        }
        Some(Self {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: 0.0,
            f: 0.0,
        })
    }
}

/// Axis-aligned rectangle as `min`/`max` corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Lower-left corner.
    pub min: Point,
    /// Upper-right corner.
    pub max: Point,
}

impl Default for Rect {
    #[inline]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Rect {
    /// The empty rectangle; union with it is the identity.
    pub const EMPTY: Self = Self {
        min: Point {
            x: f64::INFINITY,
            y: f64::INFINITY,
        },
        max: Point {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        },
    };

    /// Build a rect from corner coordinates.
    #[inline]
    #[must_use]
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    /// True when `min ≤ max` on both axes.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    /// Closed containment test.
    #[inline]
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Half-open containment test (`min ≤ p < max`).
    ///
    /// Cell rects share edges; routing a glyph with this test puts it in
    /// exactly one cell.
    #[inline]
    #[must_use]
    pub fn contains_half_open(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Smallest rect covering both operands.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Largest rect covered by both operands; invalid when they are disjoint.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            min: Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        }
    }

    /// Grow to cover `p`.
    pub fn extend(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Rect grown by `margin` on every side.
    #[must_use]
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_point_applies_translation() {
        let m = Matrix {
            a: 2.0,
            b: 0.0,
            c: 0.0,
            d: 2.0,
            e: 5.0,
            f: -1.0,
        };
        let p = m.transform_point(Point::new(3.0, 4.0));
        assert_eq!(p, Point::new(11.0, 7.0));
    }

    #[test]
    fn transform_vector_ignores_translation() {
        let m = Matrix {
            e: 100.0,
            f: 100.0,
            ..Matrix::IDENTITY
        };
        let v = m.transform_vector(Point::new(1.0, 0.0));
        assert_eq!(v, Point::new(1.0, 0.0));
    }

    #[test]
    fn expansion_of_rotation_is_one() {
        let theta = std::f64::consts::FRAC_PI_4;
        let m = Matrix {
            a: theta.cos(),
            b: theta.sin(),
            c: -theta.sin(),
            d: theta.cos(),
            e: 0.0,
            f: 0.0,
        };
        assert!((m.expansion() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn eq4_ignores_translation() {
        let m1 = Matrix::IDENTITY;
        let m2 = Matrix {
            e: 42.0,
            f: -7.0,
            ..Matrix::IDENTITY
        };
        assert!(m1.eq4(&m2));
        let m3 = Matrix {
            a: 2.0,
            ..Matrix::IDENTITY
        };
        assert!(!m1.eq4(&m3));
    }

    #[test]
    fn cmp4_orders_lexicographically() {
        let m1 = Matrix::IDENTITY;
        let m2 = Matrix {
            b: 1.0,
            ..Matrix::IDENTITY
        };
        assert_eq!(m1.cmp4(&m2), Ordering::Less);
        assert_eq!(m2.cmp4(&m1), Ordering::Greater);
        assert_eq!(m1.cmp4(&m1), Ordering::Equal);
    }

    #[test]
    fn invert4_roundtrip() {
        let m = Matrix {
            a: 0.0,
            b: 1.0,
            c: -1.0,
            d: 0.0,
            e: 10.0,
            f: 20.0,
        };
        let inv = m.invert4().unwrap();
        let v = inv.transform_vector(m.transform_vector(Point::new(3.0, 5.0)));
        assert!((v.x - 3.0).abs() < 1e-12);
        assert!((v.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn invert4_degenerate_is_none() {
        let m = Matrix {
            a: 1.0,
            b: 2.0,
            c: 2.0,
            d: 4.0,
            e: 0.0,
            f: 0.0,
        };
        assert!(m.invert4().is_none());
    }

    #[test]
    fn empty_rect_union_is_identity() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(Rect::EMPTY.union(&r), r);
        assert!(!Rect::EMPTY.is_valid());
    }

    #[test]
    fn intersect_disjoint_is_invalid() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(2.0, 2.0, 3.0, 3.0);
        assert!(!a.intersect(&b).is_valid());
    }

    #[test]
    fn contains_is_closed_on_edges() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(!r.contains_half_open(Point::new(10.0, 5.0)));
        assert!(r.contains_half_open(Point::new(0.0, 5.0)));
    }
}
