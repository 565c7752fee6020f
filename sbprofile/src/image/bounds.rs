//! Integer pixel bounds.
//!
//! Bounds are inclusive on both ends, so `[1, 10] x [1, 10]` holds 100
//! pixels. A bounds with `min > max` on either axis is undefined (empty).

use std::fmt;
use std::ops::BitAnd;

use nalgebra::Vector2;

/// Inclusive rectangle of pixel indices `[xmin, xmax] x [ymin, ymax]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    pub fn new(xmin: i32, xmax: i32, ymin: i32, ymax: i32) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }

    /// Undefined bounds containing no pixels.
    pub fn empty() -> Self {
        Self {
            xmin: 0,
            xmax: -1,
            ymin: 0,
            ymax: -1,
        }
    }

    /// `[1, nx] x [1, ny]`
    pub fn from_size(nx: usize, ny: usize) -> Self {
        Self::new(1, nx as i32, 1, ny as i32)
    }

    /// Bounds of a single pixel.
    pub fn from_point(x: i32, y: i32) -> Self {
        Self::new(x, x, y, y)
    }

    pub fn is_defined(&self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }

    /// Number of columns (x extent)
    pub fn ncol(&self) -> usize {
        if self.is_defined() {
            (self.xmax - self.xmin + 1) as usize
        } else {
            0
        }
    }

    /// Number of rows (y extent)
    pub fn nrow(&self) -> usize {
        if self.is_defined() {
            (self.ymax - self.ymin + 1) as usize
        } else {
            0
        }
    }

    pub fn area(&self) -> usize {
        self.ncol() * self.nrow()
    }

    /// Integer center, rounding down for even extents.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.xmin + self.xmax).div_euclid(2),
            (self.ymin + self.ymax).div_euclid(2),
        )
    }

    /// Geometric center; half-integer for even extents.
    pub fn true_center(&self) -> Vector2<f64> {
        Vector2::new(
            0.5 * (self.xmin as f64 + self.xmax as f64),
            0.5 * (self.ymin as f64 + self.ymax as f64),
        )
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.xmin, self.ymin)
    }

    pub fn includes(&self, x: i32, y: i32) -> bool {
        (self.xmin..=self.xmax).contains(&x) && (self.ymin..=self.ymax).contains(&y)
    }

    pub fn includes_bounds(&self, other: &Bounds) -> bool {
        !other.is_defined()
            || (self.is_defined()
                && other.xmin >= self.xmin
                && other.xmax <= self.xmax
                && other.ymin >= self.ymin
                && other.ymax <= self.ymax)
    }

    /// Smallest bounds containing both `self` and the point.
    pub fn with_point(&self, x: i32, y: i32) -> Bounds {
        if !self.is_defined() {
            return Bounds::from_point(x, y);
        }
        Bounds::new(self.xmin.min(x), self.xmax.max(x), self.ymin.min(y), self.ymax.max(y))
    }

    /// Smallest bounds containing both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        match (self.is_defined(), other.is_defined()) {
            (false, _) => *other,
            (_, false) => *self,
            _ => Bounds::new(
                self.xmin.min(other.xmin),
                self.xmax.max(other.xmax),
                self.ymin.min(other.ymin),
                self.ymax.max(other.ymax),
            ),
        }
    }

    /// Overlap of the two; undefined when they are disjoint.
    pub fn intersect(&self, other: &Bounds) -> Bounds {
        if !self.is_defined() || !other.is_defined() {
            return Bounds::empty();
        }
        let b = Bounds::new(
            self.xmin.max(other.xmin),
            self.xmax.min(other.xmax),
            self.ymin.max(other.ymin),
            self.ymax.min(other.ymax),
        );
        if b.is_defined() {
            b
        } else {
            Bounds::empty()
        }
    }

    /// Grow (or shrink, for negative `border`) on every side.
    pub fn with_border(&self, border: i32) -> Bounds {
        if !self.is_defined() {
            return *self;
        }
        Bounds::new(
            self.xmin - border,
            self.xmax + border,
            self.ymin - border,
            self.ymax + border,
        )
    }

    /// Scale the extent by `factor` about the center.
    pub fn expand(&self, factor: f64) -> Bounds {
        if !self.is_defined() {
            return *self;
        }
        let dx = ((self.ncol() as f64 * (factor - 1.0)) / 2.0).ceil() as i32;
        let dy = ((self.nrow() as f64 * (factor - 1.0)) / 2.0).ceil() as i32;
        Bounds::new(self.xmin - dx, self.xmax + dx, self.ymin - dy, self.ymax + dy)
    }

    pub fn shift(&self, dx: i32, dy: i32) -> Bounds {
        Bounds::new(self.xmin + dx, self.xmax + dx, self.ymin + dy, self.ymax + dy)
    }
}

impl BitAnd for Bounds {
    type Output = Bounds;

    fn bitand(self, rhs: Bounds) -> Bounds {
        self.intersect(&rhs)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_defined() {
            write!(f, "[{},{}]x[{},{}]", self.xmin, self.xmax, self.ymin, self.ymax)
        } else {
            write!(f, "[undefined]")
        }
    }
}
