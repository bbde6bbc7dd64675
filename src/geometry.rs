//! Fixed-point coordinates and output rectangles
//!
//! Every coordinate that crosses the seat boundary is a signed 24.8
//! fixed-point value, the same representation clients receive.

use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Signed 24.8 fixed-point number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);

    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn from_int(value: i32) -> Self {
        Fixed(value.wrapping_mul(256))
    }

    pub fn from_f64(value: f64) -> Self {
        Fixed((value * 256.0).round() as i32)
    }

    /// Integer part, truncated toward zero.
    pub const fn to_int(self) -> i32 {
        self.0 / 256
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 256.0
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Self {
        Fixed::from_int(value)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

/// A position in global or surface-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: Fixed,
    pub y: Fixed,
}

impl Point {
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    pub const fn from_int(x: i32, y: i32) -> Self {
        Self {
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
        }
    }

    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: Fixed::from_f64(x),
            y: Fixed::from_f64(y),
        }
    }

    /// Coordinates reported while a device has no focus.
    pub const fn unfocused() -> Self {
        Self::from_int(-1_000_000, -1_000_000)
    }

    pub fn offset(self, dx: Fixed, dy: Fixed) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Integer rectangle, used for output and view geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.contains(point.x.to_int(), point.y.to_int())
    }

    /// Pulls `point` onto the nearest pixel inside the rectangle.
    pub fn clamp(&self, point: Point) -> Point {
        let mut clamped = point;
        let x = point.x.to_int();
        let y = point.y.to_int();

        if x < self.x {
            clamped.x = Fixed::from_int(self.x);
        } else if x >= self.x + self.width {
            clamped.x = Fixed::from_int(self.x + self.width - 1);
        }

        if y < self.y {
            clamped.y = Fixed::from_int(self.y);
        } else if y >= self.y + self.height {
            clamped.y = Fixed::from_int(self.y + self.height - 1);
        }

        clamped
    }

    pub fn center(&self) -> Point {
        Point::from_int(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Squared distance from the rectangle's center to `point`, in pixels.
    pub fn distance_sq(&self, point: Point) -> i64 {
        let center = self.center();
        let dx = i64::from(center.x.to_int()) - i64::from(point.x.to_int());
        let dy = i64::from(center.y.to_int()) - i64::from(point.y.to_int());
        dx * dx + dy * dy
    }
}

/// Clamps a pointer move from `from` to `to` against a set of output
/// rectangles.
///
/// A destination on any output is returned unchanged. Otherwise the point is
/// clamped into the output that held `from`, falling back to the first
/// output. With no outputs at all nothing is clamped.
pub fn clamp_to_outputs(outputs: &[Rect], from: Point, to: Point) -> Point {
    if outputs.iter().any(|o| o.contains_point(to)) {
        return to;
    }

    let previous = outputs
        .iter()
        .find(|o| o.contains_point(from))
        .or_else(|| outputs.first());

    match previous {
        Some(output) => output.clamp(to),
        None => to,
    }
}
