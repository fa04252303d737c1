// src/value/geometry.rs

//! Plain geometric payloads.

/// Tolerance used for parallelism and containment checks.
pub const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Infinite line through two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Point,
    pub end: Point,
}

impl Line {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Intersection point of two lines, or `None` when they are parallel
    /// (including coincident) or either is degenerate.
    pub fn intersection(&self, other: &Line) -> Option<Point> {
        let (x1, y1, x2, y2) = (self.start.x, self.start.y, self.end.x, self.end.y);
        let (x3, y3, x4, y4) = (other.start.x, other.start.y, other.end.x, other.end.y);

        let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
        if denom.abs() < EPSILON {
            return None;
        }

        let a = x1 * y2 - y1 * x2;
        let b = x3 * y4 - y3 * x4;
        Some(Point::new(
            (a * (x3 - x4) - (x1 - x2) * b) / denom,
            (a * (y3 - y4) - (y1 - y2) * b) / denom,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Circle {
    pub const fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Closed-disk containment.
    pub fn contains(&self, p: &Point) -> bool {
        self.center.distance(p) <= self.radius + EPSILON
    }
}

/// Axis-aligned rectangle, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Half-open containment: left/top edges inclusive, right/bottom exclusive.
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        let r = Rect::new(left, top, right - left, bottom - top);
        if r.is_empty() { None } else { Some(r) }
    }
}

/// Closed polygon given by its vertices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour(Vec<Point>);

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unsigned area (shoelace formula).
    pub fn area(&self) -> f64 {
        if self.0.len() < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for (i, p) in self.0.iter().enumerate() {
            let q = &self.0[(i + 1) % self.0.len()];
            twice += p.x * q.y - q.x * p.y;
        }
        twice.abs() / 2.0
    }
}
