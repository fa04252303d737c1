// src/value/mod.rs

//! Payloads exchanged between nodes.
//!
//! Every value stored in the resource pool is a [`Value`], a tagged union over
//! the payload kinds the pipeline understands. [`ValueType`] is the matching
//! fieldless tag used for static port descriptors and runtime type checks.
//!
//! The [`Payload`] trait is the type-erasure boundary: concrete payload types
//! convert into a `Value` when published and are recovered only when the tag
//! matches exactly. There is no coercion between payload kinds.

pub mod geometry;
pub mod matrix;

use std::fmt;

pub use geometry::{Circle, Contour, Line, Point, Rect};
pub use matrix::Matrix;

/// Runtime tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    Matrix,
    Point,
    Line,
    Circle,
    Rect,
    Contour,
    Bool,
    Int,
    Float,
    Text,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Matrix => "matrix",
            ValueType::Point => "point",
            ValueType::Line => "line",
            ValueType::Circle => "circle",
            ValueType::Rect => "rect",
            ValueType::Contour => "contour",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "text",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value published by a node or passed as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Matrix(Matrix),
    Point(Point),
    Line(Line),
    Circle(Circle),
    Rect(Rect),
    Contour(Contour),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Matrix(_) => ValueType::Matrix,
            Value::Point(_) => ValueType::Point,
            Value::Line(_) => ValueType::Line,
            Value::Circle(_) => ValueType::Circle,
            Value::Rect(_) => ValueType::Rect,
            Value::Contour(_) => ValueType::Contour,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::Text,
        }
    }

    /// Recover a concrete payload, or `None` if the tag differs.
    pub fn extract<T: Payload>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Feed a canonical byte encoding of this value into `hasher`.
    ///
    /// Used for pool fingerprints; two values hash equal iff they are
    /// bit-identical.
    pub(crate) fn digest_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&[self.value_type() as u8]);
        match self {
            Value::Matrix(m) => {
                hasher.update(&(m.rows() as u64).to_le_bytes());
                hasher.update(&(m.cols() as u64).to_le_bytes());
                for px in m.data() {
                    hasher.update(&px.to_le_bytes());
                }
            }
            Value::Point(p) => digest_point(hasher, p),
            Value::Line(l) => {
                digest_point(hasher, &l.start);
                digest_point(hasher, &l.end);
            }
            Value::Circle(c) => {
                digest_point(hasher, &c.center);
                hasher.update(&c.radius.to_le_bytes());
            }
            Value::Rect(r) => {
                for v in [r.x, r.y, r.width, r.height] {
                    hasher.update(&v.to_le_bytes());
                }
            }
            Value::Contour(c) => {
                hasher.update(&(c.len() as u64).to_le_bytes());
                for p in c.points() {
                    digest_point(hasher, p);
                }
            }
            Value::Bool(b) => {
                hasher.update(&[*b as u8]);
            }
            Value::Int(i) => {
                hasher.update(&i.to_le_bytes());
            }
            Value::Float(f) => {
                hasher.update(&f.to_le_bytes());
            }
            Value::Text(s) => {
                hasher.update(&(s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
        }
    }
}

fn digest_point(hasher: &mut blake3::Hasher, p: &Point) {
    hasher.update(&p.x.to_le_bytes());
    hasher.update(&p.y.to_le_bytes());
}

/// A concrete payload type that can live in the resource pool.
pub trait Payload: Clone + Send + Sync + 'static {
    /// Tag this payload is stored under.
    const TYPE: ValueType;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_payload {
    ($ty:ty, $variant:ident) => {
        impl Payload for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_payload!(Matrix, Matrix);
impl_payload!(Point, Point);
impl_payload!(Line, Line);
impl_payload!(Circle, Circle);
impl_payload!(Rect, Rect);
impl_payload!(Contour, Contour);
impl_payload!(bool, Bool);
impl_payload!(i64, Int);
impl_payload!(f64, Float);
impl_payload!(String, Text);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_requires_exact_tag() {
        let v = Value::Int(3);
        assert_eq!(v.extract::<i64>(), Some(3));
        assert_eq!(v.extract::<f64>(), None);
        assert_eq!(v.value_type(), ValueType::Int);
    }

    #[test]
    fn digest_distinguishes_types_with_equal_bits() {
        let digest = |v: &Value| {
            let mut h = blake3::Hasher::new();
            v.digest_into(&mut h);
            h.finalize()
        };
        let as_int = Value::Int(0);
        let as_float = Value::Float(0.0);
        assert_ne!(digest(&as_int), digest(&as_float));
        assert_eq!(digest(&as_int), digest(&Value::Int(0)));
    }

    #[test]
    fn value_type_display_is_lowercase() {
        assert_eq!(ValueType::Matrix.to_string(), "matrix");
        assert_eq!(Value::from(Point::new(1.0, 2.0)).value_type().to_string(), "point");
    }
}
