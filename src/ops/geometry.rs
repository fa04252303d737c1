// src/ops/geometry.rs

use crate::errors::{OperationError, ParamError};
use crate::exec::{CancellationSignal, Inputs, Operation, Parameters, PortSpec};
use crate::value::{Circle, Line, Point, Rect, Value, ValueType};

/// `geometry.point`: source emitting `(x, y)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakePoint;

impl MakePoint {
    fn point(params: &Parameters) -> Result<Point, ParamError> {
        Ok(Point::new(params.number("x")?, params.number("y")?))
    }
}

impl Operation for MakePoint {
    fn name(&self) -> &str {
        "geometry.point"
    }

    fn inputs(&self) -> &[PortSpec] {
        &[]
    }

    fn output(&self) -> ValueType {
        ValueType::Point
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        Self::point(params).map(|_| ())
    }

    fn compute(
        &self,
        _inputs: &Inputs,
        params: &Parameters,
        _cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        Ok(Self::point(params)?.into())
    }
}

/// `geometry.line`: source emitting the line through `(x1, y1)` and
/// `(x2, y2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeLine;

impl MakeLine {
    fn line(params: &Parameters) -> Result<Line, ParamError> {
        let start = Point::new(params.number("x1")?, params.number("y1")?);
        let end = Point::new(params.number("x2")?, params.number("y2")?);
        if start == end {
            return Err(ParamError::Invalid {
                key: "x2".into(),
                reason: "line endpoints must differ".into(),
            });
        }
        Ok(Line::new(start, end))
    }
}

impl Operation for MakeLine {
    fn name(&self) -> &str {
        "geometry.line"
    }

    fn inputs(&self) -> &[PortSpec] {
        &[]
    }

    fn output(&self) -> ValueType {
        ValueType::Line
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        Self::line(params).map(|_| ())
    }

    fn compute(
        &self,
        _inputs: &Inputs,
        params: &Parameters,
        _cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        Ok(Self::line(params)?.into())
    }
}

/// `geometry.circle`: source emitting a circle at `(x, y)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCircle;

impl MakeCircle {
    fn circle(params: &Parameters) -> Result<Circle, ParamError> {
        let radius = params.number("radius")?;
        if radius < 0.0 || !radius.is_finite() {
            return Err(ParamError::Invalid {
                key: "radius".into(),
                reason: format!("must be a non-negative number, got {radius}"),
            });
        }
        Ok(Circle::new(
            Point::new(params.number("x")?, params.number("y")?),
            radius,
        ))
    }
}

impl Operation for MakeCircle {
    fn name(&self) -> &str {
        "geometry.circle"
    }

    fn inputs(&self) -> &[PortSpec] {
        &[]
    }

    fn output(&self) -> ValueType {
        ValueType::Circle
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        Self::circle(params).map(|_| ())
    }

    fn compute(
        &self,
        _inputs: &Inputs,
        params: &Parameters,
        _cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        Ok(Self::circle(params)?.into())
    }
}

/// `geometry.intersect_lines`: intersection of the `left` and `right` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntersectLines;

impl Operation for IntersectLines {
    fn name(&self) -> &str {
        "geometry.intersect_lines"
    }

    fn inputs(&self) -> &[PortSpec] {
        const PORTS: &[PortSpec] = &[
            PortSpec::new("left", ValueType::Line),
            PortSpec::new("right", ValueType::Line),
        ];
        PORTS
    }

    fn output(&self) -> ValueType {
        ValueType::Point
    }

    fn compute(
        &self,
        inputs: &Inputs,
        _params: &Parameters,
        _cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let left = inputs.named::<Line>("left")?;
        let right = inputs.named::<Line>("right")?;
        left.intersection(&right)
            .map(Value::from)
            .ok_or_else(|| OperationError::failed("no intersection found"))
    }
}

/// `geometry.point_in_rect`: whether the input point lies in `roi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointInRect;

impl Operation for PointInRect {
    fn name(&self) -> &str {
        "geometry.point_in_rect"
    }

    fn inputs(&self) -> &[PortSpec] {
        const PORTS: &[PortSpec] = &[PortSpec::single(ValueType::Point)];
        PORTS
    }

    fn output(&self) -> ValueType {
        ValueType::Bool
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        params.get::<Rect>("roi").map(|_| ())
    }

    fn compute(
        &self,
        inputs: &Inputs,
        params: &Parameters,
        _cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let p = inputs.get::<Point>(0)?;
        let roi = params.get::<Rect>("roi")?;
        Ok(Value::Bool(roi.contains(&p)))
    }
}

/// `geometry.point_in_circle`: whether `point` lies in `circle`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointInCircle;

impl Operation for PointInCircle {
    fn name(&self) -> &str {
        "geometry.point_in_circle"
    }

    fn inputs(&self) -> &[PortSpec] {
        const PORTS: &[PortSpec] = &[
            PortSpec::new("point", ValueType::Point),
            PortSpec::new("circle", ValueType::Circle),
        ];
        PORTS
    }

    fn output(&self) -> ValueType {
        ValueType::Bool
    }

    fn compute(
        &self,
        inputs: &Inputs,
        _params: &Parameters,
        _cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let p = inputs.named::<Point>("point")?;
        let circle = inputs.named::<Circle>("circle")?;
        Ok(Value::Bool(circle.contains(&p)))
    }
}
