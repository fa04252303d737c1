// src/ops/image.rs

//! Image operations over single-channel [`Matrix`] values.

use std::path::PathBuf;

use tracing::debug;

use crate::errors::{OperationError, ParamError};
use crate::exec::{CancellationSignal, Inputs, Operation, Parameters, PortSpec};
use crate::types::SyntheticPattern;
use crate::value::{Matrix, Rect, Value, ValueType};

const MATRIX_IN: &[PortSpec] = &[PortSpec::single(ValueType::Matrix)];

fn invalid(key: &str, reason: impl Into<String>) -> ParamError {
    ParamError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn positive_int(params: &Parameters, key: &str) -> Result<usize, ParamError> {
    let v = params.get::<i64>(key)?;
    usize::try_from(v)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| invalid(key, format!("must be at least 1, got {v}")))
}

// ---------------------------------------------------------------------------
// image.synthetic
// ---------------------------------------------------------------------------

/// Generated test image; a source node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthetic;

struct SyntheticSettings {
    rows: usize,
    cols: usize,
    pattern: SyntheticPattern,
    value: f32,
    cell: usize,
}

impl Synthetic {
    fn settings(params: &Parameters) -> Result<SyntheticSettings, ParamError> {
        let pattern = params
            .get_or::<String>("pattern", "fill".to_string())?
            .parse::<SyntheticPattern>()
            .map_err(|reason| invalid("pattern", reason))?;
        let cell = if params.contains("cell") {
            positive_int(params, "cell")?
        } else {
            8
        };
        Ok(SyntheticSettings {
            rows: positive_int(params, "rows")?,
            cols: positive_int(params, "cols")?,
            pattern,
            value: params.number_or("value", 255.0)? as f32,
            cell,
        })
    }
}

impl Operation for Synthetic {
    fn name(&self) -> &str {
        "image.synthetic"
    }

    fn inputs(&self) -> &[PortSpec] {
        &[]
    }

    fn output(&self) -> ValueType {
        ValueType::Matrix
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        Self::settings(params).map(|_| ())
    }

    fn compute(
        &self,
        _inputs: &Inputs,
        params: &Parameters,
        cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let s = Self::settings(params)?;
        cancel.check()?;

        let matrix = match s.pattern {
            SyntheticPattern::Fill => Matrix::filled(s.rows, s.cols, s.value),
            SyntheticPattern::Gradient => {
                let span = (s.cols.saturating_sub(1)).max(1) as f32;
                Matrix::from_fn(s.rows, s.cols, |_, c| s.value * c as f32 / span)
            }
            SyntheticPattern::Checker => Matrix::from_fn(s.rows, s.cols, |r, c| {
                if (r / s.cell + c / s.cell) % 2 == 0 {
                    s.value
                } else {
                    0.0
                }
            }),
        };
        Ok(matrix.into())
    }
}

// ---------------------------------------------------------------------------
// image.load_pgm
// ---------------------------------------------------------------------------

/// Reads a PGM file (P5 or P2) from `path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadPgm;

impl Operation for LoadPgm {
    fn name(&self) -> &str {
        "image.load_pgm"
    }

    fn inputs(&self) -> &[PortSpec] {
        &[]
    }

    fn output(&self) -> ValueType {
        ValueType::Matrix
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        let path = params.get::<String>("path")?;
        if path.trim().is_empty() {
            return Err(invalid("path", "must not be empty"));
        }
        Ok(())
    }

    fn compute(
        &self,
        _inputs: &Inputs,
        params: &Parameters,
        cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let path = PathBuf::from(params.get::<String>("path")?);
        cancel.check()?;
        let matrix = Matrix::read_pgm(&path)
            .map_err(|err| OperationError::failed(format!("{err:#}")))?;
        debug!(path = %path.display(), rows = matrix.rows(), cols = matrix.cols(), "loaded pgm");
        Ok(matrix.into())
    }
}

// ---------------------------------------------------------------------------
// image.gaussian_blur
// ---------------------------------------------------------------------------

/// Separable Gaussian blur with replicated borders.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianBlur;

impl GaussianBlur {
    fn settings(params: &Parameters) -> Result<(usize, f64), ParamError> {
        let size = positive_int(params, "kernel_size")?;
        if size % 2 == 0 {
            return Err(invalid("kernel_size", format!("must be odd, got {size}")));
        }
        let sigma = params.number("sigma")?;
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(invalid("sigma", format!("must be positive, got {sigma}")));
        }
        Ok((size, sigma))
    }

    /// Normalized 1-D kernel.
    pub fn kernel(size: usize, sigma: f64) -> Vec<f32> {
        let half = (size / 2) as f64;
        let weights: Vec<f64> = (0..size)
            .map(|i| {
                let d = i as f64 - half;
                (-(d * d) / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let sum: f64 = weights.iter().sum();
        weights.iter().map(|w| (w / sum) as f32).collect()
    }
}

impl Operation for GaussianBlur {
    fn name(&self) -> &str {
        "image.gaussian_blur"
    }

    fn inputs(&self) -> &[PortSpec] {
        MATRIX_IN
    }

    fn output(&self) -> ValueType {
        ValueType::Matrix
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        Self::settings(params).map(|_| ())
    }

    fn compute(
        &self,
        inputs: &Inputs,
        params: &Parameters,
        cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let src = inputs.get::<Matrix>(0)?;
        let (size, sigma) = Self::settings(params)?;
        if src.is_empty() {
            return Ok(src.into());
        }

        let kernel = Self::kernel(size, sigma);
        let half = (size / 2) as isize;
        let (rows, cols) = (src.rows(), src.cols());
        let clamp = |i: isize, n: usize| i.clamp(0, n as isize - 1) as usize;

        let mut horizontal = vec![0.0_f32; rows * cols];
        for r in 0..rows {
            cancel.check()?;
            let row = src.row(r);
            for c in 0..cols {
                horizontal[r * cols + c] = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * row[clamp(c as isize + k as isize - half, cols)])
                    .sum();
            }
        }

        let mut out = vec![0.0_f32; rows * cols];
        for r in 0..rows {
            cancel.check()?;
            for c in 0..cols {
                out[r * cols + c] = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        w * horizontal[clamp(r as isize + k as isize - half, rows) * cols + c]
                    })
                    .sum();
            }
        }

        Matrix::from_vec(rows, cols, out)
            .map(Value::from)
            .map_err(OperationError::Failed)
    }
}

// ---------------------------------------------------------------------------
// image.threshold
// ---------------------------------------------------------------------------

/// Binary threshold: `max_value` where the pixel exceeds `threshold`, 0
/// elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct Threshold;

impl Threshold {
    fn settings(params: &Parameters) -> Result<(f32, f32), ParamError> {
        let threshold = params.number("threshold")? as f32;
        let max_value = params.number_or("max_value", 255.0)? as f32;
        Ok((threshold, max_value))
    }
}

impl Operation for Threshold {
    fn name(&self) -> &str {
        "image.threshold"
    }

    fn inputs(&self) -> &[PortSpec] {
        MATRIX_IN
    }

    fn output(&self) -> ValueType {
        ValueType::Matrix
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        Self::settings(params).map(|_| ())
    }

    fn compute(
        &self,
        inputs: &Inputs,
        params: &Parameters,
        cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let src = inputs.get::<Matrix>(0)?;
        let (threshold, max_value) = Self::settings(params)?;
        cancel.check()?;
        let out = Matrix::from_fn(src.rows(), src.cols(), |r, c| {
            if src.row(r)[c] > threshold { max_value } else { 0.0 }
        });
        Ok(out.into())
    }
}

// ---------------------------------------------------------------------------
// image.crop
// ---------------------------------------------------------------------------

/// Copy of the pixels covered by `roi`, clipped to the image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crop;

impl Operation for Crop {
    fn name(&self) -> &str {
        "image.crop"
    }

    fn inputs(&self) -> &[PortSpec] {
        MATRIX_IN
    }

    fn output(&self) -> ValueType {
        ValueType::Matrix
    }

    fn validate(&self, params: &Parameters) -> Result<(), ParamError> {
        let roi = params.get::<Rect>("roi")?;
        if roi.is_empty() {
            return Err(invalid("roi", "width and height must be positive"));
        }
        Ok(())
    }

    fn compute(
        &self,
        inputs: &Inputs,
        params: &Parameters,
        cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let src = inputs.get::<Matrix>(0)?;
        let roi = params.get::<Rect>("roi")?;
        cancel.check()?;

        let bounds = Rect::new(0.0, 0.0, src.cols() as f64, src.rows() as f64);
        let clipped = roi
            .intersect(&bounds)
            .ok_or_else(|| OperationError::failed("empty region of interest"))?;

        let c0 = clipped.x.floor() as usize;
        let r0 = clipped.y.floor() as usize;
        let c1 = ((clipped.x + clipped.width).ceil() as usize).min(src.cols());
        let r1 = ((clipped.y + clipped.height).ceil() as usize).min(src.rows());
        if c1 <= c0 || r1 <= r0 {
            return Err(OperationError::failed("empty region of interest"));
        }

        let out = Matrix::from_fn(r1 - r0, c1 - c0, |r, c| src.row(r0 + r)[c0 + c]);
        Ok(out.into())
    }
}

// ---------------------------------------------------------------------------
// image.mean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Operation for Mean {
    fn name(&self) -> &str {
        "image.mean"
    }

    fn inputs(&self) -> &[PortSpec] {
        MATRIX_IN
    }

    fn output(&self) -> ValueType {
        ValueType::Float
    }

    fn compute(
        &self,
        inputs: &Inputs,
        _params: &Parameters,
        _cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        let src = inputs.get::<Matrix>(0)?;
        src.mean()
            .map(Value::Float)
            .ok_or_else(|| OperationError::failed("mean of an empty image"))
    }
}
