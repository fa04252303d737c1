// src/ops/pgm.rs

//! Minimal PGM (portable graymap) codec.
//!
//! Reads binary `P5` and ASCII `P2` files with 8- or 16-bit samples; writes
//! 8-bit `P5`. Sample values map to matrix values unscaled.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};

use crate::value::Matrix;

impl Matrix {
    pub fn read_pgm(path: &Path) -> Result<Matrix> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        decode(&bytes).with_context(|| format!("decoding {}", path.display()))
    }

    /// Write as 8-bit `P5`, clamping to `0..=255` and rounding.
    pub fn write_pgm(&self, path: &Path) -> Result<()> {
        fs::write(path, encode(self)).with_context(|| format!("writing {}", path.display()))
    }
}

pub fn encode(matrix: &Matrix) -> Vec<u8> {
    let mut out = format!("P5\n{} {}\n255\n", matrix.cols(), matrix.rows()).into_bytes();
    out.extend(matrix.data().iter().map(|v| v.clamp(0.0, 255.0).round() as u8));
    out
}

pub fn decode(bytes: &[u8]) -> Result<Matrix> {
    let mut header = Header { bytes, pos: 0 };
    let magic = header.token()?;
    let binary = match magic.as_str() {
        "P5" => true,
        "P2" => false,
        other => bail!("unsupported magic number '{other}' (expected P5 or P2)"),
    };

    let cols = header.number()?;
    let rows = header.number()?;
    let maxval = header.number()?;
    ensure!(
        (1..=65535).contains(&maxval),
        "maxval must be within 1..=65535, got {maxval}"
    );
    let count = rows
        .checked_mul(cols)
        .context("image dimensions overflow")?;

    let data = if binary {
        // Exactly one whitespace byte separates the header from the raster.
        let start = header.pos + 1;
        let raster = bytes.get(start..).unwrap_or_default();
        let width = if maxval < 256 { 1 } else { 2 };
        let needed = count
            .checked_mul(width)
            .context("image dimensions overflow")?;
        ensure!(
            raster.len() >= needed,
            "raster truncated: need {needed} bytes, found {}",
            raster.len()
        );
        if width == 1 {
            raster[..count].iter().map(|&b| b as f32).collect()
        } else {
            raster[..count * 2]
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as f32)
                .collect()
        }
    } else {
        // Each sample takes at least a digit and a separator.
        let remaining = bytes.len().saturating_sub(header.pos);
        ensure!(
            count <= remaining.div_ceil(2),
            "header declares {count} samples but only {remaining} bytes follow"
        );
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let v = header.number()?;
            ensure!(v <= maxval, "sample {v} exceeds maxval {maxval}");
            samples.push(v as f32);
        }
        samples
    };

    Matrix::from_vec(rows, cols, data).map_err(anyhow::Error::msg)
}

/// Whitespace/comment aware tokenizer over the header.
struct Header<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Header<'_> {
    fn skip_blank(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while let Some(&c) = self.bytes.get(self.pos) {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Result<String> {
        self.skip_blank();
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b == b'#' {
                break;
            }
            self.pos += 1;
        }
        ensure!(self.pos > start, "unexpected end of header");
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn number(&mut self) -> Result<usize> {
        let token = self.token()?;
        token
            .parse()
            .with_context(|| format!("expected a number, found '{token}'"))
    }
}
