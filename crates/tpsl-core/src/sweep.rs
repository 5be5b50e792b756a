//! TP/SL sweep axes.
//!
//! Axes are written in percent (`1.5` means 1.5%) and expanded into fraction
//! lists (`0.015`) for the engine.

use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

const STEP_TOLERANCE: f64 = 1e-9;

/// Upper bound on the values one axis may expand to.
pub const MAX_AXIS_POINTS: usize = 10_000;

/// One swept parameter, in percent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SweepAxis {
    /// Explicit values.
    Values(Vec<f64>),
    /// `points` evenly spaced values from `min` to `max`, both inclusive.
    Linear { min: f64, max: f64, points: usize },
    /// `from`, `from + step`, ... up to and including `to`.
    Stepped { from: f64, step: f64, to: f64 },
}

impl SweepAxis {
    /// Expand into percent values. Every value must be positive and the axis
    /// may hold at most [`MAX_AXIS_POINTS`] of them.
    pub fn percents(&self) -> Result<Vec<f64>, SweepError> {
        let values = match *self {
            SweepAxis::Values(ref v) => v.clone(),
            SweepAxis::Linear { min, max, points } => {
                check_finite(&[min, max])?;
                check_count(points)?;
                match points {
                    0 => return Err(SweepError::Invalid("points must be at least 1".into())),
                    1 => vec![min],
                    n => {
                        let step = (max - min) / (n - 1) as f64;
                        (0..n).map(|i| min + i as f64 * step).collect()
                    }
                }
            }
            SweepAxis::Stepped { from, step, to } => {
                check_finite(&[from, step, to])?;
                if step <= 0.0 {
                    return Err(SweepError::Invalid(format!(
                        "step must be positive, got {}",
                        step
                    )));
                }
                let span = ((to - from) / step + STEP_TOLERANCE).floor();
                if span >= MAX_AXIS_POINTS as f64 {
                    return Err(SweepError::Invalid(format!(
                        "{}:{}:{} expands to more than {} values",
                        from, step, to, MAX_AXIS_POINTS
                    )));
                }
                let mut out = Vec::new();
                let mut k = 0usize;
                loop {
                    let v = from + k as f64 * step;
                    if v > to + STEP_TOLERANCE {
                        break;
                    }
                    out.push(v);
                    k += 1;
                }
                out
            }
        };

        check_finite(&values)?;
        check_count(values.len())?;
        if values.is_empty() {
            return Err(SweepError::Invalid("axis has no values".into()));
        }
        if let Some(v) = values.iter().find(|&&v| v <= 0.0) {
            return Err(SweepError::Invalid(format!(
                "TP/SL levels must be positive, got {}",
                v
            )));
        }
        Ok(values)
    }

    /// Expand into fractions ready for the engine.
    pub fn fractions(&self) -> Result<Vec<f64>, SweepError> {
        Ok(self.percents()?.into_iter().map(|p| p / 100.0).collect())
    }

    /// Parse command-line tokens: either plain numbers or `from:step:to` ranges,
    /// concatenated in order.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, SweepError> {
        let mut values = Vec::new();
        for token in tokens {
            match token.as_ref().parse::<SweepAxis>()? {
                SweepAxis::Values(v) => values.extend(v),
                range => values.extend(range.percents()?),
            }
        }
        let axis = SweepAxis::Values(values);
        axis.percents()?;
        Ok(axis)
    }
}

impl Default for SweepAxis {
    fn default() -> Self {
        SweepAxis::Values(vec![1.0])
    }
}

impl FromStr for SweepAxis {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let num = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| SweepError::Invalid(format!("not a number: '{}'", p)))
        };
        match parts.as_slice() {
            [v] => Ok(SweepAxis::Values(vec![num(*v)?])),
            [from, step, to] => Ok(SweepAxis::Stepped {
                from: num(*from)?,
                step: num(*step)?,
                to: num(*to)?,
            }),
            _ => Err(SweepError::Invalid(format!(
                "expected a number or from:step:to, got '{}'",
                s
            ))),
        }
    }
}

/// One coordinate of the sweep, as fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub tp: f64,
    pub sl: f64,
}

/// Pair `tp[k]` with `sl[k]`. The lists must have equal length.
pub fn paired_cells(tp: &[f64], sl: &[f64]) -> Result<Vec<GridCell>, SweepError> {
    if tp.len() != sl.len() {
        return Err(SweepError::LengthMismatch {
            tp: tp.len(),
            sl: sl.len(),
        });
    }
    Ok(tp
        .iter()
        .zip(sl)
        .map(|(&tp, &sl)| GridCell { tp, sl })
        .collect())
}

fn check_count(n: usize) -> Result<(), SweepError> {
    if n > MAX_AXIS_POINTS {
        return Err(SweepError::Invalid(format!(
            "{} values exceed the limit of {}",
            n, MAX_AXIS_POINTS
        )));
    }
    Ok(())
}

fn check_finite(values: &[f64]) -> Result<(), SweepError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(v) => Err(SweepError::Invalid(format!("non-finite value {}", v))),
        None => Ok(()),
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep axis: {0}")]
    Invalid(String),
    #[error("paired sweep needs equal TP and SL counts (tp={tp}, sl={sl})")]
    LengthMismatch { tp: usize, sl: usize },
}
