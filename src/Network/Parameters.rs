//! # Component parameters and characteristic lines
//!
//! ## Main Structures
//! - **`ComponentProperty`**: a named scalar of a component (lambda, ti, P, Q1, ...). It is
//!   either fixed by the user, a free variable of the global solve, or simply reported
//! - **`CharLine`**: piecewise-linear multiplier of a normalised load ratio
//!
//! The default characteristic lines of the combustion engine are stored as embedded JSON.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

const DEFAULT_CHAR_LINES: &str = r#"{
  "TI":    {"x": [0.50, 0.75, 0.90, 1.00], "y": [2.50, 2.33, 2.27, 2.25]},
  "Q1":    {"x": [0.660, 0.770, 0.880, 0.990, 1.100], "y": [0.215, 0.197, 0.185, 0.175, 0.168]},
  "Q2":    {"x": [0.660, 0.770, 0.880, 0.990, 1.100], "y": [0.215, 0.197, 0.185, 0.175, 0.168]},
  "QLOSS": {"x": [0.50, 0.75, 0.90, 1.00], "y": [0.32, 0.30, 0.25, 0.21]}
}"#;

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Invalid characteristic line: {0}")]
    InvalidCharLine(String),
    #[error("No default characteristic line {0}")]
    UnknownCharLine(String),
    #[error("Failed to parse characteristic lines: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Finite-difference step of a parameter that becomes a free variable
pub const DEFAULT_PARAMETER_STEP: f64 = 1e-4;

fn default_step() -> f64 {
    DEFAULT_PARAMETER_STEP
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentProperty {
    pub val: f64,
    /// fixed by the user
    #[serde(default)]
    pub is_set: bool,
    /// free variable of the global solve
    #[serde(default)]
    pub is_var: bool,
    #[serde(default)]
    pub var_pos: usize,
    /// design point value, normalises characteristic line arguments
    #[serde(default)]
    pub design: Option<f64>,
    #[serde(default)]
    pub min_val: Option<f64>,
    #[serde(default)]
    pub max_val: Option<f64>,
    #[serde(default = "default_step")]
    pub d: f64,
}

impl ComponentProperty {
    pub fn new(val: f64) -> Self {
        Self {
            val,
            is_set: false,
            is_var: false,
            var_pos: 0,
            design: None,
            min_val: None,
            max_val: None,
            d: DEFAULT_PARAMETER_STEP,
        }
    }
    /// unset parameter without value
    pub fn empty() -> Self {
        Self::new(f64::NAN)
    }
    pub fn with_min(mut self, min: f64) -> Self {
        self.min_val = Some(min);
        self
    }
    pub fn with_max(mut self, max: f64) -> Self {
        self.max_val = Some(max);
        self
    }
    pub fn with_step(mut self, d: f64) -> Self {
        self.d = d;
        self
    }
    pub fn fix(&mut self, val: f64) {
        self.val = val;
        self.is_set = true;
        self.is_var = false;
    }
    pub fn release(&mut self) {
        self.is_set = false;
    }
    /// Message if the value lies outside of its bounds
    pub fn bound_warning(&self, name: &str, component: &str) -> Option<String> {
        if !self.val.is_finite() {
            return None;
        }
        if let Some(min) = self.min_val {
            if self.val < min {
                return Some(format!(
                    "Invalid value for {}: {} = {} below minimum value {} at component {}",
                    name, name, self.val, min, component
                ));
            }
        }
        if let Some(max) = self.max_val {
            if self.val > max {
                return Some(format!(
                    "Invalid value for {}: {} = {} above maximum value {} at component {}",
                    name, name, self.val, max, component
                ));
            }
        }
        None
    }
}

/// Piecewise-linear characteristic line, constant outside of its domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CharLinePoints")]
pub struct CharLine {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// breakpoints as read from a file, validated before they become a `CharLine`
#[derive(Deserialize)]
struct CharLinePoints {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl TryFrom<CharLinePoints> for CharLine {
    type Error = ParameterError;

    fn try_from(points: CharLinePoints) -> Result<Self, Self::Error> {
        CharLine::new(points.x, points.y)
    }
}

impl CharLine {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, ParameterError> {
        let line = Self { x, y };
        line.validate()?;
        Ok(line)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.x.len() != self.y.len() {
            return Err(ParameterError::InvalidCharLine(format!(
                "{} x values and {} y values",
                self.x.len(),
                self.y.len()
            )));
        }
        if self.x.len() < 2 {
            return Err(ParameterError::InvalidCharLine(
                "at least two points are needed".to_string(),
            ));
        }
        if self.x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ParameterError::InvalidCharLine(
                "x values must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// the line that always returns `y`
    pub fn constant(y: f64) -> Self {
        Self {
            x: vec![0.0, 1.0],
            y: vec![y, y],
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.y[0];
        }
        if x >= self.x[n - 1] {
            return self.y[n - 1];
        }
        let k = self.x.partition_point(|xi| *xi <= x).max(1);
        let (x0, x1) = (self.x[k - 1], self.x[k]);
        let (y0, y1) = (self.y[k - 1], self.y[k]);
        y0 + (x - x0) / (x1 - x0) * (y1 - y0)
    }

    /// Message if `x` lies outside of the tabulated domain
    pub fn bound_errors(&self, x: f64, label: &str) -> Option<String> {
        let (lo, hi) = (self.x[0], self.x[self.x.len() - 1]);
        if x < lo {
            Some(format!(
                "Operating point below characteristic line range at {}: X = {:.3}, X_min = {:.3}",
                label, x, lo
            ))
        } else if x > hi {
            Some(format!(
                "Operating point above characteristic line range at {}: X = {:.3}, X_max = {:.3}",
                label, x, hi
            ))
        } else {
            None
        }
    }
}

/// Default characteristic line of the combustion engine: "TI", "Q1", "Q2" or "QLOSS"
pub fn default_line(name: &str) -> Result<CharLine, ParameterError> {
    let mut lines: HashMap<String, CharLine> = serde_json::from_str(DEFAULT_CHAR_LINES)?;
    let line = lines
        .remove(name)
        .ok_or_else(|| ParameterError::UnknownCharLine(name.to_string()))?;
    line.validate()?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_char_line_interpolation() {
        let line = default_line("TI").unwrap();
        assert_relative_eq!(line.evaluate(1.0), 2.25);
        assert_relative_eq!(line.evaluate(0.95), 2.26, epsilon = 1e-12);
        assert_relative_eq!(line.evaluate(0.625), 2.415, epsilon = 1e-12);
        // constant outside of the domain
        assert_relative_eq!(line.evaluate(0.2), 2.5);
        assert_relative_eq!(line.evaluate(1.3), 2.25);
        let q = default_line("Q1").unwrap();
        assert_relative_eq!(q.evaluate(0.77), 0.197, epsilon = 1e-12);
        assert_relative_eq!(CharLine::constant(0.98).evaluate(12.0), 0.98);
    }

    #[test]
    fn test_char_line_bounds() {
        let line = default_line("QLOSS").unwrap();
        assert!(line.bound_errors(0.8, "chp").is_none());
        assert!(line.bound_errors(0.4, "chp").unwrap().contains("below"));
        assert!(line.bound_errors(1.2, "chp").unwrap().contains("above"));
        assert!(matches!(
            default_line("Q3"),
            Err(ParameterError::UnknownCharLine(_))
        ));
        assert!(CharLine::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
        assert!(CharLine::new(vec![0.0, 1.0], vec![1.0]).is_err());
    }

    #[test]
    fn test_char_line_from_json_is_validated() {
        let line: CharLine = serde_json::from_str(r#"{"x": [0.5, 1.0], "y": [0.9, 1.0]}"#).unwrap();
        assert_relative_eq!(line.evaluate(0.75), 0.95, epsilon = 1e-12);
        for bad in [
            r#"{"x": [], "y": []}"#,
            r#"{"x": [0.5, 1.0], "y": [0.9]}"#,
            r#"{"x": [1.0, 1.0], "y": [0.9, 1.0]}"#,
        ] {
            let err = serde_json::from_str::<CharLine>(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid characteristic line"), "{}", err);
        }
    }

    #[test]
    fn test_parameter_bounds() {
        let mut pr = ComponentProperty::empty().with_max(1.0);
        assert!(pr.bound_warning("pr1", "chp").is_none());
        pr.fix(1.05);
        assert!(pr.is_set);
        assert!(pr.bound_warning("pr1", "chp").unwrap().contains("above maximum"));
        let lamb = ComponentProperty::new(0.8).with_min(1.0);
        assert!(lamb.bound_warning("lamb", "cc").unwrap().contains("below minimum"));
        let p: ComponentProperty = serde_json::from_str(r#"{"val": 1e6, "is_set": true}"#).unwrap();
        assert_eq!(p.d, DEFAULT_PARAMETER_STEP);
        assert!(p.design.is_none());
    }
}
