//! Energy accounting of a component: which quantity a bus collects and the characteristic
//! line (e.g. generator or burner efficiency) it is scaled with.

use crate::Network::Parameters::CharLine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct Bus {
    pub label: String,
    /// quantity to account: TI, P, Q, Q1, Q2 or Qloss; chambers only offer thermal input
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub char_line: Option<CharLine>,
    /// reference value normalising the characteristic line argument
    #[serde(default)]
    pub P_ref: Option<f64>,
}

impl Bus {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            param: None,
            char_line: None,
            P_ref: None,
        }
    }
    pub fn with_param(mut self, param: &str) -> Self {
        self.param = Some(param.to_string());
        self
    }
    pub fn with_char_line(mut self, line: CharLine) -> Self {
        self.char_line = Some(line);
        self
    }
    #[allow(non_snake_case)]
    pub fn with_reference(mut self, P_ref: f64) -> Self {
        self.P_ref = Some(P_ref);
        self
    }
    /// multiplier of `value`: the line at |value / P_ref|, or at 1 without a reference
    pub fn char_factor(&self, value: f64) -> f64 {
        let x = match self.P_ref {
            Some(p_ref) if p_ref != 0.0 => (value / p_ref).abs(),
            _ => 1.0,
        };
        self.char_line.as_ref().map_or(1.0, |line| line.evaluate(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_char_factor() {
        let line = CharLine::new(vec![0.5, 1.0], vec![0.9, 1.0]).unwrap();
        let bus = Bus::new("heat").with_char_line(line.clone());
        assert_relative_eq!(bus.char_factor(123.0), 1.0);
        let bus = bus.with_reference(200.0);
        assert_relative_eq!(bus.char_factor(150.0), 0.95, epsilon = 1e-12);
        assert_relative_eq!(bus.char_factor(-150.0), 0.95, epsilon = 1e-12);
        assert_relative_eq!(Bus::new("plain").char_factor(5.0), 1.0);
        let parsed: Bus = serde_json::from_str(r#"{"label": "power", "param": "P"}"#).unwrap();
        assert_eq!(parsed.param.as_deref(), Some("P"));
        assert!(parsed.char_line.is_none());
    }
}
