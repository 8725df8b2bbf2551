/// Module to calculate the atomic composition and molar mass of a chemical formula
///
/// Only the elements that show up in fuels, air and flue gases are tabulated.
use std::collections::HashMap;
use thiserror::Error;

// struct to hold element data
pub struct Element {
    name: &'static str,
    atomic_mass: f64,
}

// list of elements and their atomic masses, g/mol
const ELEMENTS: &[Element] = &[
    Element {
        name: "H",
        atomic_mass: 1.008,
    },
    Element {
        name: "He",
        atomic_mass: 4.0026,
    },
    Element {
        name: "C",
        atomic_mass: 12.011,
    },
    Element {
        name: "N",
        atomic_mass: 14.007,
    },
    Element {
        name: "O",
        atomic_mass: 15.999,
    },
    Element {
        name: "F",
        atomic_mass: 18.998,
    },
    Element {
        name: "Ne",
        atomic_mass: 20.18,
    },
    Element {
        name: "S",
        atomic_mass: 32.065,
    },
    Element {
        name: "Cl",
        atomic_mass: 35.45,
    },
    Element {
        name: "Ar",
        atomic_mass: 39.948,
    },
    Element {
        name: "Kr",
        atomic_mass: 83.798,
    },
    Element {
        name: "Xe",
        atomic_mass: 131.293,
    },
];

#[derive(Debug, Error, PartialEq)]
pub enum FormulaError {
    #[error("Unknown element {element} in formula {formula}")]
    UnknownElement { element: String, formula: String },
    #[error("Unbalanced brackets in formula {0}")]
    UnbalancedBrackets(String),
    #[error("Unexpected symbol '{symbol}' in formula {formula}")]
    UnexpectedSymbol { symbol: char, formula: String },
}

fn atomic_mass(element: &str) -> Option<f64> {
    ELEMENTS
        .iter()
        .find(|e| e.name == element)
        .map(|e| e.atomic_mass)
}

// phase marks like (g) or (l) carry no atoms
fn filter_phases_marks(formula: &str) -> String {
    let mut formula = formula.replace(' ', "");
    for phase in ["(G)", "(g)", "(L)", "(l)", "(S)", "(s)", "(C)", "(c)"] {
        formula = formula.replace(phase, "");
    }
    formula
}

fn read_number(chars: &[char], i: &mut usize) -> usize {
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        *i += 1;
    }
    if start == *i {
        1
    } else {
        chars[start..*i]
            .iter()
            .collect::<String>()
            .parse()
            .unwrap_or(1)
    }
}

/// Parses a chemical formula like "C3H8", "H2O(g)" or "Ca(NO3)2" and returns a HashMap of
/// elements and their counts. Nested brackets are multiplied through.
pub fn parse_formula(formula: &str) -> Result<HashMap<String, usize>, FormulaError> {
    let cleaned = filter_phases_marks(formula);
    let chars: Vec<char> = cleaned.chars().collect();
    // stack of partial counts, one level per open bracket
    let mut stack: Vec<HashMap<String, usize>> = vec![HashMap::new()];
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '(' {
            stack.push(HashMap::new());
            i += 1;
        } else if c == ')' {
            i += 1;
            let multiplier = read_number(&chars, &mut i);
            let inner = stack
                .pop()
                .ok_or_else(|| FormulaError::UnbalancedBrackets(formula.to_string()))?;
            let outer = stack
                .last_mut()
                .ok_or_else(|| FormulaError::UnbalancedBrackets(formula.to_string()))?;
            for (element, count) in inner {
                *outer.entry(element).or_insert(0) += count * multiplier;
            }
        } else if c.is_ascii_uppercase() {
            let mut name = c.to_string();
            i += 1;
            if i < chars.len() && chars[i].is_ascii_lowercase() {
                name.push(chars[i]);
                i += 1;
            }
            if atomic_mass(&name).is_none() {
                return Err(FormulaError::UnknownElement {
                    element: name,
                    formula: formula.to_string(),
                });
            }
            let count = read_number(&chars, &mut i);
            let current = stack
                .last_mut()
                .ok_or_else(|| FormulaError::UnbalancedBrackets(formula.to_string()))?;
            *current.entry(name).or_insert(0) += count;
        } else {
            return Err(FormulaError::UnexpectedSymbol {
                symbol: c,
                formula: formula.to_string(),
            });
        }
    }
    if stack.len() != 1 {
        return Err(FormulaError::UnbalancedBrackets(formula.to_string()));
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Molar mass in g/mol together with the element composition
pub fn calculate_molar_mass(
    formula: &str,
) -> Result<(f64, HashMap<String, usize>), FormulaError> {
    let counts = parse_formula(formula)?;
    let mut molar_mass = 0.0;
    for (element, count) in counts.iter() {
        // parse_formula only lets tabulated elements through
        molar_mass += atomic_mass(element).unwrap_or(0.0) * *count as f64;
    }
    Ok((molar_mass, counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_formula() {
        let expected = HashMap::from([("C".to_string(), 3), ("H".to_string(), 8)]);
        assert_eq!(parse_formula("C3H8").unwrap(), expected);

        let expected = HashMap::from([("H".to_string(), 2), ("O".to_string(), 1)]);
        assert_eq!(parse_formula("H2O(g)").unwrap(), expected);

        let expected = HashMap::from([("Ar".to_string(), 1)]);
        assert_eq!(parse_formula("Ar").unwrap(), expected);

        let expected = HashMap::from([
            ("C".to_string(), 4),
            ("H".to_string(), 10),
        ]);
        assert_eq!(parse_formula("CH3(CH2)2CH3").unwrap(), expected);
    }

    #[test]
    fn test_parse_formula_errors() {
        assert!(matches!(
            parse_formula("Qx2"),
            Err(FormulaError::UnknownElement { .. })
        ));
        assert!(matches!(
            parse_formula("C(H2"),
            Err(FormulaError::UnbalancedBrackets(_))
        ));
        assert!(matches!(
            parse_formula("CH4+"),
            Err(FormulaError::UnexpectedSymbol { symbol: '+', .. })
        ));
    }

    #[test]
    fn test_calculate_molar_mass() {
        let (m, _) = calculate_molar_mass("CH4").unwrap();
        assert_relative_eq!(m, 16.043, epsilon = 1e-9);
        let (m, _) = calculate_molar_mass("H2O").unwrap();
        assert_relative_eq!(m, 18.015, epsilon = 1e-9);
        let (m, _) = calculate_molar_mass("CO2").unwrap();
        assert_relative_eq!(m, 44.009, epsilon = 1e-9);
        let (m, counts) = calculate_molar_mass("C4H10").unwrap();
        assert_relative_eq!(m, 58.124, epsilon = 1e-9);
        assert_eq!(counts["H"], 10);
    }
}
