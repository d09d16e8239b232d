//! Numbers with composite units.
//!
//! A [`Unit`] keeps sorted numerator and denominator atom lists so `px*s/em`
//! compares equal however it was produced. Conversion between atoms of the
//! same group (length, duration, angle) goes through the factor tables below.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::tree::color::{arith, format_number};
use crate::{err_msg, LessResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitGroup {
    Length,
    Duration,
    Angle,
}

impl UnitGroup {
    pub const ALL: [UnitGroup; 3] = [UnitGroup::Length, UnitGroup::Duration, UnitGroup::Angle];

    /// Factor of `atom` relative to the group's base unit.
    pub fn factor(self, atom: &str) -> Option<f64> {
        let f = match (self, atom) {
            (UnitGroup::Length, "m") => 1.0,
            (UnitGroup::Length, "cm") => 0.01,
            (UnitGroup::Length, "mm") => 0.001,
            (UnitGroup::Length, "in") => 0.0254,
            (UnitGroup::Length, "px") => 0.0254 / 96.0,
            (UnitGroup::Length, "pt") => 0.0254 / 72.0,
            (UnitGroup::Length, "pc") => 0.0254 / 72.0 * 12.0,
            (UnitGroup::Duration, "s") => 1.0,
            (UnitGroup::Duration, "ms") => 0.001,
            (UnitGroup::Angle, "rad") => 1.0 / (2.0 * PI),
            (UnitGroup::Angle, "deg") => 1.0 / 360.0,
            (UnitGroup::Angle, "grad") => 1.0 / 400.0,
            (UnitGroup::Angle, "turn") => 1.0,
            _ => return None,
        };
        Some(f)
    }

    pub fn of(atom: &str) -> Option<UnitGroup> {
        Self::ALL.into_iter().find(|g| g.factor(atom).is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    pub numerator: Vec<String>,
    pub denominator: Vec<String>,
    /// Printed when the unit is not singular and units are not strict.
    pub backup_unit: Option<String>,
}

impl Unit {
    pub fn new(mut numerator: Vec<String>, mut denominator: Vec<String>) -> Self {
        numerator.sort();
        denominator.sort();
        let backup_unit = numerator.first().cloned();
        Self {
            numerator,
            denominator,
            backup_unit,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Single-atom unit; empty text gives the empty unit.
    pub fn atom(text: &str) -> Self {
        if text.is_empty() {
            Self::none()
        } else {
            Self::new(vec![text.to_string()], Vec::new())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.numerator.is_empty() && self.denominator.is_empty()
    }

    pub fn is_singular(&self) -> bool {
        self.numerator.len() <= 1 && self.denominator.is_empty()
    }

    /// Case-insensitive comparison against the canonical `a*b/c` form.
    pub fn is(&self, text: &str) -> bool {
        self.to_string().eq_ignore_ascii_case(text)
    }

    pub fn is_length(&self) -> bool {
        const LENGTHS: [&str; 14] = [
            "px", "em", "ex", "ch", "rem", "in", "cm", "mm", "pc", "pt", "vw", "vh", "vmin", "vmax",
        ];
        self.numerator
            .iter()
            .any(|u| LENGTHS.iter().any(|l| u.eq_ignore_ascii_case(l)))
    }

    /// First atom seen per convertible group.
    pub fn used_units(&self) -> BTreeMap<UnitGroup, String> {
        let mut out = BTreeMap::new();
        for atom in self.numerator.iter().chain(&self.denominator) {
            if let Some(group) = UnitGroup::of(atom) {
                out.entry(group).or_insert_with(|| atom.clone());
            }
        }
        out
    }

    /// Removes atoms present in both lists.
    pub fn cancel(&mut self) {
        let mut counter: BTreeMap<String, i64> = BTreeMap::new();
        for atom in &self.numerator {
            *counter.entry(atom.clone()).or_default() += 1;
        }
        for atom in &self.denominator {
            *counter.entry(atom.clone()).or_default() -= 1;
        }
        self.numerator.clear();
        self.denominator.clear();
        for (atom, count) in counter {
            for _ in 0..count.unsigned_abs() {
                if count > 0 {
                    self.numerator.push(atom.clone());
                } else {
                    self.denominator.push(atom.clone());
                }
            }
        }
    }

    pub fn to_css(&self, strict_units: bool) -> String {
        if self.numerator.len() == 1 {
            return self.numerator[0].clone();
        }
        if strict_units {
            return String::new();
        }
        if let Some(backup) = &self.backup_unit {
            return backup.clone();
        }
        self.denominator.first().cloned().unwrap_or_default()
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "{}", self.numerator.join("*"))?;
        for d in &self.denominator {
            write!(f, "/{d}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub value: f64,
    pub unit: Unit,
}

impl Dimension {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn unitless(value: f64) -> Self {
        Self::new(value, Unit::none())
    }

    pub fn with_unit(value: f64, unit: &str) -> Self {
        Self::new(value, Unit::atom(unit))
    }

    pub fn operate(&self, op: &str, other: &Dimension, strict_units: bool) -> LessResult<Dimension> {
        if matches!(op, "/" | "./") && other.value == 0.0 {
            return Err(err_msg!(Operation, "Division by zero"));
        }
        let mut value = arith(op, self.value, other.value);
        let mut unit = self.unit.clone();
        match op {
            "+" | "-" => {
                if unit.is_empty() {
                    unit = other.unit.clone();
                    if self.unit.backup_unit.is_some() {
                        unit.backup_unit = self.unit.backup_unit.clone();
                    }
                } else if !(other.unit.numerator.is_empty() && unit.denominator.is_empty()) {
                    let converted = other.convert_to(&self.unit.used_units());
                    if strict_units && converted.unit.to_string() != unit.to_string() {
                        return Err(err_msg!(
                            Operation,
                            "Incompatible units. Change the units or use the unit function. Bad units: '{}' and '{}'.",
                            unit,
                            converted.unit
                        ));
                    }
                    value = arith(op, self.value, converted.value);
                }
            }
            "*" => {
                unit.numerator.extend(other.unit.numerator.iter().cloned());
                unit.denominator.extend(other.unit.denominator.iter().cloned());
                unit.numerator.sort();
                unit.denominator.sort();
                unit.cancel();
            }
            "/" | "./" => {
                unit.numerator.extend(other.unit.denominator.iter().cloned());
                unit.denominator.extend(other.unit.numerator.iter().cloned());
                unit.numerator.sort();
                unit.denominator.sort();
                unit.cancel();
            }
            _ => {}
        }
        Ok(Dimension::new(value, unit))
    }

    /// Converts every convertible atom into the target of its group.
    pub fn convert_to(&self, targets: &BTreeMap<UnitGroup, String>) -> Dimension {
        let mut value = self.value;
        let mut unit = self.unit.clone();
        for (group, target) in targets {
            let Some(target_factor) = group.factor(target) else {
                continue;
            };
            let mut convert = |atom: &mut String, denominator: bool| {
                if let Some(factor) = group.factor(atom) {
                    if denominator {
                        value /= factor / target_factor;
                    } else {
                        value *= factor / target_factor;
                    }
                    *atom = target.clone();
                }
            };
            for atom in &mut unit.numerator {
                convert(atom, false);
            }
            for atom in &mut unit.denominator {
                convert(atom, true);
            }
            unit.numerator.sort();
            unit.denominator.sort();
        }
        unit.cancel();
        Dimension::new(value, unit)
    }

    /// Converts to a single named unit, when it belongs to a known group.
    pub fn convert_to_unit(&self, target: &str) -> Dimension {
        let mut targets = BTreeMap::new();
        if let Some(group) = UnitGroup::of(target) {
            targets.insert(group, target.to_string());
        }
        self.convert_to(&targets)
    }

    /// Base units: px, s, rad.
    pub fn unify(&self) -> Dimension {
        let mut targets = BTreeMap::new();
        targets.insert(UnitGroup::Length, "px".to_string());
        targets.insert(UnitGroup::Duration, "s".to_string());
        targets.insert(UnitGroup::Angle, "rad".to_string());
        self.convert_to(&targets)
    }

    /// Ordering when comparable: unitless values compare with anything.
    pub fn compare(&self, other: &Dimension) -> Option<std::cmp::Ordering> {
        let (a, b) = if self.unit.is_empty() || other.unit.is_empty() {
            (self.clone(), other.clone())
        } else {
            let a = self.unify();
            let b = other.unify();
            if !a.unit.is(&b.unit.to_string()) {
                return None;
            }
            (a, b)
        };
        a.value.partial_cmp(&b.value)
    }

    pub fn to_css(&self, compress: bool, strict_units: bool) -> LessResult<String> {
        if strict_units && !self.unit.is_singular() {
            return Err(err_msg!(
                Operation,
                "Multiple units in dimension. Correct the units or use the unit function. Bad unit: {}",
                self.unit
            ));
        }
        let value = self.value;
        let mut text = if value != 0.0 && value.abs() < 0.000001 {
            let s = format!("{value:.20}");
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            format_number(value)
        };
        if compress {
            if value == 0.0 && self.unit.is_length() {
                return Ok(text);
            }
            if value > 0.0 && value < 1.0 && text.starts_with('0') {
                text.remove(0);
            }
        }
        text.push_str(&self.unit.to_css(strict_units));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_takes_left_unit_and_converts() {
        let a = Dimension::with_unit(1.0, "px");
        let b = Dimension::unitless(2.0);
        assert_eq!(a.operate("+", &b, false).unwrap(), Dimension::with_unit(3.0, "px"));
        let b = Dimension::with_unit(1.0, "in");
        let sum = a.operate("+", &b, false).unwrap();
        assert_eq!(sum.unit.to_string(), "px");
        assert!((sum.value - 97.0).abs() < 1e-9);
    }

    #[test]
    fn test_unitless_left_adopts_right_unit() {
        let a = Dimension::unitless(2.0);
        let b = Dimension::with_unit(3.0, "em");
        assert_eq!(a.operate("+", &b, false).unwrap().to_css(false, false).unwrap(), "5em");
    }

    #[test]
    fn test_multiply_and_cancel() {
        let a = Dimension::with_unit(2.0, "px");
        let b = Dimension::unitless(3.0);
        assert_eq!(a.operate("*", &b, false).unwrap(), Dimension::with_unit(6.0, "px"));
        let per_s = a.operate("/", &Dimension::with_unit(2.0, "s"), false).unwrap();
        assert_eq!(per_s.unit.to_string(), "px/s");
        let back = per_s.operate("*", &Dimension::with_unit(1.0, "s"), false).unwrap();
        assert_eq!(back.unit.to_string(), "px");
    }

    #[test]
    fn test_strict_units() {
        let a = Dimension::with_unit(1.0, "px");
        let b = Dimension::with_unit(1.0, "s");
        let err = a.operate("+", &b, true).unwrap_err();
        assert_eq!(
            err.message(),
            "Incompatible units. Change the units or use the unit function. Bad units: 'px' and 's'."
        );
        let area = a.operate("*", &a, false).unwrap();
        assert!(area.to_css(false, true).is_err());
        assert_eq!(area.to_css(false, false).unwrap(), "1px");
    }

    #[test]
    fn test_division_by_zero() {
        let err = Dimension::unitless(1.0)
            .operate("/", &Dimension::unitless(0.0), false)
            .unwrap_err();
        assert_eq!(err.message(), "Division by zero");
    }

    #[test]
    fn test_compare_across_units() {
        let a = Dimension::with_unit(1.0, "in");
        let b = Dimension::with_unit(96.0, "px");
        assert_eq!(a.compare(&b), Some(std::cmp::Ordering::Equal));
        assert_eq!(a.compare(&Dimension::with_unit(1.0, "s")), None);
        assert_eq!(a.compare(&Dimension::unitless(2.0)), Some(std::cmp::Ordering::Less));
    }

    #[test]
    fn test_compressed_output() {
        assert_eq!(Dimension::with_unit(0.5, "em").to_css(true, false).unwrap(), ".5em");
        assert_eq!(Dimension::with_unit(0.0, "px").to_css(true, false).unwrap(), "0");
        assert_eq!(Dimension::with_unit(0.0, "%").to_css(true, false).unwrap(), "0%");
        assert_eq!(Dimension::unitless(-0.0).to_css(false, false).unwrap(), "0");
    }
}
