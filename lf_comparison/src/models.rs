use serde::{Deserialize, Serialize};
use std::fmt;

/// Element categories compared across the two load-flow reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementCategory {
    Lines,
    XLines,
    Nodes,
    XNodes,
}

impl ElementCategory {
    pub const ALL: [ElementCategory; 4] = [
        ElementCategory::Lines,
        ElementCategory::XLines,
        ElementCategory::Nodes,
        ElementCategory::XNodes,
    ];

    /// Output sheet name.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            ElementCategory::Lines => "Lines",
            ElementCategory::XLines => "X-lines",
            ElementCategory::Nodes => "Nodes",
            ElementCategory::XNodes => "X-Nodes",
        }
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Current,
    ActivePower,
    ReactivePower,
    VoltageMagnitude,
    VoltageAngle,
}

impl Quantity {
    pub fn label(&self) -> &'static str {
        match self {
            Quantity::Current => "I",
            Quantity::ActivePower => "P",
            Quantity::ReactivePower => "Q",
            Quantity::VoltageMagnitude => "U",
            Quantity::VoltageAngle => "theta",
        }
    }
}

/// Electrical quantities measured for one element. Absent cells stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub current: Option<f64>,
    pub active_power: Option<f64>,
    pub reactive_power: Option<f64>,
    pub voltage: Option<f64>,
    pub angle: Option<f64>,
}

impl Measurements {
    pub fn get(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Current => self.current,
            Quantity::ActivePower => self.active_power,
            Quantity::ReactivePower => self.reactive_power,
            Quantity::VoltageMagnitude => self.voltage,
            Quantity::VoltageAngle => self.angle,
        }
    }

    pub fn set(&mut self, quantity: Quantity, value: Option<f64>) {
        let slot = match quantity {
            Quantity::Current => &mut self.current,
            Quantity::ActivePower => &mut self.active_power,
            Quantity::ReactivePower => &mut self.reactive_power,
            Quantity::VoltageMagnitude => &mut self.voltage,
            Quantity::VoltageAngle => &mut self.angle,
        };
        *slot = value;
    }
}

/// Join key: canonical identifier plus optional side/terminal (or bus) tag.
/// Ordering is by identifier first, then side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementKey {
    pub id: String,
    pub side: Option<String>,
}

impl ElementKey {
    pub fn new(id: impl Into<String>, side: Option<String>) -> Self {
        Self { id: id.into(), side }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.side {
            Some(side) => write!(f, "{}/{}", self.id, side),
            None => f.write_str(&self.id),
        }
    }
}

/// One row of one source's report for one element at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    pub key: ElementKey,
    pub measurements: Measurements,
}

/// Records from both sources that share a key.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedRecord {
    pub key: ElementKey,
    pub reference: Measurements,
    pub candidate: Measurements,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldComparison {
    pub quantity: Quantity,
    pub reference: f64,
    pub candidate: f64,
    /// reference - candidate
    pub diff: f64,
    pub abs_diff: f64,
    /// |reference - candidate| / |reference| * 100, zero when undefined
    pub pct_diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub key: ElementKey,
    pub fields: Vec<FieldComparison>,
    pub timestamp: String,
}

impl ComparisonRecord {
    pub fn field(&self, quantity: Quantity) -> Option<&FieldComparison> {
        self.fields.iter().find(|f| f.quantity == quantity)
    }
}

/// Comparison rows for one category at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSheet {
    pub category: ElementCategory,
    pub timestamp: String,
    pub records: Vec<ComparisonRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            ElementKey::new("B", Some("1".to_string())),
            ElementKey::new("A", Some("2".to_string())),
            ElementKey::new("A", Some("1".to_string())),
        ];
        keys.sort();
        assert_eq!(keys[0].to_string(), "A/1");
        assert_eq!(keys[1].to_string(), "A/2");
        assert_eq!(keys[2].to_string(), "B/1");
    }

    #[test]
    fn test_measurement_accessors() {
        let mut m = Measurements::default();
        m.set(Quantity::VoltageAngle, Some(-3.5));
        assert_eq!(m.get(Quantity::VoltageAngle), Some(-3.5));
        assert_eq!(m.get(Quantity::Current), None);
    }
}
