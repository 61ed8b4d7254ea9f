//! Linear passive components: Resistor, Capacitor.

use super::{DeviceModel, PinReading, PropertyError, ReportInput, StampInput, Stamper};
use crate::circuit::PinSpec;

const PINS: [PinSpec; 2] = [PinSpec::passive("pin1"), PinSpec::passive("pin2")];

/// Minimum resistance to avoid singularity.
const MIN_RESISTANCE: f64 = 1e-12;

/// A resistor component.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Resistor {
    pub resistance: f64,
}

impl Default for Resistor {
    fn default() -> Self {
        Self::new(220.0)
    }
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(resistance: f64) -> Self {
        Self {
            resistance: resistance.max(MIN_RESISTANCE),
        }
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl DeviceModel for Resistor {
    fn pins(&self) -> &'static [PinSpec] {
        &PINS
    }

    fn stamp(&self, input: &StampInput<'_>, stamper: &mut dyn Stamper) {
        stamper.conductance(input.nodes[0], input.nodes[1], self.conductance());
    }

    fn report(&self, input: &ReportInput<'_>) -> Vec<PinReading> {
        let (v1, v2) = (input.voltages[0], input.voltages[1]);
        let current = (v1 - v2) * self.conductance();
        vec![PinReading::new(v1, current), PinReading::new(v2, -current)]
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["resistance"]
    }

    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "resistance" => Some(self.resistance),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> Result<(), PropertyError> {
        match name {
            "resistance" if value <= 0.0 => {
                Err(PropertyError::Invalid("resistance must be positive"))
            }
            "resistance" => {
                self.resistance = value.max(MIN_RESISTANCE);
                Ok(())
            }
            _ => Err(PropertyError::Unknown),
        }
    }
}

/// A capacitor component.
///
/// Without reactive modeling a capacitor in steady state blocks DC: it
/// stamps nothing and carries no current. Its pins still report the voltage
/// of the nodes they sit on.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Capacitor {
    pub capacitance: f64,
}

impl Default for Capacitor {
    fn default() -> Self {
        Self::new(1e-6)
    }
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(capacitance: f64) -> Self {
        Self { capacitance }
    }
}

impl DeviceModel for Capacitor {
    fn pins(&self) -> &'static [PinSpec] {
        &PINS
    }

    fn conducts(&self) -> bool {
        false
    }

    fn stamp(&self, _input: &StampInput<'_>, _stamper: &mut dyn Stamper) {}

    fn report(&self, input: &ReportInput<'_>) -> Vec<PinReading> {
        input
            .voltages
            .iter()
            .map(|&v| PinReading::new(v, 0.0))
            .collect()
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["capacitance"]
    }

    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "capacitance" => Some(self.capacitance),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> Result<(), PropertyError> {
        match name {
            "capacitance" if value < 0.0 => {
                Err(PropertyError::Invalid("capacitance must not be negative"))
            }
            "capacitance" => {
                self.capacitance = value;
                Ok(())
            }
            _ => Err(PropertyError::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CompanionParams, OperatingPoint};

    fn report_input(voltages: &[f64]) -> ReportInput<'_> {
        ReportInput {
            voltages,
            branch_current: None,
            operating_point: OperatingPoint::default(),
            companion: CompanionParams::default(),
        }
    }

    #[test]
    fn test_resistor_conductance() {
        let r = Resistor::new(1000.0);
        assert!((r.conductance() - 0.001).abs() < 1e-10);
    }

    #[test]
    fn test_resistor_report_uses_ohms_law() {
        let r = Resistor::new(220.0);
        let readings = r.report(&report_input(&[5.0, 0.0]));
        assert!((readings[0].current - 5.0 / 220.0).abs() < 1e-12);
        assert_eq!(readings[1].current, -readings[0].current);
        assert_eq!(readings[0].voltage, 5.0);
        assert_eq!(readings[1].voltage, 0.0);
    }

    #[test]
    fn test_capacitor_blocks_dc() {
        let c = Capacitor::default();
        assert!(!c.conducts());
        let readings = c.report(&report_input(&[3.0, 1.0]));
        assert_eq!(readings, vec![PinReading::new(3.0, 0.0), PinReading::new(1.0, 0.0)]);
    }
}
