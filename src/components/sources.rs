//! Voltage sources.

use super::{DeviceModel, PinReading, PropertyError, ReportInput, StampInput, Stamper};
use crate::circuit::{PinRole, PinSpec};

const PINS: [PinSpec; 2] = [
    PinSpec::new("positive", PinRole::SourcePositive),
    PinSpec::new("negative", PinRole::SourceNegative),
];

/// An ideal voltage source (battery).
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = V_source. Its negative
/// terminal is the circuit's voltage reference.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageSource {
    pub voltage: f64,
}

impl Default for VoltageSource {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(voltage: f64) -> Self {
        Self { voltage }
    }
}

impl DeviceModel for VoltageSource {
    fn pins(&self) -> &'static [PinSpec] {
        &PINS
    }

    fn needs_branch(&self) -> bool {
        true
    }

    fn stamp(&self, input: &StampInput<'_>, stamper: &mut dyn Stamper) {
        if let Some(branch) = input.branch {
            stamper.voltage_source(input.nodes[0], input.nodes[1], branch, self.voltage);
        }
    }

    fn report(&self, input: &ReportInput<'_>) -> Vec<PinReading> {
        // The branch unknown is the current entering the + terminal from the
        // circuit, so the delivered current is its negation.
        let delivered = -input.branch_current.unwrap_or(0.0);
        vec![
            PinReading::new(input.voltages[0], delivered),
            PinReading::new(input.voltages[1], -delivered),
        ]
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["voltage"]
    }

    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "voltage" => Some(self.voltage),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> Result<(), PropertyError> {
        match name {
            "voltage" => {
                self.voltage = value;
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

    #[test]
    fn test_report_follows_source_sign_convention() {
        let source = VoltageSource::new(9.0);
        let readings = source.report(&ReportInput {
            voltages: &[9.0, 0.0],
            branch_current: Some(-0.01),
            operating_point: OperatingPoint::default(),
            companion: CompanionParams::default(),
        });
        assert_eq!(readings[0], PinReading::new(9.0, 0.01));
        assert_eq!(readings[1], PinReading::new(0.0, -0.01));
    }
}
