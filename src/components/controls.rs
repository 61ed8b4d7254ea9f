//! Control components: Potentiometer and Switch.

use super::{DeviceModel, PinReading, PropertyError, ReportInput, StampInput, Stamper};
use crate::circuit::PinSpec;

const POT_PINS: [PinSpec; 3] = [
    PinSpec::passive("end1"),
    PinSpec::passive("wiper"),
    PinSpec::passive("end2"),
];

const SWITCH_PINS: [PinSpec; 2] = [PinSpec::passive("pin1"), PinSpec::passive("pin2")];

/// A potentiometer component.
///
/// Modeled as two resistors in series with a wiper tap:
///   end1 ----[R1]---- wiper ----[R2]---- end2
///
/// where R1 = position * total_resistance
/// and   R2 = (1 - position) * total_resistance
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Potentiometer {
    pub total_resistance: f64,
    /// Position from 0.0 to 1.0
    pub position: f64,
}

impl Default for Potentiometer {
    fn default() -> Self {
        Self::new(10_000.0, 0.5)
    }
}

impl Potentiometer {
    /// Create a new potentiometer.
    pub fn new(total_resistance: f64, position: f64) -> Self {
        Self {
            total_resistance: total_resistance.max(1.0), // Minimum 1 ohm
            position: position.clamp(0.0, 1.0),
        }
    }

    /// Get the resistance from end1 to wiper.
    pub fn r1(&self) -> f64 {
        (self.position * self.total_resistance).max(0.1)
    }

    /// Get the resistance from wiper to end2.
    pub fn r2(&self) -> f64 {
        ((1.0 - self.position) * self.total_resistance).max(0.1)
    }

    /// Get the conductance from end1 to wiper.
    pub fn g1(&self) -> f64 {
        1.0 / self.r1()
    }

    /// Get the conductance from wiper to end2.
    pub fn g2(&self) -> f64 {
        1.0 / self.r2()
    }
}

impl DeviceModel for Potentiometer {
    fn pins(&self) -> &'static [PinSpec] {
        &POT_PINS
    }

    fn stamp(&self, input: &StampInput<'_>, stamper: &mut dyn Stamper) {
        let [end1, wiper, end2] = [input.nodes[0], input.nodes[1], input.nodes[2]];
        stamper.conductance(end1, wiper, self.g1());
        stamper.conductance(wiper, end2, self.g2());
    }

    fn report(&self, input: &ReportInput<'_>) -> Vec<PinReading> {
        let [v1, vw, v2] = [input.voltages[0], input.voltages[1], input.voltages[2]];
        // Currents flowing end1 -> wiper and wiper -> end2
        let i1 = (v1 - vw) * self.g1();
        let i2 = (vw - v2) * self.g2();
        vec![
            PinReading::new(v1, i1),
            PinReading::new(vw, i2 - i1),
            PinReading::new(v2, -i2),
        ]
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["resistance", "position"]
    }

    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "resistance" => Some(self.total_resistance),
            "position" => Some(self.position),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> Result<(), PropertyError> {
        match name {
            "resistance" if value <= 0.0 => {
                Err(PropertyError::Invalid("resistance must be positive"))
            }
            "resistance" => {
                self.total_resistance = value.max(1.0);
                Ok(())
            }
            "position" if !(0.0..=1.0).contains(&value) => {
                Err(PropertyError::Invalid("position must lie in [0, 1]"))
            }
            "position" => {
                self.position = value;
                Ok(())
            }
            _ => Err(PropertyError::Unknown),
        }
    }
}

/// A switch component.
///
/// Modeled as a resistance:
/// - Closed: very small resistance (0.01 ohms)
/// - Open: very large resistance (1e9 ohms)
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Switch {
    pub closed: bool,
}

impl Switch {
    /// Resistance when closed.
    pub const R_CLOSED: f64 = 0.01;
    /// Resistance when open.
    pub const R_OPEN: f64 = 1e9;

    /// Create a new switch.
    pub fn new(closed: bool) -> Self {
        Self { closed }
    }

    /// Get the current resistance.
    pub fn resistance(&self) -> f64 {
        if self.closed {
            Self::R_CLOSED
        } else {
            Self::R_OPEN
        }
    }

    /// Get the current conductance.
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance()
    }

    /// Toggle the switch state.
    pub fn toggle(&mut self) {
        self.closed = !self.closed;
    }
}

impl DeviceModel for Switch {
    fn pins(&self) -> &'static [PinSpec] {
        &SWITCH_PINS
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
        &["closed"]
    }

    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "closed" => Some(if self.closed { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> Result<(), PropertyError> {
        match name {
            "closed" => {
                self.closed = value > 0.5;
                Ok(())
            }
            _ => Err(PropertyError::Unknown),
        }
    }
}
