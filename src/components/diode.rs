//! LED / diode-like emitter model.
//!
//! The emitter conducts forward only and is piecewise linear:
//!
//! ```text
//!   v < Vf             open circuit             i = G_off * v
//!   v >= Vf            fixed drop + R_on        i = (v - Vf) / R_on
//!   i would exceed Imax   clamped current source   i = Imax
//! ```
//!
//! The solver never sees the curve. Each Newton-Raphson iteration the device
//! stamps the linear companion of its current region, and after the solve
//! [`DeviceModel::next_operating_point`] picks the region consistent with the
//! new terminal voltage.

use super::{
    CompanionParams, DeviceModel, OperatingPoint, PinReading, PropertyError, Region, ReportInput,
    StampInput, Stamper,
};
use crate::circuit::PinSpec;

const PINS: [PinSpec; 2] = [PinSpec::passive("anode"), PinSpec::passive("cathode")];

/// A conducting emitter only turns off this far below its threshold (V).
/// Smaller than any meaningful drop, larger than the solve's rounding.
const OFF_BAND: f64 = 1e-9;

/// A light-emitting diode.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Led {
    /// Forward voltage threshold (V). Red ~1.8V, Green ~2.2V, Blue ~3.3V
    pub forward_voltage: f64,
    /// Maximum rated forward current (A)
    pub max_current: f64,
}

impl Default for Led {
    fn default() -> Self {
        Self::new(2.0, 0.020)
    }
}

impl Led {
    /// Create a new LED.
    pub fn new(forward_voltage: f64, max_current: f64) -> Self {
        Self {
            forward_voltage,
            max_current,
        }
    }

    /// Forward current at terminal voltage `v` under the companion of `region`.
    pub fn current(&self, region: Region, v: f64, companion: &CompanionParams) -> f64 {
        match region {
            Region::Off => companion.off_conductance * v,
            Region::Conducting => ((v - self.forward_voltage) / companion.on_resistance).max(0.0),
            Region::Saturated => self.max_current + companion.off_conductance * v,
        }
    }

    /// Relative light output in `[0, 1]` for a forward current.
    pub fn brightness(&self, current: f64) -> f64 {
        if self.max_current <= 0.0 {
            return 0.0;
        }
        (current / self.max_current).clamp(0.0, 1.0)
    }
}

impl DeviceModel for Led {
    fn pins(&self) -> &'static [PinSpec] {
        &PINS
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn stamp(&self, input: &StampInput<'_>, stamper: &mut dyn Stamper) {
        let (anode, cathode) = (input.nodes[0], input.nodes[1]);
        let companion = &input.companion;
        match input.operating_point.region {
            Region::Off => {
                stamper.conductance(anode, cathode, companion.off_conductance);
            }
            Region::Conducting => {
                // Norton form of Vf in series with R_on:
                //   i = G_on * v - G_on * Vf
                let g_on = 1.0 / companion.on_resistance;
                stamper.conductance(anode, cathode, g_on);
                stamper.current(anode, cathode, -g_on * self.forward_voltage);
            }
            Region::Saturated => {
                stamper.conductance(anode, cathode, companion.off_conductance);
                stamper.current(anode, cathode, self.max_current);
            }
        }
    }

    fn report(&self, input: &ReportInput<'_>) -> Vec<PinReading> {
        let (va, vc) = (input.voltages[0], input.voltages[1]);
        let current = self.current(input.operating_point.region, va - vc, &input.companion);
        vec![PinReading::new(va, current), PinReading::new(vc, -current)]
    }

    fn next_operating_point(
        &self,
        current: OperatingPoint,
        voltages: &[f64],
        companion: &CompanionParams,
    ) -> OperatingPoint {
        let v = voltages[0] - voltages[1];
        let below_threshold = v < self.forward_voltage;
        let region = match current.region {
            Region::Off if below_threshold => Region::Off,
            Region::Off => Region::Conducting,
            Region::Conducting if v < self.forward_voltage - OFF_BAND => Region::Off,
            Region::Conducting
                if self.current(Region::Conducting, v, companion) > self.max_current =>
            {
                Region::Saturated
            }
            Region::Conducting => Region::Conducting,
            // The network cannot hold the rated current at the threshold
            Region::Saturated if below_threshold => Region::Conducting,
            Region::Saturated => Region::Saturated,
        };
        OperatingPoint { voltage: v, region }
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["forward_voltage", "max_current"]
    }

    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "forward_voltage" => Some(self.forward_voltage),
            "max_current" => Some(self.max_current),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> Result<(), PropertyError> {
        match name {
            "forward_voltage" if value < 0.0 => {
                Err(PropertyError::Invalid("forward voltage must not be negative"))
            }
            "forward_voltage" => {
                self.forward_voltage = value;
                Ok(())
            }
            "max_current" if value <= 0.0 => {
                Err(PropertyError::Invalid("max current must be positive"))
            }
            "max_current" => {
                self.max_current = value;
                Ok(())
            }
            _ => Err(PropertyError::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(led: &Led, region: Region, v: f64) -> Region {
        let op = OperatingPoint { voltage: 0.0, region };
        led.next_operating_point(op, &[v, 0.0], &CompanionParams::default())
            .region
    }

    #[test]
    fn test_region_transitions() {
        let led = Led::default();

        assert_eq!(step(&led, Region::Off, 1.5), Region::Off);
        assert_eq!(step(&led, Region::Off, 2.0), Region::Conducting);
        assert_eq!(step(&led, Region::Off, -5.0), Region::Off);

        // Tiny overdrive past Vf stays under the rated current
        assert_eq!(step(&led, Region::Conducting, 2.0 + 1e-9), Region::Conducting);
        assert_eq!(step(&led, Region::Conducting, 1.9), Region::Off);
        // Rounding noise at the threshold does not switch it off
        assert_eq!(step(&led, Region::Conducting, 2.0 - 1e-14), Region::Conducting);
        assert_eq!(step(&led, Region::Conducting, 2.5), Region::Saturated);

        assert_eq!(step(&led, Region::Saturated, 4.8), Region::Saturated);
        assert_eq!(step(&led, Region::Saturated, 0.6), Region::Conducting);
    }

    #[test]
    fn test_current_per_region() {
        let led = Led::default();
        let companion = CompanionParams::default();

        assert!(led.current(Region::Off, -5.0, &companion).abs() < 1e-9);
        assert_eq!(led.current(Region::Saturated, 0.0, &companion), 0.020);
        let i_on = led.current(Region::Conducting, 2.0 + 1e-8, &companion);
        assert!((i_on - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_brightness_is_clamped() {
        let led = Led::default();
        assert_eq!(led.brightness(-0.001), 0.0);
        assert!((led.brightness(0.010) - 0.5).abs() < 1e-12);
        assert_eq!(led.brightness(0.5), 1.0);
    }
}
