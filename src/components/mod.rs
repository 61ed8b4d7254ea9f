//! Component models for circuit simulation.
//!
//! This module provides models for all supported circuit components:
//! - Sources: Voltage Source (battery)
//! - Linear: Resistor, Capacitor (open in DC)
//! - Nonlinear: LED / diode-like emitter
//! - Controls: Potentiometer, Switch
//!
//! Every model implements [`DeviceModel`]: it stamps itself through a
//! [`Stamper`] given only the node of each of its pins, and reports its pin
//! voltages and currents given only the voltage of each of its pins. Models
//! never see matrix indices, so a new device type plugs in without touching
//! the topology builder or the solver.

mod controls;
mod diode;
mod linear;
mod sources;

pub use controls::{Potentiometer, Switch};
pub use diode::Led;
pub use linear::{Capacitor, Resistor};
pub use sources::VoltageSource;

use std::fmt;
use std::str::FromStr;

use crate::circuit::{BranchId, ComponentId, NodeId, PinSpec};
use crate::error::{BreadboardError, Result};

/// Sink for a device's contribution to the system of equations.
///
/// Implemented by the equation assembler; devices address it only by node.
pub trait Stamper {
    /// Conductance `g` between nodes `a` and `b`.
    fn conductance(&mut self, a: NodeId, b: NodeId, g: f64);

    /// Constant current flowing through the device from node `from` to node `to`.
    fn current(&mut self, from: NodeId, to: NodeId, current: f64);

    /// Ideal source enforcing `V(pos) - V(neg) = voltage`, with its current
    /// carried by the auxiliary unknown `branch`.
    fn voltage_source(&mut self, pos: NodeId, neg: NodeId, branch: BranchId, voltage: f64);
}

/// Linearization region of a nonlinear device.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// Below threshold: near-open circuit
    #[default]
    Off,
    /// Fixed forward drop in series with a small on-resistance
    Conducting,
    /// Current clamped at the device's rated maximum
    Saturated,
}

/// Guessed operating point of a nonlinear device for Newton-Raphson.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OperatingPoint {
    /// Terminal voltage the companion model was built around
    pub voltage: f64,
    pub region: Region,
}

/// Numerical constants of the companion models, taken from the solver config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompanionParams {
    /// Series resistance of a conducting emitter (ohms)
    pub on_resistance: f64,
    /// Leakage conductance of a blocking emitter (siemens)
    pub off_conductance: f64,
}

impl Default for CompanionParams {
    fn default() -> Self {
        Self {
            on_resistance: crate::solver::DEFAULT_ON_RESISTANCE,
            off_conductance: crate::solver::MIN_CONDUCTANCE,
        }
    }
}

/// Everything a device may look at while stamping.
#[derive(Debug, Clone, Copy)]
pub struct StampInput<'a> {
    /// Node of each pin, in pin order
    pub nodes: &'a [NodeId],
    /// Auxiliary current unknown, for devices that asked for one
    pub branch: Option<BranchId>,
    pub operating_point: OperatingPoint,
    pub companion: CompanionParams,
}

/// Everything a device may look at while reporting.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    /// Voltage of each pin, in pin order
    pub voltages: &'a [f64],
    /// Solved value of the auxiliary current unknown
    pub branch_current: Option<f64>,
    pub operating_point: OperatingPoint,
    pub companion: CompanionParams,
}

/// Solved state of one pin.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PinReading {
    pub voltage: f64,
    pub current: f64,
}

impl PinReading {
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }
}

/// Why a property could not be set on a device.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyError {
    Unknown,
    Invalid(&'static str),
}

/// The capability interface every device type implements.
pub trait DeviceModel {
    /// Ordered pin list of this device type.
    fn pins(&self) -> &'static [PinSpec];

    /// Whether the device needs an auxiliary current unknown.
    fn needs_branch(&self) -> bool {
        false
    }

    /// Whether the device must be re-linearized inside Newton-Raphson.
    fn is_nonlinear(&self) -> bool {
        false
    }

    /// Whether the device gives its pins' nodes a DC path to each other.
    fn conducts(&self) -> bool {
        true
    }

    /// Contribute conductances and sources for the given pin nodes.
    fn stamp(&self, input: &StampInput<'_>, stamper: &mut dyn Stamper);

    /// Compute the (voltage, current) of every pin from the pin voltages.
    fn report(&self, input: &ReportInput<'_>) -> Vec<PinReading>;

    /// Starting guess for Newton-Raphson.
    fn initial_operating_point(&self) -> OperatingPoint {
        OperatingPoint::default()
    }

    /// Guess for the next Newton-Raphson iteration given freshly solved pin voltages.
    fn next_operating_point(
        &self,
        current: OperatingPoint,
        _voltages: &[f64],
        _companion: &CompanionParams,
    ) -> OperatingPoint {
        current
    }

    /// Names of the numeric properties this device exposes.
    fn property_names(&self) -> &'static [&'static str];

    fn property(&self, name: &str) -> Option<f64>;

    fn set_property(&mut self, name: &str, value: f64) -> std::result::Result<(), PropertyError>;
}

/// Type tag of a component, as supplied by the editor.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    VoltageSource,
    Resistor,
    Led,
    Capacitor,
    Switch,
    Potentiometer,
}

impl ComponentType {
    /// The editor's tag for this type.
    pub fn tag(&self) -> &'static str {
        match self {
            ComponentType::VoltageSource => "battery",
            ComponentType::Resistor => "resistor",
            ComponentType::Led => "led",
            ComponentType::Capacitor => "capacitor",
            ComponentType::Switch => "switch",
            ComponentType::Potentiometer => "potentiometer",
        }
    }

    /// A device of this type carrying the palette's default properties.
    pub fn default_device(&self) -> Device {
        match self {
            ComponentType::VoltageSource => Device::VoltageSource(VoltageSource::default()),
            ComponentType::Resistor => Device::Resistor(Resistor::default()),
            ComponentType::Led => Device::Led(Led::default()),
            ComponentType::Capacitor => Device::Capacitor(Capacitor::default()),
            ComponentType::Switch => Device::Switch(Switch::default()),
            ComponentType::Potentiometer => Device::Potentiometer(Potentiometer::default()),
        }
    }
}

impl FromStr for ComponentType {
    type Err = BreadboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "battery" | "voltage_source" | "voltage-source" => Ok(ComponentType::VoltageSource),
            "resistor" => Ok(ComponentType::Resistor),
            "led" | "diode" => Ok(ComponentType::Led),
            "capacitor" => Ok(ComponentType::Capacitor),
            "switch" => Ok(ComponentType::Switch),
            "potentiometer" | "pot" => Ok(ComponentType::Potentiometer),
            _ => Err(BreadboardError::UnknownComponentType {
                component_type: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A circuit device: the closed set of supported models.
#[derive(Debug, Clone, PartialEq)]
pub enum Device {
    VoltageSource(VoltageSource),
    Resistor(Resistor),
    Led(Led),
    Capacitor(Capacitor),
    Switch(Switch),
    Potentiometer(Potentiometer),
}

macro_rules! dispatch {
    ($self:ident, $d:ident => $body:expr) => {
        match $self {
            Device::VoltageSource($d) => $body,
            Device::Resistor($d) => $body,
            Device::Led($d) => $body,
            Device::Capacitor($d) => $body,
            Device::Switch($d) => $body,
            Device::Potentiometer($d) => $body,
        }
    };
}

impl Device {
    /// Parse an editor type tag into a device with default properties.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Ok(tag.parse::<ComponentType>()?.default_device())
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Device::VoltageSource(_) => ComponentType::VoltageSource,
            Device::Resistor(_) => ComponentType::Resistor,
            Device::Led(_) => ComponentType::Led,
            Device::Capacitor(_) => ComponentType::Capacitor,
            Device::Switch(_) => ComponentType::Switch,
            Device::Potentiometer(_) => ComponentType::Potentiometer,
        }
    }

    /// Set a property, attributing errors to `component`.
    pub fn set_property_checked(
        &mut self,
        component: ComponentId,
        name: &str,
        value: f64,
    ) -> Result<()> {
        if !value.is_finite() {
            return Err(BreadboardError::invalid_parameter(
                component,
                name,
                value,
                "value must be finite",
            ));
        }
        self.set_property(name, value).map_err(|err| match err {
            PropertyError::Unknown => BreadboardError::UnknownProperty {
                component,
                property: name.to_string(),
            },
            PropertyError::Invalid(message) => {
                BreadboardError::invalid_parameter(component, name, value, message)
            }
        })
    }
}

impl DeviceModel for Device {
    fn pins(&self) -> &'static [PinSpec] {
        dispatch!(self, d => d.pins())
    }

    fn needs_branch(&self) -> bool {
        dispatch!(self, d => d.needs_branch())
    }

    fn is_nonlinear(&self) -> bool {
        dispatch!(self, d => d.is_nonlinear())
    }

    fn conducts(&self) -> bool {
        dispatch!(self, d => d.conducts())
    }

    fn stamp(&self, input: &StampInput<'_>, stamper: &mut dyn Stamper) {
        dispatch!(self, d => d.stamp(input, stamper))
    }

    fn report(&self, input: &ReportInput<'_>) -> Vec<PinReading> {
        dispatch!(self, d => d.report(input))
    }

    fn initial_operating_point(&self) -> OperatingPoint {
        dispatch!(self, d => d.initial_operating_point())
    }

    fn next_operating_point(
        &self,
        current: OperatingPoint,
        voltages: &[f64],
        companion: &CompanionParams,
    ) -> OperatingPoint {
        dispatch!(self, d => d.next_operating_point(current, voltages, companion))
    }

    fn property_names(&self) -> &'static [&'static str] {
        dispatch!(self, d => d.property_names())
    }

    fn property(&self, name: &str) -> Option<f64> {
        dispatch!(self, d => d.property(name))
    }

    fn set_property(&mut self, name: &str, value: f64) -> std::result::Result<(), PropertyError> {
        dispatch!(self, d => d.set_property(name, value))
    }
}
