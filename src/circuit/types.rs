//! Core types for circuit representation.

use std::fmt;

/// A unique identifier for a component in the circuit.
///
/// Ids are handed out by [`Circuit`](super::Circuit) and never reused, so a
/// removed component's id cannot alias a later one.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A unique identifier for a wire between two pins.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// A per-tick electrical node: the set of pins joined by wiring.
///
/// Node ids index the node arena of a [`Topology`](crate::solver::Topology)
/// and are only meaningful together with it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Index for extra unknowns in the MNA system (voltage source currents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Reference to one pin of one component.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinRef {
    pub component: ComponentId,
    /// Position of the pin in the component's ordered pin list
    pub pin: usize,
}

impl PinRef {
    pub fn new(component: ComponentId, pin: usize) -> Self {
        Self { component, pin }
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.pin)
    }
}

/// Electrical role of a pin.
///
/// The role fixes the reference direction of the pin's reported current.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinRole {
    /// Source output terminal. Current is positive flowing out of the pin
    /// into the circuit.
    SourcePositive,
    /// Source return terminal and the circuit's voltage reference. Current is
    /// positive flowing out of the pin into the circuit.
    SourceNegative,
    /// Passive terminal. Current is positive flowing into the component.
    Passive,
}

impl PinRole {
    /// Whether this pin designates its node as ground.
    pub fn is_reference(&self) -> bool {
        matches!(self, PinRole::SourceNegative)
    }
}

/// Static description of one pin of a device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSpec {
    pub name: &'static str,
    pub role: PinRole,
}

impl PinSpec {
    pub const fn new(name: &'static str, role: PinRole) -> Self {
        Self { name, role }
    }

    pub const fn passive(name: &'static str) -> Self {
        Self::new(name, PinRole::Passive)
    }
}

/// A component pin with the state written back by the last tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub name: &'static str,
    pub role: PinRole,
    /// Last computed voltage (V)
    pub voltage: f64,
    /// Last computed current (A), signed per [`PinRole`]
    pub current: f64,
}

impl Pin {
    pub fn from_spec(spec: &PinSpec) -> Self {
        Self {
            name: spec.name,
            role: spec.role,
            voltage: 0.0,
            current: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_negative_is_reference() {
        assert!(PinRole::SourceNegative.is_reference());
        assert!(!PinRole::SourcePositive.is_reference());
        assert!(!PinRole::Passive.is_reference());
    }

    #[test]
    fn test_display() {
        assert_eq!(PinRef::new(ComponentId(4), 1).to_string(), "C4.1");
        assert_eq!(NodeId(0).to_string(), "N0");
        assert_eq!(ConnectionId(7).to_string(), "W7");
    }
}
