//! Published per-tick solve state.

use crate::circuit::{ComponentId, NodeId, PinRef};
use crate::components::{ComponentType, PinReading};
use crate::error::BreadboardError;

/// Solved state of one electrical node.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReading {
    pub id: NodeId,
    /// Voltage relative to ground, or to the island's local reference when floating
    pub voltage: f64,
    pub pins: Vec<PinRef>,
    pub floating: bool,
    pub ground: bool,
}

/// Solved state of one component.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentReading {
    pub id: ComponentId,
    pub component_type: ComponentType,
    /// One reading per pin, in pin order
    pub pins: Vec<PinReading>,
    /// Light output in [0, 1], for emitters only
    pub brightness: Option<f64>,
}

/// Immutable snapshot of one simulation tick.
///
/// A result is always published, even when the tick failed: `error` then
/// holds the fatal diagnostic and every voltage and current is zero.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolveResult {
    /// Tick counter, starting at 1 for the first step
    pub tick: u64,
    /// Accumulated simulation time (seconds)
    pub time: f64,
    pub ground: Option<NodeId>,
    pub nodes: Vec<NodeReading>,
    pub components: Vec<ComponentReading>,
    /// Non-fatal diagnostics
    pub warnings: Vec<BreadboardError>,
    /// Fatal diagnostic of this tick
    pub error: Option<BreadboardError>,
    /// Newton-Raphson iterations spent
    pub iterations: usize,
}

impl SolveResult {
    pub fn node(&self, id: NodeId) -> Option<&NodeReading> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_voltage(&self, id: NodeId) -> Option<f64> {
        self.node(id).map(|n| n.voltage)
    }

    pub fn component(&self, id: ComponentId) -> Option<&ComponentReading> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Reading of a single pin.
    pub fn pin(&self, pin: PinRef) -> Option<PinReading> {
        self.component(pin.component)?.pins.get(pin.pin).copied()
    }

    /// Node a pin was merged into.
    pub fn node_of(&self, pin: PinRef) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.pins.contains(&pin))
            .map(|n| n.id)
    }

    /// No fatal error and no warnings.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.warnings.is_empty()
    }

    /// Whether the result was produced by a fallback rather than a fresh solve.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
            || self
                .warnings
                .iter()
                .any(|w| matches!(w, BreadboardError::ConvergenceFailure { .. }))
    }

    /// Whether any warning satisfies `pred`.
    pub fn has_warning(&self, pred: impl Fn(&BreadboardError) -> bool) -> bool {
        self.warnings.iter().any(pred)
    }
}
