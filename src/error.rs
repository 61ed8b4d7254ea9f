//! Error types for the Breadboard circuit core.
//!
//! This module provides a unified error type [`BreadboardError`] that covers
//! both editing errors (returned as `Err` from the [`Circuit`](crate::Circuit)
//! editing API) and solve diagnostics. Solve diagnostics never cross the
//! [`Simulator::step`](crate::Simulator::step) boundary as `Err`: they are
//! attached to the published [`SolveResult`](crate::SolveResult), either as a
//! warning or as the tick's fatal error.

use thiserror::Error;

use crate::circuit::{ComponentId, ConnectionId, NodeId};

/// Result type alias using [`BreadboardError`].
pub type Result<T> = std::result::Result<T, BreadboardError>;

/// Unified error type for all Breadboard operations.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BreadboardError {
    // ============ Editing Errors ============
    /// Component id does not refer to a live component
    #[error("Component {component} not found in circuit")]
    ComponentNotFound { component: ComponentId },

    /// Pin name not defined for the component's type
    #[error("Component {component} has no pin named '{pin}'")]
    PinNotFound { component: ComponentId, pin: String },

    /// Connection id does not refer to a live connection
    #[error("Connection {connection} not found in circuit")]
    ConnectionNotFound { connection: ConnectionId },

    /// Unknown component type tag
    #[error("Unknown component type '{component_type}'")]
    UnknownComponentType { component_type: String },

    /// Property name not defined for the component's type
    #[error("Component {component} has no property '{property}'")]
    UnknownProperty {
        component: ComponentId,
        property: String,
    },

    /// Invalid parameter value
    #[error("Invalid value {value} for property '{property}' of component {component}: {message}")]
    InvalidParameter {
        component: ComponentId,
        property: String,
        value: f64,
        message: String,
    },

    // ============ Topology Diagnostics ============
    /// Node has no path to ground; its voltage is relative to a local reference
    #[error("Floating node {node} detected - no path to ground")]
    FloatingNode { node: NodeId },

    /// A second source names a different node as the voltage reference
    #[error("Source {component} references node {node} but ground is already {ground}")]
    CompetingGround {
        component: ComponentId,
        node: NodeId,
        ground: NodeId,
    },

    /// Node contributed an all-zero row and was pinned to 0 V
    #[error("Isolated node {node} contributes no equations and was excluded")]
    IsolatedNode { node: NodeId },

    /// Component without any connection (static validation only)
    #[error("Component {component} has no connections")]
    Unconnected { component: ComponentId },

    /// Wire joining a source's own terminals (static validation only)
    #[error("Short circuit detected: source {component} terminals directly connected")]
    DirectShort { component: ComponentId },

    // ============ Simulation Errors ============
    /// No voltage source exists, so ground cannot be established
    #[error("Circuit has no ground reference (no voltage source)")]
    NoGroundReference,

    /// Source terminals land in the same node
    #[error("Short circuit - source {component} has both terminals on node {node}")]
    ShortCircuit { component: ComponentId, node: NodeId },

    /// Matrix is singular and cannot be solved
    #[error("Singular matrix - contradictory sources or an unsolvable network")]
    SingularMatrix,

    /// Newton-Raphson iteration did not converge
    #[error("Newton-Raphson did not converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },
}

impl BreadboardError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        component: ComponentId,
        property: impl Into<String>,
        value: f64,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            component,
            property: property.into(),
            value,
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
        }
    }

    /// Whether this diagnostic invalidates the whole tick.
    ///
    /// A fatal diagnostic produces an all-zero [`SolveResult`](crate::SolveResult);
    /// every other diagnostic is a warning on an otherwise usable result.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoGroundReference | Self::SingularMatrix | Self::ShortCircuit { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BreadboardError::NoGroundReference.is_fatal());
        assert!(BreadboardError::SingularMatrix.is_fatal());
        assert!(BreadboardError::ShortCircuit {
            component: ComponentId(0),
            node: NodeId(0),
        }
        .is_fatal());
        assert!(!BreadboardError::FloatingNode { node: NodeId(3) }.is_fatal());
        assert!(!BreadboardError::convergence_failure(100, 0.5).is_fatal());
    }

    #[test]
    fn test_messages_name_the_culprit() {
        let err = BreadboardError::ShortCircuit {
            component: ComponentId(2),
            node: NodeId(1),
        };
        assert_eq!(
            err.to_string(),
            "Short circuit - source C2 has both terminals on node N1"
        );
    }
}
