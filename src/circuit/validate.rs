//! Static circuit validation.

use crate::circuit::PinRole;
use crate::components::ComponentType;
use crate::error::BreadboardError;

use super::Circuit;

/// Validate a circuit before simulation.
///
/// Checks:
/// - Every component other than a source has at least one wire
/// - No wire joins a source's two terminals directly
///
/// Returns every problem found; an empty list means the circuit looks sane.
/// The solver reports the electrical consequences of the same problems on
/// its own, so validation is purely advisory for the editor.
pub fn validate_circuit(circuit: &Circuit) -> Vec<BreadboardError> {
    let mut problems = Vec::new();

    for component in circuit.components() {
        let is_source = component.component_type() == ComponentType::VoltageSource;
        if !is_source && circuit.connections_for(component.id).next().is_none() {
            problems.push(BreadboardError::Unconnected {
                component: component.id,
            });
        }
    }

    for conn in circuit.connections() {
        if conn.a.component != conn.b.component || conn.a.pin == conn.b.pin {
            continue;
        }
        let Some(component) = circuit.component(conn.a.component) else {
            continue;
        };
        let roles = [conn.a.pin, conn.b.pin].map(|idx| component.pins()[idx].role);
        if roles.contains(&PinRole::SourcePositive) && roles.contains(&PinRole::SourceNegative) {
            problems.push(BreadboardError::DirectShort {
                component: component.id,
            });
        }
    }

    problems
}
