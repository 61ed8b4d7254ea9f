//! Newton-Raphson iteration for nonlinear components.

use log::{debug, trace};

use super::mna::{assemble, Layout, MnaMatrix};
use super::topology::Topology;
use super::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
use crate::circuit::Circuit;
use crate::components::{CompanionParams, DeviceModel, OperatingPoint};
use crate::error::{BreadboardError, Result};

/// What one Newton-Raphson solve produced.
#[derive(Debug, Clone)]
pub struct NewtonOutcome {
    /// Solution vector of the last iteration
    pub solution: Vec<f64>,
    /// Operating point every component was stamped with in the last iteration
    pub operating_points: Vec<OperatingPoint>,
    /// Operating points to start the next solve from
    pub next_guesses: Vec<OperatingPoint>,
    pub iterations: usize,
    pub converged: bool,
    /// Largest terminal-voltage step of any nonlinear device in the last iteration
    pub residual: f64,
    /// Non-fatal assembly diagnostics of the last iteration
    pub warnings: Vec<BreadboardError>,
}

/// Newton-Raphson solver for nonlinear circuits.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Convergence tolerance (volts)
    pub tolerance: f64,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphson {
    /// Create a new Newton-Raphson solver.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE)
    }

    /// Create a solver with explicit limits.
    pub fn with_config(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            tolerance,
        }
    }

    /// Solve the circuit starting from `guesses` (one per component).
    ///
    /// Convergence means no device changed region and no nonlinear device's
    /// terminal voltage moved by more than the tolerance from its guess.
    /// Running out of iterations is not an error here: the outcome reports
    /// `converged = false` and the caller decides what to publish. A singular
    /// system is returned as `Err`.
    pub fn solve(
        &self,
        circuit: &Circuit,
        topology: &Topology,
        layout: &Layout,
        guesses: Vec<OperatingPoint>,
        companion: CompanionParams,
        pivot_threshold: f64,
    ) -> Result<NewtonOutcome> {
        let mut matrix = MnaMatrix::new(layout.size(), pivot_threshold);

        // Check if there are any nonlinear components
        let has_nonlinear = circuit.components().iter().any(|c| c.device().is_nonlinear());

        if !has_nonlinear {
            // Purely linear circuit - solve directly
            let warnings = assemble(circuit, topology, layout, &guesses, companion, &mut matrix);
            if layout.size() > 0 {
                matrix.factor()?;
                matrix.solve()?;
            }
            return Ok(NewtonOutcome {
                solution: matrix.x,
                next_guesses: guesses.clone(),
                operating_points: guesses,
                iterations: 1,
                converged: true,
                residual: 0.0,
                warnings,
            });
        }

        let mut ops = guesses;
        let mut residual = f64::INFINITY;

        for iter in 0..self.max_iterations {
            let warnings = assemble(circuit, topology, layout, &ops, companion, &mut matrix);

            // Solve the linear system
            matrix.factor()?;
            matrix.solve()?;

            // Re-linearize every nonlinear device at the new solution
            let mut regions_stable = true;
            let mut max_step = 0.0f64;
            let next: Vec<OperatingPoint> = circuit
                .components()
                .iter()
                .enumerate()
                .map(|(idx, comp)| {
                    let device = comp.device();
                    if !device.is_nonlinear() {
                        return ops[idx];
                    }
                    let voltages = pin_voltages(topology, layout, &matrix.x, idx);
                    let op = device.next_operating_point(ops[idx], &voltages, &companion);
                    regions_stable &= op.region == ops[idx].region;
                    max_step = max_step.max((op.voltage - ops[idx].voltage).abs());
                    op
                })
                .collect();

            // Check convergence
            residual = max_step;
            trace!(
                "newton iteration {}: residual {:.3e}, regions stable: {}",
                iter + 1,
                residual,
                regions_stable
            );

            if regions_stable && residual < self.tolerance {
                debug!("newton converged in {} iterations", iter + 1);
                return Ok(NewtonOutcome {
                    solution: matrix.x,
                    operating_points: ops,
                    next_guesses: next,
                    iterations: iter + 1,
                    converged: true,
                    residual,
                    warnings,
                });
            }

            if iter + 1 == self.max_iterations {
                debug!(
                    "newton gave up after {} iterations (residual {:.3e})",
                    self.max_iterations, residual
                );
                return Ok(NewtonOutcome {
                    solution: matrix.x,
                    operating_points: ops,
                    next_guesses: next,
                    iterations: self.max_iterations,
                    converged: false,
                    residual,
                    warnings,
                });
            }
            ops = next;
        }

        // max_iterations is at least 1, so the loop always returns
        Err(BreadboardError::convergence_failure(self.max_iterations, residual))
    }
}

/// Voltage of every pin of the component at `index`, read from a solution vector.
pub(crate) fn pin_voltages(
    topology: &Topology,
    layout: &Layout,
    x: &[f64],
    index: usize,
) -> Vec<f64> {
    topology
        .component_nodes(index)
        .iter()
        .map(|&node| layout.node_index(node).map_or(0.0, |i| x[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Region;
    use approx::assert_abs_diff_eq;

    fn led_circuit(resistance: f64) -> Circuit {
        let mut c = Circuit::new("led");
        let b = c.add_from_tag("B1", "battery").unwrap();
        let r = c.add_from_tag("R1", "resistor").unwrap();
        let d = c.add_from_tag("D1", "led").unwrap();
        c.set_property(r, "resistance", resistance).unwrap();
        c.connect_pins(b, "positive", r, "pin1").unwrap();
        c.connect_pins(r, "pin2", d, "anode").unwrap();
        c.connect_pins(d, "cathode", b, "negative").unwrap();
        c
    }

    fn run(circuit: &Circuit, newton: &NewtonRaphson) -> NewtonOutcome {
        let topology = Topology::build(circuit);
        let layout = Layout::new(circuit, &topology);
        let guesses = circuit
            .components()
            .iter()
            .map(|c| c.device().initial_operating_point())
            .collect();
        newton
            .solve(circuit, &topology, &layout, guesses, CompanionParams::default(), 1e-15)
            .unwrap()
    }

    #[test]
    fn test_led_settles_in_conducting_region() {
        let outcome = run(&led_circuit(220.0), &NewtonRaphson::new());
        assert!(outcome.converged);
        assert_eq!(outcome.operating_points[2].region, Region::Conducting);
        // Off, then Conducting, then the confirming solve
        assert_eq!(outcome.iterations, 3);
    }

    #[test]
    fn test_led_saturates_with_small_resistor() {
        let outcome = run(&led_circuit(10.0), &NewtonRaphson::new());
        assert!(outcome.converged);
        assert_eq!(outcome.operating_points[2].region, Region::Saturated);
    }

    #[test]
    fn test_settled_guess_converges_at_once() {
        let circuit = led_circuit(220.0);
        let settled = run(&circuit, &NewtonRaphson::new());

        let topology = Topology::build(&circuit);
        let layout = Layout::new(&circuit, &topology);
        let again = NewtonRaphson::new()
            .solve(
                &circuit,
                &topology,
                &layout,
                settled.next_guesses.clone(),
                CompanionParams::default(),
                1e-15,
            )
            .unwrap();
        assert!(again.converged);
        assert_eq!(again.iterations, 1);
        assert!(again.residual < 1e-3);
    }

    #[test]
    fn test_voltage_step_blocks_convergence() {
        // Conducting from the start, but guessed 1 V away from where it settles
        let circuit = led_circuit(220.0);
        let mut guesses: Vec<OperatingPoint> = circuit
            .components()
            .iter()
            .map(|c| c.device().initial_operating_point())
            .collect();
        guesses[2] = OperatingPoint {
            voltage: 3.0,
            region: Region::Conducting,
        };

        let topology = Topology::build(&circuit);
        let layout = Layout::new(&circuit, &topology);
        let outcome = NewtonRaphson::with_config(1, 1e-3)
            .solve(&circuit, &topology, &layout, guesses, CompanionParams::default(), 1e-15)
            .unwrap();
        assert!(!outcome.converged);
        assert_abs_diff_eq!(outcome.residual, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let outcome = run(&led_circuit(220.0), &NewtonRaphson::with_config(1, 1e-3));
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_linear_circuit_solves_once() {
        let mut c = Circuit::new("linear");
        let b = c.add_from_tag("B1", "battery").unwrap();
        let r = c.add_from_tag("R1", "resistor").unwrap();
        c.connect_pins(b, "positive", r, "pin1").unwrap();
        c.connect_pins(r, "pin2", b, "negative").unwrap();

        let outcome = run(&c, &NewtonRaphson::new());
        assert_eq!(outcome.iterations, 1);
        // [V(N0), I(B1)]
        assert_abs_diff_eq!(outcome.solution[0], 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.solution[1], -5.0 / 220.0, epsilon = 1e-9);
    }
}
