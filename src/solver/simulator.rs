//! Main simulator interface.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::circuit::{Circuit, ComponentId, StructureKey};
use crate::components::{
    CompanionParams, Device, DeviceModel, OperatingPoint, PinReading, ReportInput,
};
use crate::error::BreadboardError;

use super::mna::Layout;
use super::newton::{pin_voltages, NewtonOutcome};
use super::result::{ComponentReading, NodeReading, SolveResult};
use super::topology::Topology;
use super::{
    NewtonRaphson, DEFAULT_MAX_ITERATIONS, DEFAULT_ON_RESISTANCE, DEFAULT_TOLERANCE,
    MIN_CONDUCTANCE, PIVOT_THRESHOLD,
};

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Maximum Newton-Raphson iterations per tick.
    pub max_iterations: usize,
    /// Convergence tolerance for Newton-Raphson (volts).
    pub tolerance: f64,
    /// Series resistance of a conducting emitter (ohms).
    pub on_resistance: f64,
    /// Leakage conductance of a blocking emitter (siemens).
    pub off_conductance: f64,
    /// Pivot magnitude below which the system is singular.
    pub pivot_threshold: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            on_resistance: DEFAULT_ON_RESISTANCE,
            off_conductance: MIN_CONDUCTANCE,
            pivot_threshold: PIVOT_THRESHOLD,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance (in volts).
    ///
    /// The default of 1 mV is well below anything visible on an LED.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_on_resistance(mut self, on_resistance: f64) -> Self {
        self.on_resistance = on_resistance;
        self
    }

    pub fn with_off_conductance(mut self, off_conductance: f64) -> Self {
        self.off_conductance = off_conductance;
        self
    }

    pub fn with_pivot_threshold(mut self, pivot_threshold: f64) -> Self {
        self.pivot_threshold = pivot_threshold;
        self
    }

    /// Companion model constants handed to the devices.
    pub fn companion(&self) -> CompanionParams {
        CompanionParams {
            on_resistance: self.on_resistance,
            off_conductance: self.off_conductance,
        }
    }
}

/// Node partition and unknown layout for one circuit structure.
#[derive(Debug)]
struct Plan {
    key: StructureKey,
    topology: Topology,
    layout: Layout,
}

/// The circuit simulator session.
///
/// Owns everything carried between ticks: the cached node partition, the
/// nonlinear devices' operating-point guesses and the last converged
/// result. The circuit itself stays with the editor and is lent to each
/// [`step`](Simulator::step).
#[derive(Debug)]
pub struct Simulator {
    config: SolverConfig,
    /// Newton-Raphson solver
    newton: NewtonRaphson,
    plan: Option<Arc<Plan>>,
    /// Guesses carried over from the last converged tick
    guesses: HashMap<ComponentId, OperatingPoint>,
    /// Last converged result and the structure it was solved for
    last_good: Option<(StructureKey, Arc<SolveResult>)>,
    latest: Arc<SolveResult>,
    time: f64,
    tick: u64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Create a new simulator with default configuration.
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    /// Create a new simulator with custom configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        let newton = NewtonRaphson::with_config(config.max_iterations, config.tolerance);
        Self {
            config,
            newton,
            plan: None,
            guesses: HashMap::new(),
            last_good: None,
            latest: Arc::new(SolveResult::default()),
            time: 0.0,
            tick: 0,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replace the configuration. Carried-over state is kept.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.newton = NewtonRaphson::with_config(config.max_iterations, config.tolerance);
        self.config = config;
    }

    /// Most recently published result.
    pub fn latest(&self) -> Arc<SolveResult> {
        Arc::clone(&self.latest)
    }

    /// Accumulated simulation time (seconds).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of ticks stepped since creation or the last reset.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Node partition of the last stepped circuit.
    pub fn topology(&self) -> Option<&Topology> {
        self.plan.as_deref().map(|plan| &plan.topology)
    }

    /// Forget all carried-over state.
    pub fn reset(&mut self) {
        debug!("simulator reset");
        self.plan = None;
        self.guesses.clear();
        self.last_good = None;
        self.latest = Arc::new(SolveResult::default());
        self.time = 0.0;
        self.tick = 0;
    }

    /// Run one tick: solve the circuit, write pin state back and publish the result.
    ///
    /// `dt` only advances the clock; a non-finite or negative `dt` leaves it
    /// untouched. Never fails: problems are reported on the returned result.
    pub fn step(&mut self, circuit: &mut Circuit, dt: f64) -> Arc<SolveResult> {
        if dt.is_finite() && dt >= 0.0 {
            self.time += dt;
        }
        self.tick += 1;

        let plan = self.plan_for(circuit);
        let mut result = self.solve(circuit, &plan);
        result.tick = self.tick;
        result.time = self.time;

        for warning in &result.warnings {
            warn!("tick {}: {}", result.tick, warning);
        }
        if let Some(error) = &result.error {
            warn!("tick {} failed: {}", result.tick, error);
        }

        for (component, reading) in circuit.components_mut().iter_mut().zip(&result.components) {
            component.write_back(&reading.pins);
        }

        self.latest = Arc::new(result);
        Arc::clone(&self.latest)
    }

    /// Reuse the cached plan, or rebuild it when the structure changed.
    fn plan_for(&mut self, circuit: &Circuit) -> Arc<Plan> {
        let key = circuit.structure();
        if let Some(plan) = self.plan.as_ref().filter(|plan| plan.key == key) {
            return Arc::clone(plan);
        }

        let topology = Topology::build(circuit);
        let layout = Layout::new(circuit, &topology);
        debug!(
            "rebuilt topology for '{}': {} nodes, {} unknowns",
            circuit.name,
            topology.num_nodes(),
            layout.size()
        );
        self.guesses.retain(|id, _| circuit.component(*id).is_some());

        let plan = Arc::new(Plan {
            key,
            topology,
            layout,
        });
        self.plan = Some(Arc::clone(&plan));
        plan
    }

    fn solve(&mut self, circuit: &Circuit, plan: &Plan) -> SolveResult {
        let topology = &plan.topology;
        let mut warnings = topology.diagnostics().to_vec();

        if topology.ground().is_none() {
            return zero_result(circuit, topology, warnings, BreadboardError::NoGroundReference);
        }
        if let Some((first, rest)) = topology.short_circuits().split_first() {
            for short in rest {
                warn!("{}", short);
            }
            return zero_result(circuit, topology, warnings, first.clone());
        }

        let guesses = circuit
            .components()
            .iter()
            .map(|c| {
                self.guesses
                    .get(&c.id)
                    .copied()
                    .unwrap_or_else(|| c.device().initial_operating_point())
            })
            .collect();

        let companion = self.config.companion();
        let outcome = match self.newton.solve(
            circuit,
            topology,
            &plan.layout,
            guesses,
            companion,
            self.config.pivot_threshold,
        ) {
            Ok(outcome) => outcome,
            Err(err) => return zero_result(circuit, topology, warnings, err),
        };
        warnings.extend(outcome.warnings.iter().cloned());

        if !outcome.converged {
            warnings.push(BreadboardError::convergence_failure(
                outcome.iterations,
                outcome.residual,
            ));
            return match &self.last_good {
                Some((key, last)) if *key == plan.key => SolveResult {
                    warnings,
                    iterations: outcome.iterations,
                    ..SolveResult::clone(last)
                },
                _ => {
                    let mut result = zero_state(circuit, topology);
                    result.warnings = warnings;
                    result.iterations = outcome.iterations;
                    result
                }
            };
        }

        for (comp, op) in circuit.components().iter().zip(&outcome.next_guesses) {
            if comp.device().is_nonlinear() {
                self.guesses.insert(comp.id, *op);
            }
        }

        let mut result = readings(circuit, plan, &outcome, companion);
        result.warnings = warnings;
        self.last_good = Some((plan.key.clone(), Arc::new(result.clone())));
        result
    }
}

/// Build the published readings from a converged solution.
fn readings(
    circuit: &Circuit,
    plan: &Plan,
    outcome: &NewtonOutcome,
    companion: CompanionParams,
) -> SolveResult {
    let (topology, layout) = (&plan.topology, &plan.layout);
    let x = &outcome.solution;

    let nodes = topology
        .nodes()
        .iter()
        .map(|node| NodeReading {
            id: node.id,
            voltage: layout.node_index(node.id).map_or(0.0, |i| x[i]),
            pins: node.pins.clone(),
            floating: node.floating,
            ground: topology.ground() == Some(node.id),
        })
        .collect();

    let components = circuit
        .components()
        .iter()
        .enumerate()
        .map(|(idx, comp)| {
            let voltages = pin_voltages(topology, layout, x, idx);
            let branch_current = layout.branch_of(idx).map(|b| x[layout.branch_index(b)]);
            let pins = comp.device().report(&ReportInput {
                voltages: &voltages,
                branch_current,
                operating_point: outcome.operating_points[idx],
                companion,
            });
            component_reading(comp.id, comp.device(), pins)
        })
        .collect();

    SolveResult {
        ground: topology.ground(),
        nodes,
        components,
        iterations: outcome.iterations,
        ..SolveResult::default()
    }
}

fn component_reading(id: ComponentId, device: &Device, pins: Vec<PinReading>) -> ComponentReading {
    let brightness = match device {
        Device::Led(led) => Some(pins.first().map_or(0.0, |p| led.brightness(p.current))),
        _ => None,
    };
    ComponentReading {
        id,
        component_type: device.component_type(),
        pins,
        brightness,
    }
}

/// Every node and pin at 0 V carrying 0 A.
fn zero_state(circuit: &Circuit, topology: &Topology) -> SolveResult {
    let nodes = topology
        .nodes()
        .iter()
        .map(|node| NodeReading {
            id: node.id,
            voltage: 0.0,
            pins: node.pins.clone(),
            floating: node.floating,
            ground: topology.ground() == Some(node.id),
        })
        .collect();

    let components = circuit
        .components()
        .iter()
        .map(|comp| {
            let pins = vec![PinReading::default(); comp.pins().len()];
            component_reading(comp.id, comp.device(), pins)
        })
        .collect();

    SolveResult {
        ground: topology.ground(),
        nodes,
        components,
        ..SolveResult::default()
    }
}

fn zero_result(
    circuit: &Circuit,
    topology: &Topology,
    warnings: Vec<BreadboardError>,
    error: BreadboardError,
) -> SolveResult {
    SolveResult {
        warnings,
        error: Some(error),
        ..zero_state(circuit, topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::PinRef;
    use approx::assert_abs_diff_eq;

    fn divider() -> (Circuit, ComponentId) {
        let mut c = Circuit::new("divider");
        let b = c.add_from_tag("B1", "battery").unwrap();
        let r1 = c.add_from_tag("R1", "resistor").unwrap();
        let r2 = c.add_from_tag("R2", "resistor").unwrap();
        c.set_property(r2, "resistance", 660.0).unwrap();
        c.connect_pins(b, "positive", r1, "pin1").unwrap();
        c.connect_pins(r1, "pin2", r2, "pin1").unwrap();
        c.connect_pins(r2, "pin2", b, "negative").unwrap();
        (c, r2)
    }

    #[test]
    fn test_divider_and_write_back() {
        let (mut c, r2) = divider();
        let mut sim = Simulator::new();
        let result = sim.step(&mut c, 0.016);

        assert!(result.is_ok());
        let mid = result.node_of(PinRef::new(r2, 0)).unwrap();
        assert_abs_diff_eq!(result.node_voltage(mid).unwrap(), 3.75, epsilon = 1e-9);

        let pin = c.component(r2).unwrap().pin("pin1").unwrap();
        assert_abs_diff_eq!(pin.voltage, 3.75, epsilon = 1e-9);
        assert_abs_diff_eq!(pin.current, 5.0 / 880.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clock_advances_only_on_valid_dt() {
        let (mut c, _) = divider();
        let mut sim = Simulator::new();
        sim.step(&mut c, 0.5);
        sim.step(&mut c, f64::NAN);
        let result = sim.step(&mut c, -1.0);
        assert_eq!(result.tick, 3);
        assert_eq!(sim.time(), 0.5);
        assert_eq!(result.time, 0.5);
    }

    #[test]
    fn test_plan_is_reused_until_structure_changes() {
        let (mut c, r2) = divider();
        let mut sim = Simulator::new();
        sim.step(&mut c, 0.0);
        let first = Arc::clone(sim.plan.as_ref().unwrap());

        c.set_property(r2, "resistance", 220.0).unwrap();
        let result = sim.step(&mut c, 0.0);
        assert!(Arc::ptr_eq(&first, sim.plan.as_ref().unwrap()));
        let mid = result.node_of(PinRef::new(r2, 0)).unwrap();
        assert_abs_diff_eq!(result.node_voltage(mid).unwrap(), 2.5, epsilon = 1e-9);

        c.add_from_tag("R3", "resistor").unwrap();
        sim.step(&mut c, 0.0);
        assert!(!Arc::ptr_eq(&first, sim.plan.as_ref().unwrap()));
    }

    #[test]
    fn test_reset_clears_session_state() {
        let (mut c, _) = divider();
        let mut sim = Simulator::new();
        sim.step(&mut c, 1.0);
        sim.reset();
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.time(), 0.0);
        assert!(sim.topology().is_none());
        assert_eq!(*sim.latest(), SolveResult::default());
    }
}
