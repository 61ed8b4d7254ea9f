//! # Breadboard Core
//!
//! A quasi-static DC circuit solver for a schematic editor.
//!
//! This library provides:
//! - An editable circuit graph of components, pins and wires
//! - Modified Nodal Analysis (MNA) with a direct LU solve
//! - Newton-Raphson iteration over piecewise-linear LED models
//! - A per-tick stepper publishing immutable solve results
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`circuit`] - Circuit graph representation and validation
//! - [`components`] - Component models (battery, resistor, LED, ...)
//! - [`solver`] - Topology, MNA assembly and numerical solving
//! - [`error`] - Editing errors and solve diagnostics
//!
//! ## Usage
//!
//! ```
//! use breadboard_core::{Circuit, Simulator};
//!
//! let mut circuit = Circuit::new("blink");
//! let battery = circuit.add_from_tag("B1", "battery").unwrap();
//! let resistor = circuit.add_from_tag("R1", "resistor").unwrap();
//! let led = circuit.add_from_tag("D1", "led").unwrap();
//! circuit.connect_pins(battery, "positive", resistor, "pin1").unwrap();
//! circuit.connect_pins(resistor, "pin2", led, "anode").unwrap();
//! circuit.connect_pins(led, "cathode", battery, "negative").unwrap();
//!
//! let mut simulator = Simulator::new();
//! let result = simulator.step(&mut circuit, 1.0 / 60.0);
//! let current = result.component(led).unwrap().pins[0].current;
//! assert!((current - 3.0 / 220.0).abs() < 1e-6);
//! ```
//!
//! ## Solve Method
//!
//! For each tick:
//!
//! 1. Merge wired pins into nodes (rebuilt only when the structure changes)
//! 2. Assemble the system matrix A and source vector z
//! 3. Solve Ax = z for node voltages and branch currents
//! 4. For nonlinear elements, iterate using Newton-Raphson until convergence
//! 5. Write pin voltages and currents back onto the circuit
//!
//! There are no reactive elements: capacitors are open circuits and `dt`
//! only advances the session clock.

pub mod circuit;
pub mod components;
pub mod error;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{BreadboardError, Result};
pub use solver::{Simulator, SolveResult, SolverConfig};

/// Default series resistance of a wire (ohms)
pub const DEFAULT_WIRE_RESISTANCE: f64 = 0.001;
