//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for the DC circuit core:
//!
//! - [`Topology`] merges wired pins into nodes and picks the ground reference
//! - [`MnaMatrix`] assembles and LU-solves the linear system
//! - [`NewtonRaphson`] re-linearizes nonlinear devices until they settle
//! - [`Simulator`] runs one tick and publishes a [`SolveResult`]
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources to nodes
//! - D is 0 (ideal voltage sources only)
//! - v is the vector of node voltages
//! - j is the vector of voltage source currents
//! - i is the sum of current sources into each node
//! - e is the vector of voltage source values
//!
//! Only non-reference nodes get a voltage unknown. The ground node and the
//! local reference of every floating island sit at 0 V.

mod mna;
mod newton;
mod result;
mod simulator;
mod topology;

pub use mna::{assemble, Layout, MnaMatrix};
pub use newton::{NewtonOutcome, NewtonRaphson};
pub use result::{ComponentReading, NodeReading, SolveResult};
pub use simulator::{Simulator, SolverConfig};
pub use topology::{Node, Topology};

/// Default convergence tolerance for Newton-Raphson iteration (volts).
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Default Newton-Raphson iteration cap per tick.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Minimum conductance; also the leakage of a blocking emitter.
pub const MIN_CONDUCTANCE: f64 = 1e-12;

/// Series resistance of a conducting emitter's fixed-drop model.
pub const DEFAULT_ON_RESISTANCE: f64 = 1e-6;

/// Pivot magnitude below which LU factorization reports a singular matrix.
pub const PIVOT_THRESHOLD: f64 = 1e-15;
