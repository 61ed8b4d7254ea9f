//! Circuit graph representation and validation.
//!
//! This module provides the snapshot the editor hands to the solver. The
//! [`Circuit`] struct holds all components, their pins and the wires
//! between them; the solver reads it and writes solved pin state back.

mod graph;
mod types;
mod validate;

pub use graph::{Circuit, Component, Connection, StructureKey};
pub use types::*;
pub use validate::validate_circuit;
