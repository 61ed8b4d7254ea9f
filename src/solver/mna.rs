//! MNA matrix assembly and solving.

use log::debug;

use super::topology::Topology;
use crate::circuit::{BranchId, Circuit, NodeId};
use crate::components::{CompanionParams, DeviceModel, OperatingPoint, StampInput, Stamper};
use crate::error::{BreadboardError, Result};

/// MNA matrix system Ax = z.
#[derive(Debug)]
pub struct MnaMatrix {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Solution vector x
    pub x: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of A
    pub lu: Vec<f64>,
    /// Pivot indices for LU decomposition
    pub pivots: Vec<usize>,
    /// Pivot magnitude below which the matrix is treated as singular
    pub pivot_threshold: f64,
}

impl MnaMatrix {
    /// Create a new MNA matrix of the given dimension.
    pub fn new(size: usize, pivot_threshold: f64) -> Self {
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            x: vec![0.0; size],
            size,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
            pivot_threshold,
        }
    }

    /// Clear the matrix and vectors to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Whether every coefficient of `row` is zero.
    pub fn row_is_empty(&self, row: usize) -> bool {
        self.a[row * self.size..(row + 1) * self.size]
            .iter()
            .all(|&v| v == 0.0)
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp a voltage source between two nodes with branch current at index br.
    /// V[n+] - V[n-] = E
    pub fn stamp_voltage_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        br: usize,
        voltage: f64,
    ) {
        if let Some(i) = n_pos {
            self.add(br, i, 1.0);
            self.add(i, br, 1.0);
        }
        if let Some(j) = n_neg {
            self.add(br, j, -1.0);
            self.add(j, br, -1.0);
        }
        self.z[br] = voltage;
    }

    /// Stamp a current source between two nodes.
    /// Current flows from n+ to n- through the source.
    pub fn stamp_current_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        current: f64,
    ) {
        if let Some(i) = n_pos {
            self.add_source(i, -current);
        }
        if let Some(j) = n_neg {
            self.add_source(j, current);
        }
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for i in 0..n {
            self.pivots[i] = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < self.pivot_threshold {
                return Err(BreadboardError::SingularMatrix);
            }

            // Swap rows if needed
            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    /// Solve the system using the pre-computed LU decomposition.
    pub fn solve(&mut self) -> Result<()> {
        let n = self.size;

        // Apply pivot permutation to z
        for i in 0..n {
            self.x[i] = self.z[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            let diag = self.lu[i * n + i];
            if diag.abs() < self.pivot_threshold {
                return Err(BreadboardError::SingularMatrix);
            }
            self.x[i] /= diag;
        }

        if self.x.iter().any(|v| !v.is_finite()) {
            return Err(BreadboardError::SingularMatrix);
        }

        Ok(())
    }

    /// Get the voltage at a node index (`None` is a reference node).
    pub fn voltage(&self, node: Option<usize>) -> f64 {
        match node {
            Some(i) => self.x[i],
            None => 0.0,
        }
    }
}

/// Placement of unknowns in the solution vector.
///
/// Non-reference node voltages come first, then one current per branch.
#[derive(Debug, Clone)]
pub struct Layout {
    node_index: Vec<Option<usize>>,
    num_node_unknowns: usize,
    /// Branch of each component, in circuit order
    branches: Vec<Option<BranchId>>,
    num_branches: usize,
}

impl Layout {
    /// Lay out the unknowns for a topology of `circuit`.
    pub fn new(circuit: &Circuit, topology: &Topology) -> Self {
        let mut next = 0usize;
        let node_index = topology
            .nodes()
            .iter()
            .map(|node| {
                if node.reference {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect();

        let mut num_branches = 0usize;
        let branches = circuit
            .components()
            .iter()
            .map(|comp| {
                comp.device().needs_branch().then(|| {
                    num_branches += 1;
                    BranchId(num_branches - 1)
                })
            })
            .collect();

        Self {
            node_index,
            num_node_unknowns: next,
            branches,
            num_branches,
        }
    }

    /// Get the total size of the MNA solution vector.
    pub fn size(&self) -> usize {
        self.num_node_unknowns + self.num_branches
    }

    pub fn num_node_unknowns(&self) -> usize {
        self.num_node_unknowns
    }

    /// Get the matrix index for a node voltage.
    /// Returns None for reference nodes.
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        self.node_index[node.0]
    }

    /// Node whose voltage lives at `index`.
    pub fn node_at(&self, index: usize) -> Option<NodeId> {
        self.node_index
            .iter()
            .position(|&i| i == Some(index))
            .map(NodeId)
    }

    /// Get the matrix index for a branch current.
    pub fn branch_index(&self, branch: BranchId) -> usize {
        self.num_node_unknowns + branch.0
    }

    /// Branch of the component at position `index` in circuit order.
    pub fn branch_of(&self, index: usize) -> Option<BranchId> {
        self.branches[index]
    }
}

/// Adapter letting devices stamp by node into a matrix laid out by index.
struct NodeStamper<'a> {
    matrix: &'a mut MnaMatrix,
    layout: &'a Layout,
}

impl Stamper for NodeStamper<'_> {
    fn conductance(&mut self, a: NodeId, b: NodeId, g: f64) {
        let (a, b) = (self.layout.node_index(a), self.layout.node_index(b));
        self.matrix.stamp_conductance(a, b, g);
    }

    fn current(&mut self, from: NodeId, to: NodeId, current: f64) {
        let (from, to) = (self.layout.node_index(from), self.layout.node_index(to));
        self.matrix.stamp_current_source(from, to, current);
    }

    fn voltage_source(&mut self, pos: NodeId, neg: NodeId, branch: BranchId, voltage: f64) {
        let (pos, neg) = (self.layout.node_index(pos), self.layout.node_index(neg));
        let br = self.layout.branch_index(branch);
        self.matrix.stamp_voltage_source(pos, neg, br, voltage);
    }
}

/// Stamp every component into the MNA matrix.
///
/// `operating_points` holds one guess per component in circuit order; only
/// nonlinear devices read theirs. Node rows left entirely empty are pinned
/// to 0 V and reported as isolated nodes.
pub fn assemble(
    circuit: &Circuit,
    topology: &Topology,
    layout: &Layout,
    operating_points: &[OperatingPoint],
    companion: CompanionParams,
    matrix: &mut MnaMatrix,
) -> Vec<BreadboardError> {
    matrix.clear();

    let mut stamper = NodeStamper {
        matrix: &mut *matrix,
        layout,
    };
    for (idx, comp) in circuit.components().iter().enumerate() {
        let input = StampInput {
            nodes: topology.component_nodes(idx),
            branch: layout.branch_of(idx),
            operating_point: operating_points[idx],
            companion,
        };
        comp.device().stamp(&input, &mut stamper);
    }

    // Every non-reference node shares an island with a reference through a
    // conducting device, and the built-in devices all stamp such nodes, so
    // this only fires for a device that conducts but stamps nothing.
    let mut isolated = Vec::new();
    for row in 0..layout.num_node_unknowns() {
        if matrix.row_is_empty(row) {
            matrix.add(row, row, 1.0);
            if let Some(node) = layout.node_at(row) {
                debug!("node {} has no equations; pinning it to 0 V", node);
                isolated.push(BreadboardError::IsolatedNode { node });
            }
        }
    }
    isolated
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lu_solves_small_system() {
        // 2x + y = 5, x + 3y = 10
        let mut m = MnaMatrix::new(2, 1e-15);
        m.add(0, 0, 2.0);
        m.add(0, 1, 1.0);
        m.add(1, 0, 1.0);
        m.add(1, 1, 3.0);
        m.add_source(0, 5.0);
        m.add_source(1, 10.0);
        m.factor().unwrap();
        m.solve().unwrap();
        assert_relative_eq!(m.x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.x[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lu_pivots_zero_diagonal() {
        // Voltage source rows put zeros on the diagonal
        let mut m = MnaMatrix::new(2, 1e-15);
        m.add(0, 1, 1.0);
        m.add(1, 0, 1.0);
        m.add_source(0, 2.0);
        m.add_source(1, 7.0);
        m.factor().unwrap();
        m.solve().unwrap();
        assert_relative_eq!(m.x[0], 7.0);
        assert_relative_eq!(m.x[1], 2.0);
    }

    #[test]
    fn test_singular_matrix_is_reported() {
        let mut m = MnaMatrix::new(2, 1e-15);
        m.add(0, 0, 1.0);
        m.add(0, 1, 1.0);
        m.add(1, 0, 1.0);
        m.add(1, 1, 1.0);
        assert_eq!(m.factor(), Err(BreadboardError::SingularMatrix));
    }

    #[test]
    fn test_conductance_stamp_to_reference() {
        let mut m = MnaMatrix::new(1, 1e-15);
        m.stamp_conductance(Some(0), None, 0.5);
        assert_eq!(m.get(0, 0), 0.5);
        assert!(!m.row_is_empty(0));
    }

    #[test]
    fn test_layout_places_branches_after_nodes() {
        let mut c = Circuit::new("layout");
        let b = c.add_from_tag("B1", "battery").unwrap();
        let r = c.add_from_tag("R1", "resistor").unwrap();
        c.connect_pins(b, "positive", r, "pin1").unwrap();
        c.connect_pins(r, "pin2", b, "negative").unwrap();
        let topo = Topology::build(&c);
        let layout = Layout::new(&c, &topo);

        assert_eq!(layout.size(), 2);
        assert_eq!(layout.node_index(NodeId(0)), Some(0));
        assert_eq!(layout.node_index(NodeId(1)), None);
        assert_eq!(layout.branch_of(0), Some(BranchId(0)));
        assert_eq!(layout.branch_index(BranchId(0)), 1);
        assert_eq!(layout.branch_of(1), None);
    }
}
