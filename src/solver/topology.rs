//! Node partition: merging directly-wired pins into electrical nodes.
//!
//! Pins are numbered densely in component order (`offset[component] + pin`)
//! and grouped with a union-find over those integers. A second union-find
//! over nodes groups them into islands joined through conducting devices;
//! every island needs a reference node fixed at 0 V for the system to be
//! solvable. The island holding ground uses ground, every other island is
//! floating and gets a local reference.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::circuit::{Circuit, ComponentId, NodeId, PinRef};
use crate::components::DeviceModel;
use crate::error::BreadboardError;

/// Simple union-find with path halving.
#[derive(Debug, Clone)]
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// One electrical node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Pins joined into this node, in pin-number order
    pub pins: Vec<PinRef>,
    /// No conducting path to ground
    pub floating: bool,
    /// Fixed at 0 V (ground or a floating island's local reference)
    pub reference: bool,
}

/// The node partition of one circuit structure.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    /// Node of every pin, by dense pin number
    pin_nodes: Vec<NodeId>,
    /// First dense pin number of each component, in circuit order
    offsets: Vec<usize>,
    component_ids: Vec<ComponentId>,
    ground: Option<NodeId>,
    diagnostics: Vec<BreadboardError>,
    short_circuits: Vec<BreadboardError>,
}

impl Topology {
    /// Partition the circuit's pins into nodes and choose references.
    ///
    /// A later source whose negative terminal sits in another island than
    /// ground raises `CompetingGround` and becomes that island's reference.
    /// One whose negative terminal sits in a different node of the ground
    /// island is not reported, so series stacks and sources returned to
    /// ground through a load solve without warnings.
    pub fn build(circuit: &Circuit) -> Self {
        let components = circuit.components();

        let mut offsets = Vec::with_capacity(components.len());
        let mut total_pins = 0usize;
        for comp in components {
            offsets.push(total_pins);
            total_pins += comp.pins().len();
        }
        let component_ids: Vec<ComponentId> = components.iter().map(|c| c.id).collect();
        let dense = |pin: PinRef| -> Option<usize> {
            let idx = component_ids.binary_search(&pin.component).ok()?;
            (pin.pin < components[idx].pins().len()).then(|| offsets[idx] + pin.pin)
        };

        // Union the two ends of every wire
        let mut uf = UnionFind::new(total_pins);
        let wires: Vec<(usize, usize)> = circuit
            .connections()
            .iter()
            .filter_map(|c| Some((dense(c.a)?, dense(c.b)?)))
            .collect();
        for &(a, b) in &wires {
            uf.union(a, b);
        }

        // Assign node ids in wire-processing order, then unwired pins
        let mut root_to_node: HashMap<usize, NodeId> = HashMap::new();
        let mut next_id = 0usize;
        let mut assign = |root: usize| {
            *root_to_node.entry(root).or_insert_with(|| {
                let id = NodeId(next_id);
                next_id += 1;
                id
            })
        };
        for &(a, b) in &wires {
            assign(uf.find(a));
            assign(uf.find(b));
        }
        let pin_nodes: Vec<NodeId> = (0..total_pins).map(|p| assign(uf.find(p))).collect();

        let mut nodes: Vec<Node> = (0..next_id)
            .map(|i| Node {
                id: NodeId(i),
                pins: Vec::new(),
                floating: false,
                reference: false,
            })
            .collect();
        for (comp_idx, comp) in components.iter().enumerate() {
            for pin in 0..comp.pins().len() {
                let node = pin_nodes[offsets[comp_idx] + pin];
                nodes[node.0].pins.push(PinRef::new(comp.id, pin));
            }
        }

        // Group nodes into islands through conducting devices
        let mut islands = UnionFind::new(nodes.len());
        for (comp_idx, comp) in components.iter().enumerate() {
            if !comp.device().conducts() {
                continue;
            }
            let first = pin_nodes[offsets[comp_idx]].0;
            for pin in 1..comp.pins().len() {
                islands.union(first, pin_nodes[offsets[comp_idx] + pin].0);
            }
        }

        // Ground is the first source reference terminal; later ones that land
        // in another island become that island's local reference
        let mut diagnostics = Vec::new();
        let mut ground: Option<NodeId> = None;
        let mut island_reference: HashMap<usize, NodeId> = HashMap::new();
        for (comp_idx, comp) in components.iter().enumerate() {
            for (pin, spec) in comp.pins().iter().enumerate() {
                if !spec.role.is_reference() {
                    continue;
                }
                let node = pin_nodes[offsets[comp_idx] + pin];
                let island = islands.find(node.0);
                match ground {
                    None => {
                        ground = Some(node);
                        island_reference.insert(island, node);
                    }
                    Some(g) if node == g => {}
                    Some(g) if islands.find(g.0) == island => {}
                    Some(g) => {
                        diagnostics.push(BreadboardError::CompetingGround {
                            component: comp.id,
                            node,
                            ground: g,
                        });
                        island_reference.entry(island).or_insert(node);
                    }
                }
            }
        }

        let ground_island = ground.map(|g| islands.find(g.0));
        for i in 0..nodes.len() {
            let island = islands.find(i);
            let reference = *island_reference.entry(island).or_insert(NodeId(i));
            nodes[i].reference = reference == NodeId(i);
            if Some(island) != ground_island {
                nodes[i].floating = true;
                diagnostics.push(BreadboardError::FloatingNode { node: NodeId(i) });
            }
        }

        let mut short_circuits = Vec::new();
        for (comp_idx, comp) in components.iter().enumerate() {
            let pins = &pin_nodes[offsets[comp_idx]..offsets[comp_idx] + comp.pins().len()];
            if comp.device().needs_branch() && pins.windows(2).all(|w| w[0] == w[1]) {
                if let Some(&node) = pins.first() {
                    short_circuits.push(BreadboardError::ShortCircuit {
                        component: comp.id,
                        node,
                    });
                }
            }
        }

        debug!(
            "topology: {} pins, {} wires -> {} nodes, ground {:?}",
            total_pins,
            wires.len(),
            nodes.len(),
            ground
        );

        Self {
            nodes,
            pin_nodes,
            offsets,
            component_ids,
            ground,
            diagnostics,
            short_circuits,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn ground(&self) -> Option<NodeId> {
        self.ground
    }

    /// Whether the node is fixed at 0 V rather than solved for.
    pub fn is_reference(&self, id: NodeId) -> bool {
        self.nodes[id.0].reference
    }

    /// Competing-ground and floating-node warnings.
    pub fn diagnostics(&self) -> &[BreadboardError] {
        &self.diagnostics
    }

    /// Sources whose terminals all sit on one node.
    pub fn short_circuits(&self) -> &[BreadboardError] {
        &self.short_circuits
    }

    /// Pin nodes of the component at position `index` in circuit order.
    pub fn component_nodes(&self, index: usize) -> &[NodeId] {
        let start = self.offsets[index];
        let end = self
            .offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.pin_nodes.len());
        &self.pin_nodes[start..end]
    }

    /// Node of a pin.
    pub fn node_of(&self, pin: PinRef) -> Option<NodeId> {
        let idx = self.component_ids.binary_search(&pin.component).ok()?;
        self.component_nodes(idx).get(pin.pin).copied()
    }

    /// The partition with node ids erased, for order-independent comparison.
    pub fn canonical_partition(&self) -> BTreeSet<BTreeSet<PinRef>> {
        self.nodes
            .iter()
            .map(|n| n.pins.iter().copied().collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;

    /// Battery -> R1 -> R2 -> back to battery.
    fn divider() -> (Circuit, [ComponentId; 3]) {
        let mut c = Circuit::new("divider");
        let b = c.add_from_tag("B1", "battery").unwrap();
        let r1 = c.add_from_tag("R1", "resistor").unwrap();
        let r2 = c.add_from_tag("R2", "resistor").unwrap();
        c.connect_pins(b, "positive", r1, "pin1").unwrap();
        c.connect_pins(r1, "pin2", r2, "pin1").unwrap();
        c.connect_pins(r2, "pin2", b, "negative").unwrap();
        (c, [b, r1, r2])
    }

    #[test]
    fn test_union_find_merges_transitively() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(3, 4);
        uf.union(1, 4);
        let root = uf.find(0);
        assert!([1, 3, 4].iter().all(|&x| uf.find(x) == root));
        assert_ne!(uf.find(2), root);
    }

    #[test]
    fn test_nodes_follow_wire_order() {
        let (c, [b, r1, r2]) = divider();
        let topo = Topology::build(&c);

        assert_eq!(topo.num_nodes(), 3);
        assert_eq!(topo.node_of(PinRef::new(b, 0)), Some(NodeId(0)));
        assert_eq!(topo.node_of(PinRef::new(r1, 1)), Some(NodeId(1)));
        assert_eq!(topo.node_of(PinRef::new(r2, 1)), Some(NodeId(2)));
        assert_eq!(topo.ground(), Some(NodeId(2)));
        assert!(topo.is_reference(NodeId(2)));
        assert!(topo.diagnostics().is_empty());
    }

    #[test]
    fn test_partition_ignores_wire_order() {
        let (forward, [b, r1, r2]) = divider();

        let mut shuffled = Circuit::new("shuffled");
        shuffled.add_from_tag("B1", "battery").unwrap();
        shuffled.add_from_tag("R1", "resistor").unwrap();
        shuffled.add_from_tag("R2", "resistor").unwrap();
        shuffled.connect_pins(b, "negative", r2, "pin2").unwrap();
        shuffled.connect_pins(r2, "pin1", r1, "pin2").unwrap();
        shuffled.connect_pins(r1, "pin1", b, "positive").unwrap();

        let a = Topology::build(&forward);
        let z = Topology::build(&shuffled);
        assert_eq!(a.canonical_partition(), z.canonical_partition());
        assert_ne!(a.node_of(PinRef::new(b, 0)), z.node_of(PinRef::new(b, 0)));
    }

    #[test]
    fn test_unwired_component_floats() {
        let (mut c, _) = divider();
        let loose = c.add_from_tag("R3", "resistor").unwrap();
        let topo = Topology::build(&c);

        let n1 = topo.node_of(PinRef::new(loose, 0)).unwrap();
        let n2 = topo.node_of(PinRef::new(loose, 1)).unwrap();
        assert_ne!(n1, n2);
        assert!(topo.node(n1).unwrap().floating);
        assert!(topo.is_reference(n1));
        assert!(!topo.is_reference(n2));
        assert_eq!(
            topo.diagnostics(),
            &[
                BreadboardError::FloatingNode { node: n1 },
                BreadboardError::FloatingNode { node: n2 },
            ]
        );
    }

    #[test]
    fn test_second_source_in_own_island_competes() {
        let (mut c, _) = divider();
        let b2 = c.add_from_tag("B2", "battery").unwrap();
        let r = c.add_from_tag("R9", "resistor").unwrap();
        c.connect_pins(b2, "positive", r, "pin1").unwrap();
        c.connect_pins(r, "pin2", b2, "negative").unwrap();
        let topo = Topology::build(&c);

        let local = topo.node_of(PinRef::new(b2, 1)).unwrap();
        assert!(topo.is_reference(local));
        assert!(matches!(
            topo.diagnostics().first(),
            Some(BreadboardError::CompetingGround { component, .. }) if *component == b2
        ));
    }

    #[test]
    fn test_stacked_sources_share_ground() {
        let mut c = Circuit::new("stack");
        let b1 = c.add_from_tag("B1", "battery").unwrap();
        let b2 = c.add_from_tag("B2", "battery").unwrap();
        let r = c.add_from_tag("R1", "resistor").unwrap();
        c.connect_pins(b1, "positive", b2, "negative").unwrap();
        c.connect_pins(b2, "positive", r, "pin1").unwrap();
        c.connect_pins(r, "pin2", b1, "negative").unwrap();
        let topo = Topology::build(&c);

        assert!(topo.diagnostics().is_empty());
        assert_eq!(topo.ground(), topo.node_of(PinRef::new(b1, 1)));
    }

    #[test]
    fn test_source_returned_through_load_is_not_reported() {
        let mut c = Circuit::new("return");
        let b1 = c.add_from_tag("B1", "battery").unwrap();
        let r1 = c.add_from_tag("R1", "resistor").unwrap();
        let b2 = c.add_from_tag("B2", "battery").unwrap();
        let r2 = c.add_from_tag("R2", "resistor").unwrap();
        c.connect_pins(b1, "positive", r1, "pin1").unwrap();
        c.connect_pins(r1, "pin2", b1, "negative").unwrap();
        c.connect_pins(b2, "positive", b1, "positive").unwrap();
        c.connect_pins(b2, "negative", r2, "pin1").unwrap();
        c.connect_pins(r2, "pin2", b1, "negative").unwrap();
        let topo = Topology::build(&c);

        let b2_negative = topo.node_of(PinRef::new(b2, 1)).unwrap();
        assert_ne!(topo.ground(), Some(b2_negative));
        assert!(!topo.is_reference(b2_negative));
        assert!(topo.diagnostics().is_empty());
    }

    #[test]
    fn test_shorted_source_is_detected() {
        let mut c = Circuit::new("short");
        let b = c.add_from_tag("B1", "battery").unwrap();
        c.connect_pins(b, "positive", b, "negative").unwrap();
        let topo = Topology::build(&c);
        assert!(matches!(
            topo.short_circuits(),
            [BreadboardError::ShortCircuit { component, .. }] if *component == b
        ));
    }

    #[test]
    fn test_no_source_means_no_ground() {
        let mut c = Circuit::new("passive");
        c.add_from_tag("R1", "resistor").unwrap();
        let topo = Topology::build(&c);
        assert_eq!(topo.ground(), None);
        assert!(topo.nodes().iter().all(|n| n.floating));
    }
}
