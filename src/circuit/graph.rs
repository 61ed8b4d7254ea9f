//! Circuit graph structure.

use super::types::{ComponentId, ConnectionId, Pin, PinRef};
use crate::components::{ComponentType, Device, DeviceModel, PinReading};
use crate::error::{BreadboardError, Result};
use crate::DEFAULT_WIRE_RESISTANCE;

/// A placed component: a device model plus its pins.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    device: Device,
    pins: Vec<Pin>,
}

impl Component {
    fn new(id: ComponentId, name: String, device: Device) -> Self {
        let pins = device.pins().iter().map(Pin::from_spec).collect();
        Self {
            id,
            name,
            device,
            pins,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn component_type(&self) -> ComponentType {
        self.device.component_type()
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Position of the named pin.
    pub fn pin_index(&self, name: &str) -> Option<usize> {
        self.pins.iter().position(|p| p.name == name)
    }

    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn property(&self, name: &str) -> Option<f64> {
        self.device.property(name)
    }

    pub(crate) fn write_back(&mut self, readings: &[PinReading]) {
        for (pin, reading) in self.pins.iter_mut().zip(readings) {
            pin.voltage = reading.voltage;
            pin.current = reading.current;
        }
    }
}

/// A wire joining two pins.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: ConnectionId,
    pub a: PinRef,
    pub b: PinRef,
    /// Series resistance of the wire (ohms). Wires are solved as ideal joins.
    pub resistance: f64,
}

impl Connection {
    /// Whether either end sits on `component`.
    pub fn touches(&self, component: ComponentId) -> bool {
        self.a.component == component || self.b.component == component
    }

    /// Whether either end is exactly `pin`.
    pub fn touches_pin(&self, pin: PinRef) -> bool {
        self.a == pin || self.b == pin
    }
}

/// Identity of a circuit's structure: which components and wires exist.
///
/// Two snapshots with equal keys have the same node partition. Property
/// values are deliberately not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructureKey {
    components: Vec<(ComponentId, ComponentType)>,
    connections: Vec<(ConnectionId, PinRef, PinRef)>,
}

/// A circuit snapshot owned by the editor.
///
/// The solver only reads components and connections and writes back pin
/// state; it never creates or deletes either.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub name: String,

    /// Components in insertion order (ids ascending)
    components: Vec<Component>,

    /// Wires in insertion order (ids ascending)
    connections: Vec<Connection>,

    next_component: usize,
    next_connection: usize,

    /// Bumped on every structural edit
    revision: u64,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a component and return its id.
    pub fn add_component(&mut self, name: impl Into<String>, device: Device) -> ComponentId {
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        self.components.push(Component::new(id, name.into(), device));
        self.revision += 1;
        id
    }

    /// Add a component from an editor type tag with default properties.
    pub fn add_from_tag(&mut self, name: impl Into<String>, tag: &str) -> Result<ComponentId> {
        let device = Device::from_tag(tag)?;
        Ok(self.add_component(name, device))
    }

    /// Remove a component together with every wire touching it.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Component> {
        let idx = self.position(id)?;
        self.connections.retain(|c| !c.touches(id));
        self.revision += 1;
        Ok(self.components.remove(idx))
    }

    /// Wire two pins together with the default wire resistance.
    pub fn connect(&mut self, a: PinRef, b: PinRef) -> Result<ConnectionId> {
        self.connect_with_resistance(a, b, DEFAULT_WIRE_RESISTANCE)
    }

    /// Wire two pins together.
    pub fn connect_with_resistance(
        &mut self,
        a: PinRef,
        b: PinRef,
        resistance: f64,
    ) -> Result<ConnectionId> {
        self.check_pin(a)?;
        self.check_pin(b)?;
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.push(Connection {
            id,
            a,
            b,
            resistance,
        });
        self.revision += 1;
        Ok(id)
    }

    /// Wire two pins addressed by name.
    pub fn connect_pins(
        &mut self,
        a: ComponentId,
        a_pin: &str,
        b: ComponentId,
        b_pin: &str,
    ) -> Result<ConnectionId> {
        let a = self.pin_ref(a, a_pin)?;
        let b = self.pin_ref(b, b_pin)?;
        self.connect(a, b)
    }

    /// Remove a wire.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<Connection> {
        let idx = self
            .connections
            .binary_search_by_key(&id, |c| c.id)
            .map_err(|_| BreadboardError::ConnectionNotFound { connection: id })?;
        self.revision += 1;
        Ok(self.connections.remove(idx))
    }

    /// Resolve a pin name on a component.
    pub fn pin_ref(&self, component: ComponentId, pin: &str) -> Result<PinRef> {
        let comp = self.get(component)?;
        comp.pin_index(pin)
            .map(|idx| PinRef::new(component, idx))
            .ok_or_else(|| BreadboardError::PinNotFound {
                component,
                pin: pin.to_string(),
            })
    }

    /// Set a named property. Property edits are not structural.
    pub fn set_property(&mut self, component: ComponentId, name: &str, value: f64) -> Result<()> {
        let idx = self.position(component)?;
        self.components[idx]
            .device
            .set_property_checked(component, name, value)
    }

    /// Read a named property.
    pub fn property(&self, component: ComponentId, name: &str) -> Result<f64> {
        self.get(component)?
            .property(name)
            .ok_or_else(|| BreadboardError::UnknownProperty {
                component,
                property: name.to_string(),
            })
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.position(id).ok().map(|idx| &self.components[idx])
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Wires touching a component.
    pub fn connections_for(&self, id: ComponentId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.touches(id))
    }

    /// Counter bumped on every add/remove of a component or wire.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Structural identity for change detection.
    pub fn structure(&self) -> StructureKey {
        StructureKey {
            components: self
                .components
                .iter()
                .map(|c| (c.id, c.component_type()))
                .collect(),
            connections: self.connections.iter().map(|c| (c.id, c.a, c.b)).collect(),
        }
    }

    pub(crate) fn components_mut(&mut self) -> &mut [Component] {
        &mut self.components
    }

    fn get(&self, id: ComponentId) -> Result<&Component> {
        self.component(id)
            .ok_or(BreadboardError::ComponentNotFound { component: id })
    }

    fn position(&self, id: ComponentId) -> Result<usize> {
        self.components
            .binary_search_by_key(&id, |c| c.id)
            .map_err(|_| BreadboardError::ComponentNotFound { component: id })
    }

    fn check_pin(&self, pin: PinRef) -> Result<()> {
        let comp = self.get(pin.component)?;
        if pin.pin < comp.pins.len() {
            Ok(())
        } else {
            Err(BreadboardError::PinNotFound {
                component: pin.component,
                pin: pin.pin.to_string(),
            })
        }
    }
}
