//! Event ports and sinks

use crate::field::{FieldKind, FieldValue};

use super::NodeId;

/// Where an emitted event goes next
#[derive(Debug, Clone, PartialEq)]
pub enum EventSink {
    /// Deliver to an eventIn (or exposedField) of a node
    Input { node: NodeId, input: String },
    /// Re-emit from an output port of a prototype instance
    Output { node: NodeId, output: String },
}

/// An output port: last emitted value, last emission time and listeners
///
/// Ports only re-emit for strictly increasing timestamps. A port that has
/// never emitted accepts any timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPort {
    value: FieldValue,
    last_timestamp: Option<f64>,
    sinks: Vec<EventSink>,
}

impl EventPort {
    /// Create a port holding an initial value
    pub fn new(value: FieldValue) -> Self {
        Self {
            value,
            last_timestamp: None,
            sinks: Vec::new(),
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    /// Last emitted (or initial) value
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    pub fn sinks(&self) -> &[EventSink] {
        &self.sinks
    }

    /// Store an event if its timestamp is newer than the last emission
    ///
    /// Returns false if the event was dropped. The value must be of the
    /// port's kind; callers check kinds when the port is connected.
    pub fn accept(&mut self, value: FieldValue, timestamp: f64) -> bool {
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return false;
            }
        }
        debug_assert_eq!(value.kind(), self.value.kind());
        self.value = value;
        self.last_timestamp = Some(timestamp);
        true
    }

    /// Overwrite the stored value without emitting
    pub(crate) fn set_value(&mut self, value: FieldValue) {
        self.value = value;
    }

    /// Add a listener; returns false if it was already connected
    pub fn add_sink(&mut self, sink: EventSink) -> bool {
        if self.sinks.contains(&sink) {
            false
        } else {
            self.sinks.push(sink);
            true
        }
    }

    /// Remove a listener; returns false if it was not connected
    pub fn remove_sink(&mut self, sink: &EventSink) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|s| s != sink);
        self.sinks.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_event_is_accepted() {
        let mut port = EventPort::new(FieldValue::SfFloat(0.0));
        assert!(port.accept(FieldValue::SfFloat(1.0), -5.0));
        assert_eq!(port.last_timestamp(), Some(-5.0));
    }

    #[test]
    fn test_monotonic_dedup() {
        let mut port = EventPort::new(FieldValue::SfFloat(0.0));
        assert!(port.accept(FieldValue::SfFloat(1.0), 1.0));
        assert!(!port.accept(FieldValue::SfFloat(2.0), 1.0));
        assert!(!port.accept(FieldValue::SfFloat(3.0), 0.5));
        assert_eq!(port.value(), &FieldValue::SfFloat(1.0));
        assert!(port.accept(FieldValue::SfFloat(4.0), 2.0));
        assert_eq!(port.value(), &FieldValue::SfFloat(4.0));
    }

    #[test]
    fn test_sinks_are_unique() {
        let mut port = EventPort::new(FieldValue::SfBool(false));
        let sink = EventSink::Input {
            node: NodeId::from_index(3),
            input: "on".into(),
        };
        assert!(port.add_sink(sink.clone()));
        assert!(!port.add_sink(sink.clone()));
        assert_eq!(port.sinks().len(), 1);
        assert!(port.remove_sink(&sink));
        assert!(!port.remove_sink(&sink));
    }
}
