use crate::widgets::{WidgetKind, WidgetValue};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Text {
        body: String,
    },
    Markdown {
        body: String,
    },
    /// Placeholder that a later write can fill in.
    Empty,
    Exception {
        message: String,
    },
    Widget {
        id: String,
        kind: WidgetKind,
        label: String,
        value: WidgetValue,
    },
}

impl Element {
    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        match self {
            Self::Text { body } => Some(body.as_str()),
            _ => None,
        }
    }
}

/// One UI update: `element` goes into output slot `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub index: usize,
    pub element: Element,
}

pub trait OutputSink {
    fn emit(&mut self, delta: Delta);
}

impl OutputSink for Vec<Delta> {
    fn emit(&mut self, delta: Delta) {
        self.push(delta);
    }
}

impl OutputSink for Sender<Delta> {
    fn emit(&mut self, delta: Delta) {
        let _ = self.send(delta);
    }
}

#[derive(Debug, Default)]
struct Slots {
    deltas: Vec<Delta>,
    received: usize,
}

/// Renderer-side view of the output: a delta for an already filled slot
/// replaces it in place.
///
/// Clones share the same buffer, so one handle can be given to a runner as
/// its sink while another is used to read what was rendered.
#[derive(Debug, Clone, Default)]
pub struct DeltaQueue {
    slots: Arc<Mutex<Slots>>,
}

impl DeltaQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, delta: Delta) {
        let mut slots = self.slots.lock();
        slots.received += 1;
        match slots.deltas.iter_mut().find(|d| d.index == delta.index) {
            Some(existing) => *existing = delta,
            None => {
                let at = slots.deltas.partition_point(|d| d.index < delta.index);
                slots.deltas.insert(at, delta);
            }
        }
    }

    /// Current deltas ordered by slot.
    #[must_use]
    pub fn deltas(&self) -> Vec<Delta> {
        self.slots.lock().deltas.clone()
    }

    #[must_use]
    pub fn text_bodies(&self) -> Vec<String> {
        self.slots
            .lock()
            .deltas
            .iter()
            .filter_map(|d| d.element.text_body().map(str::to_string))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().deltas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().deltas.is_empty()
    }

    /// Number of deltas received, including ones that replaced a slot.
    #[must_use]
    pub fn received(&self) -> usize {
        self.slots.lock().received
    }

    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        slots.deltas.clear();
        slots.received = 0;
    }
}

impl OutputSink for DeltaQueue {
    fn emit(&mut self, delta: Delta) {
        self.push(delta);
    }
}
