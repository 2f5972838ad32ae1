use crate::events::{GraphEvent, GraphEventSubscriber};

/// A buffering subscriber used to batch events, typically around replay.
///
/// Events accumulate until [`Self::flush`]; a buffered event that a newer
/// one supersedes (see [`GraphEvent::mergeable`]) is dropped together with
/// the newcomer, so a frame that is added and removed within one batch never
/// reaches the flush target at all.
#[derive(Default)]
pub struct GraphEventQueue {
    buffer: Vec<GraphEvent>,
}

impl GraphEventQueue {
    pub fn new() -> Self {
        GraphEventQueue::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn events(&self) -> &[GraphEvent] {
        &self.buffer
    }

    /// Delivers all buffered events to `target` in arrival order and clears
    /// the buffer.
    pub fn flush(&mut self, target: &mut dyn GraphEventSubscriber) {
        for event in self.buffer.drain(..) {
            target.notify(&event);
        }
    }

    fn push(&mut self, event: GraphEvent) {
        if let Some(position) = self
            .buffer
            .iter()
            .position(|buffered| buffered.mergeable(&event))
        {
            self.buffer.remove(position);
            return;
        }
        self.buffer.push(event);
    }
}

impl GraphEventSubscriber for GraphEventQueue {
    fn notify(&mut self, event: &GraphEvent) {
        self.push(event.clone());
    }
}
