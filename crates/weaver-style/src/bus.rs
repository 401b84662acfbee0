//! Channel-keyed publish/subscribe for engine notifications.
//!
//! Handlers run synchronously in registration order. The engine never calls
//! [`EventBus::publish`] directly; every publish goes through the coalescer's
//! channel filter first.

use crate::host::ChangeMetadata;
use crate::range::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    SelectionChanged,
    ContentChanged,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The live selection moved or was re-pointed after a mutation.
    SelectionChanged(Option<Range>),
    /// The trailing notification after a burst of mutations settled.
    ContentChanged(ChangeMetadata),
}

impl Event {
    pub fn channel(&self) -> Channel {
        match self {
            Event::SelectionChanged(_) => Channel::SelectionChanged,
            Event::ContentChanged(_) => Channel::ContentChanged,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&Event)>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Channel, Handler)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("next_id", &self.next_id)
            .field("subscriber_count", &self.handlers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        channel: Channel,
        handler: impl FnMut(&Event) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, channel, Box::new(handler)));
        id
    }

    /// Returns whether a handler was registered under `id`.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sid, _, _)| *sid != id);
        self.handlers.len() != before
    }

    /// Delivers `event` to every handler on its channel. Returns the number
    /// of handlers reached.
    pub fn publish(&mut self, event: &Event) -> usize {
        let channel = event.channel();
        let mut delivered = 0;
        for (_, ch, handler) in &mut self.handlers {
            if *ch == channel {
                handler(event);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.handlers.iter().filter(|(_, ch, _)| *ch == channel).count()
    }
}
