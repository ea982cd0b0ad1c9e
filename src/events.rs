// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Synthesizer notifications for control-side observers.
//!
//! Events are published from control threads only. The audio thread never
//! runs observer code.

use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

/// Something observers may want to react to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SynthEvent {
    /// A new instrument was handed to the audio thread.
    InstrumentLoaded { name: String, regions: usize },
    /// An instrument failed to load. The previous instrument remains active.
    InstrumentLoadFailed { path: PathBuf, error: String },
}

/// Fans events out to every live subscriber.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<SynthEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver that sees every event published from now on.
    pub fn subscribe(&self) -> Receiver<SynthEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Sends the event to every subscriber, dropping any that have gone away.
    pub fn publish(&self, event: SynthEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(event = ?event, subscribers = subscribers.len(), "Published event");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
