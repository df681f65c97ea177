//! Single-shot timers driving the negotiation transitions
//!
//! The engine never sleeps: it asks for timers by effect, and each fire
//! comes back through the app's single event channel, serialized with the
//! protocol events. Arming a kind always cancels the previous timer of that
//! kind; stale fires are filtered by generation.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The logical timers of the negotiation core
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Pacing delay before activating the next queued deal
    Activation,
    /// Stall detection for the active negotiation
    SessionTimeout,
    /// Pacing delay before the first stage confirmation
    Confirm,
}

impl TimerKind {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        match self {
            TimerKind::Activation => 0,
            TimerKind::SessionTimeout => 1,
            TimerKind::Confirm => 2,
        }
    }
}

/// A timer fire delivered through the event channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Owns the pending single-shot timers of the event loop
pub struct TimerManager {
    tx: mpsc::UnboundedSender<TimerFired>,
    slots: [Slot; TimerKind::COUNT],
}

impl TimerManager {
    /// Create a manager and the receiver its fires arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            tx,
            slots: std::array::from_fn(|_| Slot::default()),
        };
        (manager, rx)
    }

    /// Arm `kind` to fire once after `delay`, superseding any pending timer
    /// of the same kind.
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel(kind);

        let slot = &mut self.slots[kind.index()];
        let generation = slot.generation;
        let tx = self.tx.clone();
        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired { kind, generation });
        }));
    }

    /// Cancel any pending timer of `kind`. Cancelling a timer that already
    /// fired or was never armed is a no-op.
    pub fn cancel(&mut self, kind: TimerKind) {
        let slot = &mut self.slots[kind.index()];
        // Invalidate a fire that may already sit in the channel
        slot.generation += 1;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
    }

    /// Check a received fire against the current generation. Returns false
    /// for fires of timers that were cancelled or re-armed since.
    pub fn acknowledge(&mut self, fired: &TimerFired) -> bool {
        let slot = &mut self.slots[fired.kind.index()];
        if fired.generation == slot.generation {
            slot.handle = None;
            true
        } else {
            false
        }
    }
}
