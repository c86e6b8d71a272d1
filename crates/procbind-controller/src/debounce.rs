//! Debounced cleanup scheduling.
//!
//! Each re-arm bumps a generation counter and the timer carries the
//! generation it was armed with. A firing whose generation is no longer
//! current was superseded and is ignored, even if the superseded timer's
//! message slipped into the mailbox before it was aborted.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::controller::Message;
use crate::timer::Timer;

#[derive(Debug, Default)]
pub(crate) struct DebounceState {
    timer: Option<Timer>,
    generation: u64,
}

impl DebounceState {
    /// Cancels any pending firing and schedules a new one after `delay`.
    pub(crate) fn rearm(&mut self, delay: Duration, tx: &UnboundedSender<Message>) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        // Replacing the old timer drops and aborts it.
        self.timer = Some(Timer::arm(
            delay,
            tx,
            Message::DebounceElapsed { generation },
        ));
        generation
    }

    /// Consumes the pending firing if `generation` is the current one.
    pub(crate) fn take_if_current(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.timer.is_none() {
            return false;
        }
        self.timer = None;
        true
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.timer.is_some()
    }
}
