//! One-shot delayed messages.
//!
//! A [`Timer`] is a spawned task that sleeps and then posts a message back
//! to its controller's mailbox. Dropping or cancelling the timer aborts the
//! task. A message that was already posted before the abort still arrives,
//! so every handler re-validates what the message refers to.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::controller::Message;

#[derive(Debug)]
pub(crate) struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Posts `message` to `tx` after `delay`.
    pub(crate) fn arm(delay: Duration, tx: &UnboundedSender<Message>, message: Message) -> Self {
        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone once the controller has detached.
            let _ = tx.send(message);
        });
        Timer { handle }
    }

    pub(crate) fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = Timer::arm(
            Duration::from_millis(50),
            &tx,
            Message::DebounceElapsed { generation: 7 },
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        match rx.try_recv() {
            Ok(Message::DebounceElapsed { generation }) => assert_eq!(generation, 7),
            other => panic!("expected DebounceElapsed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = Timer::arm(
            Duration::from_millis(50),
            &tx,
            Message::DebounceElapsed { generation: 1 },
        );
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(Timer::arm(
            Duration::from_millis(50),
            &tx,
            Message::DebounceElapsed { generation: 1 },
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
