//! Linked cancellation signal composed from caller cancellation and a
//! timeout clock.
//!
//! Both triggers fire the same composed token, so downstream code only
//! has to watch one token. Which trigger actually fired is recorded in a
//! tagged flag: [`LinkedSignal::timed_out`] distinguishes timeout expiry
//! from caller cancellation after the fact, which is what decides between
//! `Timeout` and `Cancelled` outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancellation signal for exactly one orchestrator call.
///
/// Composes the caller's token with a hard wall-clock deadline measured
/// from construction. Dropping the signal aborts the deadline timer, so
/// its lifetime is scoped to the call that created it.
pub(crate) struct LinkedSignal {
    token: CancellationToken,
    timed_out: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

impl LinkedSignal {
    /// Derive a linked signal from the caller's token and a timeout.
    ///
    /// The composed token is a child of `caller`, so caller cancellation
    /// propagates into it. A timer task cancels the composed token when
    /// the deadline elapses; the flag is stored before the cancel so an
    /// observer that sees the token fire can attribute it correctly.
    pub(crate) fn new(caller: CancellationToken, timeout: Duration) -> Self {
        let token = caller.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));

        let timer = tokio::spawn({
            let token = token.clone();
            let timed_out = Arc::clone(&timed_out);
            async move {
                tokio::time::sleep(timeout).await;
                timed_out.store(true, Ordering::SeqCst);
                token.cancel();
            }
        });

        Self {
            token,
            timed_out,
            timer,
        }
    }

    /// Clone of the composed token, for handing to relays and sinks.
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the timeout trigger is the one that fired.
    pub(crate) fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }
}

impl Drop for LinkedSignal {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
