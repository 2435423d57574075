//! Signal relay from the supervisor to the sandboxed child.
//!
//! Listener tasks turn process signals into [`RelaySignal`] messages on a
//! bounded channel. The supervisor owns the receiving end and decides what
//! to forward. Dropping the relay cancels the listeners.
//!
//! Once tokio has registered a handler for a signal it never unregisters
//! it, so the signal would be swallowed for the rest of the process. While
//! no relay is live, a conditional handler instead performs the signal's
//! default action, so a `SIGTERM` after the child has exited still
//! terminates the launcher.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use nix::sys::signal::Signal;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

/// A signal to relay to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySignal {
    /// `SIGTERM`
    Terminate,
    /// `SIGHUP`
    Hangup,
    /// `SIGINT`
    Interrupt,
    /// `SIGQUIT`
    Quit,
}

impl RelaySignal {
    /// Every relayed signal.
    pub const ALL: [Self; 4] = [Self::Terminate, Self::Hangup, Self::Interrupt, Self::Quit];

    /// The signal to deliver with `kill(2)`.
    #[must_use]
    pub fn as_signal(self) -> Signal {
        match self {
            Self::Terminate => Signal::SIGTERM,
            Self::Hangup => Signal::SIGHUP,
            Self::Interrupt => Signal::SIGINT,
            Self::Quit => Signal::SIGQUIT,
        }
    }

    /// Keyboard-generated signals, which a child sharing the terminal's
    /// foreground process group already receives.
    #[must_use]
    pub fn is_keyboard(self) -> bool {
        matches!(self, Self::Interrupt | Self::Quit)
    }

    fn raw(self) -> i32 {
        match self {
            Self::Terminate => SIGTERM,
            Self::Hangup => SIGHUP,
            Self::Interrupt => SIGINT,
            Self::Quit => SIGQUIT,
        }
    }

    fn kind(self) -> SignalKind {
        match self {
            Self::Terminate => SignalKind::terminate(),
            Self::Hangup => SignalKind::hangup(),
            Self::Interrupt => SignalKind::interrupt(),
            Self::Quit => SignalKind::quit(),
        }
    }
}

/// Process-wide switch between relaying and default signal handling.
struct DefaultHandling {
    /// When set, relayed signals get their default action.
    restore: Arc<AtomicBool>,
    live_relays: usize,
}

static DEFAULT_HANDLING: Mutex<Option<DefaultHandling>> = Mutex::new(None);

/// Suspend default handling for the lifetime of one relay.
fn suspend_default_handling() -> io::Result<()> {
    let mut state = DEFAULT_HANDLING
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if state.is_none() {
        // Recorded before registering so a partial failure is never
        // retried with a second, unrelated flag.
        let handling = state.insert(DefaultHandling {
            restore: Arc::new(AtomicBool::new(true)),
            live_relays: 0,
        });
        for relayed in RelaySignal::ALL {
            signal_hook::flag::register_conditional_default(
                relayed.raw(),
                Arc::clone(&handling.restore),
            )?;
        }
    }
    if let Some(handling) = state.as_mut() {
        handling.live_relays = handling.live_relays.saturating_add(1);
        handling.restore.store(false, Ordering::SeqCst);
    }
    Ok(())
}

/// Undo one [`suspend_default_handling`]; the last relay out restores the
/// default actions.
fn resume_default_handling() {
    let mut state = DEFAULT_HANDLING
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(handling) = state.as_mut() {
        handling.live_relays = handling.live_relays.saturating_sub(1);
        if handling.live_relays == 0 {
            handling.restore.store(true, Ordering::SeqCst);
            debug!("Default signal handling restored");
        }
    }
}

/// Receiving end of the relay plus the listeners feeding it.
#[derive(Debug)]
pub struct SignalRelay {
    rx: mpsc::Receiver<RelaySignal>,
    token: CancellationToken,
    /// Whether this relay holds default handling suspended.
    suspends_defaults: bool,
}

impl SignalRelay {
    /// Install listeners for every [`RelaySignal`].
    ///
    /// Must be called inside a tokio runtime. The signals are relayed until
    /// [`SignalRelay::cancel`] or drop, after which they regain their
    /// default action.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler cannot be registered.
    pub fn install() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = CancellationToken::new();

        suspend_default_handling()?;
        let relay = Self {
            rx,
            token,
            suspends_defaults: true,
        };

        for relayed in RelaySignal::ALL {
            let mut stream = signal(relayed.kind())?;
            let tx = tx.clone();
            let token = relay.token.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        received = stream.recv() => {
                            if received.is_none() || tx.send(relayed).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                debug!(signal = ?relayed, "Signal listener stopped");
            });
        }

        Ok(relay)
    }

    /// A relay fed by an external channel instead of process signals.
    #[must_use]
    pub fn from_receiver(rx: mpsc::Receiver<RelaySignal>) -> Self {
        Self {
            rx,
            token: CancellationToken::new(),
            suspends_defaults: false,
        }
    }

    /// The next signal, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<RelaySignal> {
        self.rx.recv().await
    }

    /// Stop the listeners and hand the signals back to their default
    /// action.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if std::mem::take(&mut self.suspends_defaults) {
            resume_default_handling();
        }
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_mapping() {
        assert_eq!(RelaySignal::Terminate.as_signal(), Signal::SIGTERM);
        assert_eq!(RelaySignal::Quit.as_signal(), Signal::SIGQUIT);
        assert!(RelaySignal::Interrupt.is_keyboard());
        assert!(!RelaySignal::Hangup.is_keyboard());
    }

    #[tokio::test]
    async fn test_injected_relay_delivers_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let mut relay = SignalRelay::from_receiver(rx);
        tx.send(RelaySignal::Hangup).await.unwrap();
        tx.send(RelaySignal::Terminate).await.unwrap();
        drop(tx);
        assert_eq!(relay.recv().await, Some(RelaySignal::Hangup));
        assert_eq!(relay.recv().await, Some(RelaySignal::Terminate));
        assert_eq!(relay.recv().await, None);
    }

    /// Serializes tests that touch the process-wide handling state.
    static SERIAL: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_install_and_cancel() {
        let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let mut relay = SignalRelay::install().unwrap();
        assert!(!restoring_defaults());
        relay.cancel();
        assert!(restoring_defaults());
        relay.cancel();
        drop(relay);
        assert!(restoring_defaults());
    }

    #[tokio::test]
    async fn test_defaults_wait_for_the_last_relay() {
        let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let first = SignalRelay::install().unwrap();
        let second = SignalRelay::install().unwrap();
        drop(first);
        assert!(!restoring_defaults());
        drop(second);
        assert!(restoring_defaults());
    }

    #[test]
    fn test_injected_relay_leaves_defaults_alone() {
        let (_tx, rx) = mpsc::channel(1);
        let relay = SignalRelay::from_receiver(rx);
        assert!(!relay.suspends_defaults);
    }

    fn restoring_defaults() -> bool {
        DEFAULT_HANDLING
            .lock()
            .unwrap()
            .as_ref()
            .is_none_or(|handling| handling.restore.load(Ordering::SeqCst))
    }
}
