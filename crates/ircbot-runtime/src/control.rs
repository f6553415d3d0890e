//! Out-of-band control of a running bot.
//!
//! Control events arrive on a channel and are handled by the connection loop
//! between two inbound lines, never in the middle of one.

use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Quit the server; a second one drops the connection.
    Terminate,
    /// Run every layer's flush hook.
    Flush,
}

pub type ControlSender = mpsc::UnboundedSender<ControlEvent>;
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlEvent>;

pub fn control_channel() -> (ControlSender, ControlReceiver) {
    mpsc::unbounded_channel()
}

/// Forwards OS signals as control events until the receiver goes away.
///
/// SIGINT and SIGTERM become [`ControlEvent::Terminate`], SIGUSR1 becomes
/// [`ControlEvent::Flush`]. Elsewhere only Ctrl+C is watched.
#[cfg(unix)]
pub fn subscribe_signals(events: ControlSender) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut flush = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = interrupt.recv() => {
                    info!("Received SIGINT");
                    ControlEvent::Terminate
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM");
                    ControlEvent::Terminate
                }
                _ = flush.recv() => {
                    info!("Received SIGUSR1");
                    ControlEvent::Flush
                }
            };
            if events.send(event).is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn subscribe_signals(events: ControlSender) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            if events.send(ControlEvent::Terminate).is_err() {
                break;
            }
        }
    }))
}
