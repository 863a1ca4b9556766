//! Ringtone control with autoplay-policy handling.
//!
//! Platforms may reject audio playback until a user gesture has occurred.
//! A rejected play is not an error: it becomes a pending flag that the
//! first gesture resolves, if the call is still ringing by then.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

/// Playback was rejected by the platform (autoplay policy)
#[derive(Debug, Error)]
#[error("playback rejected: {0}")]
pub struct PlaybackRejected(pub String);

/// A loopable audio resource.
///
/// `play` may reject until a user-gesture unlock has occurred; `pause` and
/// `rewind` always succeed.
pub trait RingtonePlayer: Send + Sync {
    fn play(&self) -> std::result::Result<(), PlaybackRejected>;
    fn pause(&self);
    fn rewind(&self);
}

/// Wraps a [`RingtonePlayer`] with the pending-unlock state machine.
pub struct RingtoneControl {
    player: Arc<dyn RingtonePlayer>,
    pending: AtomicBool,
}

impl RingtoneControl {
    pub fn new(player: Arc<dyn RingtonePlayer>) -> Self {
        RingtoneControl {
            player,
            pending: AtomicBool::new(false),
        }
    }

    /// Start looping playback; a rejection parks the ring as pending
    pub fn start(&self) {
        match self.player.play() {
            Ok(()) => {
                self.pending.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                debug!(error = %e, "ringtone blocked until user gesture");
                self.pending.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Stop playback and reset position; clears any pending ring
    pub fn stop(&self) {
        self.pending.store(false, Ordering::SeqCst);
        self.player.pause();
        self.player.rewind();
    }

    /// First user interaction: audio is now unlocked, so start a ring that
    /// was parked as pending
    pub fn user_gesture(&self) {
        if self.pending.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.player.play() {
                warn!(error = %e, "ringtone still rejected after user gesture");
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}
