//! Call signaling for the parley coordination core.
//!
//! Detects incoming voice/video calls from several independently-unreliable
//! sources (a push change feed, a polling fallback, per-call and generic
//! call-record subscriptions), deduplicates them, and drives the
//! ringing → accepted/declined/missed/cancelled lifecycle along with the
//! ringtone and banner state the UI renders. Persistence writes are
//! best-effort throughout; the lifecycle depends only on locally-observed
//! transitions and the reactive subscriptions.

pub mod call;
pub mod config;
pub mod error;
pub mod handler;
pub mod ports;
pub mod ringtone;
pub mod room;
pub mod testing;

pub use call::{
    CallContent, CallId, CallKind, CallNotification, CallRecord, CallRecordStatus, CallUiState,
    ClearReason,
};
pub use config::SignalingConfig;
pub use error::{Result, SignalingError};
pub use handler::{CallSignalingHandler, CandidateSource};
pub use ports::{
    CallRecordApi, JoinGrant, NavParams, Navigator, NotificationApi, SignalingPorts, TokenService,
};
pub use ringtone::{PlaybackRejected, RingtoneControl, RingtonePlayer};
pub use room::{RoomLocation, RoomLocationContext};
