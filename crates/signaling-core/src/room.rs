//! Room location context.
//!
//! Process-wide state written by room-level UI and read by the signaling
//! handler to suppress the global banner when the recipient is already
//! inside the call's room. Single writer per room, many readers; a few
//! hundred milliseconds of staleness is acceptable because the suppression
//! rule only needs "was recently in this room".

use std::sync::Arc;

use parking_lot::RwLock;

/// Where the user currently is, as reported by room-level UI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomLocation {
    pub room_id: Option<String>,
    pub path: Option<String>,
}

/// Cheap-to-clone shared handle to the current room location
#[derive(Clone, Default)]
pub struct RoomLocationContext {
    inner: Arc<RwLock<RoomLocation>>,
}

impl RoomLocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room UI calls this on entering a room, before any await point
    pub fn enter_room(&self, room_id: impl Into<String>, path: impl Into<String>) {
        let mut loc = self.inner.write();
        loc.room_id = Some(room_id.into());
        loc.path = Some(path.into());
    }

    /// Room UI calls this on leaving the room view
    pub fn leave_room(&self) {
        let mut loc = self.inner.write();
        loc.room_id = None;
    }

    /// Update the navigational path without changing the room
    pub fn set_path(&self, path: impl Into<String>) {
        self.inner.write().path = Some(path.into());
    }

    pub fn current(&self) -> RoomLocation {
        self.inner.read().clone()
    }

    /// True when the user is viewing the given room, by room id or by the
    /// current path containing it
    pub fn is_in_room(&self, room_id: &str) -> bool {
        let loc = self.inner.read();
        if loc.room_id.as_deref() == Some(room_id) {
            return true;
        }
        loc.path
            .as_deref()
            .map(|p| p.contains(room_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_by_room_id_or_path() {
        let ctx = RoomLocationContext::new();
        assert!(!ctx.is_in_room("r1"));

        ctx.enter_room("r1", "/rooms/r1");
        assert!(ctx.is_in_room("r1"));
        assert!(!ctx.is_in_room("r2"));

        ctx.leave_room();
        // the path still references the room until navigation moves on
        assert!(ctx.is_in_room("r1"));

        ctx.set_path("/home");
        assert!(!ctx.is_in_room("r1"));
    }
}
