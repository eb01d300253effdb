//! Presence view projection
//!
//! Holds the session's copy of the presence set and projects it, together
//! with local state, into a renderable [`Frame`]. Each snapshot replaces the
//! previous one wholesale; nothing from an older snapshot survives.

use serde::Serialize;

use crate::presence::{AlertLevel, LocationUpdate, Position};

use super::alert::indicator_color;

/// Radius of the local danger indicator circle, in meters
pub const INDICATOR_RADIUS_M: f64 = 5000.0;

/// Zoom level used when centering on the participant
pub const DEFAULT_ZOOM: u8 = 15;

/// Another participant's marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: Position,
    /// `"<email> (<Level>)"`
    pub label: String,
}

impl From<&LocationUpdate> for Marker {
    fn from(user: &LocationUpdate) -> Self {
        Self {
            position: user.position(),
            label: format!("{} ({})", user.email, user.alert_level),
        }
    }
}

/// Circle drawn around the participant's own position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DangerIndicator {
    pub center: Position,
    pub radius_m: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    pub center: Position,
    pub zoom: u8,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub viewport: Viewport,
    /// Own marker ("Your Location"), present once a position is known
    pub own_marker: Option<Marker>,
    pub indicator: Option<DangerIndicator>,
    /// `"Lat: 40.0000 Lng: -70.0000"`
    pub coordinates: Option<String>,
    pub markers: Vec<Marker>,
}

/// Session-local presence set
#[derive(Debug, Clone, Default)]
pub struct PresenceView {
    users: Vec<LocationUpdate>,
    snapshots_applied: u64,
    closed: bool,
}

impl PresenceView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the presence set. Ignored once the view is closed.
    pub fn apply_snapshot(&mut self, users: Vec<LocationUpdate>) -> bool {
        if self.closed {
            return false;
        }
        self.users = users;
        self.snapshots_applied += 1;
        true
    }

    /// Stop accepting snapshots
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn users(&self) -> &[LocationUpdate] {
        &self.users
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.users.iter().map(Marker::from).collect()
    }

    /// Project the presence set plus local state into a frame
    pub fn render(&self, position: Option<Position>, level: AlertLevel) -> Frame {
        let viewport = Viewport {
            center: position.unwrap_or(Position::new(0.0, 0.0)),
            zoom: DEFAULT_ZOOM,
        };
        let own_marker = position.map(|p| Marker {
            position: p,
            label: "Your Location".to_string(),
        });
        let indicator = position.map(|p| DangerIndicator {
            center: p,
            radius_m: INDICATOR_RADIUS_M,
            color: indicator_color(level),
        });
        let coordinates =
            position.map(|p| format!("Lat: {:.4} Lng: {:.4}", p.latitude, p.longitude));

        Frame {
            viewport,
            own_marker,
            indicator,
            coordinates,
            markers: self.markers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str, lat: f64, lng: f64, level: AlertLevel) -> LocationUpdate {
        LocationUpdate {
            email: email.to_string(),
            latitude: lat,
            longitude: lng,
            alert_level: level,
        }
    }

    #[test]
    fn test_snapshot_replaces_wholesale() {
        let mut view = PresenceView::new();
        view.apply_snapshot(vec![
            user("u1", 1.0, 1.0, AlertLevel::Low),
            user("u2", 2.0, 2.0, AlertLevel::High),
        ]);
        view.apply_snapshot(vec![user("u3", 3.0, 3.0, AlertLevel::Low)]);

        assert_eq!(view.users(), &[user("u3", 3.0, 3.0, AlertLevel::Low)]);
        assert_eq!(view.snapshots_applied(), 2);
    }

    #[test]
    fn test_empty_snapshot_clears() {
        let mut view = PresenceView::new();
        view.apply_snapshot(vec![user("u1", 1.0, 1.0, AlertLevel::Low)]);
        view.apply_snapshot(Vec::new());
        assert!(view.markers().is_empty());
    }

    #[test]
    fn test_marker_label() {
        let mut view = PresenceView::new();
        view.apply_snapshot(vec![user("u2", 1.0, 2.0, AlertLevel::High)]);
        let markers = view.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].label, "u2 (High)");
        assert_eq!(markers[0].position, Position::new(1.0, 2.0));
    }

    #[test]
    fn test_closed_view_ignores_snapshots() {
        let mut view = PresenceView::new();
        view.apply_snapshot(vec![user("u1", 1.0, 1.0, AlertLevel::Low)]);
        view.close();
        assert!(!view.apply_snapshot(Vec::new()));
        assert_eq!(view.users().len(), 1);
    }

    #[test]
    fn test_render_without_position() {
        let view = PresenceView::new();
        let frame = view.render(None, AlertLevel::Low);
        assert_eq!(frame.viewport.center, Position::new(0.0, 0.0));
        assert!(frame.own_marker.is_none());
        assert!(frame.indicator.is_none());
        assert!(frame.coordinates.is_none());
    }

    #[test]
    fn test_render_with_position() {
        let mut view = PresenceView::new();
        view.apply_snapshot(vec![user("u2", 1.0, 2.0, AlertLevel::High)]);
        let frame = view.render(Some(Position::new(40.0, -70.0)), AlertLevel::High);

        assert_eq!(frame.viewport.center, Position::new(40.0, -70.0));
        assert_eq!(frame.viewport.zoom, DEFAULT_ZOOM);
        assert_eq!(frame.own_marker.unwrap().label, "Your Location");
        let indicator = frame.indicator.unwrap();
        assert_eq!(indicator.color, "red");
        assert_eq!(indicator.radius_m, INDICATOR_RADIUS_M);
        assert_eq!(frame.coordinates.unwrap(), "Lat: 40.0000 Lng: -70.0000");
        // Other participants are independent of the local marker
        assert_eq!(frame.markers[0].label, "u2 (High)");
    }
}
