//! Local alert-level state machine
//!
//! States `{Low, High}`, initial `Low`. Selection is local and synchronous
//! and always updates the held level.

use crate::presence::AlertLevel;

/// Indicator color for a level
pub fn indicator_color(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Low => "green",
        AlertLevel::High => "red",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertStateMachine {
    level: AlertLevel,
}

impl AlertStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> AlertLevel {
        self.level
    }

    /// Record the participant's selection. Returns the previous level.
    pub fn select(&mut self, level: AlertLevel) -> AlertLevel {
        std::mem::replace(&mut self.level, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_low() {
        assert_eq!(AlertStateMachine::new().level(), AlertLevel::Low);
    }

    #[test]
    fn test_select_unconditionally_updates() {
        let mut machine = AlertStateMachine::new();
        assert_eq!(machine.select(AlertLevel::High), AlertLevel::Low);
        assert_eq!(machine.level(), AlertLevel::High);
        // Re-selecting the same level is still a transition
        assert_eq!(machine.select(AlertLevel::High), AlertLevel::High);
        assert_eq!(machine.level(), AlertLevel::High);
    }

    #[test]
    fn test_indicator_color() {
        assert_eq!(indicator_color(AlertLevel::Low), "green");
        assert_eq!(indicator_color(AlertLevel::High), "red");
    }
}
