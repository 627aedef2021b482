//! Tracking / mapping phase alternation

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Optimization phase of one training step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Only pose corrections are optimized.
    Tracking,
    /// Only scene parameters are optimized.
    #[default]
    Mapping,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Tracking => Mode::Mapping,
            Mode::Mapping => Mode::Tracking,
        }
    }

    /// Whether the tracker's parameter groups are handed to the optimizer.
    pub fn reports_tracker(self) -> bool {
        matches!(self, Mode::Tracking)
    }

    /// Whether the scene's parameter groups are handed to the optimizer.
    pub fn reports_scene(self) -> bool {
        matches!(self, Mode::Mapping)
    }

    /// Whether scene refinement runs after the optimizer step.
    pub fn runs_refinement(self) -> bool {
        matches!(self, Mode::Mapping)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Tracking => write!(f, "tracking"),
            Mode::Mapping => write!(f, "mapping"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Mode before the first pre-iteration toggle.
    pub initial: Mode,
    /// Toggle once every `period` steps.
    pub period: u64,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            initial: Mode::Mapping,
            period: 1,
        }
    }
}

impl ModeConfig {
    pub fn with_initial(mut self, initial: Mode) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }
}

/// Flips the training mode from the pre-iteration hook.
#[derive(Debug, Clone)]
pub struct PhaseAlternator {
    mode: Mode,
    period: u64,
    calls: u64,
}

impl PhaseAlternator {
    pub fn new(config: &ModeConfig) -> Self {
        Self {
            mode: config.initial,
            period: config.period.max(1),
            calls: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Called once before each training step. Returns the mode for that step.
    pub fn on_pre_iteration(&mut self, step: u64) -> Mode {
        self.calls += 1;
        if self.calls % self.period == 0 {
            self.mode = self.mode.toggled();
            debug!("Step {}: switched to {} mode", step, self.mode);
        }
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_starts_mapping_and_alternates_every_step() {
        let mut alternator = PhaseAlternator::new(&ModeConfig::default());
        assert_eq!(alternator.mode(), Mode::Mapping);

        let modes: Vec<Mode> = (0..4).map(|step| alternator.on_pre_iteration(step)).collect();
        assert_eq!(
            modes,
            vec![Mode::Tracking, Mode::Mapping, Mode::Tracking, Mode::Mapping]
        );
    }

    #[test]
    fn test_mode_follows_call_parity() {
        let mut alternator = PhaseAlternator::new(&ModeConfig::default());
        for step in 0..20u64 {
            let mode = alternator.on_pre_iteration(step);
            let expected = if step % 2 == 0 { Mode::Tracking } else { Mode::Mapping };
            assert_eq!(mode, expected);
        }
    }

    #[test]
    fn test_mode_follows_call_parity_from_tracking() {
        let config = ModeConfig::default().with_initial(Mode::Tracking);
        let mut alternator = PhaseAlternator::new(&config);
        assert_eq!(alternator.mode(), Mode::Tracking);
        for step in 0..20u64 {
            let mode = alternator.on_pre_iteration(step);
            let expected = if step % 2 == 0 { Mode::Mapping } else { Mode::Tracking };
            assert_eq!(mode, expected);
            if step % 2 == 1 {
                assert_eq!(alternator.mode(), config.initial);
            }
        }
    }

    #[test]
    fn test_period_delays_toggle() {
        let config = ModeConfig::default()
            .with_initial(Mode::Tracking)
            .with_period(3);
        let mut alternator = PhaseAlternator::new(&config);
        let modes: Vec<Mode> = (0..6).map(|step| alternator.on_pre_iteration(step)).collect();
        assert_eq!(
            modes,
            vec![
                Mode::Tracking,
                Mode::Tracking,
                Mode::Mapping,
                Mode::Mapping,
                Mode::Mapping,
                Mode::Tracking
            ]
        );
    }

    #[test]
    fn test_effects_are_exclusive() {
        for mode in [Mode::Tracking, Mode::Mapping] {
            assert_ne!(mode.reports_tracker(), mode.reports_scene());
            assert_eq!(mode.runs_refinement(), mode.reports_scene());
        }
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Tracking).unwrap(), "\"tracking\"");
        let mode: Mode = serde_json::from_str("\"mapping\"").unwrap();
        assert_eq!(mode, Mode::Mapping);
    }
}
