//! Resistance engine - accumulation and recovery
//!
//! Scroll activity accumulates in a leaky bucket:
//! - Every qualifying wheel event adds at least one unit
//! - The multiplier grows linearly with accumulated units, up to a ceiling
//! - A 1 Hz recovery tick drains units while the user is idle
//!
//! The engine only tracks whether the recovery timer *should* run; the
//! caller owns the actual timer and reconciles it with
//! [`ResistanceEngine::recovery_active`] after every operation.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ResistanceConfig;

/// A wheel event as dispatched by the host page
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelEvent {
    pub delta_x: f64,
    pub delta_y: f64,
    /// The page already consumed this event
    #[serde(default)]
    pub default_prevented: bool,
    #[serde(default)]
    pub ctrl_key: bool,
    #[serde(default)]
    pub meta_key: bool,
}

impl WheelEvent {
    /// Plain vertical wheel event
    pub fn vertical(delta_y: f64) -> Self {
        Self {
            delta_y,
            ..Default::default()
        }
    }

    pub fn new(delta_x: f64, delta_y: f64) -> Self {
        Self {
            delta_x,
            delta_y,
            ..Default::default()
        }
    }

    /// Zoom/navigation gestures and already-handled events are left alone
    pub fn is_reserved(&self) -> bool {
        self.default_prevented || self.ctrl_key || self.meta_key
    }

    /// Both deltas are real numbers
    pub fn is_finite(&self) -> bool {
        self.delta_x.is_finite() && self.delta_y.is_finite()
    }

    /// Largest absolute travel on either axis
    pub fn distance(&self) -> f64 {
        self.delta_x.abs().max(self.delta_y.abs())
    }
}

/// Scroll offsets to apply relative to the current position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollDelta {
    pub left: f64,
    pub top: f64,
}

/// What the caller must do with a wheel event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelOutcome {
    /// Let the browser scroll natively
    PassThrough,
    /// Suppress native scrolling and scroll by the adjusted delta instead
    Adjusted(ScrollDelta),
}

/// Coarse engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// Not active on this page, no recovery timer
    Idle,
    /// Active with no accumulated activity
    ActiveResting,
    /// Active with accumulated activity, recovery timer running
    ActiveLoaded,
}

/// Per-page accumulation state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    /// Accumulated activity (never negative)
    pub scroll_units: f64,
    /// Derived from `scroll_units`, always within [base, max]
    pub multiplier: f64,
    /// Whether the recovery timer should be running
    pub recovery_active: bool,
}

/// Result of one recovery tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickResult {
    pub scroll_units: f64,
    pub multiplier: f64,
    /// The timer should be released
    pub stop_timer: bool,
}

/// The resistance state machine
#[derive(Debug, Clone)]
pub struct ResistanceEngine {
    config: ResistanceConfig,
    active: bool,
    state: EngineState,
}

impl ResistanceEngine {
    /// Create an idle engine with the given curve
    pub fn new(config: ResistanceConfig) -> Self {
        Self {
            config,
            active: false,
            state: EngineState {
                scroll_units: 0.0,
                multiplier: config.base_multiplier,
                recovery_active: false,
            },
        }
    }

    pub fn config(&self) -> &ResistanceConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn scroll_units(&self) -> f64 {
        self.state.scroll_units
    }

    pub fn multiplier(&self) -> f64 {
        self.state.multiplier
    }

    pub fn recovery_active(&self) -> bool {
        self.state.recovery_active
    }

    pub fn phase(&self) -> EnginePhase {
        if !self.active {
            EnginePhase::Idle
        } else if self.state.scroll_units > 0.0 {
            EnginePhase::ActiveLoaded
        } else {
            EnginePhase::ActiveResting
        }
    }

    /// Apply new settings. Accumulated activity is discarded and the recovery
    /// timer released; it restarts on the next qualifying wheel event.
    pub fn configure(&mut self, config: ResistanceConfig, is_active: bool) {
        self.config = config;
        self.active = is_active;
        self.state.scroll_units = 0.0;
        self.state.recovery_active = false;
        self.recompute();

        trace!(active = is_active, multiplier = self.state.multiplier, "engine configured");
    }

    /// Process one wheel event
    pub fn on_wheel(&mut self, event: &WheelEvent) -> WheelOutcome {
        if !self.active || event.is_reserved() || !event.is_finite() {
            return WheelOutcome::PassThrough;
        }

        let gain = self.config.gain_for(event.distance());
        self.state.scroll_units += gain;
        self.recompute();
        self.state.recovery_active = true;

        let multiplier = self.state.multiplier;
        WheelOutcome::Adjusted(ScrollDelta {
            left: event.delta_x / multiplier,
            top: event.delta_y / multiplier,
        })
    }

    /// Roll back to a state previously taken with [`ResistanceEngine::state`].
    ///
    /// Used when an adjusted scroll could not be applied.
    pub fn restore(&mut self, state: EngineState) {
        self.state = state;
    }

    /// One recovery step, driven at [`crate::RECOVERY_INTERVAL_SECS`]
    pub fn tick(&mut self) -> TickResult {
        if !self.active {
            self.state.scroll_units = 0.0;
            self.recompute();
            self.state.recovery_active = false;
        } else if self.state.scroll_units <= 0.0 {
            // Resting while active: the timer stays alive until deactivation.
            self.state.scroll_units = 0.0;
            self.recompute();
        } else {
            self.state.scroll_units =
                (self.state.scroll_units - self.config.recovery_per_second).max(0.0);
            self.recompute();
        }

        TickResult {
            scroll_units: self.state.scroll_units,
            multiplier: self.state.multiplier,
            stop_timer: !self.state.recovery_active,
        }
    }

    fn recompute(&mut self) {
        self.state.multiplier = self.config.multiplier_for(self.state.scroll_units);
    }
}

impl Default for ResistanceEngine {
    fn default() -> Self {
        Self::new(ResistanceConfig::default())
    }
}
