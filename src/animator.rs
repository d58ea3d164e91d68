//! ==============================================================================
//! animator.rs - local fixed-period motion between poll arrivals
//! ==============================================================================
//!
//! purpose:
//!     everything that moves on the local clock rather than the network:
//!     - Animator: counts displayed_seconds down by one period per tick
//!     - SignalCycle: GREEN/RED fallback cycle when no signal feed is configured
//!     - GateArm: lowers/raises the crossing arm toward the current category
//!
//! relationships:
//!     - driven by: monitor.rs (one tick interval for all three)
//!     - mutates: domain.rs (ReconciledState::displayed_seconds)
//!
//! ==============================================================================

use crate::domain::{ReconciledState, SignalCategory};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// float slack so 30.0 - 300 * 0.1 lands on zero instead of 1e-13
const ZERO_EPSILON: f64 = 1e-9;

pub struct Animator {
    period: Duration,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl Animator {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// one tick: count down and hold at zero
    pub fn advance(&self, state: &mut ReconciledState) {
        state.displayed_seconds = count_down(state.displayed_seconds, self.period);
        if state.displayed_seconds == 0.0 {
            state.is_counting = false;
        }
    }
}

fn count_down(seconds: f64, period: Duration) -> f64 {
    let next = seconds - period.as_secs_f64();
    if next <= ZERO_EPSILON {
        0.0
    } else {
        next
    }
}

// ==============================================================================
// simulated signal cycle
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalPhase {
    Green,
    Red,
}

impl SignalPhase {
    pub fn category(self) -> SignalCategory {
        match self {
            SignalPhase::Green => SignalCategory::Clear,
            SignalPhase::Red => SignalCategory::Occupied,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalCycle {
    phase: SignalPhase,
    green_seconds: f64,
    red_seconds: f64,
    remaining: f64,
}

impl SignalCycle {
    /// starts in GREEN with the full green time loaded
    pub fn new(green_seconds: f64, red_seconds: f64) -> Self {
        let green_seconds = green_seconds.max(0.0);
        Self {
            phase: SignalPhase::Green,
            green_seconds,
            red_seconds: red_seconds.max(0.0),
            remaining: green_seconds,
        }
    }

    pub fn advance(&mut self, period: Duration) {
        self.remaining = count_down(self.remaining, period);
        if self.remaining == 0.0 {
            let (phase, load) = match self.phase {
                SignalPhase::Green => (SignalPhase::Red, self.red_seconds),
                SignalPhase::Red => (SignalPhase::Green, self.green_seconds),
            };
            self.phase = phase;
            self.remaining = load;
        }
    }

    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn green_seconds(&self) -> f64 {
        self.green_seconds
    }

    pub fn red_seconds(&self) -> f64 {
        self.red_seconds
    }

    pub fn total_cycle(&self) -> f64 {
        self.green_seconds + self.red_seconds
    }
}

// ==============================================================================
// gate arm
// ==============================================================================
// 90 degrees is raised, 0 is lowered. full travel takes 5s down and 1s up
// with the default timings.

pub const GATE_RAISED: f64 = 90.0;
pub const GATE_LOWERED: f64 = 0.0;

#[derive(Debug, Clone)]
pub struct GateArm {
    angle: f64,
    close_seconds: f64,
    open_seconds: f64,
}

impl GateArm {
    pub fn new(close_seconds: f64, open_seconds: f64) -> Self {
        Self {
            angle: GATE_RAISED,
            close_seconds,
            open_seconds,
        }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// move toward the target for `category`; Unknown holds position
    pub fn advance(&mut self, period: Duration, category: SignalCategory) {
        let span = GATE_RAISED - GATE_LOWERED;
        let dt = period.as_secs_f64();
        match category {
            SignalCategory::Approaching | SignalCategory::Occupied => {
                self.angle = step_toward(self.angle, GATE_LOWERED, span, self.close_seconds, dt);
            }
            SignalCategory::Clear => {
                self.angle = step_toward(self.angle, GATE_RAISED, span, self.open_seconds, dt);
            }
            SignalCategory::Unknown => {}
        }
    }
}

fn step_toward(current: f64, target: f64, span: f64, full_travel_seconds: f64, dt: f64) -> f64 {
    if full_travel_seconds <= 0.0 {
        return target;
    }
    let step = span * dt / full_travel_seconds;
    if current > target {
        (current - step).max(target)
    } else {
        (current + step).min(target)
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, PollRecord};
    use proptest::prelude::*;

    fn state_with(seconds: f64) -> ReconciledState {
        let mut state = ReconciledState::new(PollRecord::sentinel(Coordinate::default()));
        state.displayed_seconds = seconds;
        state.is_counting = seconds > 0.0;
        state
    }

    #[test]
    fn test_three_ticks_from_thirty() {
        let animator = Animator::default();
        let mut state = state_with(30.0);
        for _ in 0..3 {
            animator.advance(&mut state);
        }
        assert!((state.displayed_seconds - 29.7).abs() < 0.1 + 1e-9);
        assert!(state.is_counting);
    }

    #[test]
    fn test_holds_at_zero() {
        let animator = Animator::default();
        let mut state = state_with(0.15);
        for _ in 0..10 {
            animator.advance(&mut state);
        }
        assert_eq!(state.displayed_seconds, 0.0);
        assert!(!state.is_counting);
    }

    #[test]
    fn test_cycle_starts_green() {
        let cycle = SignalCycle::new(30.0, 25.0);
        assert_eq!(cycle.phase(), SignalPhase::Green);
        assert_eq!(cycle.remaining(), 30.0);
        assert_eq!(cycle.total_cycle(), 55.0);
    }

    #[test]
    fn test_cycle_switches_on_zero() {
        let mut cycle = SignalCycle::new(1.0, 0.5);
        for _ in 0..10 {
            cycle.advance(DEFAULT_TICK);
        }
        assert_eq!(cycle.phase(), SignalPhase::Red);
        assert_eq!(cycle.remaining(), 0.5);
        for _ in 0..5 {
            cycle.advance(DEFAULT_TICK);
        }
        assert_eq!(cycle.phase(), SignalPhase::Green);
        assert_eq!(cycle.remaining(), 1.0);
    }

    #[test]
    fn test_cycle_phase_categories() {
        assert_eq!(SignalPhase::Green.category(), SignalCategory::Clear);
        assert_eq!(SignalPhase::Red.category(), SignalCategory::Occupied);
    }

    #[test]
    fn test_gate_closes_in_five_seconds_opens_in_one() {
        let mut gate = GateArm::new(5.0, 1.0);
        for _ in 0..25 {
            gate.advance(DEFAULT_TICK, SignalCategory::Approaching);
        }
        assert!((gate.angle() - 45.0).abs() < 1e-6);
        for _ in 0..26 {
            gate.advance(DEFAULT_TICK, SignalCategory::Occupied);
        }
        assert_eq!(gate.angle(), GATE_LOWERED);

        for _ in 0..5 {
            gate.advance(DEFAULT_TICK, SignalCategory::Clear);
        }
        assert!((gate.angle() - 45.0).abs() < 1e-6);
        for _ in 0..6 {
            gate.advance(DEFAULT_TICK, SignalCategory::Clear);
        }
        assert_eq!(gate.angle(), GATE_RAISED);
    }

    #[test]
    fn test_gate_unknown_holds() {
        let mut gate = GateArm::new(5.0, 1.0);
        gate.advance(Duration::from_secs(1), SignalCategory::Occupied);
        let held = gate.angle();
        gate.advance(Duration::from_secs(1), SignalCategory::Unknown);
        assert_eq!(gate.angle(), held);
    }

    proptest! {
        #[test]
        fn displayed_never_negative(start in 0.0f64..100.0, ticks in 0usize..2000, period_ms in 1u64..1000) {
            let animator = Animator::new(Duration::from_millis(period_ms));
            let mut state = state_with(start);
            for _ in 0..ticks {
                animator.advance(&mut state);
                prop_assert!(state.displayed_seconds >= 0.0);
            }
        }

        #[test]
        fn gate_stays_in_bounds(steps in prop::collection::vec(0u8..4, 0..200)) {
            let mut gate = GateArm::new(5.0, 1.0);
            for s in steps {
                let category = match s {
                    0 => SignalCategory::Clear,
                    1 => SignalCategory::Approaching,
                    2 => SignalCategory::Occupied,
                    _ => SignalCategory::Unknown,
                };
                gate.advance(Duration::from_millis(300), category);
                prop_assert!((GATE_LOWERED..=GATE_RAISED).contains(&gate.angle()));
            }
        }
    }
}
