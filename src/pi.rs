//! Fixed-point PI control law.
//!
//! The integrator is held in the double-width accumulator and clamped to the
//! output bounds *before* the proportional term is added. Clamping the
//! integrator rather than the combined output bounds integral drift
//! independently of transient proportional spikes, so a long saturated
//! excursion unwinds in one cycle once the error changes sign.

use crate::carrier::DutyCommand;
use crate::fixpt::{self, Q15, Q30};
use crate::sampler::Sample;

/// Initial gains, bounds and setpoint, all in Q1.15 per-unit.
#[derive(Debug, Clone)]
pub struct PiConfig {
    pub kp: Q15,
    pub ki: Q15,
    pub setpoint: Q15,
    pub output_min: Q15,
    pub output_max: Q15,
}

/// Engine lifecycle. Construction arms the engine; the first update puts it
/// in `Running`. There is no independent shutdown: the engine simply stops
/// being invoked when the carrier stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiState {
    Armed,
    Running,
}

/// The control law engine. Owns all controller state; mutation happens only
/// through [`PiController::update`] and the tuning setters.
#[derive(Debug)]
pub struct PiController {
    kp: Q15,
    ki: Q15,
    setpoint: Q15,
    output_min: Q15,
    output_max: Q15,
    integrator: Q30,
    saturated: bool,
    state: PiState,
}

impl PiController {
    pub fn new(config: PiConfig) -> Self {
        Self {
            kp: config.kp,
            ki: config.ki,
            setpoint: config.setpoint,
            output_min: config.output_min,
            output_max: config.output_max,
            integrator: Q30::ZERO,
            saturated: false,
            state: PiState::Armed,
        }
    }

    /// One control update, run exactly once per carrier trigger.
    ///
    /// Consumes the sample, advances the integrator, and produces the duty
    /// command for the next period, rescaled to `[0, max_duty]` ticks.
    /// Nothing in here can fail; every numeric rail saturates.
    pub fn update(&mut self, sample: Sample, max_duty: u16) -> DutyCommand {
        self.state = PiState::Running;

        let error = self.setpoint.saturating_sub(sample.to_fixed());

        // Accumulate error * Ki at full width, then apply the anti-windup
        // clamp before the proportional term is added.
        self.integrator = fixpt::mac(error, self.ki, self.integrator);
        let clamped = self.clamp_integrator();

        // Proportional term joins at accumulator width, unrounded.
        let raw = fixpt::mac(error, self.kp, self.integrator);
        let out = fixpt::saturate(raw);
        self.saturated = clamped || fixpt::out_of_range(raw) || out < Q15::ZERO;

        DutyCommand::from_ticks(rescale(out, max_duty))
    }

    fn clamp_integrator(&mut self) -> bool {
        let lo = fixpt::widen(self.output_min);
        let hi = fixpt::widen(self.output_max);
        if self.integrator > hi {
            self.integrator = hi;
            true
        } else if self.integrator < lo {
            self.integrator = lo;
            true
        } else {
            false
        }
    }

    /// Whether the last update clamped the integrator or the duty output.
    /// A designed protective behavior, surfaced for telemetry; never an
    /// error.
    pub fn saturation_engaged(&self) -> bool {
        self.saturated
    }

    pub fn state(&self) -> PiState {
        self.state
    }

    pub fn integrator(&self) -> Q30 {
        self.integrator
    }

    pub fn kp(&self) -> Q15 {
        self.kp
    }

    pub fn ki(&self) -> Q15 {
        self.ki
    }

    pub fn setpoint(&self) -> Q15 {
        self.setpoint
    }

    // Each tunable is a single 16-bit word, so a store from a lower-priority
    // context cannot tear against a concurrent update.

    pub fn set_kp(&mut self, kp: Q15) {
        self.kp = kp;
    }

    pub fn set_ki(&mut self, ki: Q15) {
        self.ki = ki;
    }

    pub fn set_setpoint(&mut self, setpoint: Q15) {
        self.setpoint = setpoint;
    }
}

/// Maps the non-negative part of the per-unit output onto duty ticks,
/// rounding to nearest. Negative commands have no meaning for a
/// single-quadrant duty register and map to zero.
fn rescale(out: Q15, max_duty: u16) -> u16 {
    let pos = out.to_bits().max(0) as u32;
    ((pos * u32::from(max_duty) + (1 << (fixpt::FRAC_BITS - 1))) >> fixpt::FRAC_BITS) as u16
}
