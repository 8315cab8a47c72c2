//! The per-cycle dispatcher.
//!
//! [`ControlLoop`] is the single subscriber to the carrier's trigger: each
//! cycle it runs sample -> compute -> latch, strictly in that order, to
//! completion, with no allocation and no waiting. Re-entry is impossible by
//! construction because the next trigger cannot exist before `run_cycle`
//! returns. On a target this body is what the trigger interrupt executes, at
//! a priority above any housekeeping work; the binding itself is platform
//! glue and lives outside this crate.

use crate::carrier::{Carrier, CarrierConfig, ConfigError, DutyCommand};
use crate::pi::{PiConfig, PiController};
use crate::sampler::Sampler;

/// Read-only telemetry snapshot for a lower-priority observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Duty value currently driving the output, in ticks.
    pub duty_ticks: u16,
    /// Most recent raw feedback reading.
    pub raw_sample: u16,
    /// Triggers that arrived before the previous sample was consumed.
    pub missed_samples: u32,
    /// Whether the last update engaged a clamp (integrator or duty).
    pub saturation_engaged: bool,
}

/// One complete regulation loop: carrier, sampler and PI engine under a
/// single owner, driven through one entry point.
#[derive(Debug)]
pub struct ControlLoop {
    carrier: Carrier,
    sampler: Sampler,
    controller: PiController,
}

impl ControlLoop {
    /// Builds the loop from its start-up configuration. Carrier parameters
    /// are validated here; nothing later can fail.
    pub fn new(
        carrier_config: CarrierConfig,
        pi_config: PiConfig,
        channel: u8,
    ) -> Result<Self, ConfigError> {
        let mut carrier = Carrier::new();
        carrier.configure(carrier_config)?;

        let mut sampler = Sampler::new();
        sampler.arm(channel);

        Ok(Self {
            carrier,
            sampler,
            controller: PiController::new(pi_config),
        })
    }

    /// Starts the carrier; from here the loop is live.
    pub fn start(&mut self) {
        self.carrier.start();
    }

    /// Stops the carrier. The engine keeps its state and simply stops being
    /// invoked.
    pub fn stop(&mut self) {
        self.carrier.stop();
    }

    /// Runs one control cycle: carrier rollover fires the trigger, the
    /// sampler converts `raw_feedback`, the engine computes the next duty
    /// command, and the command is handed to the carrier's latch. Returns
    /// the command, or `None` when the carrier is stopped.
    pub fn run_cycle(&mut self, raw_feedback: u16) -> Option<DutyCommand> {
        let trigger = self.carrier.rollover()?;
        self.sampler.acquire(&trigger, raw_feedback);
        let sample = self.sampler.take()?;

        let duty = self.controller.update(sample, self.carrier.max_duty());
        self.carrier.set_duty(duty);
        Some(duty)
    }

    pub fn snapshot(&self) -> Diagnostics {
        Diagnostics {
            duty_ticks: self.carrier.duty(),
            raw_sample: self.sampler.last_raw(),
            missed_samples: self.sampler.missed(),
            saturation_engaged: self.controller.saturation_engaged(),
        }
    }

    pub fn carrier(&self) -> &Carrier {
        &self.carrier
    }

    pub fn controller(&self) -> &PiController {
        &self.controller
    }

    /// Tuning access for the lower-priority foreground context.
    pub fn controller_mut(&mut self) -> &mut PiController {
        &mut self.controller
    }
}
