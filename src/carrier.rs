//! PWM carrier generator with an update-on-rollover duty latch.
//!
//! The carrier is configured once, started, and then free-runs. A new duty
//! command is buffered and applied atomically at the next period boundary,
//! so a value written mid-period can never partially apply. Once per period
//! the carrier emits a [`Trigger`]: at the centre of the period in
//! centre-aligned mode (the least-ripple sampling instant) or at the period
//! start in edge-aligned mode.

use core::fmt;

/// Shortest supported carrier period, in time-base ticks.
pub const PERIOD_MIN_TICKS: u16 = 16;
/// Longest supported carrier period. Centre-aligned duty spans twice the
/// period, so this keeps the full duty range inside 16 bits.
pub const PERIOD_MAX_TICKS: u16 = 0x7fff;

/// Carrier alignment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierMode {
    /// Free-running counter; pulse starts at the period boundary.
    EdgeAligned,
    /// Up-down counter; pulse is centred within the period.
    CenterAligned,
}

/// Output polarity of the PWM pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

/// Static carrier parameters. Immutable while the carrier is running;
/// reconfiguration requires an explicit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierConfig {
    /// Period length in time-base ticks.
    pub period_ticks: u16,
    pub mode: CarrierMode,
    /// Gap between complementary switch transitions, in ticks.
    pub dead_time_ticks: u16,
    pub polarity: Polarity,
}

/// Rejected carrier parameters. Start-up only; nothing at runtime
/// produces these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `period_ticks` resolves to a frequency outside the supported range.
    UnsupportedPeriod,
    /// `dead_time_ticks` exceeds half the period.
    DeadTimeTooLong,
    /// The carrier must be stopped before it can be reconfigured.
    CarrierRunning,
}

impl core::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedPeriod => write!(f, "carrier period outside supported range"),
            Self::DeadTimeTooLong => write!(f, "dead time exceeds half the carrier period"),
            Self::CarrierRunning => write!(f, "carrier must be stopped before reconfiguration"),
        }
    }
}

/// Phase point within the period at which the trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    PeriodStart,
    MidPeriod,
}

/// One per-period sampling event emitted by the carrier. The sampler is
/// strictly driven by these; it never self-triggers.
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    phase: TriggerPhase,
}

impl Trigger {
    pub(crate) fn new(phase: TriggerPhase) -> Self {
        Self { phase }
    }

    pub fn phase(&self) -> TriggerPhase {
        self.phase
    }
}

/// Duty command in time-base ticks, produced once per control cycle and
/// consumed atomically at the next carrier rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCommand(u16);

impl DutyCommand {
    pub const fn from_ticks(ticks: u16) -> Self {
        Self(ticks)
    }

    pub const fn ticks(&self) -> u16 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Configuring,
    Running,
}

/// The waveform generator.
///
/// Time is advanced by the caller: each [`Carrier::rollover`] call models one
/// full carrier period, latching the pending duty value and emitting the
/// period's trigger.
#[derive(Debug)]
pub struct Carrier {
    state: State,
    config: Option<CarrierConfig>,
    pending: u16,
    applied: u16,
}

impl Carrier {
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            config: None,
            pending: 0,
            applied: 0,
        }
    }

    /// Validates and installs a carrier configuration. The output stays
    /// disabled until [`Carrier::start`].
    pub fn configure(&mut self, config: CarrierConfig) -> Result<(), ConfigError> {
        if self.state == State::Running {
            return Err(ConfigError::CarrierRunning);
        }
        if config.period_ticks < PERIOD_MIN_TICKS || config.period_ticks > PERIOD_MAX_TICKS {
            return Err(ConfigError::UnsupportedPeriod);
        }
        if config.dead_time_ticks > config.period_ticks / 2 {
            return Err(ConfigError::DeadTimeTooLong);
        }

        self.config = Some(config);
        self.pending = 0;
        self.applied = 0;
        self.state = State::Configuring;
        Ok(())
    }

    /// Starts the carrier. From here the trigger fires autonomously once per
    /// period. No-op when already running or never configured.
    pub fn start(&mut self) {
        if self.config.is_some() {
            self.state = State::Running;
        }
    }

    /// Stops the carrier. The installed configuration is kept, so the
    /// carrier can be restarted or reconfigured.
    pub fn stop(&mut self) {
        if self.state == State::Running {
            self.state = State::Idle;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Buffers a duty command for application at the next period boundary.
    /// The running cycle keeps its current duty; the value never tears.
    pub fn set_duty(&mut self, duty: DutyCommand) {
        self.pending = duty.ticks();
    }

    /// Advances one full carrier period: latches the pending duty command
    /// and emits this period's trigger. Returns `None` unless running.
    pub fn rollover(&mut self) -> Option<Trigger> {
        if self.state != State::Running {
            return None;
        }
        self.applied = self.pending.min(self.max_duty());

        let config = self.config.as_ref()?;
        let phase = match config.mode {
            CarrierMode::EdgeAligned => TriggerPhase::PeriodStart,
            CarrierMode::CenterAligned => TriggerPhase::MidPeriod,
        };
        Some(Trigger::new(phase))
    }

    /// Full-scale duty range: `2 * period_ticks` in centre-aligned mode
    /// (the duty register counts both slopes), `period_ticks` otherwise.
    /// Zero while unconfigured.
    pub fn max_duty(&self) -> u16 {
        match &self.config {
            Some(config) => match config.mode {
                CarrierMode::EdgeAligned => config.period_ticks,
                CarrierMode::CenterAligned => config.period_ticks * 2,
            },
            None => 0,
        }
    }

    /// Duty value currently driving the output, for diagnostics.
    pub fn duty(&self) -> u16 {
        self.applied
    }

    pub fn config(&self) -> Option<&CarrierConfig> {
        self.config.as_ref()
    }
}

impl Default for Carrier {
    fn default() -> Self {
        Self::new()
    }
}
