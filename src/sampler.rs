//! Trigger-synchronized feedback sampler.
//!
//! One conversion per carrier trigger, on a single armed channel. The raw
//! reading is mapped onto the non-negative half of the Q1.15 per-unit domain
//! by a static shift calibration; the converter width is a calibration
//! constant, not part of the control algorithm.

use crate::carrier::Trigger;
use crate::fixpt::{Q15, FRAC_BITS};

/// Converter resolution in bits.
pub const RAW_BITS: u32 = 10;
/// Largest raw reading the converter can produce.
pub const RAW_MAX: u16 = (1 << RAW_BITS) - 1;

const CAL_SHIFT: u32 = FRAC_BITS - RAW_BITS;

/// Maps a raw reading onto the per-unit domain. Full scale lands just under
/// 1.0; the mapping is a fixed left shift, applied once per sample.
pub fn to_fixed(raw: u16) -> Q15 {
    Q15::from_bits((raw.min(RAW_MAX) << CAL_SHIFT) as i16)
}

/// Reference inverse of [`to_fixed`]. Negative per-unit values have no raw
/// counterpart and map to zero.
pub fn to_raw(value: Q15) -> u16 {
    (value.to_bits().max(0) as u16) >> CAL_SHIFT
}

/// One feedback reading. Lives for a single control cycle: it is consumed
/// by the controller update and never retained.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    raw: u16,
}

impl Sample {
    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn to_fixed(&self) -> Q15 {
        to_fixed(self.raw)
    }
}

/// The synchronized sampler.
///
/// Strictly event-driven: a conversion happens only in response to a carrier
/// [`Trigger`]. If a trigger arrives before the previous sample was consumed
/// the old sample is overwritten and the miss is counted; the loop carries on
/// with the newer value.
#[derive(Debug)]
pub struct Sampler {
    channel: Option<u8>,
    pending: Option<u16>,
    last_raw: u16,
    missed: u32,
}

impl Sampler {
    pub const fn new() -> Self {
        Self {
            channel: None,
            pending: None,
            last_raw: 0,
            missed: 0,
        }
    }

    /// Binds the sampler to one input channel. Until armed, triggers are
    /// ignored.
    pub fn arm(&mut self, channel: u8) {
        self.channel = Some(channel);
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// Records the conversion for one trigger. Overwrites (and counts) an
    /// unconsumed previous sample rather than blocking.
    pub fn acquire(&mut self, _trigger: &Trigger, raw: u16) {
        if self.channel.is_none() {
            return;
        }
        if self.pending.is_some() {
            self.missed = self.missed.saturating_add(1);
        }
        let raw = raw.min(RAW_MAX);
        self.pending = Some(raw);
        self.last_raw = raw;
    }

    /// Consumes the pending sample, if any.
    pub fn take(&mut self) -> Option<Sample> {
        self.pending.take().map(|raw| Sample { raw })
    }

    /// Most recent raw reading, for diagnostics.
    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    /// Number of samples overwritten before they were consumed.
    pub fn missed(&self) -> u32 {
        self.missed
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{Trigger, TriggerPhase};

    fn trigger() -> Trigger {
        Trigger::new(TriggerPhase::MidPeriod)
    }

    #[test]
    fn calibration_round_trips_within_one_lsb() {
        for raw in [0, 1, 511, 512, 1000, RAW_MAX] {
            assert_eq!(to_raw(to_fixed(raw)), raw);
        }

        let one_raw_lsb = 1.0 / f64::from(1u32 << RAW_BITS);
        for value in [0.0, 0.25, 0.5, 0.75, 0.999] {
            let q = Q15::from_num(value);
            let recovered = to_fixed(to_raw(q));
            assert!(recovered.abs_diff(q).to_num::<f64>() <= one_raw_lsb);
        }
    }

    #[test]
    fn full_scale_stays_below_unity() {
        let full = to_fixed(RAW_MAX);
        assert!(full < Q15::from_num(1.0 - 1.0 / 1024.0) + Q15::from_bits(1));
        assert!(full > Q15::from_num(0.99));
    }

    #[test]
    fn negative_values_have_no_raw_counterpart() {
        assert_eq!(to_raw(Q15::from_num(-0.5)), 0);
    }

    #[test]
    fn unarmed_sampler_ignores_triggers() {
        let mut sampler = Sampler::new();
        sampler.acquire(&trigger(), 100);
        assert!(sampler.take().is_none());
        assert_eq!(sampler.missed(), 0);
    }

    #[test]
    fn second_trigger_overwrites_and_counts() {
        let mut sampler = Sampler::new();
        sampler.arm(0);

        sampler.acquire(&trigger(), 100);
        sampler.acquire(&trigger(), 200);

        // The later sample wins, exactly one miss is recorded.
        let sample = sampler.take().unwrap();
        assert_eq!(sample.raw(), 200);
        assert_eq!(sampler.missed(), 1);

        // The sampler resumes cleanly on the next trigger.
        sampler.acquire(&trigger(), 300);
        assert_eq!(sampler.take().unwrap().raw(), 300);
        assert_eq!(sampler.missed(), 1);
    }

    #[test]
    fn take_consumes_the_sample() {
        let mut sampler = Sampler::new();
        sampler.arm(0);
        sampler.acquire(&trigger(), 42);
        assert!(sampler.take().is_some());
        assert!(sampler.take().is_none());
    }

    #[test]
    fn over_range_readings_clamp_to_full_scale() {
        let mut sampler = Sampler::new();
        sampler.arm(0);
        sampler.acquire(&trigger(), u16::MAX);
        assert_eq!(sampler.take().unwrap().raw(), RAW_MAX);
    }
}
