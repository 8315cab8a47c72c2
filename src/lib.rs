//! A fixed-point PI regulation loop for PWM-driven power converters.
//!
//! One single-input single-output loop: a PWM [`carrier`](crate::carrier)
//! fires a per-period trigger, the [`sampler`](crate::sampler) converts one
//! feedback reading, and the [`pi`](crate::pi) engine produces the next duty
//! command, which the carrier latches at the following period boundary. The
//! [`dispatch`](crate::dispatch) module binds the pieces into the single
//! entry point a trigger interrupt would execute.
//!
//! All controller arithmetic is saturating Q1.15 with a Q2.30 integrator,
//! built on the [`fixed`] crate; see [`fixpt`](crate::fixpt) for the
//! rounding policy. Hardware bit-widths (converter resolution, carrier tick
//! range) are calibration constants, so the whole loop runs and tests on a
//! host.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod carrier;
pub mod dispatch;
pub mod fixpt;
pub mod pi;
pub mod sampler;
