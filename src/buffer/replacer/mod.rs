//! Replacement policy.
//!
//! - [`ClockReplacer`] - Second-chance clock over the frame table

mod clock;

pub(crate) use clock::ClockReplacer;
