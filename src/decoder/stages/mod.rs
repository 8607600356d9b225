//! L2: the DSP stage catalog.
//!
//! Every stage here treats samples as `(sample - silence_level)` signed
//! values for its math, clips to the type's range on write, and re-applies
//! the offset. That convention applies uniformly across all per-sample DSP.

pub mod distortion;
pub mod fade;
pub mod fade_on_stop;
pub mod joint_stereo;
pub mod moving_average;
pub mod resolution;
pub mod reverb;

#[cfg(test)]
pub(crate) mod test_support;
