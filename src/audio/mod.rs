//! Audio decoding, conditioning, and loudness measurement.

pub mod decode;
pub mod level;
pub mod resample;
pub mod wav;
