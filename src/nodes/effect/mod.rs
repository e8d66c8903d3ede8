//! Effect nodes (audio in, audio out)

mod biquad;
mod gain;
mod mix;
mod panner;

pub use biquad::{BiquadFilter, BiquadMessage, FilterType};
pub use gain::{Gain, GainMessage};
pub use mix::sum_inputs;
pub use panner::{
    azimuth_elevation, distance_gain, equal_power_gains, DistanceModel, Panner, PannerMessage, PanningModel,
};
