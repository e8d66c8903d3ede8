//! CPAL device discovery and engine creation.
//!
//! This module provides [`CpalDevice`] for discovering and selecting audio output devices.
//!
//! # Example: List and Select a Device
//!
//! ```no_run
//! # #[cfg(feature = "cpal_sink")] {
//! use rauschen::CpalDevice;
//!
//! // List all available output devices
//! let devices = CpalDevice::list_outputs();
//! for (i, device) in devices.iter().enumerate() {
//!     println!("[{}] {} ({} Hz, {} ch)",
//!         i, device.name(), device.sample_rate(), device.channels());
//! }
//!
//! // Open an engine on a specific device
//! if let Some(device) = devices.first() {
//!     let mut engine = device.open_engine();
//!     engine.resume();
//! }
//! # }
//! ```

use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "cpal_sink")]
use cpal::traits::{DeviceTrait, HostTrait};
#[cfg(feature = "cpal_sink")]
use tracing::{debug, info, warn};

/// A discovered audio output device.
///
/// Use [`CpalDevice::default_output`] to get the system default, or
/// [`CpalDevice::list_outputs`] to enumerate all available devices.
/// Without the `cpal_sink` feature both return nothing.
pub struct CpalDevice {
    #[cfg(feature = "cpal_sink")]
    device: cpal::Device,
    #[cfg(feature = "cpal_sink")]
    config: cpal::SupportedStreamConfig,

    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    #[cfg(feature = "cpal_sink")]
    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = match device.default_output_config() {
            Ok(config) => config,
            Err(err) => {
                debug!(%err, "skipping device without an output config");
                return None;
            }
        };
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    /// Get the system's default output device.
    ///
    /// Returns `None` if no audio device is available.
    #[cfg(feature = "cpal_sink")]
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => {
                warn!(host = ?host.id(), "no default output device");
                return None;
            }
        };
        Self::from_device(device)
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn default_output() -> Option<Self> {
        None
    }

    /// List all available audio output devices.
    ///
    /// Returns an empty list if no devices are found or if enumeration fails.
    #[cfg(feature = "cpal_sink")]
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(Self::from_device).collect(),
            Err(err) => {
                warn!(%err, "failed to enumerate output devices");
                Vec::new()
            }
        }
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn list_outputs() -> Vec<Self> {
        Vec::new()
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device's sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Create a sink node that outputs audio to this device.
    #[cfg(feature = "cpal_sink")]
    pub fn create_sink(&self) -> crate::nodes::CpalSink {
        crate::nodes::CpalSink::new(&self.device, &self.config)
    }

    /// Create a suspended [`AudioEngine`](crate::AudioEngine) rendering to this device.
    #[cfg(feature = "cpal_sink")]
    pub fn open_engine(&self) -> crate::AudioEngine {
        info!(device = %self.name, sample_rate = self.sample_rate, channels = self.channels, "opening output device");
        crate::AudioEngine::new(self.sample_rate)
            .with_channels(self.channels as usize)
            .with_output(self.create_sink())
    }
}
