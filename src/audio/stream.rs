use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use rtrb::Consumer;

use super::{ClickMixer, ClickTone};
use crate::config::AudioSettings;

/// Scratch space for the f32 mix before conversion to the device format.
const SCRATCH_SAMPLES: usize = 8192;

/// An open output stream playing clicks. Dropping it closes the device.
pub struct AudioOutput {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Open the configured (or default) output device and start draining
    /// `clicks` into it.
    pub fn open(settings: &AudioSettings, clicks: Consumer<ClickTone>) -> Result<Self> {
        let host = cpal::default_host();
        let device = resolve_output_device(&host, settings.output_device.as_deref())?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();

        // Use the native config of the device
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        log::info!(
            "Output device: {} ({}Hz, {}ch, {:?})",
            device_name,
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let mixer = ClickMixer::new(clicks, config.sample_rate.0, settings.volume);
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &config, mixer)?,
            other => return Err(anyhow!("Unsupported sample format {:?}", other)),
        };
        stream.play()?;

        Ok(Self {
            _stream: stream,
            device_name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        log::debug!("Closing output device {}", self.device_name);
    }
}

fn resolve_output_device(host: &cpal::Host, name: Option<&str>) -> Result<Device> {
    let Some(name) = name else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"));
    };

    for device in host.output_devices()? {
        if let Ok(device_name) = device.name()
            && device_name == name
        {
            return Ok(device);
        }
    }
    Err(anyhow!("Output device '{}' not found", name))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, mut mixer: ClickMixer) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch = vec![0.0f32; SCRATCH_SAMPLES];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Only grows if the host hands us an unusually large buffer
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let mix = &mut scratch[..data.len()];
            mixer.render(mix, channels);
            for (out, &sample) in data.iter_mut().zip(mix.iter()) {
                *out = T::from_sample(sample);
            }
        },
        move |err| {
            log::warn!("Output stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}

/// Names of all output devices on the default host.
pub fn enumerate_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let mut outputs = Vec::new();
    for device in host.output_devices()? {
        outputs.push(device.name().unwrap_or_else(|_| "Unknown".to_string()));
    }
    Ok(outputs)
}
