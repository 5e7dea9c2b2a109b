//! cpal output device driving the software mixer

use std::sync::Arc;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use keysynth::{
    io::{AudioSink, Mixer, PlaybackHandle, SinkSource},
    Result, MAX_BLOCK_SIZE,
};

/// Mixer shared between the scheduler and the audio callback.
#[derive(Clone)]
pub struct SharedMixer(Arc<Mutex<Mixer>>);

impl SharedMixer {
    pub fn new(sample_rate: f32, block_len: usize, sample_width: u8) -> Self {
        Self(Arc::new(Mutex::new(Mixer::new(
            sample_rate,
            block_len,
            sample_width,
        ))))
    }
}

impl AudioSink for SharedMixer {
    fn play(&mut self, source: SinkSource, delay: f32) -> Result<PlaybackHandle> {
        self.0.lock().play(source, delay)
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        self.0.lock().stop(handle)
    }

    fn is_playing(&self, handle: PlaybackHandle) -> bool {
        self.0.lock().is_playing(handle)
    }

    fn close(&mut self) {
        self.0.lock().close()
    }
}

pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    pub fn open() -> EyreResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    /// Start pulling from `mixer`. Audio stops when the stream is dropped.
    pub fn start(&self, mixer: SharedMixer) -> EyreResult<cpal::Stream> {
        let channels = self.config.channels() as usize;
        let mut pcm = vec![0i32; MAX_BLOCK_SIZE];

        let stream = self.device.build_output_stream(
            &self.config.clone().into(),
            move |data: &mut [f32], _| {
                let mut mixer = mixer.0.lock();
                let scale = mixer.full_scale();
                let total_frames = data.len() / channels;
                let mut frames_written = 0;

                while frames_written < total_frames {
                    let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let block = &mut pcm[..frames];
                    mixer.mix_block(block);

                    // Copy to output (mono to all channels)
                    let out_off = frames_written * channels;
                    for (i, &s) in block.iter().enumerate() {
                        let sample = s as f32 / scale;
                        for ch in 0..channels {
                            data[out_off + i * channels + ch] = sample;
                        }
                    }

                    frames_written += frames;
                }
            },
            |err| tracing::error!(%err, "audio stream error"),
            None,
        )?;

        stream.play()?;
        Ok(stream)
    }
}
