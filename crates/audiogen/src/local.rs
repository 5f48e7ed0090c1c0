//! Local inference: an in-process model behind hub-authenticated setup.

use crate::error::{Error, Result};
use crate::hub::HubClient;
use crate::persist;
use crate::request::GenerationRequest;
use std::f32::consts::PI;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Interleaved `f32` samples in `[-1, 1]`, plus their layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(Error::Local(format!(
                "invalid layout: {channels} channels at {sample_rate} Hz"
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::Local(format!(
                "{} samples do not divide into {channels} channels",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }
}

/// An in-process generator. Runs synchronously on the calling thread.
pub trait LocalModel: Send + Sync {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    fn generate(&self, request: &GenerationRequest) -> Result<Waveform>;
}

/// Sine-tone engine. Descriptions mentioning "pad" get a slow decay.
#[derive(Debug, Clone)]
pub struct ToneModel {
    sample_rate: u32,
    frequency: f32,
    channels: u16,
}

impl ToneModel {
    pub const DEFAULT_FREQUENCY: f32 = 440.0;

    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frequency: Self::DEFAULT_FREQUENCY,
            channels: 1,
        }
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Duplicate the tone across `channels` (1 or 2).
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }
}

impl LocalModel for ToneModel {
    fn name(&self) -> &str {
        "tone"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn generate(&self, request: &GenerationRequest) -> Result<Waveform> {
        if !(1..=2).contains(&self.channels) {
            return Err(Error::Local(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }

        let frames = request.duration() as usize * self.sample_rate as usize;
        let pad = request.description().to_lowercase().contains("pad");
        let rate = self.sample_rate as f32;

        let mut samples = Vec::with_capacity(frames * self.channels as usize);
        for i in 0..frames {
            let t = i as f32 / rate;
            let mut value = (2.0 * PI * self.frequency * t).sin();
            if pad {
                value *= (-0.5 * t).exp();
            }
            for _ in 0..self.channels {
                samples.push(value);
            }
        }

        let mut waveform = Waveform::new(samples, self.channels, self.sample_rate)?;
        normalize(&mut waveform.samples);
        Ok(waveform)
    }
}

fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// Encode `waveform` as 16-bit PCM WAV at `path`, atomically.
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<()> {
    let spec = hound::WavSpec {
        channels: waveform.channels(),
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let peak = waveform.peak();
    let gain = if peak > 0.0 { 1.0 / peak } else { 1.0 };

    let mut tmp = persist::staging_file(path)?;
    {
        let mut writer = hound::WavWriter::new(BufWriter::new(tmp.as_file_mut()), spec)?;
        for &sample in waveform.samples() {
            let scaled = (sample * gain).clamp(-1.0, 1.0) * i16::MAX as f32;
            writer.write_sample(scaled as i16)?;
        }
        writer.finalize()?;
    }
    persist::commit(tmp, path)
}

/// A local engine that has passed hub setup.
pub struct LocalRuntime {
    model: Box<dyn LocalModel>,
    user: String,
}

impl std::fmt::Debug for LocalRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRuntime")
            .field("model", &self.model.name())
            .field("user", &self.user)
            .finish()
    }
}

impl LocalRuntime {
    /// Authenticate with the hub and confirm access to `model_id` before the
    /// engine accepts requests. Any failure leaves no runtime behind.
    #[tracing::instrument(name = "local.setup", skip(hub, model), fields(engine = model.name()))]
    pub async fn setup(
        hub: &HubClient,
        model_id: &str,
        config_file: &str,
        model: Box<dyn LocalModel>,
    ) -> Result<Self> {
        let user = hub
            .whoami()
            .await
            .map_err(|e| Error::Setup(format!("hub authentication failed: {e}")))?;
        tracing::info!(user = %user.name, token_source = hub.token().source(), "Authenticated with hub");

        match hub.check_file_access(model_id, config_file).await {
            Ok(()) => {}
            Err(e @ Error::GatedModel { .. }) => return Err(e),
            Err(e) => {
                return Err(Error::Setup(format!(
                    "cannot access {model_id}/{config_file}: {e}"
                )))
            }
        }
        tracing::info!(model_id, "Gated model access confirmed");

        Ok(Self {
            model,
            user: user.name,
        })
    }

    /// Hub account the runtime was set up with.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    #[tracing::instrument(name = "local.generate", skip(self, request), fields(duration = request.duration()))]
    pub fn generate(&self, request: &GenerationRequest) -> Result<Waveform> {
        let waveform = self.model.generate(request)?;
        if waveform.frames() == 0 {
            return Err(Error::Local("model produced no audio".into()));
        }
        Ok(waveform)
    }

    /// Generate and write a WAV file at `path`.
    pub fn generate_to(&self, request: &GenerationRequest, path: &Path) -> Result<PathBuf> {
        let waveform = self.generate(request)?;
        write_wav(path, &waveform)?;
        tracing::info!(
            path = %path.display(),
            seconds = waveform.duration_secs(),
            "Wrote local audio"
        );
        Ok(path.to_path_buf())
    }
}
