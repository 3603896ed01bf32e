pub mod devices;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod render;
mod ring;

pub use dsp::crusher::{crush, crush_sample, process_channels, Bitcrusher};
pub use dsp::effect::{ChannelLayout, Effect};
pub use dsp::params::{Assignment, CrusherParams, ParamId, ParamSnapshot};
pub use error::{Error, Result};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use graph::Chain;
use parking_lot::Mutex;
use ring::{next_pow2, FrameRing};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub input_name: Option<String>,       // match by substring (case-insensitive)
    pub output_name: Option<String>,
    pub input_index: Option<usize>,       // explicit index from device list
    pub output_index: Option<usize>,
    pub sample_rate: Option<u32>,         // e.g., 48000
    pub block_size: Option<u32>,          // frames per buffer (if backend supports)
    pub params: ParamSnapshot,            // initial crusher settings
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_name: None,
            output_name: None,
            input_index: None,
            output_index: None,
            sample_rate: None,
            block_size: None,
            params: ParamSnapshot::default(),
        }
    }
}

/// Health of the running streams, written from the callbacks and read from
/// the control side.
#[derive(Debug, Default)]
pub struct StreamStatus {
    last_error: Mutex<Option<String>>,
    underruns: AtomicU64,
    overruns: AtomicU64,
}

impl StreamStatus {
    fn record_error(&self, direction: &str, err: &cpal::StreamError) {
        tracing::error!(direction, %err, "stream error");
        *self.last_error.lock() = Some(format!("{direction}: {err}"));
    }

    /// Most recent stream error, cleared on read.
    pub fn take_error(&self) -> Option<String> {
        self.last_error.lock().take()
    }

    /// Output callbacks that found the ring short and padded with silence.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Input blocks that did not fully fit in the ring.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

pub struct Engine {
    input_stream: Option<cpal::Stream>,
    output_stream: Option<cpal::Stream>,
    cfg: EngineConfig,
    params: Arc<CrusherParams>,
    status: Arc<StreamStatus>,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Self {
        let params = Arc::new(CrusherParams::new(cfg.params));
        Self {
            input_stream: None,
            output_stream: None,
            cfg,
            params,
            status: Arc::new(StreamStatus::default()),
        }
    }

    /// Live controls; safe to change from any thread while running.
    pub fn params(&self) -> Arc<CrusherParams> {
        self.params.clone()
    }

    pub fn status(&self) -> Arc<StreamStatus> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.input_stream.is_some() && self.output_stream.is_some()
    }

    /// Start the bitcrusher on input -> output.
    pub fn start(&mut self) -> Result<()> {
        let host = cpal::default_host();

        let in_dev  = pick_device(&host, true,  self.cfg.input_name.as_deref(), self.cfg.input_index)?
            .ok_or(Error::NoDevice("input"))?;
        let out_dev = pick_device(&host, false, self.cfg.output_name.as_deref(), self.cfg.output_index)?
            .ok_or(Error::NoDevice("output"))?;

        let in_cfg_any  = in_dev.default_input_config()?;
        let out_cfg_any = out_dev.default_output_config()?;

        let mut in_cfg  = in_cfg_any.config();
        let mut out_cfg = out_cfg_any.config();

        // Honor sample_rate/block_size if provided (best-effort)
        if let Some(sr) = self.cfg.sample_rate {
            in_cfg.sample_rate  = cpal::SampleRate(sr);
            out_cfg.sample_rate = cpal::SampleRate(sr);
        }
        if let Some(bs) = self.cfg.block_size {
            if bs == 0 { return Err(Error::ZeroBlockSize); }
            out_cfg.buffer_size = cpal::BufferSize::Fixed(bs);
            in_cfg.buffer_size  = cpal::BufferSize::Fixed(bs);
        }

        // Align channels/SR
        in_cfg.channels    = out_cfg.channels;
        in_cfg.sample_rate = out_cfg.sample_rate;

        let channels = out_cfg.channels as usize;
        let sr = out_cfg.sample_rate.0;

        // Ring holds >= 8 negotiated buffers; host-chosen sizes get 4096 frames
        let ring_frames = match out_cfg.buffer_size {
            cpal::BufferSize::Fixed(n) => next_pow2(n as usize * 8).max(1024),
            _ => 4096,
        };

        tracing::info!(
            input = %in_dev.name().unwrap_or_default(),
            output = %out_dev.name().unwrap_or_default(),
            sample_rate = sr,
            channels,
            ring_frames,
            "starting engine"
        );

        let ring = Arc::new(FrameRing::new(ring_frames, channels));
        let ring_tx = ring.clone();
        let ring_rx = ring.clone();

        let mut chain = Chain::new(sr, ChannelLayout::matched(out_cfg.channels));
        chain.push(Box::new(Bitcrusher::new(self.params.clone())));

        // Scratch buffers reused in the callbacks (avoid allocs)
        let mut scratch = Vec::<f32>::with_capacity(ring_frames * channels);
        let mut out_tmp = Vec::<f32>::with_capacity(ring_frames * channels);

        let status_in = self.status.clone();
        let status_out = self.status.clone();
        let err_in = self.status.clone();
        let err_out = self.status.clone();

        /* --------- INPUT (format-specific) --------- */
        let input_stream = match in_cfg_any.sample_format() {
            cpal::SampleFormat::F32 => {
                in_dev.build_input_stream::<f32, _, _>(
                    &in_cfg,
                    {
                        let mut chain = chain;
                        let ring = ring_tx;
                        move |data: &[f32], _| {
                            scratch.clear();
                            scratch.extend_from_slice(data);
                            chain.process(&mut scratch);
                            if ring.push(&scratch) * channels < scratch.len() {
                                status_in.overruns.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    },
                    move |err| err_in.record_error("input", &err),
                    None,
                )?
            }
            cpal::SampleFormat::I16 => {
                in_dev.build_input_stream::<i16, _, _>(
                    &in_cfg,
                    {
                        let mut chain = chain;
                        let ring = ring_tx;
                        move |data: &[i16], _| {
                            scratch.clear();
                            scratch.extend(data.iter().map(|&s| s as f32 / 32768.0));
                            chain.process(&mut scratch);
                            if ring.push(&scratch) * channels < scratch.len() {
                                status_in.overruns.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    },
                    move |err| err_in.record_error("input", &err),
                    None,
                )?
            }
            cpal::SampleFormat::U16 => {
                in_dev.build_input_stream::<u16, _, _>(
                    &in_cfg,
                    {
                        let mut chain = chain;
                        let ring = ring_tx;
                        move |data: &[u16], _| {
                            scratch.clear();
                            scratch.extend(data.iter().map(|&s| ((s as f32 / 65535.0) * 2.0) - 1.0));
                            chain.process(&mut scratch);
                            if ring.push(&scratch) * channels < scratch.len() {
                                status_in.overruns.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    },
                    move |err| err_in.record_error("input", &err),
                    None,
                )?
            }
            other => {
                return Err(Error::UnsupportedFormat { direction: "input", format: format!("{other:?}") })
            }
        };

        /* --------- OUTPUT (format-specific) -------- */
        let output_stream = match out_cfg_any.sample_format() {
            cpal::SampleFormat::F32 => {
                out_dev.build_output_stream::<f32, _, _>(
                    &out_cfg,
                    move |out: &mut [f32], _| {
                        if ring_rx.pop(out) * channels < out.len() {
                            status_out.underruns.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    move |err| err_out.record_error("output", &err),
                    None,
                )?
            }
            cpal::SampleFormat::I16 => {
                out_dev.build_output_stream::<i16, _, _>(
                    &out_cfg,
                    move |out: &mut [i16], _| {
                        out_tmp.resize(out.len(), 0.0);
                        if ring_rx.pop(&mut out_tmp) * channels < out.len() {
                            status_out.underruns.fetch_add(1, Ordering::Relaxed);
                        }
                        for (o, &v) in out.iter_mut().zip(out_tmp.iter()) {
                            *o = (v.clamp(-1.0, 1.0) * 32767.0) as i16;
                        }
                    },
                    move |err| err_out.record_error("output", &err),
                    None,
                )?
            }
            cpal::SampleFormat::U16 => {
                out_dev.build_output_stream::<u16, _, _>(
                    &out_cfg,
                    move |out: &mut [u16], _| {
                        out_tmp.resize(out.len(), 0.0);
                        if ring_rx.pop(&mut out_tmp) * channels < out.len() {
                            status_out.underruns.fetch_add(1, Ordering::Relaxed);
                        }
                        for (o, &v) in out.iter_mut().zip(out_tmp.iter()) {
                            *o = (((v.clamp(-1.0, 1.0) + 1.0) * 0.5) * 65535.0) as u16;
                        }
                    },
                    move |err| err_out.record_error("output", &err),
                    None,
                )?
            }
            other => {
                return Err(Error::UnsupportedFormat { direction: "output", format: format!("{other:?}") })
            }
        };

        input_stream.play()?;
        output_stream.play()?;

        self.input_stream  = Some(input_stream);
        self.output_stream = Some(output_stream);
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.is_running() {
            tracing::info!(
                underruns = self.status.underruns(),
                overruns = self.status.overruns(),
                "stopping engine"
            );
        }
        self.input_stream  = None;
        self.output_stream = None;
    }
}

/* ---------- device picking (by name or index) ---------- */

fn pick_device(
    host: &cpal::Host,
    want_input: bool,
    name_substr: Option<&str>,
    index: Option<usize>,
) -> Result<Option<cpal::Device>> {
    let capable = |dev: &cpal::Device| {
        if want_input {
            dev.supported_input_configs().is_ok()
        } else {
            dev.supported_output_configs().is_ok()
        }
    };

    // Try explicit index first
    if let Some(idx) = index {
        if let Some(dev) = host.devices()?.filter(|d| capable(d)).nth(idx) {
            return Ok(Some(dev));
        }
        tracing::warn!(index = idx, "device index not found, falling back");
    }

    // Then try substring match
    if let Some(q) = name_substr {
        let qn = q.to_lowercase();
        for dev in host.devices()? {
            let name = dev.name().unwrap_or_default();
            if name.to_lowercase().contains(&qn) && capable(&dev) {
                return Ok(Some(dev));
            }
        }
        tracing::warn!(query = q, "no device name matched, falling back to default");
    }

    // Fallback to default
    Ok(if want_input { host.default_input_device() } else { host.default_output_device() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_engine_seeds_params_from_config() {
        let cfg = EngineConfig {
            params: ParamSnapshot { steps: 4, mix: 0.8, bypass: true },
            ..EngineConfig::default()
        };
        let engine = Engine::new(cfg);
        assert!(!engine.is_running());
        assert_eq!(engine.params().snapshot(), ParamSnapshot { steps: 4, mix: 0.8, bypass: true });
    }

    #[test]
    fn params_handle_is_shared() {
        let engine = Engine::new(EngineConfig::default());
        let handle = engine.params();
        handle.set_steps(3);
        assert_eq!(engine.params().snapshot().steps, 3);
    }

    #[test]
    fn status_starts_clean() {
        let status = StreamStatus::default();
        assert_eq!(status.underruns(), 0);
        assert_eq!(status.overruns(), 0);
        assert!(status.take_error().is_none());
    }
}
