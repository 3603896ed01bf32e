//! Offline rendering of WAV files through the bitcrusher.

use crate::dsp::crusher::Bitcrusher;
use crate::dsp::effect::ChannelLayout;
use crate::dsp::params::{CrusherParams, ParamSnapshot};
use crate::error::{Error, Result};
use crate::graph::Chain;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub params: ParamSnapshot,
    /// Frames per processing call.
    pub block_size: usize,
    /// Widen the output to this many channels; the extra ones come out silent.
    pub output_channels: Option<u16>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { params: ParamSnapshot::default(), block_size: 512, output_channels: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub frames: u64,
    pub sample_rate: u32,
    pub input_channels: u16,
    pub output_channels: u16,
    pub peak_in: f32,
    pub peak_out: f32,
}

/// Read every sample of a WAV as interleaved f32 in [-1, 1].
pub fn read_samples<R: std::io::Read>(reader: WavReader<R>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().map(|s| s.map_err(Error::from)).collect(),
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale).map_err(Error::from))
                .collect()
        }
    }
}

/// Render `input` through the bitcrusher into a 32-bit float WAV at `output`.
pub fn render_file(input: &Path, output: &Path, cfg: &RenderConfig) -> Result<RenderReport> {
    if cfg.block_size == 0 {
        return Err(Error::ZeroBlockSize);
    }
    let reader = WavReader::open(input)?;
    let in_spec = reader.spec();
    let samples = read_samples(reader)?;

    let layout = ChannelLayout {
        input: in_spec.channels,
        output: cfg.output_channels.unwrap_or(in_spec.channels),
    };
    if layout.output < layout.input {
        return Err(Error::ChannelMismatch { input: layout.input, output: layout.output });
    }
    tracing::info!(
        input = %input.display(),
        sample_rate = in_spec.sample_rate,
        channels_in = layout.input,
        channels_out = layout.output,
        steps = cfg.params.steps,
        mix = cfg.params.mix,
        bypass = cfg.params.bypass,
        "rendering"
    );

    let params = Arc::new(CrusherParams::new(cfg.params));
    let mut chain = Chain::new(in_spec.sample_rate, layout);
    chain.push(Box::new(Bitcrusher::new(params)));

    let out_spec = WavSpec {
        channels: layout.output,
        sample_rate: in_spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output, out_spec)?;

    let in_stride = layout.input as usize;
    let out_stride = layout.stride();
    let mut block = vec![0.0f32; cfg.block_size * out_stride];
    let mut frames = 0u64;
    let mut peak_in = 0.0f32;
    let mut peak_out = 0.0f32;

    for chunk in samples.chunks(cfg.block_size * in_stride) {
        let n = chunk.len() / in_stride;
        let block = &mut block[..n * out_stride];
        for (dst, src) in block.chunks_mut(out_stride).zip(chunk.chunks(in_stride)) {
            dst[..in_stride].copy_from_slice(src);
            dst[in_stride..].fill(0.0);
            peak_in = src.iter().fold(peak_in, |m, s| m.max(s.abs()));
        }
        chain.process(block);
        for &s in block.iter() {
            peak_out = peak_out.max(s.abs());
            writer.write_sample(s)?;
        }
        frames += n as u64;
    }
    writer.finalize()?;

    let report = RenderReport {
        frames,
        sample_rate: in_spec.sample_rate,
        input_channels: layout.input,
        output_channels: layout.output,
        peak_in,
        peak_out,
    };
    tracing::info!(frames, peak_in, peak_out, output = %output.display(), "render done");
    Ok(report)
}
