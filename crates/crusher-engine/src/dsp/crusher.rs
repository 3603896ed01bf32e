use super::effect::{ChannelLayout, Effect};
use super::params::{CrusherParams, ParamSnapshot};
use std::sync::Arc;

/// Quantize `s` onto a `1/steps` staircase, rounding away from zero.
///
/// `steps` must be >= 1. Zero (of either sign) passes through.
#[inline]
pub fn crush(s: f32, steps: f32) -> f32 {
    if s > 0.0 {
        (s * steps).ceil() / steps
    } else if s < 0.0 {
        (s * steps).floor() / steps
    } else {
        s
    }
}

/// Crush one sample and blend it with the dry input.
#[inline]
pub fn crush_sample(s: f32, p: &ParamSnapshot) -> f32 {
    if p.bypass {
        return s;
    }
    debug_assert!(p.steps >= 1);
    crush(s, p.steps as f32) * p.mix + s * (1.0 - p.mix)
}

/// Process a channel-major block in place.
///
/// Bypass leaves the whole block untouched. Otherwise channels below
/// `input_channels` are crushed and channels at or above it are silenced.
pub fn process_channels<C: AsMut<[f32]>>(
    channels: &mut [C],
    input_channels: usize,
    p: &ParamSnapshot,
) {
    if p.bypass {
        return;
    }
    for (c, ch) in channels.iter_mut().enumerate() {
        let ch = ch.as_mut();
        if c >= input_channels {
            ch.fill(0.0);
        } else {
            for s in ch.iter_mut() {
                *s = crush_sample(*s, p);
            }
        }
    }
}

/// Bitcrusher reading its controls from a shared [`CrusherParams`].
pub struct Bitcrusher {
    params: Arc<CrusherParams>,
    layout: ChannelLayout,
}

impl Bitcrusher {
    pub fn new(params: Arc<CrusherParams>) -> Self {
        Self { params, layout: ChannelLayout::matched(2) }
    }
}

impl Effect for Bitcrusher {
    fn prepare(&mut self, _sr: u32, layout: ChannelLayout) {
        self.layout = layout;
    }

    fn process(&mut self, block: &mut [f32]) {
        let p = self.params.snapshot();
        let stride = self.layout.stride();
        if p.bypass || stride == 0 {
            return;
        }
        let inputs = self.layout.input as usize;
        for frame in block.chunks_mut(stride) {
            for (c, s) in frame.iter_mut().enumerate() {
                *s = if c >= inputs { 0.0 } else { crush_sample(*s, &p) };
            }
        }
    }
}
