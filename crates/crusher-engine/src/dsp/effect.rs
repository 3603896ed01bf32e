/// Channel counts seen by an effect.
///
/// Interleaved blocks are laid out with `output` samples per frame. Only the
/// first `input` channels of each frame carry signal; any channel beyond that
/// is silenced by effects that honor the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub input: u16,
    pub output: u16,
}

impl ChannelLayout {
    /// Same channel count on both sides.
    pub fn matched(channels: u16) -> Self {
        Self { input: channels, output: channels }
    }

    /// Samples per interleaved frame.
    pub fn stride(&self) -> usize {
        self.output as usize
    }
}

/// Real-time safe effect interface.
/// - process() must not allocate or lock on the hot path.
/// - `block` is interleaved f32 samples in [-1, 1], `layout.output` per frame.
pub trait Effect: Send {
    fn prepare(&mut self, _sr: u32, _layout: ChannelLayout) {}
    fn process(&mut self, block: &mut [f32]);
}
