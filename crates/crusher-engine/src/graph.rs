use crate::dsp::effect::{ChannelLayout, Effect};

/// A serial chain of effects. Owns the effects.
pub struct Chain {
    effects: Vec<Box<dyn Effect>>,
    layout: ChannelLayout,
    sample_rate: u32,
}

impl Chain {
    pub fn new(sample_rate: u32, layout: ChannelLayout) -> Self {
        Self { effects: Vec::new(), layout, sample_rate }
    }
    pub fn push(&mut self, mut fx: Box<dyn Effect>) {
        fx.prepare(self.sample_rate, self.layout);
        self.effects.push(fx);
    }
    /// Process one interleaved block in-place.
    pub fn process(&mut self, block: &mut [f32]) {
        for fx in self.effects.iter_mut() {
            fx.process(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scale(f32);
    impl Effect for Scale {
        fn process(&mut self, block: &mut [f32]) {
            for s in block.iter_mut() {
                *s *= self.0;
            }
        }
    }

    struct Probe(std::sync::Arc<parking_lot::Mutex<Option<(u32, ChannelLayout)>>>);
    impl Effect for Probe {
        fn prepare(&mut self, sr: u32, layout: ChannelLayout) {
            *self.0.lock() = Some((sr, layout));
        }
        fn process(&mut self, _block: &mut [f32]) {}
    }

    #[test]
    fn effects_run_in_order() {
        let mut chain = Chain::new(48_000, ChannelLayout::matched(1));
        chain.push(Box::new(Scale(2.0)));
        chain.push(Box::new(Scale(0.25)));
        let mut block = [1.0f32, -0.5];
        chain.process(&mut block);
        assert_eq!(block, [0.5, -0.25]);
    }

    #[test]
    fn push_prepares_effect() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let layout = ChannelLayout { input: 1, output: 2 };
        let mut chain = Chain::new(44_100, layout);
        chain.push(Box::new(Probe(seen.clone())));
        assert_eq!(*seen.lock(), Some((44_100, layout)));
    }

    #[test]
    fn empty_chain_is_passthrough() {
        let mut chain = Chain::new(48_000, ChannelLayout::matched(2));
        let mut block = [0.1f32, 0.2];
        chain.process(&mut block);
        assert_eq!(block, [0.1, 0.2]);
    }
}
