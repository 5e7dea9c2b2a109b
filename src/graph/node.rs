/// Context passed to graph nodes during rendering
///
/// - sample_rate: Audio sample rate (e.g., 44100.0)
/// - block_len: Frames in every block of this graph
/// - frame: Index of the block being rendered, counted from the start of the
///   stream. Shared nodes use it to advance once per block no matter how many
///   consumers read them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub block_len: usize,
    pub frame: u64,
}

impl RenderCtx {
    pub fn new(sample_rate: f32, block_len: usize) -> Self {
        Self {
            sample_rate,
            block_len,
            frame: 0,
        }
    }

    /// Seconds covered by one block.
    pub fn block_duration(&self) -> f32 {
        self.block_len as f32 / self.sample_rate
    }
}

/// Trait for nodes that accept per-sample modulation input
pub trait Modulatable: Send {
    type Param: Copy + Send;

    /// Install the modulation values for the next rendered block.
    ///
    /// `values` holds one entry per frame. Values not set before a render are
    /// treated as zero, which leaves the parameter unmodulated.
    fn set_modulation(&mut self, param: Self::Param, values: &[f32]);
}

/// Core trait for audio processing graph nodes
///
/// A node fills fixed-size blocks on request. Infinite sources stay active
/// forever; finite ones (timed envelopes, released voices, echo tails) report
/// `is_active() == false` once their last block has been rendered.
pub trait GraphNode: Send {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx);

    /// Triggered when the key that started this graph is released
    ///
    /// Sources stop producing signal; effects with a tail keep ringing.
    fn note_off(&mut self) {
        // Default: do nothing
    }

    /// Check if this node is still producing sound
    fn is_active(&self) -> bool {
        true
    }
}

/// Allow boxed graph nodes to be used as graph nodes (for dynamic dispatch)
impl GraphNode for Box<dyn GraphNode> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        (**self).render_block(out, ctx)
    }

    fn note_off(&mut self) {
        (**self).note_off()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

/// A composed graph bound to a sample rate and a block length.
///
/// This is the lazy block sequence handed to the streaming adapter: each call
/// to [`BoundNode::next_block`] renders exactly one block and advances the
/// block counter.
pub struct BoundNode {
    node: Box<dyn GraphNode>,
    ctx: RenderCtx,
}

impl BoundNode {
    pub fn new(node: impl GraphNode + 'static, sample_rate: f32, block_len: usize) -> Self {
        Self {
            node: Box::new(node),
            ctx: RenderCtx::new(sample_rate, block_len),
        }
    }

    pub fn block_len(&self) -> usize {
        self.ctx.block_len
    }

    pub fn sample_rate(&self) -> f32 {
        self.ctx.sample_rate
    }

    /// Blocks rendered so far.
    pub fn frame(&self) -> u64 {
        self.ctx.frame
    }

    /// Render the next block into `out[..block_len]`.
    ///
    /// Returns `false` without touching `out` once the graph is exhausted.
    pub fn next_block(&mut self, out: &mut [f32]) -> bool {
        if !self.node.is_active() {
            return false;
        }
        let len = self.ctx.block_len;
        self.node.render_block(&mut out[..len], &self.ctx);
        self.ctx.frame += 1;
        true
    }

    pub fn note_off(&mut self) {
        self.node.note_off();
    }

    pub fn is_active(&self) -> bool {
        self.node.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits `remaining` blocks of ones, then goes quiet.
    struct Countdown {
        remaining: usize,
    }

    impl GraphNode for Countdown {
        fn render_block(&mut self, out: &mut [f32], _ctx: &RenderCtx) {
            out.fill(1.0);
            self.remaining = self.remaining.saturating_sub(1);
        }

        fn is_active(&self) -> bool {
            self.remaining > 0
        }
    }

    #[test]
    fn bound_node_stops_when_exhausted() {
        let mut bound = BoundNode::new(Countdown { remaining: 2 }, 1000.0, 4);
        let mut out = vec![0.0; 4];

        assert!(bound.next_block(&mut out));
        assert!(bound.next_block(&mut out));
        assert_eq!(out, vec![1.0; 4]);
        assert!(!bound.next_block(&mut out));
        assert_eq!(bound.frame(), 2);
    }

    #[test]
    fn renders_only_block_len_frames() {
        let mut bound = BoundNode::new(Countdown { remaining: 1 }, 1000.0, 3);
        let mut out = vec![0.0; 8];
        bound.next_block(&mut out);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn block_duration_matches_rate() {
        let ctx = RenderCtx::new(1000.0, 100);
        assert!((ctx.block_duration() - 0.1).abs() < 1e-6);
    }
}
