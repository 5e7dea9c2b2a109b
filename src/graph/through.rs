use crate::graph::node::{GraphNode, RenderCtx};

/*
Serial Signal Chain (Through)
=============================

Through connects two nodes in series, passing the output of the first (source)
into the second (effect). This is the fundamental building block for creating
signal processing chains like: oscillator → tremolo → echo.

How It Works:
-------------
1. Render the source into the output buffer
2. Pass that buffer through the effect (in-place processing)

  Source renders:  [0.5, 0.8, -0.3, 0.9, ...]
  Effect processes in-place (e.g., echo, 2 samples later at half level)
  Final output:    [0.5, 0.8, -0.05, 1.3, ...]

This is different from Amplify (which multiplies) or Mix (which blends).
Through passes audio through a processor that transforms it.

Released Sources and Tails:
---------------------------

Once the source has finished (released or exhausted) it is no longer
rendered; the effect receives silence instead. The chain stays active while
either side is, so an echo keeps ringing after its source is released:

    source active   → [Source] ──→ [Echo] ──→ output
    source finished → [zeros]  ──→ [Echo] ──→ output   (tail rings out)
    both finished   → inactive, the voice ends

  let voice = osc.through(EchoNode::new(sample_rate, 0.0, 6, 0.2, 0.7));

Through vs Amplify vs Mix:
--------------------------
- Through: Serial processing (source → effect → output)
- Amplify: Multiplication (signal × modulator)
- Mix:     Parallel summing (layer + layer)

Signal Flow Diagram:
--------------------
  Through: [Source] ──→ [Effect] ──→ output

  Amplify: [Signal] ──┬──→ (×) ──→ output
           [Mod]    ──┘

  Mix:     [A] ──────┬──→ (+) ──→ output
           [B] ──────┘

Choose Through when audio flows from one processor to the next.
*/

pub struct Through<S, F> {
    source: S,
    filter: F,
}

impl<S, F> Through<S, F> {
    pub fn new(source: S, filter: F) -> Self {
        Self { source, filter }
    }
}

impl<S: GraphNode, F: GraphNode> GraphNode for Through<S, F> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        if self.source.is_active() {
            self.source.render_block(out, ctx);
        } else {
            out.fill(0.0);
        }
        self.filter.render_block(out, ctx);
    }

    fn note_off(&mut self) {
        self.source.note_off();
        self.filter.note_off();
    }

    fn is_active(&self) -> bool {
        self.source.is_active() || self.filter.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{delay::EchoNode, extensions::NodeExt, oscillator::OscNode};

    fn ctx() -> RenderCtx {
        RenderCtx::new(1_000.0, 100)
    }

    #[test]
    fn renders_source_then_filter() {
        let mut plain = OscNode::sine(50.0);
        let mut node = OscNode::sine(50.0).through(EchoNode::new(1_000.0, 0.01, 1, 0.0, 0.5));
        let mut a = vec![0.0; 100];
        let mut b = vec![0.0; 100];
        plain.render_block(&mut a, &ctx());
        node.render_block(&mut b, &ctx());

        assert_eq!(a[..10], b[..10]);
        assert!((b[20] - (a[20] + 0.5 * a[10])).abs() < 1e-6);
    }

    #[test]
    fn tail_outlives_released_source() {
        let mut node = OscNode::sine(50.0).through(EchoNode::new(1_000.0, 0.0, 2, 0.1, 0.5));
        let mut out = vec![0.0; 100];
        node.render_block(&mut out, &ctx());

        node.note_off();
        assert!(node.is_active(), "echo should keep ringing after release");

        // Last repeat lands 0.1 s after the input stops.
        node.render_block(&mut out, &ctx());
        assert!(out.iter().any(|&s| s != 0.0));
        node.render_block(&mut out, &ctx());
        assert!(!node.is_active());
    }

    #[test]
    fn released_without_tail_ends() {
        let mut node = OscNode::sine(50.0).through(EchoNode::new(1_000.0, 0.0, 0, 0.1, 0.5));
        node.note_off();
        assert!(!node.is_active());
    }
}
