use crate::{
    dsp::delay::{audible_repeats, EchoLine},
    graph::node::{GraphNode, RenderCtx},
};

/*
Echo
====

A multi-tap echo: the input, followed by a train of progressively quieter
copies of it.

    ──x──┬─────────────────────────────────────────→ (+) ──→ out
         └─[after]──×decay──┬─[delay]──×decay──┬─ ...  ↑
                            └──────────────────┴───────┘

  after   seconds before the first repeat
  amount  number of repeats
  delay   seconds between repeats
  decay   gain of each repeat relative to the one before

Repeats that would fall below -120 dB are not computed at all, so a large
`amount` with a small `decay` costs nothing extra.

Tail
----

Once its input goes silent the last repeat lands
`after + (repeats - 1) × delay` seconds later. The node reports itself
active for exactly that long, which lets a released voice ring out and then
end. `tail()` rounds this up to `after + repeats × delay` so callers sizing
buffers leave room for the final repeat to sound.
*/

pub struct EchoNode {
    line: EchoLine,
    tail: f32,
}

impl EchoNode {
    pub fn new(sample_rate: f32, after: f32, amount: usize, delay: f32, decay: f32) -> Self {
        let repeats = audible_repeats(amount, decay);
        let to_samples = |secs: f32| (secs.max(0.0) * sample_rate).round() as usize;
        let line = EchoLine::new(to_samples(after), to_samples(delay), repeats, decay);
        let tail = if repeats == 0 {
            0.0
        } else {
            after + repeats as f32 * delay
        };

        Self { line, tail }
    }

    /// Seconds of sound added after the input stops.
    pub fn tail(&self) -> f32 {
        self.tail
    }
}

impl GraphNode for EchoNode {
    fn render_block(&mut self, out: &mut [f32], _ctx: &RenderCtx) {
        self.line.render(out);
    }

    fn is_active(&self) -> bool {
        self.line.is_ringing()
    }
}
