use crate::{
    graph::node::{GraphNode, RenderCtx},
    MAX_BLOCK_SIZE,
};

/*
Summing Mixer
=============

The Mix node adds any number of signals sample by sample. This is the
additive counterpart to the Amplify node (which multiplies signals).

    output[n] = source_1[n] + source_2[n] + ... + source_k[n]

There is no automatic gain compensation. Callers that want the sum to stay
inside [-1, 1] scale the sources beforehand, which is exactly what the graph
builder does for chords: every chord note is built with amplitude / k.
Independent output oscillators, on the other hand, are summed at full level,
so two oscillators at amplitude 0.5 make a full-scale signal.

Use Cases:
----------
- Chords (one copy of the carrier per note, pre-scaled)
- Routing several oscillator slots to the output
- Layering

  let chord = Mix::new(vec![root.boxed(), third.boxed(), fifth.boxed()]);
  let layered = OscNode::sine(220.0).mix(OscNode::sine(330.0));

Activity
--------

A mix is active while any of its sources is. Sources that have finished are
skipped (they contribute silence) so a finite layer can end early without
cutting the others.
*/

pub struct Mix {
    sources: Vec<Box<dyn GraphNode>>,
    temp_buffer: Vec<f32>,
}

impl Mix {
    pub fn new(sources: Vec<Box<dyn GraphNode>>) -> Self {
        Self {
            sources,
            temp_buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn push(&mut self, source: impl GraphNode + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl GraphNode for Mix {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        out.fill(0.0);
        let frames = &mut self.temp_buffer[..out.len()];

        for source in self.sources.iter_mut() {
            if !source.is_active() {
                continue;
            }
            source.render_block(frames, ctx);
            for (o, s) in out.iter_mut().zip(frames.iter()) {
                *o += *s;
            }
        }
    }

    fn note_off(&mut self) {
        for source in self.sources.iter_mut() {
            source.note_off();
        }
    }

    fn is_active(&self) -> bool {
        self.sources.iter().any(|source| source.is_active())
    }
}
