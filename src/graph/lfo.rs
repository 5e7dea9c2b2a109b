use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    graph::node::{GraphNode, RenderCtx},
    MAX_BLOCK_SIZE,
};

/*
Shared LFO
==========

A modulation source read by more than one consumer. The classic case is a
chord: three copies of the same carrier, all wobbled by the same vibrato
LFO. Each copy must see the same LFO block, and the LFO must advance
exactly once per block no matter how many copies read it.

  ┌────────────┐       ┌───────────┐
  │            ├──────→│ carrier 1 │
  │ SharedLfo  ├──────→│ carrier 2 │   one tick, three reads
  │            ├──────→│ carrier 3 │
  └────────────┘       └───────────┘

How It Works
------------

Clones of a SharedLfo point at the same state. The first consumer to render
in a block (identified by `RenderCtx::frame`) advances the inner node and
caches the result; every later consumer in the same block copies the cache.

The graph builder is the only place that creates and clones these handles.
Once a voice is playing, the per-block tick is the only mutation, and it
happens from the audio thread that pulls the voice. The mutex is therefore
never contended in practice; it exists so the graph stays `Send`.

Lifetime
--------

The state lives as long as the longest-lived consumer (plain `Arc`
reference counting).

note_off() is not forwarded: one consumer releasing must not silence the
source for the others.
*/

struct LfoState {
    node: Box<dyn GraphNode>,
    block: Vec<f32>,
    /// Block index the cache was rendered for.
    frame: Option<u64>,
}

#[derive(Clone)]
pub struct SharedLfo {
    state: Arc<Mutex<LfoState>>,
}

impl SharedLfo {
    pub fn new(node: impl GraphNode + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(LfoState {
                node: Box::new(node),
                block: vec![0.0; MAX_BLOCK_SIZE],
                frame: None,
            })),
        }
    }

    /// Number of handles currently sharing this source.
    pub fn consumers(&self) -> usize {
        Arc::strong_count(&self.state)
    }
}

impl GraphNode for SharedLfo {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let len = out.len();
        let mut state = self.state.lock();
        let LfoState { node, block, frame } = &mut *state;

        if *frame != Some(ctx.frame) {
            node.render_block(&mut block[..len], ctx);
            *frame = Some(ctx.frame);
        }

        out.copy_from_slice(&block[..len]);
    }

    fn is_active(&self) -> bool {
        self.state.lock().node.is_active()
    }
}
