/// Echo gains below this are not worth computing.
const AUDIBLE_GAIN: f32 = 0.000_001;

/// Number of repeats that stay above [`AUDIBLE_GAIN`] when each repeat is
/// `decay` times the previous one.
pub fn audible_repeats(amount: usize, decay: f32) -> usize {
    if decay <= 0.0 {
        return 0;
    }
    if decay < 1.0 {
        let limit = AUDIBLE_GAIN.ln() / decay.ln();
        return amount.min(limit as usize);
    }
    amount
}

/// Multi-tap echo over a ring buffer of past input.
///
/// `out[n] = x[n] + Σ decay^(i+1) · x[n - after - i·spacing]` for each repeat `i`.
pub struct EchoLine {
    buffer: Vec<f32>,
    write_pos: usize,
    after: usize,
    spacing: usize,
    gains: Vec<f32>,
    /// Consecutive zero input samples seen so far.
    silent_run: usize,
}

impl EchoLine {
    pub fn new(after: usize, spacing: usize, amount: usize, decay: f32) -> Self {
        let gains: Vec<f32> = (1..=amount as i32).map(|i| decay.powi(i)).collect();
        let reach = after.saturating_add(amount.saturating_sub(1).saturating_mul(spacing));

        Self {
            buffer: vec![0.0; reach + 1],
            write_pos: 0,
            after,
            spacing,
            gains,
            silent_run: usize::MAX,
        }
    }

    /// Samples the line keeps sounding after its input goes silent.
    pub fn tail_len(&self) -> usize {
        if self.gains.is_empty() {
            0
        } else {
            self.buffer.len() - 1
        }
    }

    pub fn next_sample(&mut self, sample: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = sample;

        let mut out = sample;
        for (i, gain) in self.gains.iter().enumerate() {
            let offset = self.after + i * self.spacing;
            let read_pos = (self.write_pos + len - offset) % len;
            out += gain * self.buffer[read_pos];
        }

        self.write_pos = (self.write_pos + 1) % len;
        self.silent_run = if sample == 0.0 {
            self.silent_run.saturating_add(1)
        } else {
            0
        };

        out
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample);
        }
    }

    /// True while echoes of earlier input are still due.
    pub fn is_ringing(&self) -> bool {
        self.silent_run < self.tail_len()
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.silent_run = usize::MAX;
    }
}
