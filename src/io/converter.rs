use tracing::warn;

use crate::error::{OverflowCondition, Result, SynthError};

/// Float to integer PCM conversion for one stream.
///
/// Samples scale by `2^(8·w − 1)` and round to nearest. The scaled value is
/// not clamped up front: anything beyond the range of a `w`-byte sample is
/// reported as an [`OverflowCondition`] and then hard-clipped to that range.
/// The warning is logged once per converter.
#[derive(Debug, Clone)]
pub struct PcmConverter {
    sample_width: u8,
    scale: f64,
    min: i64,
    max: i64,
    warned: bool,
}

impl PcmConverter {
    pub fn new(sample_width: u8) -> Result<Self> {
        if !(1..=4).contains(&sample_width) {
            return Err(SynthError::config(format!(
                "sample width must be 1 to 4 bytes, got {sample_width}"
            )));
        }
        let scale = (1i64 << (8 * sample_width as u32 - 1)) as f64;
        Ok(Self {
            sample_width,
            scale,
            min: -(scale as i64),
            max: scale as i64 - 1,
            warned: false,
        })
    }

    pub fn sample_width(&self) -> u8 {
        self.sample_width
    }

    /// Multiplier applied before rounding.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Convert `input` into `out`, which must be at least as long.
    ///
    /// Returns the overflow seen in this block, if any.
    pub fn convert(&mut self, input: &[f32], out: &mut [i32]) -> Option<OverflowCondition> {
        let mut peak = 0i64;
        for (o, &v) in out.iter_mut().zip(input) {
            let scaled = (v as f64 * self.scale).round() as i64;
            if scaled > self.max || scaled < self.min {
                peak = peak.max(scaled.abs());
            }
            *o = scaled.clamp(self.min, self.max) as i32;
        }

        if peak == 0 {
            return None;
        }
        let condition = OverflowCondition {
            sample_width: self.sample_width,
            peak,
        };
        if !self.warned {
            warn!(%condition, "pcm overflow");
            self.warned = true;
        }
        Some(condition)
    }

    /// Whether any block converted so far overflowed.
    pub fn overflowed(&self) -> bool {
        self.warned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_and_rounds() {
        let mut pcm = PcmConverter::new(2).unwrap();
        let mut out = [0; 4];
        assert!(pcm.convert(&[0.5, -0.5, 0.25, 0.0], &mut out).is_none());
        assert_eq!(out, [16384, -16384, 8192, 0]);
        assert!(!pcm.overflowed());
    }

    #[test]
    fn full_scale_overflows_and_clips() {
        let mut pcm = PcmConverter::new(2).unwrap();
        let mut out = [0; 3];
        let condition = pcm.convert(&[1.0, -1.0, 1.5], &mut out).unwrap();
        assert_eq!(out, [32767, -32768, 32767]);
        assert_eq!(condition.sample_width, 2);
        assert_eq!(condition.peak, 49152);
        assert!(pcm.overflowed());
    }

    #[test]
    fn eight_bit() {
        let mut pcm = PcmConverter::new(1).unwrap();
        let mut out = [0; 2];
        assert!(pcm.convert(&[0.5, -1.0], &mut out).is_none());
        assert_eq!(out, [64, -128]);
    }

    #[test]
    fn rejects_unsupported_width() {
        assert!(PcmConverter::new(0).is_err());
        assert!(PcmConverter::new(5).is_err());
    }
}
