//! Frame assembly: float samples to fixed-size s16le relay frames.
//!
//! The assembler is the single place where sequence numbers are issued,
//! so frames leave capture in strict temporal order with no gaps in the
//! numbering of frames that were actually produced.

use crate::domain::types::AudioFrame;

/// Packs incoming f32 samples into fixed-size s16le byte frames tagged
/// with monotonically increasing sequence numbers.
pub struct FrameAssembler {
    frame_size_bytes: usize,
    buf: Vec<u8>,
    next_seq: u64,
}

impl FrameAssembler {
    /// `frame_size_bytes` must be even (two bytes per s16le sample);
    /// config validation guarantees this.
    pub fn new(frame_size_bytes: usize) -> Self {
        debug_assert!(frame_size_bytes >= 2 && frame_size_bytes % 2 == 0);
        Self {
            frame_size_bytes,
            buf: Vec::with_capacity(frame_size_bytes),
            next_seq: 0,
        }
    }

    /// Append samples and return every completed frame, in order.
    pub fn push_samples(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        for &s in samples {
            let v = sample_to_i16(s);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }

        let mut frames = Vec::new();
        while self.buf.len() >= self.frame_size_bytes {
            let data: Vec<u8> = self.buf.drain(..self.frame_size_bytes).collect();
            frames.push(AudioFrame::new(self.next_seq, data));
            self.next_seq += 1;
        }
        frames
    }

    /// Flush the trailing partial frame, zero-padded to full size.
    ///
    /// Returns `None` when no samples are pending.
    pub fn flush(&mut self) -> Option<AudioFrame> {
        if self.buf.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.buf);
        data.resize(self.frame_size_bytes, 0);
        let frame = AudioFrame::new(self.next_seq, data);
        self.next_seq += 1;
        Some(frame)
    }

    /// Total frames issued so far.
    pub fn frames_produced(&self) -> u64 {
        self.next_seq
    }
}

fn sample_to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Convert interleaved multi-channel samples to mono by averaging.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_emits_fixed_size_frames_in_order() {
        let mut asm = FrameAssembler::new(8); // 4 samples per frame
        let frames = asm.push_samples(&[0.0; 10]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].seq, 0);
        assert_eq!(frames[1].seq, 1);
        assert!(frames.iter().all(|f| f.data.len() == 8));
    }

    #[test]
    fn test_assembler_carries_remainder_across_calls() {
        let mut asm = FrameAssembler::new(8);
        assert!(asm.push_samples(&[0.0; 3]).is_empty());
        let frames = asm.push_samples(&[0.0; 1]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 0);
    }

    #[test]
    fn test_flush_pads_partial_frame() {
        let mut asm = FrameAssembler::new(8);
        asm.push_samples(&[1.0, 1.0]);
        let frame = asm.flush().expect("pending samples");
        assert_eq!(frame.data.len(), 8);
        // Two real samples followed by zero padding
        assert_eq!(&frame.data[4..], &[0, 0, 0, 0]);
        assert!(asm.flush().is_none());
    }

    #[test]
    fn test_sequence_numbers_never_repeat() {
        let mut asm = FrameAssembler::new(4);
        let a = asm.push_samples(&[0.0; 4]);
        asm.push_samples(&[0.0; 1]);
        let b = asm.flush().unwrap();
        assert_eq!(a.last().unwrap().seq + 1, b.seq);
        assert_eq!(asm.frames_produced(), 3);
    }

    #[test]
    fn test_sample_conversion_clamps() {
        assert_eq!(sample_to_i16(1.5), i16::MAX);
        assert_eq!(sample_to_i16(-1.5), -i16::MAX);
        assert_eq!(sample_to_i16(0.0), 0);
    }

    #[test]
    fn test_sample_conversion_le_bytes() {
        let mut asm = FrameAssembler::new(2);
        let frames = asm.push_samples(&[1.0]);
        assert_eq!(frames[0].data, i16::MAX.to_le_bytes().to_vec());
    }

    #[test]
    fn test_mix_to_mono_stereo() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5];
        assert_eq!(mix_to_mono(&stereo, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn test_mix_to_mono_passthrough() {
        let mono = vec![0.1, 0.2];
        assert_eq!(mix_to_mono(&mono, 1), mono);
    }
}
