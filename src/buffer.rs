// This file is a part of hotswap-dsp. Released under GPL-3.0-or-later.
// See README.md for details.

//! Scratch buffer between the host's channel data and a compiled unit.
//!
//! Not all generated DSP code tolerates true in-place processing, so the
//! host's input channels are copied into this adapter first and the unit
//! computes from the copy back into the host buffers.

/// A flat sample store of `channels * max_frames` with per channel views.
///
/// Resizing must only happen under the same exclusivity the lifecycle uses
/// for installation; the audio thread reaches the views through the same
/// lock it holds during `process`.
#[derive(Debug, Default)]
pub struct ChannelBuffer {
    data: Vec<f32>,
    channels: usize,
    max_frames: usize,
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_channels(&self) -> usize {
        self.channels
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Reallocates the store for `channels * max_frames` samples. An exact
    /// no-op when the configuration is unchanged, so repeated `prepare`
    /// calls with identical specs don't disturb buffer state.
    pub fn resize(&mut self, channels: usize, max_frames: usize) {
        if self.channels == channels && self.max_frames == max_frames {
            return;
        }

        self.channels = channels;
        self.max_frames = max_frames;
        self.data.clear();
        self.data.resize(channels * max_frames, 0.0);
    }

    /// Copies `frames` samples of each host channel into the scratch store.
    ///
    /// `channels.len()` must match the configured channel count and `frames`
    /// must not exceed the configured maximum. Violating either means
    /// `prepare` was not called correctly upstream, which is a programming
    /// error, not a runtime condition.
    pub fn copy_in<S: AsRef<[f32]>>(&mut self, channels: &[S], frames: usize) {
        assert_eq!(channels.len(), self.channels);
        assert!(frames <= self.max_frames);

        for (i, ch) in channels.iter().enumerate() {
            let offs = i * self.max_frames;
            self.data[offs..offs + frames].copy_from_slice(&ch.as_ref()[..frames]);
        }
    }

    /// Iterates the per channel views, `frames` samples each.
    pub fn channels(&self, frames: usize) -> impl Iterator<Item = &[f32]> {
        debug_assert!(frames <= self.max_frames);
        self.data.chunks(self.max_frames.max(1)).take(self.channels).map(move |c| &c[..frames])
    }
}

/// Stack table size for channel views. Hosts with more channels than this
/// fall back to a heap table.
pub(crate) const CHANNEL_TABLE_SIZE: usize = 16;

/// Builds the `&[&[f32]]` view a [crate::CompiledUnit] computes from without
/// heap allocation for typical channel counts.
pub(crate) fn with_channel_table<R>(
    buffer: &ChannelBuffer,
    frames: usize,
    f: impl FnOnce(&[&[f32]]) -> R,
) -> R {
    let n = buffer.num_channels();
    if n <= CHANNEL_TABLE_SIZE {
        let mut table: [&[f32]; CHANNEL_TABLE_SIZE] = [&[]; CHANNEL_TABLE_SIZE];
        for (slot, ch) in table.iter_mut().zip(buffer.channels(frames)) {
            *slot = ch;
        }
        f(&table[..n])
    } else {
        let table: Vec<&[f32]> = buffer.channels(frames).collect();
        f(&table)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn check_resize_and_copy() {
        let mut buf = ChannelBuffer::new();
        buf.resize(2, 4);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.max_frames(), 4);

        let left = [1.0_f32, 2.0, 3.0, 4.0];
        let right = [5.0_f32, 6.0, 7.0, 8.0];
        buf.copy_in(&[&left[..], &right[..]], 4);

        let chans: Vec<Vec<f32>> = buf.channels(4).map(|c| c.to_vec()).collect();
        assert_eq!(chans, vec![left.to_vec(), right.to_vec()]);
    }

    #[test]
    fn check_resize_is_idempotent() {
        let mut buf = ChannelBuffer::new();
        buf.resize(2, 8);
        buf.copy_in(&[&[1.0_f32; 8][..], &[2.0; 8][..]], 8);

        // same configuration: contents must survive
        buf.resize(2, 8);
        let first: Vec<f32> = buf.channels(8).next().unwrap().to_vec();
        assert_eq!(first, vec![1.0; 8]);

        // different configuration: store is rebuilt and zeroed
        buf.resize(2, 16);
        let first: Vec<f32> = buf.channels(16).next().unwrap().to_vec();
        assert_eq!(first, vec![0.0; 16]);
    }

    #[test]
    fn check_partial_block_copy() {
        let mut buf = ChannelBuffer::new();
        buf.resize(1, 8);
        buf.copy_in(&[&[9.0_f32, 9.0][..]], 2);

        let ch: Vec<f32> = buf.channels(2).next().unwrap().to_vec();
        assert_eq!(ch, vec![9.0, 9.0]);
    }

    #[test]
    #[should_panic]
    fn check_channel_count_mismatch_asserts() {
        let mut buf = ChannelBuffer::new();
        buf.resize(2, 4);
        buf.copy_in(&[&[0.0_f32; 4][..]], 4);
    }

    #[test]
    #[should_panic]
    fn check_frame_overflow_asserts() {
        let mut buf = ChannelBuffer::new();
        buf.resize(1, 4);
        buf.copy_in(&[&[0.0_f32; 8][..]], 8);
    }

    #[test]
    fn check_channel_table_views() {
        let mut buf = ChannelBuffer::new();
        buf.resize(2, 4);
        buf.copy_in(&[&[1.0_f32; 4][..], &[2.0; 4][..]], 4);

        with_channel_table(&buf, 3, |table| {
            assert_eq!(table.len(), 2);
            assert_eq!(table[0], &[1.0, 1.0, 1.0][..]);
            assert_eq!(table[1], &[2.0, 2.0, 2.0][..]);
        });
    }
}
