//! Frame-aligned chunk planning.
//!
//! Groups scanned frames into consecutive spans of roughly the target
//! playback time each. Spans never split a frame, so every chunk is
//! independently decodable and the spans partition the scanned audio bytes.

use crate::mp3::Frame;

/// A planned chunk: a half-open byte range over the source buffer plus the
/// exact playback time of the frames inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    /// Position of this chunk within the track, starting at 0.
    pub index: u32,
    /// Byte offset of the first frame in the chunk.
    pub start: usize,
    /// Byte offset one past the last frame in the chunk.
    pub end: usize,
    /// Summed duration of the chunk's frames in seconds.
    pub duration: f64,
}

impl ChunkSpan {
    pub fn byte_len(&self) -> usize {
        self.end - self.start
    }
}

/// Partition `frames` into consecutive groups of at least `target_seconds`
/// playback time each (except the final group, which takes whatever is left).
///
/// Accumulation is greedy: frames are added until the running duration
/// reaches the target, so a single frame longer than the target forms a
/// chunk on its own. An empty frame list yields an empty plan.
pub fn plan_chunks(frames: &[Frame], target_seconds: f64) -> Vec<ChunkSpan> {
    let mut spans = Vec::new();
    let mut i = 0;

    while i < frames.len() {
        let start = frames[i].offset;
        let mut end = start;
        let mut accumulated = 0.0;

        while i < frames.len() && accumulated < target_seconds {
            accumulated += frames[i].duration;
            end = frames[i].offset + frames[i].length;
            i += 1;
        }

        spans.push(ChunkSpan {
            index: spans.len() as u32,
            start,
            end,
            duration: accumulated,
        });
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frames(count: usize, duration: f64, length: usize) -> Vec<Frame> {
        (0..count)
            .map(|k| Frame {
                offset: k * length,
                length,
                duration,
            })
            .collect()
    }

    #[test]
    fn empty_frame_list_plans_nothing() {
        assert!(plan_chunks(&[], 10.0).is_empty());
    }

    #[test]
    fn twenty_five_seconds_at_ten_second_target_gives_three_chunks() {
        // 50 frames of 0.5 s each: 10 s + 10 s + 5 s remainder.
        let frames = uniform_frames(50, 0.5, 417);
        let spans = plan_chunks(&frames, 10.0);

        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].index, 0);
        assert_eq!(spans[1].index, 1);
        assert_eq!(spans[2].index, 2);
        assert!((spans[0].duration - 10.0).abs() < 1e-9);
        assert!((spans[1].duration - 10.0).abs() < 1e-9);
        assert!((spans[2].duration - 5.0).abs() < 1e-9);
        assert_eq!(spans[0].byte_len(), 20 * 417);
        assert_eq!(spans[2].byte_len(), 10 * 417);
    }

    #[test]
    fn spans_partition_the_scanned_bytes() {
        let frames = uniform_frames(37, 0.3, 209);
        let spans = plan_chunks(&frames, 4.0);

        assert_eq!(spans[0].start, frames[0].offset);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let last_frame = frames.last().unwrap();
        assert_eq!(
            spans.last().unwrap().end,
            last_frame.offset + last_frame.length
        );

        let covered: usize = spans.iter().map(|s| s.byte_len()).sum();
        assert_eq!(covered, 37 * 209);
    }

    #[test]
    fn chunk_durations_sum_to_the_track_duration() {
        let frames = uniform_frames(123, 1152.0 / 44100.0, 417);
        let total: f64 = frames.iter().map(|f| f.duration).sum();

        let spans = plan_chunks(&frames, 10.0);
        let planned: f64 = spans.iter().map(|s| s.duration).sum();
        assert!((planned - total).abs() < 1e-6);
    }

    #[test]
    fn oversized_frame_forms_its_own_chunk() {
        let frames = vec![
            Frame {
                offset: 0,
                length: 2000,
                duration: 12.0,
            },
            Frame {
                offset: 2000,
                length: 400,
                duration: 0.5,
            },
        ];

        let spans = plan_chunks(&frames, 10.0);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].end, 2000);
        assert!((spans[0].duration - 12.0).abs() < 1e-9);
        assert!((spans[1].duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn target_longer_than_track_gives_a_single_chunk() {
        let frames = uniform_frames(8, 0.5, 417);
        let spans = plan_chunks(&frames, 60.0);

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans[0].end, 8 * 417);
        assert!((spans[0].duration - 4.0).abs() < 1e-9);
    }
}
