//! MPEG Layer III frame scanning.
//!
//! Walks the raw byte structure of an MP3 buffer without decoding any audio:
//! skips a leading ID3v2 tag, locates frame headers, and records each frame's
//! byte range and playback duration. The resulting frame list drives duration
//! calculation and frame-aligned chunk planning.

use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum Mp3Error {
    #[error("buffer does not start with an ID3 tag or MPEG sync word")]
    UnrecognizedHeader,
    #[error("no playable MPEG Layer III frames found")]
    NoFrames,
    #[error("frame durations do not sum to a playable length")]
    UnusableDuration,
}

// Layer III bitrates in kbps, indexed by the 4-bit bitrate field.
// Index 0 (free format) and 15 (bad) stay zero and are rejected before lookup.
const BITRATES_MPEG1_L3: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATES_MPEG2_L3: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

// Sample rates in Hz, indexed by the 2-bit sample-rate field (index 3 is reserved).
const SAMPLE_RATES_MPEG1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_MPEG2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_MPEG25: [u32; 3] = [11025, 12000, 8000];

// Version field values from the frame header (0b01 is reserved).
const VERSION_MPEG1: u8 = 0x03;
const VERSION_MPEG2: u8 = 0x02;
const VERSION_MPEG25: u8 = 0x00;

const LAYER_III: u8 = 0x01;

/// Upper bound on scan loop iterations. Each iteration advances the cursor by
/// at least one byte, so this caps the work done on pathological input.
const MAX_SCAN_STEPS: usize = 200_000;

/// A single MPEG frame located in the source buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Byte offset of the frame header in the source buffer.
    pub offset: usize,
    /// Frame length in bytes, header included.
    pub length: usize,
    /// Playback duration of this frame in seconds.
    pub duration: f64,
}

/// Result of a frame scan over a complete buffer.
#[derive(Debug, Default)]
pub struct FrameScan {
    pub frames: Vec<Frame>,
    duration_sum: f64,
}

impl FrameScan {
    /// Exact playback duration in seconds, summed across all frames.
    ///
    /// For VBR files without a Xing header this is the frame-sum estimate,
    /// which is exact for the frames actually present.
    pub fn total_duration(&self) -> Result<f64, Mp3Error> {
        if self.frames.is_empty() {
            return Err(Mp3Error::NoFrames);
        }
        if !self.duration_sum.is_finite() || self.duration_sum <= 0.0 {
            return Err(Mp3Error::UnusableDuration);
        }
        Ok(self.duration_sum)
    }

    /// Duration rounded down to whole seconds, the value stored for a track.
    pub fn whole_seconds(&self) -> Result<u64, Mp3Error> {
        Ok(self.total_duration()?.floor() as u64)
    }
}

/// Cheap check that a buffer plausibly holds MP3 data: an ID3v2 tag or an
/// MPEG sync word at offset 0. Never a substitute for the full scan.
pub fn looks_like_mp3(buffer: &[u8]) -> bool {
    if buffer.len() < 4 {
        return false;
    }
    if &buffer[0..3] == b"ID3" {
        return true;
    }
    buffer[0] == 0xFF && (buffer[1] & 0xE0) == 0xE0
}

/// Syncsafe 32-bit integer: four big-endian 7-bit groups.
fn syncsafe_u32(b: &[u8]) -> u32 {
    ((b[0] as u32) << 21) + ((b[1] as u32) << 14) + ((b[2] as u32) << 7) + (b[3] as u32)
}

/// Offset where frame scanning starts: past the ID3v2 tag if one is present.
fn scan_start(buffer: &[u8]) -> usize {
    if buffer.len() >= 10 && &buffer[0..3] == b"ID3" {
        // Tag size lives in the 4 syncsafe bytes after the 6-byte tag header.
        let tag_size = syncsafe_u32(&buffer[6..10]) as usize;
        let start = 10 + tag_size;
        if start <= buffer.len() {
            return start;
        }
        // Declared size runs past the buffer; scan everything instead.
    }
    0
}

/// Scan a complete MP3 buffer for Layer III frames.
///
/// Invalid sync candidates advance the cursor by one byte, so garbage between
/// frames is skipped and scanning resumes at the next real header. Scanning
/// never fails; an unusable buffer simply yields no frames.
pub fn scan_frames(buffer: &[u8]) -> FrameScan {
    let mut frames = Vec::new();
    let mut duration_sum = 0.0;

    if buffer.len() < 4 {
        return FrameScan {
            frames,
            duration_sum,
        };
    }

    let mut pos = scan_start(buffer);
    let mut steps = 0;

    while pos + 4 <= buffer.len() && steps < MAX_SCAN_STEPS {
        steps += 1;

        let b1 = buffer[pos + 1];
        let b2 = buffer[pos + 2];
        if !(buffer[pos] == 0xFF && (b1 & 0xE0) == 0xE0) {
            pos += 1;
            continue;
        }

        let version = (b1 >> 3) & 0x03;
        let layer = (b1 >> 1) & 0x03;
        let bitrate_idx = ((b2 >> 4) & 0x0F) as usize;
        let samplerate_idx = ((b2 >> 2) & 0x03) as usize;
        let padding = ((b2 >> 1) & 0x01) as usize;

        // Free-format (0) and bad (15) bitrates are rejected along with
        // non-Layer-III frames and the reserved sample-rate index.
        if layer != LAYER_III || samplerate_idx == 0x03 || bitrate_idx == 0x0F || bitrate_idx == 0x00
        {
            pos += 1;
            continue;
        }

        let sample_rate = match version {
            VERSION_MPEG1 => SAMPLE_RATES_MPEG1[samplerate_idx],
            VERSION_MPEG2 => SAMPLE_RATES_MPEG2[samplerate_idx],
            VERSION_MPEG25 => SAMPLE_RATES_MPEG25[samplerate_idx],
            _ => {
                // Reserved version
                pos += 1;
                continue;
            }
        };

        let bitrate = if version == VERSION_MPEG1 {
            BITRATES_MPEG1_L3[bitrate_idx]
        } else {
            BITRATES_MPEG2_L3[bitrate_idx]
        };
        if sample_rate == 0 || bitrate == 0 {
            pos += 1;
            continue;
        }

        let (samples_per_frame, coefficient) = if version == VERSION_MPEG1 {
            (1152u32, 144_000u32)
        } else {
            (576, 72_000)
        };

        let frame_len = ((coefficient * bitrate) / sample_rate) as usize + padding;
        if frame_len == 0 || pos + frame_len > buffer.len() {
            // Truncated tail frame or degenerate length; resync.
            pos += 1;
            continue;
        }

        let duration = samples_per_frame as f64 / sample_rate as f64;
        frames.push(Frame {
            offset: pos,
            length: frame_len,
            duration,
        });
        duration_sum += duration;
        pos += frame_len;
    }

    if steps == MAX_SCAN_STEPS && pos + 4 <= buffer.len() {
        warn!(
            offset = pos,
            frames = frames.len(),
            "frame scan stopped at iteration guard; using frames found so far"
        );
    }

    FrameScan {
        frames,
        duration_sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MPEG-1 Layer III frame, 128 kbps @ 44100 Hz: 417 bytes (418 padded).
    fn mpeg1_frame(padded: bool) -> Vec<u8> {
        let len = if padded { 418 } else { 417 };
        let mut frame = vec![0u8; len];
        frame[0] = 0xFF;
        frame[1] = 0xFB; // MPEG-1, Layer III
        frame[2] = if padded { 0x92 } else { 0x90 }; // 128 kbps, 44100 Hz
        frame
    }

    /// MPEG-2.5 Layer III frame, 64 kbps @ 11025 Hz: 417 bytes.
    fn mpeg25_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[0] = 0xFF;
        frame[1] = 0xE3; // MPEG-2.5, Layer III
        frame[2] = 0x80; // 64 kbps, 11025 Hz
        frame
    }

    fn id3_tag(payload_size: usize) -> Vec<u8> {
        let mut tag = vec![0u8; 10 + payload_size];
        tag[0..3].copy_from_slice(b"ID3");
        tag[3] = 0x04; // v2.4
        tag[6] = ((payload_size >> 21) & 0x7F) as u8;
        tag[7] = ((payload_size >> 14) & 0x7F) as u8;
        tag[8] = ((payload_size >> 7) & 0x7F) as u8;
        tag[9] = (payload_size & 0x7F) as u8;
        tag
    }

    #[test]
    fn empty_and_tiny_buffers_scan_no_frames() {
        assert!(scan_frames(&[]).frames.is_empty());
        assert!(scan_frames(&[0xFF, 0xFB, 0x90]).frames.is_empty());
    }

    #[test]
    fn scans_consecutive_frames() {
        let mut buffer = mpeg1_frame(false);
        buffer.extend(mpeg1_frame(false));
        buffer.extend(mpeg1_frame(true));

        let scan = scan_frames(&buffer);
        assert_eq!(scan.frames.len(), 3);
        assert_eq!(scan.frames[0].offset, 0);
        assert_eq!(scan.frames[0].length, 417);
        assert_eq!(scan.frames[1].offset, 417);
        assert_eq!(scan.frames[2].offset, 834);
        assert_eq!(scan.frames[2].length, 418);

        let expected = 3.0 * 1152.0 / 44100.0;
        assert!((scan.total_duration().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn frame_duration_uses_sample_rate() {
        let scan = scan_frames(&mpeg25_frame());
        assert_eq!(scan.frames.len(), 1);
        assert_eq!(scan.frames[0].length, 417); // 72000 * 64 / 11025
        assert!((scan.frames[0].duration - 576.0 / 11025.0).abs() < 1e-12);
    }

    #[test]
    fn skips_id3_tag_before_first_frame() {
        let mut buffer = id3_tag(200);
        buffer.extend(mpeg1_frame(false));

        let scan = scan_frames(&buffer);
        assert_eq!(scan.frames.len(), 1);
        assert_eq!(scan.frames[0].offset, 210);
    }

    #[test]
    fn oversized_tag_size_falls_back_to_full_scan() {
        // Tag claims more payload than the buffer holds; the scanner starts
        // over at offset 0 and resyncs to the real frame.
        let mut buffer = id3_tag(0);
        buffer[6..10].copy_from_slice(&[0x7F, 0x7F, 0x7F, 0x7F]);
        buffer.extend(mpeg1_frame(false));

        let scan = scan_frames(&buffer);
        assert_eq!(scan.frames.len(), 1);
        assert_eq!(scan.frames[0].offset, 10);
    }

    #[test]
    fn resyncs_over_garbage_between_frames() {
        let mut buffer = mpeg1_frame(false);
        buffer.extend_from_slice(&[0x13, 0x37, 0x00, 0xAB, 0xCD, 0x11, 0x22]);
        buffer.extend(mpeg1_frame(false));

        let scan = scan_frames(&buffer);
        assert_eq!(scan.frames.len(), 2);
        assert_eq!(scan.frames[1].offset, 424);
    }

    #[test]
    fn rejects_truncated_final_frame() {
        let mut buffer = mpeg1_frame(false);
        buffer.extend_from_slice(&mpeg1_frame(false)[..100]);

        let scan = scan_frames(&buffer);
        assert_eq!(scan.frames.len(), 1);
    }

    #[test]
    fn rejects_reserved_and_invalid_header_fields() {
        // Reserved version (0b01)
        let mut reserved_version = vec![0u8; 417];
        reserved_version[0] = 0xFF;
        reserved_version[1] = 0xEB;
        reserved_version[2] = 0x90;
        assert!(scan_frames(&reserved_version).frames.is_empty());

        // Layer I instead of Layer III
        let mut layer1 = vec![0u8; 417];
        layer1[0] = 0xFF;
        layer1[1] = 0xFF;
        layer1[2] = 0x90;
        assert!(scan_frames(&layer1).frames.is_empty());

        // Free-format bitrate (0), bad bitrate (15), reserved sample rate (3)
        for b2 in [0x00u8, 0xF0, 0x9C] {
            let mut buffer = vec![0u8; 417];
            buffer[0] = 0xFF;
            buffer[1] = 0xFB;
            buffer[2] = b2;
            assert!(scan_frames(&buffer).frames.is_empty(), "b2 = {:#04x}", b2);
        }
    }

    #[test]
    fn scan_guard_stops_pathological_input() {
        // All zeros: every position fails the sync check, one byte at a time.
        let buffer = vec![0u8; 300_000];
        let scan = scan_frames(&buffer);
        assert!(scan.frames.is_empty());
    }

    #[test]
    fn duration_requires_frames_and_a_positive_sum() {
        assert!(matches!(
            scan_frames(&[0u8; 64]).total_duration(),
            Err(Mp3Error::NoFrames)
        ));

        let broken = FrameScan {
            frames: vec![Frame {
                offset: 0,
                length: 417,
                duration: f64::NAN,
            }],
            duration_sum: f64::NAN,
        };
        assert!(matches!(
            broken.total_duration(),
            Err(Mp3Error::UnusableDuration)
        ));
    }

    #[test]
    fn whole_seconds_rounds_down() {
        // 100 frames at 1152/44100 s each is ~2.612 s.
        let frame = mpeg1_frame(false);
        let mut buffer = Vec::new();
        for _ in 0..100 {
            buffer.extend_from_slice(&frame);
        }

        let scan = scan_frames(&buffer);
        assert_eq!(scan.whole_seconds().unwrap(), 2);
    }

    #[test]
    fn likely_mp3_checks_tag_or_sync() {
        assert!(looks_like_mp3(b"ID3\x04\x00\x00\x00\x00\x00\x00"));
        assert!(looks_like_mp3(&[0xFF, 0xFB, 0x90, 0x00]));
        assert!(!looks_like_mp3(b"RIFF1234"));
        assert!(!looks_like_mp3(&[0xFF, 0x1B, 0x90, 0x00]));
        assert!(!looks_like_mp3(b"ID3"));
    }
}
