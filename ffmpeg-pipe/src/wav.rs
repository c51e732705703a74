//! Backpatches the RIFF/WAVE size fields of audio streamed through a pipe.
//!
//! ffmpeg cannot seek back on a non-seekable output, so both size fields
//! keep placeholder values. With `-bitexact` there are no LIST chunks and
//! the canonical 44-byte header layout holds:
//!
//! ```text
//! [0,4)   "RIFF"
//! [4,8)   u32 LE  total length - 8        <- patched
//! [8,12)  "WAVE"
//! [12,36) "fmt " chunk
//! [36,40) "data"
//! [40,44) u32 LE  total length - 44       <- patched
//! [44,..) samples
//! ```

pub const WAV_HEADER_LEN: usize = 44;

const RIFF_SIZE_OFFSET: usize = 4;
const DATA_SIZE_OFFSET: usize = 40;

/// The two size fields as currently stored in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSizes {
    pub riff_size: u32,
    pub data_size: u32,
}

impl WavSizes {
    pub fn read(buf: &[u8]) -> Option<Self> {
        if buf.len() < WAV_HEADER_LEN {
            return None;
        }
        Some(Self {
            riff_size: read_u32_le(buf, RIFF_SIZE_OFFSET),
            data_size: read_u32_le(buf, DATA_SIZE_OFFSET),
        })
    }
}

/// Writes `len - 8` at offset 4 and `len - 44` at offset 40.
///
/// # Panics
///
/// If the buffer is shorter than the canonical header, too large for 32-bit
/// size fields, or its tags are not at the canonical offsets. Any of these
/// means the encoder configuration changed and offset 40 is no longer the
/// data size, so writing would corrupt the file.
pub fn patch_wav_header(buf: &mut [u8]) {
    let len = buf.len();
    assert!(
        len >= WAV_HEADER_LEN,
        "wav buffer is {} bytes, shorter than the {}-byte header",
        len,
        WAV_HEADER_LEN
    );
    assert!(
        len - 8 <= u32::MAX as usize,
        "wav buffer of {} bytes does not fit 32-bit size fields",
        len
    );
    assert!(
        &buf[0..4] == b"RIFF" && &buf[8..12] == b"WAVE" && &buf[36..40] == b"data",
        "wav header is not canonical (extra chunks before \"data\"?)"
    );

    buf[RIFF_SIZE_OFFSET..RIFF_SIZE_OFFSET + 4].copy_from_slice(&((len - 8) as u32).to_le_bytes());
    buf[DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4]
        .copy_from_slice(&((len - WAV_HEADER_LEN) as u32).to_le_bytes());
}

fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Header as ffmpeg writes it to a pipe: sizes left at 0xFFFFFFFF.
    fn streamed_wav(samples: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WAV_HEADER_LEN + samples);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&44_100u32.to_le_bytes());
        buf.extend_from_slice(&(44_100u32 * 4).to_le_bytes());
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        buf.extend((0..samples).map(|i| i as u8));
        buf
    }

    #[test]
    fn test_patch_sets_both_sizes() {
        let mut buf = streamed_wav(1000);
        patch_wav_header(&mut buf);

        let sizes = WavSizes::read(&buf).unwrap();
        assert_eq!(sizes.riff_size as usize, buf.len() - 8);
        assert_eq!(sizes.data_size, 1000);
    }

    #[test]
    fn test_patch_header_only() {
        let mut buf = streamed_wav(0);
        patch_wav_header(&mut buf);

        assert_eq!(
            WavSizes::read(&buf),
            Some(WavSizes {
                riff_size: 36,
                data_size: 0
            })
        );
    }

    #[test]
    fn test_patch_is_idempotent() {
        let mut buf = streamed_wav(321);
        patch_wav_header(&mut buf);
        let once = buf.clone();
        patch_wav_header(&mut buf);

        assert_eq!(buf, once);
    }

    #[test]
    fn test_patch_leaves_other_bytes_alone() {
        let original = streamed_wav(64);
        let mut buf = original.clone();
        patch_wav_header(&mut buf);

        for (i, (a, b)) in original.iter().zip(&buf).enumerate() {
            if !(4..8).contains(&i) && !(40..44).contains(&i) {
                assert_eq!(a, b, "byte {} changed", i);
            }
        }
    }

    #[test]
    #[should_panic(expected = "shorter than the 44-byte header")]
    fn test_undersized_buffer_panics() {
        let mut buf = streamed_wav(0);
        buf.truncate(43);
        patch_wav_header(&mut buf);
    }

    #[test]
    #[should_panic(expected = "not canonical")]
    fn test_extra_chunk_panics() {
        // A LIST chunk before "data" shifts the data size away from offset 40.
        let mut buf = streamed_wav(0);
        let mut list = b"LIST".to_vec();
        list.extend_from_slice(&4u32.to_le_bytes());
        list.extend_from_slice(b"INFO");
        let tail = buf.split_off(36);
        buf.extend(list);
        buf.extend(tail);
        patch_wav_header(&mut buf);
    }

    #[test]
    fn test_read_sizes_short_buffer() {
        assert!(WavSizes::read(&[0u8; 10]).is_none());
    }
}
