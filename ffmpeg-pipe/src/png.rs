//! Splits a concatenated PNG stream (ffmpeg `image2pipe`) into one buffer per
//! image.
//!
//! Only the chunk framing is interpreted: each chunk is a 4-byte big-endian
//! length, a 4-byte type, `length` payload bytes and a 4-byte CRC. Payloads
//! and CRCs are copied verbatim and never validated, so payload bytes that
//! happen to look like a signature cannot shift the cursor.

use std::{fmt, io::Read};

use bytes::Bytes;

use crate::error::{PipeError, Result};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Chunk type closing one image.
pub const IEND: [u8; 4] = *b"IEND";

/// One complete image, signature through the `IEND` chunk inclusive.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRecord(Bytes);

impl ImageRecord {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ImageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageRecord {{ len: {} }}", self.0.len())
    }
}

/// Lazy demuxer over any byte source. Yields records in stream order and
/// stops for good after the end of the stream or the first error.
pub struct PngStreamDemuxer<R> {
    reader: R,
    done: bool,
}

impl<R: Read> PngStreamDemuxer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    fn read_record(&mut self) -> Result<Option<ImageRecord>> {
        let mut signature = [0u8; 8];
        let n = read_up_to(&mut self.reader, &mut signature)?;
        if n < signature.len() || signature != PNG_SIGNATURE {
            // no further signature: natural end of the sequence
            return Ok(None);
        }

        let mut record = Vec::with_capacity(8 * 1024);
        record.extend_from_slice(&signature);

        loop {
            let mut header = [0u8; 8];
            let n = read_up_to(&mut self.reader, &mut header)?;
            if n < header.len() {
                return Err(PipeError::StreamTruncated {
                    needed: header.len() as u64,
                    available: n as u64,
                });
            }
            record.extend_from_slice(&header);

            let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            let chunk_type = [header[4], header[5], header[6], header[7]];

            // payload + CRC
            let needed = u64::from(length) + 4;
            let copied = (&mut self.reader).take(needed).read_to_end(&mut record)? as u64;
            if copied < needed {
                return Err(PipeError::StreamTruncated {
                    needed,
                    available: copied,
                });
            }

            if chunk_type == IEND {
                break;
            }
        }

        Ok(Some(ImageRecord(Bytes::from(record))))
    }
}

impl<R: Read> Iterator for PngStreamDemuxer<R> {
    type Item = Result<ImageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for PngStreamDemuxer<R> {}

/// Eagerly demuxes a fully buffered stream.
pub fn demux_png_stream(stream: &[u8]) -> Result<Vec<ImageRecord>> {
    PngStreamDemuxer::new(stream).collect()
}

/// Fills as much of `buf` as the reader can provide; returns the count read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
