use crc32fast::Hasher;

use super::flate::FlateCodec;
use super::{Codec, Direction};
use crate::error::CodecError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;
const HEADER_LEN: usize = 10;

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0xe0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body,
    Trailer,
    Done,
}

/// RFC 1952 gzip member framing around a raw DEFLATE codec.
///
/// Compression prepends the 10-byte header to the first output segment and
/// appends the CRC32/ISIZE trailer once the inner codec has fully flushed.
/// Decompression parses the header incrementally (optional fields are
/// skipped), inflates the body, and verifies the trailer. Bytes after the
/// first member are ignored.
pub struct GzipCodec {
    direction: Direction,
    inner: FlateCodec,
    phase: Phase,
    /// Header bytes being collected (decompression) before the body starts.
    pending: Vec<u8>,
    /// Trailer bytes: collected on decompression, staged on compression.
    trailer: Vec<u8>,
    header_sent: bool,
    crc: Hasher,
    raw_len: u64,
    finished: bool,
}

impl GzipCodec {
    pub fn new(direction: Direction, level: u32, buffer_size: usize) -> Self {
        Self {
            direction,
            inner: FlateCodec::new(direction, false, level, buffer_size),
            phase: match direction {
                Direction::Compress => Phase::Body,
                Direction::Decompress => Phase::Header,
            },
            pending: Vec::new(),
            trailer: Vec::new(),
            header_sent: false,
            crc: Hasher::new(),
            raw_len: 0,
            finished: false,
        }
    }

    fn header_bytes() -> [u8; HEADER_LEN] {
        // MTIME zero, no flags, XFL zero, OS unknown.
        [GZIP_MAGIC[0], GZIP_MAGIC[1], METHOD_DEFLATE, 0, 0, 0, 0, 0, 0, 0xff]
    }

    fn check_trailer(&mut self) -> Result<(), CodecError> {
        if self.trailer.len() < 8 {
            // Wait for the rest.
            return Ok(());
        }
        let crc = u32::from_le_bytes([
            self.trailer[0],
            self.trailer[1],
            self.trailer[2],
            self.trailer[3],
        ]);
        let isize = u32::from_le_bytes([
            self.trailer[4],
            self.trailer[5],
            self.trailer[6],
            self.trailer[7],
        ]);
        if crc != self.crc.clone().finalize() {
            return Err(CodecError::Corrupt("gzip checksum mismatch".to_string()));
        }
        if isize != self.raw_len as u32 {
            return Err(CodecError::Corrupt("gzip length mismatch".to_string()));
        }
        self.phase = Phase::Done;
        self.finished = true;
        Ok(())
    }
}

impl Codec for GzipCodec {
    fn write(&mut self, input: &[u8]) {
        match self.direction {
            Direction::Compress => {
                self.crc.update(input);
                self.raw_len += input.len() as u64;
                self.inner.write(input);
            }
            Direction::Decompress => match self.phase {
                Phase::Header => self.pending.extend_from_slice(input),
                Phase::Body => self.inner.write(input),
                Phase::Trailer => self.trailer.extend_from_slice(input),
                Phase::Done => {}
            },
        }
    }

    fn step(&mut self) -> Result<bool, CodecError> {
        match self.direction {
            Direction::Compress => self.inner.step(),
            Direction::Decompress => match self.phase {
                Phase::Header => {
                    let consumed = match parse_header(&self.pending)? {
                        Some(n) => n,
                        None => return Ok(false),
                    };
                    self.inner.write(&self.pending[consumed..]);
                    self.pending.clear();
                    self.phase = Phase::Body;
                    self.step()
                }
                Phase::Body => {
                    let more = self.inner.step()?;
                    if self.inner.finished() {
                        let leftover = self.inner.take_input();
                        self.trailer.extend_from_slice(&leftover);
                        self.phase = Phase::Trailer;
                    }
                    Ok(more)
                }
                Phase::Trailer => {
                    self.check_trailer()?;
                    Ok(false)
                }
                Phase::Done => Ok(false),
            },
        }
    }

    fn flush_step(&mut self) -> Result<bool, CodecError> {
        match self.direction {
            Direction::Compress => {
                if self.finished {
                    return Ok(false);
                }
                if self.inner.flush_step()? {
                    return Ok(true);
                }
                // Inner stream fully terminated; stage the trailer.
                let crc = self.crc.clone().finalize();
                self.trailer.extend_from_slice(&crc.to_le_bytes());
                self.trailer
                    .extend_from_slice(&(self.raw_len as u32).to_le_bytes());
                self.finished = true;
                Ok(true)
            }
            Direction::Decompress => Ok(false),
        }
    }

    fn read(&mut self) -> Vec<u8> {
        match self.direction {
            Direction::Compress => {
                let mut chunk = Vec::new();
                if !self.header_sent {
                    chunk.extend_from_slice(&Self::header_bytes());
                    self.header_sent = true;
                }
                chunk.extend(self.inner.read());
                chunk.append(&mut self.trailer);
                chunk
            }
            Direction::Decompress => {
                let chunk = self.inner.read();
                self.crc.update(&chunk);
                self.raw_len += chunk.len() as u64;
                chunk
            }
        }
    }
}

/// Parses a gzip member header from the start of `buf`. Returns the header
/// length once the whole header is present, `None` while more bytes are
/// needed.
fn parse_header(buf: &[u8]) -> Result<Option<usize>, CodecError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    if buf[0..2] != GZIP_MAGIC {
        return Err(CodecError::Corrupt("bad gzip magic".to_string()));
    }
    if buf[2] != METHOD_DEFLATE {
        return Err(CodecError::Corrupt(format!(
            "unknown gzip compression method {}",
            buf[2]
        )));
    }
    let flags = buf[3];
    if flags & FRESERVED != 0 {
        return Err(CodecError::Corrupt("reserved gzip header flags set".to_string()));
    }

    let mut pos = HEADER_LEN;
    if flags & FEXTRA != 0 {
        if buf.len() < pos + 2 {
            return Ok(None);
        }
        let xlen = u16::from_le_bytes([buf[pos], buf[pos + 1]]) as usize;
        pos += 2 + xlen;
        if buf.len() < pos {
            return Ok(None);
        }
    }
    if flags & FNAME != 0 {
        match buf[pos..].iter().position(|&b| b == 0) {
            Some(i) => pos += i + 1,
            None => return Ok(None),
        }
    }
    if flags & FCOMMENT != 0 {
        match buf[pos..].iter().position(|&b| b == 0) {
            Some(i) => pos += i + 1,
            None => return Ok(None),
        }
    }
    if flags & FHCRC != 0 {
        pos += 2;
        if buf.len() < pos {
            return Ok(None);
        }
    }

    Ok(Some(pos))
}
