use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::{Codec, Direction};
use crate::error::CodecError;

enum Engine {
    Deflate(Compress),
    Inflate(Decompress),
}

/// Raw and zlib DEFLATE over flate2's stateful engines.
///
/// The output window is a fixed `buffer_size` allocation that fills across
/// steps; `read` takes whatever has accumulated and resets it. Input bytes
/// not consumed by the engine stay in `input` for the next step.
pub struct FlateCodec {
    engine: Engine,
    input: Vec<u8>,
    out: Vec<u8>,
    out_len: usize,
    buffer_size: usize,
    finished: bool,
}

impl FlateCodec {
    pub fn new(direction: Direction, zlib_header: bool, level: u32, buffer_size: usize) -> Self {
        let engine = match direction {
            Direction::Compress => {
                Engine::Deflate(Compress::new(Compression::new(level), zlib_header))
            }
            Direction::Decompress => Engine::Inflate(Decompress::new(zlib_header)),
        };

        Self {
            engine,
            input: Vec::new(),
            out: vec![0u8; buffer_size],
            out_len: 0,
            buffer_size,
            finished: false,
        }
    }

    pub(crate) fn finished(&self) -> bool {
        self.finished
    }

    /// Input left over after the engine reached stream end. The engine stops
    /// consuming at the end marker, so trailing bytes belong to the caller.
    pub(crate) fn take_input(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.input)
    }
}

impl Codec for FlateCodec {
    fn write(&mut self, input: &[u8]) {
        self.input.extend_from_slice(input);
    }

    fn step(&mut self) -> Result<bool, CodecError> {
        match &mut self.engine {
            Engine::Deflate(c) => {
                let before_in = c.total_in();
                let before_out = c.total_out();
                c.compress(
                    &self.input,
                    &mut self.out[self.out_len..],
                    FlushCompress::None,
                )
                .map_err(|e| CodecError::Corrupt(e.to_string()))?;
                let consumed = (c.total_in() - before_in) as usize;
                self.input.drain(..consumed);
                self.out_len += (c.total_out() - before_out) as usize;
                Ok(self.out_len == self.buffer_size)
            }
            Engine::Inflate(d) => {
                if self.finished {
                    return Ok(false);
                }
                let before_in = d.total_in();
                let before_out = d.total_out();
                let status = d
                    .decompress(
                        &self.input,
                        &mut self.out[self.out_len..],
                        FlushDecompress::None,
                    )
                    .map_err(|e| CodecError::Corrupt(e.to_string()))?;
                let consumed = (d.total_in() - before_in) as usize;
                self.input.drain(..consumed);
                self.out_len += (d.total_out() - before_out) as usize;
                if status == Status::StreamEnd {
                    // Surface the final partial window right away.
                    self.finished = true;
                    return Ok(true);
                }
                Ok(self.out_len == self.buffer_size)
            }
        }
    }

    fn flush_step(&mut self) -> Result<bool, CodecError> {
        match &mut self.engine {
            Engine::Deflate(c) => {
                if self.finished {
                    return Ok(false);
                }
                let before_in = c.total_in();
                let before_out = c.total_out();
                let status = c
                    .compress(
                        &self.input,
                        &mut self.out[self.out_len..],
                        FlushCompress::Finish,
                    )
                    .map_err(|e| CodecError::Corrupt(e.to_string()))?;
                let consumed = (c.total_in() - before_in) as usize;
                self.input.drain(..consumed);
                self.out_len += (c.total_out() - before_out) as usize;
                if status == Status::StreamEnd {
                    self.finished = true;
                }
                // True until stream end has been reached, so the caller
                // reads the final partial window on the last iteration.
                Ok(true)
            }
            Engine::Inflate(_) => Ok(false),
        }
    }

    fn read(&mut self) -> Vec<u8> {
        let chunk = self.out[..self.out_len].to_vec();
        self.out_len = 0;
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut FlateCodec, out: &mut Vec<u8>) {
        while codec.step().unwrap() {
            out.extend(codec.read());
        }
    }

    fn flush(codec: &mut FlateCodec, out: &mut Vec<u8>) {
        while codec.flush_step().unwrap() {
            out.extend(codec.read());
        }
    }

    fn roundtrip(zlib_header: bool, data: &[u8], buffer_size: usize) -> Vec<u8> {
        let mut c = FlateCodec::new(Direction::Compress, zlib_header, 6, buffer_size);
        let mut compressed = Vec::new();
        c.write(data);
        drain(&mut c, &mut compressed);
        flush(&mut c, &mut compressed);

        let mut d = FlateCodec::new(Direction::Decompress, zlib_header, 6, buffer_size);
        let mut plain = Vec::new();
        d.write(&compressed);
        drain(&mut d, &mut plain);
        plain.extend(d.read());
        plain
    }

    #[test]
    fn test_raw_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        assert_eq!(roundtrip(false, &data, 64), data);
        assert_eq!(roundtrip(false, &data, 64 * 1024), data);
    }

    #[test]
    fn test_zlib_roundtrip() {
        let data = b"hello zlib".to_vec();
        assert_eq!(roundtrip(true, &data, 4096), data);
    }

    #[test]
    fn test_small_write_buffered_until_flush() {
        // Three bytes with a large window never fill it, so stepping
        // produces nothing until the flush forces the stream out.
        let mut c = FlateCodec::new(Direction::Compress, true, 6, 64 * 1024);
        c.write(b"abc");
        let mut compressed = Vec::new();
        drain(&mut c, &mut compressed);
        assert!(compressed.is_empty());
        flush(&mut c, &mut compressed);
        assert!(!compressed.is_empty());

        let mut d = FlateCodec::new(Direction::Decompress, true, 6, 64 * 1024);
        d.write(&compressed);
        let mut plain = Vec::new();
        drain(&mut d, &mut plain);
        plain.extend(d.read());
        assert_eq!(plain, b"abc");
    }

    #[test]
    fn test_corrupt_zlib_input() {
        let mut d = FlateCodec::new(Direction::Decompress, true, 6, 4096);
        d.write(b"\xff\xff\xff\xff not a zlib stream");
        let mut err = None;
        loop {
            match d.step() {
                Ok(true) => {
                    d.read();
                }
                Ok(false) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert!(matches!(err, Some(CodecError::Corrupt(_))));
    }

    #[test]
    fn test_trailing_input_preserved_after_stream_end() {
        let mut c = FlateCodec::new(Direction::Compress, false, 6, 4096);
        c.write(b"payload");
        let mut compressed = Vec::new();
        while c.step().unwrap() {
            compressed.extend(c.read());
        }
        while c.flush_step().unwrap() {
            compressed.extend(c.read());
        }
        compressed.extend_from_slice(b"TRAILER");

        let mut d = FlateCodec::new(Direction::Decompress, false, 6, 4096);
        d.write(&compressed);
        let mut plain = Vec::new();
        while d.step().unwrap() {
            plain.extend(d.read());
        }
        plain.extend(d.read());
        assert_eq!(plain, b"payload");
        assert!(d.finished());
        assert_eq!(d.take_input(), b"TRAILER");
    }
}
