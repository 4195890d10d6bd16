use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::codec::{self, Codec, Direction, Format};
use crate::error::{Result, StreamError};
use crate::stream::{shared, ByteStream, Shared, Sink, StreamState, Subscribers};

/// Push-driven decompressor stage.
///
/// Compressed segments written in come back out of the subscribed sinks as
/// decoded segments. There is no flush concept on this side: a complete
/// input stream has surfaced all of its output by the time the last write
/// returns. `end` still drains the codec's partially filled output window
/// first, so a truncated input does not silently swallow decodable bytes.
pub struct DecompressorStream {
    codec: Box<dyn Codec>,
    state: StreamState,
    subscribers: Subscribers,
    upstream: Option<Weak<RefCell<dyn ByteStream>>>,
}

impl DecompressorStream {
    /// `level` is ignored by the decompression engine but accepted and
    /// bounds-checked, keeping the two constructors symmetric.
    pub fn new(format: Format, level: u32, buffer_size: usize) -> Result<Self> {
        let codec = codec::new_codec(Direction::Decompress, format, level, buffer_size)?;
        Ok(Self {
            codec,
            state: StreamState::Open,
            subscribers: Subscribers::default(),
            upstream: None,
        })
    }

    /// See [`CompressorStream::attach`](crate::CompressorStream::attach).
    pub fn attach<S>(
        source: &Shared<S>,
        format: Format,
        level: u32,
        buffer_size: usize,
    ) -> Result<Shared<Self>>
    where
        S: ByteStream + 'static,
    {
        if !source.borrow().readable() {
            return Err(StreamError::InvalidArgument(
                "source stream is not readable".to_string(),
            ));
        }
        let stream = shared(Self::new(format, level, buffer_size)?);
        let source_dyn: Shared<dyn ByteStream> = source.clone();
        stream.borrow_mut().upstream = Some(Rc::downgrade(&source_dyn));
        source.borrow_mut().subscribe(stream.clone());
        Ok(stream)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn upstream(&self) -> Option<Shared<dyn ByteStream>> {
        self.upstream.as_ref()?.upgrade()
    }

    fn step_codec(&mut self) -> Result<bool> {
        match self.codec.step() {
            Ok(more) => Ok(more),
            Err(err) => {
                self.state = StreamState::Closed;
                Err(err.into())
            }
        }
    }

    fn drain(&mut self) -> Result<()> {
        while self.step_codec()? {
            let segment = self.codec.read();
            if !segment.is_empty() {
                self.subscribers.data(&segment)?;
            }
        }
        Ok(())
    }
}

impl ByteStream for DecompressorStream {
    fn readable(&self) -> bool {
        self.state == StreamState::Open
    }

    fn writable(&self) -> bool {
        self.state == StreamState::Open
    }

    fn write(&mut self, chunk: &[u8]) -> Result<()> {
        if self.state != StreamState::Open {
            return Err(StreamError::InvalidState(format!(
                "write on {:?} stream",
                self.state
            )));
        }
        self.codec.write(chunk);
        self.drain()
    }

    fn end(&mut self) -> Result<()> {
        if self.state != StreamState::Open {
            return Ok(());
        }
        // A partially filled output window still holds decoded bytes when
        // the input was cut short of its end marker; hand them over first.
        self.drain()?;
        let tail = self.codec.read();
        if !tail.is_empty() {
            trace!(bytes = tail.len(), "draining buffered tail at end of stream");
            self.subscribers.data(&tail)?;
        }
        self.state = StreamState::Ended;
        self.subscribers.end()
    }

    fn destroy(&mut self) {
        trace!(state = ?self.state, "decompressor destroyed");
        self.state = StreamState::Closed;
        self.subscribers.close();
    }

    fn subscribe(&mut self, consumer: Shared<dyn Sink>) {
        self.subscribers.add(consumer);
    }
}

impl Sink for DecompressorStream {
    fn on_data(&mut self, chunk: &[u8]) -> Result<()> {
        self.write(chunk)
    }

    fn on_end(&mut self) -> Result<()> {
        self.end()
    }

    fn on_close(&mut self) {
        self.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DEFAULT_LEVEL;
    use crate::compress::CompressorStream;
    use crate::oneshot;
    use crate::stream::MemorySink;

    #[test]
    fn test_chunked_round_trip() {
        // 10,000 bytes through a small-window compressor in three uneven
        // writes, then every emitted segment fed to a decompressor in
        // emission order.
        let data = vec![b'A'; 10_000];
        let mut c = CompressorStream::new(Format::Gzip, DEFAULT_LEVEL, 64).unwrap();
        let compressed = shared(MemorySink::new());
        c.subscribe(compressed.clone());
        c.write(&data[..3_333]).unwrap();
        c.write(&data[3_333..7_100]).unwrap();
        c.write(&data[7_100..]).unwrap();
        c.end().unwrap();

        let mut d = DecompressorStream::new(Format::Gzip, DEFAULT_LEVEL, 64).unwrap();
        let plain = shared(MemorySink::new());
        d.subscribe(plain.clone());
        for chunk in &compressed.borrow().chunks {
            d.write(chunk).unwrap();
        }
        d.end().unwrap();

        let plain = plain.borrow();
        assert_eq!(plain.data(), data);
        assert_eq!(plain.ends, 1);
    }

    #[test]
    fn test_pipeline_chaining() {
        // compressor -> decompressor -> sink, wired with subscribe only.
        let data = b"pipe stages compose without manual buffering".repeat(200);
        let mut c = CompressorStream::new(Format::Zlib, DEFAULT_LEVEL, 512).unwrap();
        let d = shared(DecompressorStream::new(Format::Zlib, DEFAULT_LEVEL, 512).unwrap());
        let sink = shared(MemorySink::new());
        d.borrow_mut().subscribe(sink.clone());
        c.subscribe(d.clone());

        c.write(&data).unwrap();
        c.end().unwrap();

        let sink = sink.borrow();
        assert_eq!(sink.data(), data);
        assert_eq!(sink.ends, 1);
        assert_eq!(d.borrow().state(), StreamState::Ended);
    }

    #[test]
    fn test_corrupt_input_closes_stream() {
        let mut d = DecompressorStream::new(Format::Gzip, DEFAULT_LEVEL, 4096).unwrap();
        let sink = shared(MemorySink::new());
        d.subscribe(sink.clone());
        let err = d.write(b"definitely not a gzip member").unwrap_err();
        assert!(matches!(err, StreamError::Codec(_)));
        assert_eq!(d.state(), StreamState::Closed);
        assert!(sink.borrow().chunks.is_empty());
        assert!(matches!(
            d.write(b"more"),
            Err(StreamError::InvalidState(_))
        ));
    }

    #[test]
    fn test_end_drains_buffered_tail_of_truncated_input() {
        let data = vec![b'B'; 10_000];
        let compressed = oneshot::compress(&data, Format::Raw, DEFAULT_LEVEL).unwrap();

        // Withhold the end of the stream. The decoded bytes sit in the
        // codec's window because it never filled and never saw the end
        // marker; end() must still hand them over.
        let cut = compressed.len() - 5;
        let mut d = DecompressorStream::new(Format::Raw, DEFAULT_LEVEL, 64 * 1024).unwrap();
        let sink = shared(MemorySink::new());
        d.subscribe(sink.clone());
        d.write(&compressed[..cut]).unwrap();
        assert!(sink.borrow().chunks.is_empty());
        d.end().unwrap();

        let sink = sink.borrow();
        assert!(!sink.data().is_empty());
        assert_eq!(sink.ends, 1);
        assert!(data.starts_with(&sink.data()));
    }

    #[test]
    fn test_trailing_garbage_after_member_is_ignored() {
        let mut compressed = oneshot::compress(b"payload", Format::Gzip, DEFAULT_LEVEL).unwrap();
        compressed.extend_from_slice(b"\x00\x01\x02\x03");

        let mut d = DecompressorStream::new(Format::Gzip, DEFAULT_LEVEL, 4096).unwrap();
        let sink = shared(MemorySink::new());
        d.subscribe(sink.clone());
        d.write(&compressed).unwrap();
        d.end().unwrap();
        assert_eq!(sink.borrow().data(), b"payload");
    }
}
