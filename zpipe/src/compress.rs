use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::codec::{self, Codec, Direction, Format};
use crate::error::{Result, StreamError};
use crate::stream::{shared, ByteStream, Shared, Sink, StreamState, Subscribers};

/// Push-driven compressor stage.
///
/// Raw bytes written in come back out of the subscribed sinks as compressed
/// segments, in input order. `end` drains everything still buffered in the
/// codec before the final `end` notification, so no written byte is lost.
pub struct CompressorStream {
    codec: Box<dyn Codec>,
    state: StreamState,
    subscribers: Subscribers,
    upstream: Option<Weak<RefCell<dyn ByteStream>>>,
}

impl CompressorStream {
    pub fn new(format: Format, level: u32, buffer_size: usize) -> Result<Self> {
        let codec = codec::new_codec(Direction::Compress, format, level, buffer_size)?;
        Ok(Self {
            codec,
            state: StreamState::Open,
            subscribers: Subscribers::default(),
            upstream: None,
        })
    }

    /// Builds a compressor fed by `source`: the new stage subscribes
    /// itself to the source and keeps a non-owning reference back to it.
    /// Fails when the source is not readable.
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

    /// The attached source, if it is still alive.
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
}

impl ByteStream for CompressorStream {
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
        while self.step_codec()? {
            let segment = self.codec.read();
            if !segment.is_empty() {
                self.subscribers.data(&segment)?;
            }
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.state != StreamState::Open {
            // Tolerate pipe teardown races.
            return Ok(());
        }
        loop {
            let more = match self.codec.flush_step() {
                Ok(more) => more,
                Err(err) => {
                    self.state = StreamState::Closed;
                    return Err(err.into());
                }
            };
            if !more {
                break;
            }
            let segment = self.codec.read();
            if !segment.is_empty() {
                self.subscribers.data(&segment)?;
            }
        }
        self.state = StreamState::Ended;
        trace!("compressor flushed and ended");
        self.subscribers.end()
    }

    fn destroy(&mut self) {
        trace!(state = ?self.state, "compressor destroyed");
        self.state = StreamState::Closed;
        self.subscribers.close();
    }

    fn subscribe(&mut self, consumer: Shared<dyn Sink>) {
        self.subscribers.add(consumer);
    }
}

impl Sink for CompressorStream {
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
