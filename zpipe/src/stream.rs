use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Result, StreamError};

/// Shared handle for single-threaded pipelines.
pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Ended,
    Closed,
}

/// Downstream half of the pipe protocol: ordered `data` segments, then at
/// most one `end`, with `close` possible at any point. A failing sink
/// aborts the drain that invoked it.
pub trait Sink {
    fn on_data(&mut self, chunk: &[u8]) -> Result<()>;
    fn on_end(&mut self) -> Result<()>;
    fn on_close(&mut self);
}

/// A push-driven byte stream stage.
pub trait ByteStream {
    fn readable(&self) -> bool;
    fn writable(&self) -> bool;
    fn write(&mut self, chunk: &[u8]) -> Result<()>;
    fn end(&mut self) -> Result<()>;
    fn destroy(&mut self);
    fn subscribe(&mut self, consumer: Shared<dyn Sink>);
}

/// Ordered fan-out to subscribed sinks.
#[derive(Default)]
pub(crate) struct Subscribers {
    sinks: Vec<Shared<dyn Sink>>,
}

impl Subscribers {
    pub fn add(&mut self, sink: Shared<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn data(&self, chunk: &[u8]) -> Result<()> {
        for sink in &self.sinks {
            sink.borrow_mut().on_data(chunk)?;
        }
        Ok(())
    }

    pub fn end(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.borrow_mut().on_end()?;
        }
        Ok(())
    }

    pub fn close(&self) {
        for sink in &self.sinks {
            sink.borrow_mut().on_close();
        }
    }
}

/// Identity stage. Useful as the head of a pipeline when the producer is
/// plain code rather than another stream.
pub struct PassThrough {
    state: StreamState,
    subscribers: Subscribers,
}

impl PassThrough {
    pub fn new() -> Self {
        Self {
            state: StreamState::Open,
            subscribers: Subscribers::default(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStream for PassThrough {
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
        self.subscribers.data(chunk)
    }

    fn end(&mut self) -> Result<()> {
        if self.state != StreamState::Open {
            return Ok(());
        }
        self.state = StreamState::Ended;
        self.subscribers.end()
    }

    fn destroy(&mut self) {
        self.state = StreamState::Closed;
        self.subscribers.close();
    }

    fn subscribe(&mut self, consumer: Shared<dyn Sink>) {
        self.subscribers.add(consumer);
    }
}

/// A stage can sit downstream of another: data feeds its write side, end
/// and close follow its own lifecycle operations.
impl Sink for PassThrough {
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

/// Terminal sink writing into anything `io::Write`. Flushes on `end`.
pub struct WriteSink<W: Write> {
    w: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }
}

impl<W: Write> Sink for WriteSink<W> {
    fn on_data(&mut self, chunk: &[u8]) -> Result<()> {
        self.w.write_all(chunk)?;
        Ok(())
    }

    fn on_end(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }

    fn on_close(&mut self) {
        trace!("sink closed");
    }
}

/// Collecting sink. Records each segment and counts lifecycle events.
#[derive(Default)]
pub struct MemorySink {
    pub chunks: Vec<Vec<u8>>,
    pub ends: u32,
    pub closes: u32,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

impl Sink for MemorySink {
    fn on_data(&mut self, chunk: &[u8]) -> Result<()> {
        self.chunks.push(chunk.to_vec());
        Ok(())
    }

    fn on_end(&mut self) -> Result<()> {
        self.ends += 1;
        Ok(())
    }

    fn on_close(&mut self) {
        self.closes += 1;
    }
}
