//! Frame transports between the caller and an isolation domain.
//!
//! - [`FramedChannel`]: length-prefixed frames (u64 little endian) over a
//!   byte stream, used on the pipes of a process boundary
//! - [`ThreadChannel`]: whole frames over in-process channels, used by the
//!   thread boundary

use crate::HostError;
use crate::protocol::{decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};

/// Upper bound on a single frame; larger length prefixes are rejected.
pub const MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

/// A bidirectional, frame-oriented link.
pub trait Channel: Send {
    fn send(&mut self, frame: &[u8]) -> Result<(), HostError>;
    fn recv(&mut self) -> Result<Vec<u8>, HostError>;
}

pub fn send_message<C: Channel + ?Sized, T: Serialize>(
    channel: &mut C,
    message: &T,
) -> Result<(), HostError> {
    channel.send(&encode(message)?)
}

pub fn recv_message<C: Channel + ?Sized, T: DeserializeOwned>(
    channel: &mut C,
) -> Result<T, HostError> {
    decode(&channel.recv()?)
}

/// Length-prefixed frames over a reader/writer pair.
pub struct FramedChannel<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> FramedChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Read + Send, W: Write + Send> Channel for FramedChannel<R, W> {
    fn send(&mut self, frame: &[u8]) -> Result<(), HostError> {
        let len = (frame.len() as u64).to_le_bytes();
        self.writer.write_all(&len)?;
        self.writer.write_all(frame)?;
        self.writer.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>, HostError> {
        let mut len_bytes = [0u8; 8];
        self.reader.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        if len > MAX_FRAME_LEN {
            return Err(HostError::Protocol(format!(
                "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
            )));
        }
        let mut frame = vec![0u8; len as usize];
        self.reader.read_exact(&mut frame)?;
        Ok(frame)
    }
}

/// One end of an in-process frame link.
pub struct ThreadChannel {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ThreadChannel {
    /// Two connected ends.
    pub fn pair() -> (ThreadChannel, ThreadChannel) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            ThreadChannel { tx: a_tx, rx: a_rx },
            ThreadChannel { tx: b_tx, rx: b_rx },
        )
    }
}

impl Channel for ThreadChannel {
    fn send(&mut self, frame: &[u8]) -> Result<(), HostError> {
        self.tx.send(frame.to_vec()).map_err(|_| hung_up())
    }

    fn recv(&mut self) -> Result<Vec<u8>, HostError> {
        self.rx.recv().map_err(|_| hung_up())
    }
}

fn hung_up() -> HostError {
    HostError::Transport(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "isolation domain peer hung up",
    ))
}
