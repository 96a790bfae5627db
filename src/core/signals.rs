//! Self-pipe for asynchronous signals
//!
//! SIGCHLD and SIGWINCH handlers only write a tag byte into a non-blocking
//! socket pair. The event loop waits on the read end and interprets the
//! tags outside signal context.

use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::net::UnixStream;

use signal_hook::consts::{SIGCHLD, SIGWINCH};
use signal_hook::SigId;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Failed to create self-pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("Failed to register handler for signal {signal}: {source}")]
    Register {
        signal: libc::c_int,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read self-pipe: {0}")]
    Read(#[source] io::Error),
}

/// What a byte on the self-pipe means
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalTag {
    /// SIGCHLD: the child changed state, possibly exited
    ChildExited,
    /// SIGWINCH: the terminal was resized
    Resized,
}

impl SignalTag {
    pub const fn byte(self) -> u8 {
        match self {
            SignalTag::ChildExited => b'x',
            SignalTag::Resized => b'r',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'x' => Some(SignalTag::ChildExited),
            b'r' => Some(SignalTag::Resized),
            _ => None,
        }
    }
}

pub struct SelfPipe {
    reader: UnixStream,
    writer: UnixStream,
    handlers: Vec<SigId>,
}

impl SelfPipe {
    /// Create the pipe and hook SIGCHLD and SIGWINCH to it
    pub fn install() -> Result<Self, SignalError> {
        let (reader, writer) = UnixStream::pair().map_err(SignalError::Pipe)?;
        reader.set_nonblocking(true).map_err(SignalError::Pipe)?;
        writer.set_nonblocking(true).map_err(SignalError::Pipe)?;

        let mut pipe = Self {
            reader,
            writer,
            handlers: Vec::new(),
        };
        pipe.register(SIGCHLD, SignalTag::ChildExited)?;
        pipe.register(SIGWINCH, SignalTag::Resized)?;
        debug!("Signal handlers installed");

        Ok(pipe)
    }

    fn register(&mut self, signal: libc::c_int, tag: SignalTag) -> Result<(), SignalError> {
        let fd = self.writer.as_raw_fd();
        let byte = tag.byte();

        // The handler does nothing but a single write(2), which is
        // async-signal-safe. A full pipe just drops the byte.
        let id = unsafe { signal_hook::low_level::register(signal, move || write_tag(fd, byte)) }
            .map_err(|source| SignalError::Register { signal, source })?;
        self.handlers.push(id);
        Ok(())
    }

    /// Every tag written since the last drain, in order
    pub fn drain(&self) -> Result<Vec<SignalTag>, SignalError> {
        let mut tags = Vec::new();
        let mut buf = [0u8; 64];

        loop {
            match (&self.reader).read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    tags.extend(buf[..n].iter().filter_map(|b| SignalTag::from_byte(*b)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SignalError::Read(e)),
            }
        }

        trace!("Self-pipe tags: {:?}", tags);
        Ok(tags)
    }
}

impl AsFd for SelfPipe {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }
}

impl Drop for SelfPipe {
    fn drop(&mut self) {
        for id in self.handlers.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

fn write_tag(fd: RawFd, byte: u8) {
    unsafe {
        libc::write(fd, (&byte as *const u8).cast(), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tag_bytes() {
        for tag in [SignalTag::ChildExited, SignalTag::Resized] {
            assert_eq!(SignalTag::from_byte(tag.byte()), Some(tag));
        }
        assert_eq!(SignalTag::from_byte(b'?'), None);
    }

    #[test]
    fn test_drain_in_order() {
        let pipe = SelfPipe::install().unwrap();
        pipe.drain().unwrap();

        (&pipe.writer).write_all(&[b'r', b'?', b'r']).unwrap();
        let tags = pipe.drain().unwrap();
        // Other tests may raise SIGWINCH concurrently.
        assert!(tags.iter().filter(|t| **t == SignalTag::Resized).count() >= 2);
    }

    #[test]
    fn test_signal_reaches_pipe() {
        let pipe = SelfPipe::install().unwrap();
        unsafe {
            libc::raise(libc::SIGWINCH);
        }
        assert!(pipe.drain().unwrap().contains(&SignalTag::Resized));
    }
}
