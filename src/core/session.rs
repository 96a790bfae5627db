//! Session multiplexer
//!
//! Shuttles bytes between the user's terminal, the child pty and the
//! signal self-pipe, and tracks whether the child's line discipline is
//! canonical (our editable overlay is shown) or raw (the child owns the
//! terminal and bytes pass through untouched).

use std::io;
use std::os::fd::AsFd;

use anyhow::Context;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use tracing::{debug, info, trace, warn};

use super::protocol::{extract_type_ahead, is_private_mode_set};
use super::pty::{Pty, PtyError, WindowSize};
use super::signals::{SelfPipe, SignalTag};

/// Line-discipline state of the child
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineMode {
    Canonical,
    Raw,
}

/// Result of decoding user input in canonical mode
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Bytes to send to the child
    Command(Vec<u8>),
    /// The user asked to leave
    Quit,
    /// Nothing for the child
    None,
}

/// Why the event loop ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Read error or EOF on the pty
    ChildGone,
    /// The child terminated with this translated status
    ChildExited(i32),
    /// Confirmed quit or end of input
    UserQuit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(StopReason),
}

/// The child side of the session
pub trait ChildDevice {
    /// Read one packet (header byte plus data)
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PtyError>;
    fn write_all(&mut self, data: &[u8]) -> Result<(), PtyError>;
    fn set_window_size(&mut self, size: WindowSize) -> Result<(), PtyError>;
    fn line_mode(&self) -> Result<LineMode, PtyError>;
    /// Continue a child that stopped itself
    fn resume(&mut self) -> Result<(), PtyError>;
    /// Translated exit status once the child has terminated
    fn try_wait(&mut self) -> Result<Option<i32>, PtyError>;
}

impl ChildDevice for Pty {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PtyError> {
        Pty::read(self, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), PtyError> {
        Pty::write_all(self, data)
    }

    fn set_window_size(&mut self, size: WindowSize) -> Result<(), PtyError> {
        Pty::set_window_size(self, size)
    }

    fn line_mode(&self) -> Result<LineMode, PtyError> {
        let discipline = self.line_discipline()?;
        debug!("Line discipline: {}", discipline.describe().join(", "));
        Ok(if discipline.is_canonical() {
            LineMode::Canonical
        } else {
            LineMode::Raw
        })
    }

    fn resume(&mut self) -> Result<(), PtyError> {
        Pty::resume(self)
    }

    fn try_wait(&mut self) -> Result<Option<i32>, PtyError> {
        Pty::try_wait(self)
    }
}

/// The user's side of the session
pub trait Frontend {
    /// Draw the overlay (canonical mode only)
    fn render(&mut self) -> anyhow::Result<()>;
    /// Force a full redraw on the next render
    fn clear(&mut self);
    /// Child output for the scrollback
    fn output(&mut self, data: &[u8]);
    /// Queued input the shell handed back
    fn type_ahead(&mut self, data: &[u8]);
    /// Decode pending key and mouse events
    fn input(&mut self) -> anyhow::Result<Input>;
    /// Raw bytes from the user, `None` on end of file
    fn raw_input(&mut self) -> anyhow::Result<Option<Vec<u8>>>;
    /// Bytes for the real terminal, unmodified
    fn passthrough(&mut self, data: &[u8]) -> anyhow::Result<()>;
    fn window_size(&self) -> anyhow::Result<WindowSize>;
    /// Geometry changed
    fn resize(&mut self, size: WindowSize) -> anyhow::Result<()>;
    /// Entering raw mode blanks the screen before the child draws on it
    fn set_line_mode(&mut self, mode: LineMode) -> anyhow::Result<()>;
}

const READ_SIZE: usize = 4096;

pub struct Multiplexer<D> {
    device: D,
    mode: LineMode,
    /// Last size pushed to the child
    size: WindowSize,
}

impl<D: ChildDevice> Multiplexer<D> {
    /// `size` is the geometry the device was opened with
    pub fn new(device: D, size: WindowSize) -> Self {
        Self {
            device,
            mode: LineMode::Canonical,
            size,
        }
    }

    pub fn mode(&self) -> LineMode {
        self.mode
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Push the terminal geometry to the child. Unchanged sizes are
    /// skipped unless `force` is set; the display is told only about
    /// actual changes.
    pub fn propagate_resize(&mut self, fe: &mut impl Frontend, force: bool) -> anyhow::Result<()> {
        let size = fe.window_size()?;
        let changed = self.size != size;
        if !changed && !force {
            trace!("Window size unchanged at {}x{}", size.cols, size.rows);
            return Ok(());
        }

        self.device.set_window_size(size)?;
        if changed {
            info!("Window size {}x{}", size.cols, size.rows);
            fe.resize(size)?;
        }
        self.size = size;
        Ok(())
    }

    /// Re-read the child's line discipline and apply any transition
    pub fn on_mode_change(&mut self, fe: &mut impl Frontend) -> anyhow::Result<()> {
        let mode = self.device.line_mode()?;
        if mode == self.mode {
            return Ok(());
        }

        info!("Line mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        match mode {
            LineMode::Raw => {
                // Full-screen programs need accurate geometry.
                self.propagate_resize(fe, true)?;
                fe.clear();
            }
            LineMode::Canonical => fe.clear(),
        }
        fe.set_line_mode(mode)
    }

    /// Read and dispatch one packet from the child
    pub fn on_child_readable(&mut self, fe: &mut impl Frontend) -> anyhow::Result<Flow> {
        let mut buf = [0u8; READ_SIZE];
        let n = match self.device.read(&mut buf) {
            Ok(0) => {
                info!("Child closed the terminal");
                return Ok(Flow::Stop(StopReason::ChildGone));
            }
            Ok(n) => n,
            Err(e) => {
                info!("Child unreachable: {}", e);
                return Ok(Flow::Stop(StopReason::ChildGone));
            }
        };

        if buf[0] != 0 {
            trace!("Control packet {:#04x}", buf[0]);
            self.on_mode_change(fe)?;
        }
        if n > 1 {
            self.on_child_output(&buf[1..n], fe)?;
        }
        Ok(Flow::Continue)
    }

    /// Route child output according to the current mode
    pub fn on_child_output(&mut self, data: &[u8], fe: &mut impl Frontend) -> anyhow::Result<()> {
        let (data, type_ahead) = extract_type_ahead(data);

        if let Some(type_ahead) = type_ahead {
            debug!("Shell waiting for more input, type-ahead {:?}", String::from_utf8_lossy(type_ahead));
            if self.mode == LineMode::Raw {
                self.mode = LineMode::Canonical;
                fe.clear();
                fe.set_line_mode(LineMode::Canonical)?;
            }
            fe.type_ahead(type_ahead);
            if let Err(e) = self.device.resume() {
                warn!("Failed to resume child: {}", e);
            }
        }

        if data.is_empty() {
            return Ok(());
        }

        match self.mode {
            LineMode::Canonical if is_private_mode_set(data) => {
                fe.passthrough(data)?;
                self.on_mode_change(fe)?;
            }
            LineMode::Canonical => fe.output(data),
            LineMode::Raw => {
                fe.passthrough(data)?;
                self.on_mode_change(fe)?;
            }
        }
        Ok(())
    }

    /// User input is ready
    pub fn on_user_input(&mut self, fe: &mut impl Frontend) -> anyhow::Result<Flow> {
        match self.mode {
            LineMode::Canonical => match fe.input()? {
                Input::Command(data) => {
                    fe.clear();
                    self.device.write_all(&data)?;
                }
                Input::Quit => return Ok(Flow::Stop(StopReason::UserQuit)),
                Input::None => {}
            },
            LineMode::Raw => match fe.raw_input()? {
                Some(data) => self.device.write_all(&data)?,
                None => {
                    info!("End of file on input");
                    return Ok(Flow::Stop(StopReason::UserQuit));
                }
            },
        }
        Ok(Flow::Continue)
    }

    /// Interpret one self-pipe tag
    pub fn on_signal(&mut self, tag: SignalTag, fe: &mut impl Frontend) -> anyhow::Result<Flow> {
        debug!("Signal {:?}", tag);
        match tag {
            SignalTag::ChildExited => match self.device.try_wait()? {
                Some(code) => {
                    info!("Child exited with status {}", code);
                    Ok(Flow::Stop(StopReason::ChildExited(code)))
                }
                // Stopped, not terminated.
                None => Ok(Flow::Continue),
            },
            SignalTag::Resized => {
                self.propagate_resize(fe, false)?;
                Ok(Flow::Continue)
            }
        }
    }
}

impl<D: ChildDevice + AsFd> Multiplexer<D> {
    /// Run until the child goes away or the user quits
    pub fn run(&mut self, pipe: &SelfPipe, fe: &mut impl Frontend) -> anyhow::Result<StopReason> {
        self.propagate_resize(fe, false)?;
        self.mode = self.device.line_mode()?;
        fe.set_line_mode(self.mode)?;

        let reason = 'events: loop {
            if self.mode == LineMode::Canonical {
                fe.render()?;
            }

            trace!("Waiting...");
            let ready = wait_ready(&io::stdin(), &self.device, pipe)
                .context("Failed to wait for input")?;

            if ready.child {
                if let Flow::Stop(reason) = self.on_child_readable(fe)? {
                    break 'events reason;
                }
            }

            if ready.input {
                if let Flow::Stop(reason) = self.on_user_input(fe)? {
                    break 'events reason;
                }
            }

            if ready.signal {
                for tag in pipe.drain()? {
                    if let Flow::Stop(reason) = self.on_signal(tag, fe)? {
                        break 'events reason;
                    }
                }
            }

            if ready.child_status {
                self.on_mode_change(fe)?;
            }
        };

        info!("Event loop finished: {:?}", reason);
        Ok(reason)
    }
}

impl Multiplexer<Pty> {
    /// Close the pty and reap the child, returning its translated status
    pub fn close(self) -> Result<i32, PtyError> {
        let code = self.device.close()?;
        info!("Child finished with status {}", code);
        Ok(code)
    }
}

/// Readiness of the three descriptors after one wait
#[derive(Debug, Default)]
struct Ready {
    input: bool,
    child: bool,
    /// Packet-mode status change pending on the child
    child_status: bool,
    signal: bool,
}

/// Block until at least one descriptor is ready
fn wait_ready(
    input: &impl AsFd,
    child: &impl AsFd,
    signal: &impl AsFd,
) -> Result<Ready, Errno> {
    let mut fds = [
        PollFd::new(input, PollFlags::POLLIN),
        PollFd::new(child, PollFlags::POLLIN | PollFlags::POLLPRI),
        PollFd::new(signal, PollFlags::POLLIN),
    ];

    loop {
        match poll(&mut fds, -1) {
            Ok(_) => break,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(Ready {
        input: readable(&fds[0]),
        child: readable(&fds[1]),
        child_status: revents(&fds[1]).contains(PollFlags::POLLPRI),
        signal: readable(&fds[2]),
    })
}

fn revents(fd: &PollFd<'_>) -> PollFlags {
    fd.revents().unwrap_or_else(PollFlags::empty)
}

/// Hang-ups and errors count as readable so the read reports them
fn readable(fd: &PollFd<'_>) -> bool {
    revents(fd).intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
}
