//! Pseudo-terminal wrapper for Unix
//!
//! Opens a pty pair in packet mode and runs the child shell on the slave
//! side as a session leader with the slave as its controlling terminal.
//! Every read from the master starts with a packet header byte: zero for
//! ordinary data, non-zero for a line-discipline status change.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::pty::{openpty, OpenptyResult};
use nix::sys::signal::{kill, Signal};
use nix::sys::termios::tcgetattr;
use nix::unistd::{setsid, Pid};
use thiserror::Error;
use tracing::{debug, info};

use super::line_discipline::LineDiscipline;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open pseudo terminal: {0}")]
    Open(#[source] nix::Error),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Empty shell command")]
    EmptyCommand,

    #[error("Failed to read from PTY: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),

    #[error("PTY control request failed: {0}")]
    Ioctl(#[source] nix::Error),

    #[error("Failed to read terminal attributes: {0}")]
    Termios(#[source] nix::Error),

    #[error("Failed to signal child: {0}")]
    Signal(#[source] nix::Error),

    #[error("Failed to wait for child: {0}")]
    Wait(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

nix::ioctl_write_ptr_bad!(ioctl_set_window_size, libc::TIOCSWINSZ, libc::winsize);
nix::ioctl_write_ptr_bad!(ioctl_set_packet_mode, libc::TIOCPKT, libc::c_int);
nix::ioctl_write_int_bad!(ioctl_set_controlling_terminal, libc::TIOCSCTTY);

/// Terminal geometry in character cells
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    fn to_winsize(self) -> libc::winsize {
        libc::winsize {
            ws_row: self.rows,
            ws_col: self.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        }
    }
}

/// Program and extra environment for the child
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellCommand {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Translate a wait status: exit code, or the negated signal number
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => -signal,
        (None, None) => 0,
    }
}

/// Master side of a pty with the child running on the slave side
pub struct Pty {
    master: File,
    child: Child,
    status: Option<i32>,
}

impl Pty {
    /// Open a pty of `size` and start `command` on it
    pub fn spawn(command: &ShellCommand, size: WindowSize) -> Result<Self> {
        let (program, args) = command.argv.split_first().ok_or(PtyError::EmptyCommand)?;

        let (master, slave) = open_pair(size)?;

        // Packet mode: every read is prefixed by a status byte.
        let on: libc::c_int = 1;
        unsafe { ioctl_set_packet_mode(master.as_raw_fd(), &on) }.map_err(PtyError::Ioctl)?;

        let spawn_error = |source| PtyError::Spawn {
            program: program.clone(),
            source,
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::from(slave.try_clone().map_err(spawn_error)?))
            .stdout(Stdio::from(slave.try_clone().map_err(spawn_error)?))
            .stderr(Stdio::from(slave));

        unsafe {
            cmd.pre_exec(|| {
                // New session, with the pty slave (now stdin) as its terminal.
                setsid()?;
                ioctl_set_controlling_terminal(libc::STDIN_FILENO, 0)?;
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(spawn_error)?;
        info!(
            "Spawned {:?} (pid {}) at {}x{}",
            command.argv,
            child.id(),
            size.cols,
            size.rows
        );

        Ok(Self {
            master: File::from(master),
            child,
            status: None,
        })
    }

    /// Read one packet. Returns the number of bytes including the header.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.master.read(buf).map_err(PtyError::Read)
    }

    /// Write all of `data`, retrying partial writes
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.master.write_all(data).map_err(PtyError::Write)
    }

    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        let ws = size.to_winsize();
        unsafe { ioctl_set_window_size(self.master.as_raw_fd(), &ws) }.map_err(PtyError::Ioctl)?;
        debug!("PTY window size set to {}x{}", size.cols, size.rows);
        Ok(())
    }

    /// Current line discipline of the slave side
    pub fn line_discipline(&self) -> Result<LineDiscipline> {
        let termios = tcgetattr(&self.master).map_err(PtyError::Termios)?;
        Ok(LineDiscipline::from_termios(&termios))
    }

    /// Continue a child that stopped itself
    pub fn resume(&self) -> Result<()> {
        let pid = Pid::from_raw(self.child.id() as libc::pid_t);
        kill(pid, Signal::SIGCONT).map_err(PtyError::Signal)
    }

    /// Exit code of the child if it has terminated. Stops are not reported.
    pub fn try_wait(&mut self) -> Result<Option<i32>> {
        if self.status.is_none() {
            self.status = self.child.try_wait().map_err(PtyError::Wait)?.map(exit_code);
        }
        Ok(self.status)
    }

    /// Close the master and reap the child
    pub fn close(self) -> Result<i32> {
        let Self {
            master,
            mut child,
            status,
        } = self;
        drop(master);

        match status {
            Some(code) => Ok(code),
            None => Ok(exit_code(child.wait().map_err(PtyError::Wait)?)),
        }
    }
}

impl AsFd for Pty {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.master.as_fd()
    }
}

fn open_pair(size: WindowSize) -> Result<(OwnedFd, OwnedFd)> {
    let OpenptyResult { master, slave } = openpty(&size.to_winsize(), None).map_err(PtyError::Open)?;

    // The child must not inherit the master.
    fcntl(master.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(PtyError::Open)?;

    Ok((master, slave))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ShellCommand {
        ShellCommand::new(vec!["/bin/sh".into(), "-c".into(), script.into()])
    }

    /// Data bytes until the child goes away
    fn drain(pty: &mut Pty) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        while let Ok(n) = pty.read(&mut buf) {
            if n == 0 {
                break;
            }
            if buf[0] == 0 {
                out.extend_from_slice(&buf[1..n]);
            }
        }
        out
    }

    #[test]
    fn test_exit_code() {
        let mut pty = Pty::spawn(&sh("exit 3"), WindowSize::new(80, 24)).unwrap();
        drain(&mut pty);
        assert_eq!(pty.close().unwrap(), 3);
    }

    #[test]
    fn test_signal_exit_code() {
        let mut pty = Pty::spawn(&sh("kill -9 $$"), WindowSize::new(80, 24)).unwrap();
        drain(&mut pty);
        assert_eq!(pty.close().unwrap(), -9);
    }

    #[test]
    fn test_output_and_environment() {
        let command = sh("echo \"$GREETING\"; stty size").env("GREETING", "hello there");
        let mut pty = Pty::spawn(&command, WindowSize::new(100, 30)).unwrap();
        let output = String::from_utf8_lossy(&drain(&mut pty)).into_owned();

        assert!(output.contains("hello there"), "output: {output:?}");
        assert!(output.contains("30 100"), "output: {output:?}");
        assert_eq!(pty.close().unwrap(), 0);
    }

    #[test]
    fn test_line_discipline_and_resize() {
        let mut pty = Pty::spawn(&sh("sleep 1"), WindowSize::new(80, 24)).unwrap();
        assert!(pty.line_discipline().unwrap().is_canonical());
        pty.set_window_size(WindowSize::new(120, 40)).unwrap();
        assert_eq!(pty.try_wait().unwrap(), None);
        drain(&mut pty);
        assert_eq!(pty.close().unwrap(), 0);
    }

    #[test]
    fn test_spawn_failures() {
        let missing = ShellCommand::new(vec!["/nonexistent/shell".into()]);
        assert!(matches!(
            Pty::spawn(&missing, WindowSize::new(80, 24)),
            Err(PtyError::Spawn { .. })
        ));
        assert!(matches!(
            Pty::spawn(&ShellCommand::default(), WindowSize::new(80, 24)),
            Err(PtyError::EmptyCommand)
        ));
    }
}
