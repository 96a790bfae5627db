//! Child session plumbing.
//!
//! - **pty**: pseudo-terminal pair in packet mode with the shell on the slave
//! - **line_discipline**: decoded termios flags of the child's terminal
//! - **protocol**: shell environment and the type-ahead marker
//! - **signals**: SIGCHLD/SIGWINCH converted to self-pipe bytes
//! - **session**: the canonical/raw multiplexer and its event loop
//!
//! # Architecture
//!
//! ```text
//! Multiplexer
//! ├── Pty (child shell, packet-mode master)
//! ├── SelfPipe (signal tags)
//! └── Frontend (user's terminal, panels)
//! ```

pub mod line_discipline;
pub mod protocol;
pub mod pty;
pub mod session;
pub mod signals;
