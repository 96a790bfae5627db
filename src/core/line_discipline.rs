//! Line-discipline flags of the child's terminal.
//!
//! Only the canonical flag drives behaviour; the rest is decoded so mode
//! changes can be logged in readable form.

use bitflags::bitflags;
use nix::sys::termios::Termios;

bitflags! {
    /// termios `c_lflag` bits
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LocalModes: libc::tcflag_t {
        const ECHO   = libc::ECHO;
        const ECHOE  = libc::ECHOE;
        const ECHOK  = libc::ECHOK;
        const ECHONL = libc::ECHONL;
        const ICANON = libc::ICANON;
        const IEXTEN = libc::IEXTEN;
        const ISIG   = libc::ISIG;
        const NOFLSH = libc::NOFLSH;
        const TOSTOP = libc::TOSTOP;
    }
}

bitflags! {
    /// termios `c_iflag` bits
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InputModes: libc::tcflag_t {
        const BRKINT = libc::BRKINT;
        const ICRNL  = libc::ICRNL;
        const IGNBRK = libc::IGNBRK;
        const IGNCR  = libc::IGNCR;
        const IGNPAR = libc::IGNPAR;
        const INLCR  = libc::INLCR;
        const INPCK  = libc::INPCK;
        const ISTRIP = libc::ISTRIP;
        const IXANY  = libc::IXANY;
        const IXOFF  = libc::IXOFF;
        const IXON   = libc::IXON;
        const PARMRK = libc::PARMRK;
    }
}

const LOCAL_DESCRIPTIONS: &[(LocalModes, &str)] = &[
    (LocalModes::ECHO, "Enable echo"),
    (LocalModes::ECHOE, "Echo erase character as error-correcting backspace"),
    (LocalModes::ECHOK, "Echo KILL"),
    (LocalModes::ECHONL, "Echo NL"),
    (LocalModes::ICANON, "Canonical input (erase and kill processing)"),
    (LocalModes::IEXTEN, "Enable extended input character processing"),
    (LocalModes::ISIG, "Enable signals"),
    (LocalModes::NOFLSH, "Disable flush after interrupt or quit"),
    (LocalModes::TOSTOP, "Send SIGTTOU for background output"),
];

const INPUT_DESCRIPTIONS: &[(InputModes, &str)] = &[
    (InputModes::BRKINT, "Signal interrupt on break"),
    (InputModes::ICRNL, "Map CR to NL on input"),
    (InputModes::IGNBRK, "Ignore break condition"),
    (InputModes::IGNCR, "Ignore CR"),
    (InputModes::IGNPAR, "Ignore characters with parity errors"),
    (InputModes::INLCR, "Map NL to CR on input"),
    (InputModes::INPCK, "Enable input parity check"),
    (InputModes::ISTRIP, "Strip character"),
    (InputModes::IXANY, "Enable any character to restart output"),
    (InputModes::IXOFF, "Enable start/stop input control"),
    (InputModes::IXON, "Enable start/stop output control"),
    (InputModes::PARMRK, "Mark parity errors"),
];

/// Snapshot of the flags that matter to us
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineDiscipline {
    pub input: InputModes,
    pub local: LocalModes,
}

impl LineDiscipline {
    pub fn from_termios(termios: &Termios) -> Self {
        Self {
            input: InputModes::from_bits_truncate(termios.input_flags.bits()),
            local: LocalModes::from_bits_truncate(termios.local_flags.bits()),
        }
    }

    /// Line-buffered input, edited by the kernel
    pub fn is_canonical(&self) -> bool {
        self.local.contains(LocalModes::ICANON)
    }

    /// Descriptions of every enabled flag, input flags first
    pub fn describe(&self) -> Vec<&'static str> {
        let input = INPUT_DESCRIPTIONS
            .iter()
            .filter(|(flag, _)| self.input.contains(*flag))
            .map(|(_, text)| *text);
        let local = LOCAL_DESCRIPTIONS
            .iter()
            .filter(|(flag, _)| self.local.contains(*flag))
            .map(|(_, text)| *text);
        input.chain(local).collect()
    }
}
