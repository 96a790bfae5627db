//! Conversation with the child shell
//!
//! The shell is started with empty prompts and a `PROMPT_COMMAND` that,
//! before every prompt, reads whatever input is already queued, echoes it
//! after a marker and stops itself. The marker tells us the shell wants
//! more input; the echoed text is type-ahead for the command line. We
//! resume the shell once the type-ahead has been taken.

use super::pty::ShellCommand;

/// Printed by the shell before the type-ahead
pub const MULTI_LINE: &[u8] = b"multi-line: bash, type-ahead: ";

/// Shell used when none is configured
pub const DEFAULT_SHELL: &[&str] = &["bash", "--noediting", "--noprofile", "--norc"];

/// Pre-prompt hook installed in the child
pub fn prompt_command() -> String {
    let marker = String::from_utf8_lossy(MULTI_LINE);
    [
        "read -N8192 -t0.01 ta".to_string(),
        format!("echo \"{marker}$ta\""),
        "stty -echo".to_string(),
        "kill -sTSTP $$".to_string(),
    ]
    .join("; ")
}

/// Attach the prompt variables and hook to `command`
pub fn shell_environment(command: ShellCommand) -> ShellCommand {
    command
        .env("PROMPT_COMMAND", prompt_command())
        .env("PS1", "")
        .env("PS2", "")
}

/// Split child output around the marker.
///
/// Returns the output before the marker and, if the marker was present,
/// the type-ahead after it with one trailing CRLF removed.
pub fn extract_type_ahead(data: &[u8]) -> (&[u8], Option<&[u8]>) {
    let Some(at) = find(data, MULTI_LINE) else {
        return (data, None);
    };

    let rest = &data[at + MULTI_LINE.len()..];
    let type_ahead = rest.strip_suffix(b"\r\n").unwrap_or(rest);
    (&data[..at], Some(type_ahead))
}

/// Output that begins with a DEC private mode set (`ESC [ ? Pn h`), e.g.
/// the switch to the alternate screen.
pub fn is_private_mode_set(data: &[u8]) -> bool {
    let Some(params) = data.strip_prefix(b"\x1b[?") else {
        return false;
    };

    let len = params
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b';')
        .count();
    len > 0 && params.get(len) == Some(&b'h')
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
