//! Single-slot clipboard shared by every panel.
//!
//! The front-end owns one [`Clipboard`] and lends it to cut, copy and paste.
//! Copies can also be mirrored into the desktop clipboard; that is best
//! effort, since there may be no display at all.

use tracing::debug;

#[derive(Debug, Default)]
pub struct Clipboard {
    contents: Option<Vec<u8>>,
    /// Mirror copies into the system clipboard
    system: bool,
}

impl Clipboard {
    pub fn new(system: bool) -> Self {
        Self {
            contents: None,
            system,
        }
    }

    /// Replace the contents (last writer wins)
    pub fn set(&mut self, raw: Vec<u8>) {
        if self.system {
            if let Ok(mut clipboard) = arboard::Clipboard::new() {
                if let Err(e) = clipboard.set_text(String::from_utf8_lossy(&raw).into_owned()) {
                    debug!("System clipboard unavailable: {}", e);
                }
            }
        }
        self.contents = Some(raw);
    }

    pub fn get(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }
}
