//! Text editing: buffers, selections, key bindings and panels

pub mod actions;
pub mod buffer;
pub mod clipboard;
pub mod panel;
pub mod point;
pub mod selection;

pub use actions::{ActionContext, Bindings, Key, Operation, SyntaxChecker};
pub use clipboard::Clipboard;
pub use panel::{Panel, PanelKind, Pointer, Surface};
pub use point::Point;
