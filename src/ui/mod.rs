//! User interface rendering and input handling.
//!
//! - **console**: front-end that lays out the panels and routes input
//! - **status**: status bar and its one-line prompts
//! - **renderer**: crossterm drawing, terminal setup and passthrough
//! - **keymapper**: crossterm events to editor keys and pointer events

pub mod console;
pub mod keymapper;
pub mod renderer;
pub mod status;

pub use console::Console;
pub use keymapper::KeyMapper;
pub use renderer::Renderer;
