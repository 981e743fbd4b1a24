//! User interface module - console stand-in for the status-bar item

mod console;

pub use console::{spawn_stdin_reader, ConsoleFrontend};
