//! Core module - Podman machine probing, container listing and the VM controller

pub mod command;
mod containers;
mod controller;
pub mod error;
mod locator;
mod probe;
pub mod settings;
mod status;
mod timer;

pub use command::{CommandRunner, SystemCommandRunner};
pub use containers::ContainerName;
pub use controller::VmController;
pub use settings::Settings;
pub use status::RuntimeState;
