//! CLI subcommands.

pub mod demo;
pub mod inspect;

pub use demo::DemoCommand;
pub use inspect::InspectCommand;
