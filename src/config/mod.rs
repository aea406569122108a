//! Local configuration file support.

pub mod settings;

pub use settings::Settings;
