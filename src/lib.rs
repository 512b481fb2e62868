// Library surface for the binary and the headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod attempts;
pub mod catalog;
pub mod config;
pub mod countdown;
pub mod enrollment;
pub mod error;
pub mod fixtures;
pub mod flow;
pub mod logging;
pub mod runtime;
pub mod scorer;
pub mod session;
pub mod ui;
pub mod util;
