#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod collection;
pub mod config;
pub mod data;
pub mod editor;
pub mod events;
pub mod markdown;
pub mod mutation;
pub mod nav;
pub mod netcache;
pub mod render;
pub mod telemetry;
pub mod toast;
pub mod ui;
pub mod window;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
