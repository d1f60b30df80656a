pub mod automode;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod queue;
pub mod request;
pub mod service;
pub mod status;
pub mod worker;

pub use error::{Error, Result};
pub use request::{MediaKind, Quality, Request, RequestPreset};
pub use service::DownloadService;
pub use status::{StatusBus, StatusEvent};
