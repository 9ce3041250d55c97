// Portable application logic for the person-clicker device. Everything
// in this crate runs on the host for testing; the hardware enters only
// through the `FrameSink`, `Storage` and `SeedSource` traits. The
// firmware crate supplies the real implementations.

#![no_std]

extern crate alloc;

pub mod api;
pub mod b64;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod json;
pub mod render;
pub mod sink;
pub mod state;
pub mod storage;

pub use controller::{ButtonEvent, CompleteStatus, Controller, FetchOutcome, RequestToken, SeedSource};
pub use error::{SinkError, StorageError, TransportError};
pub use sink::FrameSink;
pub use storage::Storage;
