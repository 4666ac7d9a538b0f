//! Shared types and models for the Hyperlocal Air Quality platform
//!
//! This crate contains types shared between the backend, the browser client
//! (via WASM), and other components of the system. Nothing in here performs
//! I/O.

pub mod aqi;
pub mod connection;
pub mod models;
pub mod types;
pub mod validation;

pub use aqi::*;
pub use connection::*;
pub use models::*;
pub use types::*;
pub use validation::*;
