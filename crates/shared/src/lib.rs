//! Shared types and utilities for the courtside client and its tests.

pub mod draft;
pub mod error;
pub mod events;
pub mod models;
pub mod protocol;

pub use draft::*;
pub use error::*;
pub use events::*;
pub use models::*;
pub use protocol::*;
