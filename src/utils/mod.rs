//! Utility modules

pub mod error;
pub mod time;
