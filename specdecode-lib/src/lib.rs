#![doc = include_str!("../README.md")]

mod error;
mod prelude;

pub mod averaging;
pub mod codec;
pub mod framing;
pub mod packets;

pub use error::{Error, Result};
