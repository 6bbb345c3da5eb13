#![doc = include_str!("../README.md")]

mod decode;
mod error;
mod generator;
mod id;
mod time;

pub use crate::decode::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::time::*;
