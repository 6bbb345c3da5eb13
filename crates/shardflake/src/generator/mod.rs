mod config;
mod mutex;
mod shard;
mod sharded;
#[cfg(test)]
mod tests;

pub use config::*;
pub(crate) use mutex::*;
pub(crate) use shard::*;
pub use sharded::*;
