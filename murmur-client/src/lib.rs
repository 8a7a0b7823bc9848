// Library interface for the murmur client
#[macro_use]
pub mod logging;

pub mod api;
pub mod config;
pub mod store;
