pub mod utils;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "rest")]
pub mod rest;
