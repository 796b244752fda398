#![no_std]

pub mod checksum;
pub mod error;
pub mod messages;
pub(crate) mod parser;

pub use error::Error;
