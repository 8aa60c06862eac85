#[cfg(test)]
#[macro_use] extern crate hex_literal;

mod util;
mod config;
mod crypto;

pub use util::*;
pub use config::*;
pub use crypto::*;
