#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod debugger;
pub mod error;
pub mod notifier;
pub mod util;

pub use error::{Error, Result};
