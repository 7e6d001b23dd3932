#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub mod interrupt;
mod register;
mod snowflake;
mod time;

pub use crate::error::*;
pub use crate::register::*;
pub use crate::snowflake::*;
pub use crate::time::*;
