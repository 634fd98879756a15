//! Host interface for patchgate
//!
//! Every interaction with the operating system goes through one narrow seam:
//! run a command, with a deadline, and get its combined output and exit
//! status back. This crate defines that seam and a scripted mock; it
//! contains no platform code itself.

mod command;
mod mock;
mod traits;

pub use command::*;
pub use mock::*;
pub use traits::*;
