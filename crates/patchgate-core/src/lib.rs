//! Update enforcement engine for patchgate
//!
//! This crate is the heart of patchgate, containing:
//! - Probes: power source and battery, console and remote sessions
//! - The update inventory adapter around the platform update tool
//! - The deferral ledger (one deadline per machine)
//! - User prompts, install-at-logout staging and the login-window installer
//! - The enforcement state machine that picks exactly one action per run
//!
//! Every external command goes through a
//! [`CommandRunner`](patchgate_host_api::CommandRunner) with a deadline. A
//! timeout anywhere unwinds the whole run via `?` and ends it as
//! [`Outcome::AbortedTimeout`](patchgate_api::Outcome::AbortedTimeout).

mod controller;
mod error;
mod inventory;
mod ledger;
mod logout;
mod power;
mod prompt;
mod session;
mod unattended;

pub use controller::*;
pub use error::*;
pub use inventory::*;
pub use ledger::*;
pub use logout::*;
pub use power::*;
pub use prompt::*;
pub use session::*;
pub use unattended::*;
