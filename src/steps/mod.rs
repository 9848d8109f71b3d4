//! Step bridge: maps scenario step text onto the engine.
//!
//! A [`LocalClient`] is created once per suite. Each scenario gets its own
//! [`Scenario`] from [`LocalClient::begin_scenario`] and must be finished
//! with [`Scenario::finish`] (or run through [`Scenario::run`]) so pending
//! expectations and recorded mismatches are reported.

mod argument;
mod client;
mod scenario;
mod table;

pub use argument::StepArgument;
pub use client::LocalClient;
pub use scenario::Scenario;
pub use table::{StepCall, step_patterns};
