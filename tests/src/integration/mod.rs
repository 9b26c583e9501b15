//! # Integration Tests
//!
//! Filter manager driven against an in-memory peer group, observed from the
//! peers' inboxes and the manager's event channel.

#[cfg(test)]
mod support;

pub mod flows;
