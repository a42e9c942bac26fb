//! Integration test utilities for corvid
//!
//! Mock REST and gateway servers on ephemeral ports, plus payload fixtures
//! for driving a real [`corvid_gateway::Session`] against them.

pub mod fixtures;
pub mod gateway;
pub mod helpers;

pub use fixtures::*;
pub use gateway::*;
pub use helpers::*;
