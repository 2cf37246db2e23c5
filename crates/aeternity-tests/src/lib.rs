//! # aeternity-tests
//!
//! Integration tests for the aeternity listener.
//!
//! This crate provides end-to-end testing of the peer-to-peer core:
//! - A harness spawning real network services on loopback ports
//! - A scripted remote peer driving the wire protocol directly
//! - Scenario tests for dialing, ping exchange, network guards,
//!   micro block fetching, fragmentation and the first-ping gate

pub mod generators;
pub mod harness;


pub use generators::*;
pub use harness::*;
