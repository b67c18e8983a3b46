//! WAGERMILL — Sports Betting Market & Settlement Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod feeds;
pub mod market;
pub mod betting;
pub mod wallet;
pub mod settlement;
pub mod storage;
pub mod api;
