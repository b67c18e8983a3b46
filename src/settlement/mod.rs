//! Settlement — match settlement passes and the auto-settlement watchdog.

pub mod engine;
pub mod trigger;
