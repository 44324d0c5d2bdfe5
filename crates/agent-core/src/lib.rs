//! Core of the grid-game agent: the per-game control loop, its knowledge model, and the
//! LLM-backed reasoning adapters.
//!
//! Binaries (the control-port runner, offline experiments) share this crate so they drive
//! the same loop.

pub mod agent;
pub mod config;
pub mod llm;
