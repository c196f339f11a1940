//! Background Tasks Module
//!
//! Contains background tasks that run while a provider is alive.
//!
//! # Tasks
//! - Idle reaper: Closes pooled connections unused past the idle timeout

mod idle_reaper;

pub use idle_reaper::{reap_idle, spawn_idle_reaper};
