//! Background worker: claims jobs, runs task bodies against the vision
//! service, and persists outcomes.

pub mod config;
pub mod progress;
pub mod reaper;
pub mod retention;
pub mod runner;
pub mod tasks;
