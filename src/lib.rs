//! Weekly school timetable generation engine.
//!
//! Converts teachers, classes, and a small rule catalogue into an ILP
//! assignment problem, solves it repeatedly under randomized tie-break
//! seeds to collect distinct feasible timetables, post-places study
//! hall supervision, and ranks the results.
//!
//! The engine is a pure function of (input, seed sequence): it owns no
//! state across runs and neither reads nor writes durable storage. The
//! [`server`] module wraps it in a single HTTP route for the demo
//! binary.

pub mod assemble;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod server;
pub mod solver;
pub mod study_hall;

pub use data::{
    GenerateOptions, GenerationResult, GenerationStatus, RuleConfig, ScheduleOption,
    TimetableInput,
};
pub use engine::generate;
pub use error::EngineError;
