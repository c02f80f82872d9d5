//! Centralized constants for the upsync project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod backoff;
pub mod network;
pub mod paths;
