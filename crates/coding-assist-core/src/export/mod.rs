//! Submission assembly for the host application.

mod submission;

pub use submission::*;
