//! Domain models for the coding assistant.

mod alert;
mod analysis;
mod code;
mod encounter;

pub use alert::*;
pub use analysis::*;
pub use code::*;
pub use encounter::*;
