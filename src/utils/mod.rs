//! Utility modules for the partials builder.

pub mod exec;
pub mod path;
