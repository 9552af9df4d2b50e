//! Writers for drawn curves.

pub mod json;
pub mod svg;
