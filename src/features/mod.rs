//! Feature implementations for medivault.

pub mod offline;
