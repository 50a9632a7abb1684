//! MCP tool implementations

pub mod air;
pub mod mapping;
