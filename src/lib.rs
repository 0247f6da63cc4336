// Wren - AI study copilot engine
// Library exports

pub mod backend;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod services;
pub mod tools;
pub mod trigger;
