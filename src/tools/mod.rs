// Tool system: descriptors, registry, and dispatch
//
// Tools give the chat engine callable campus capabilities (calendar,
// courses, reminders) the backend can invoke instead of free-text
// generation.

pub mod dispatcher;
pub mod implementations;
pub mod registry;
pub mod types;

pub use dispatcher::ToolDispatcher;
pub use registry::{Tool, ToolFilter, ToolRegistry};
pub use types::{
    ParamSpec, PermissionLevel, ToolCall, ToolDefinition, ToolDescriptor, ToolInputSchema,
};
