//! Tool schema registry and dispatch for the ERP MCP gateway.
//!
//! ## Modules
//!
//! - [`registry`]: the fixed set of callable operations and their schemas
//! - [`schema`]: recursive parameter-schema tree with strict validation
//! - [`dispatch`]: maps validated tool calls onto the ERP collaborator
//! - [`error`]: the gateway error taxonomy and wire envelopes

pub mod dispatch;
pub mod error;
pub mod registry;
pub mod schema;
pub mod wire;

pub use dispatch::Dispatcher;
pub use error::{ErrorEnvelope, GatewayError, GatewayResult};
pub use registry::{RegistryError, ToolAccess, ToolDefinition, ToolDescriptor, ToolRegistry};
pub use schema::{assert_complete, ParamSchema, SchemaViolation};
pub use wire::ToolCallRequest;
