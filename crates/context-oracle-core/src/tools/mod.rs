//! Agent-facing tools built on the context oracle.

pub mod context_oracle;
pub mod registry;

use serde_json::Value;

use crate::errors::OracleResult;

/// A callable exposed to an agent runtime.
pub trait Tool: Send + Sync {
    /// Stable identifier, e.g. `"context-oracle"`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema object describing the accepted arguments.
    fn parameters(&self) -> Value;

    /// Run the tool with a JSON object of arguments.
    fn invoke(&self, args: &Value) -> OracleResult<String>;
}

pub use context_oracle::ContextOracleTool;
pub use registry::{ToolDeps, ToolKind, ToolRegistry};
