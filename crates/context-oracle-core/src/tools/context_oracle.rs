//! The `context-oracle` tool: query in, assembled context out.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::{OracleError, OracleResult};
use crate::query::context::ContextAssembler;
use crate::tools::registry::ToolDeps;
use crate::tools::Tool;

pub const TOOL_NAME: &str = "context-oracle";

const DESCRIPTION: &str = "Builds a context for a query by combining semantic similarity with \
symbol rank. The most similar symbol's source and documentation come first, followed by the \
dotted path and summary of the most relevant related symbols.";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContextOracleArgs {
    query: String,
    #[serde(default)]
    max_related_symbols: Option<usize>,
}

pub struct ContextOracleTool {
    assembler: Arc<ContextAssembler>,
    default_max_related: usize,
}

impl ContextOracleTool {
    pub fn new(assembler: Arc<ContextAssembler>, default_max_related: usize) -> Self {
        Self {
            assembler,
            default_max_related,
        }
    }

    pub(crate) fn construct(deps: &ToolDeps) -> Box<dyn Tool> {
        Box::new(Self::new(
            Arc::clone(&deps.assembler),
            deps.default_max_related,
        ))
    }
}

impl Tool for ContextOracleTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The query string to search for."
                },
                "max_related_symbols": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "The maximum number of related symbols to return.",
                    "default": self.default_max_related
                }
            },
            "required": ["query"]
        })
    }

    fn invoke(&self, args: &Value) -> OracleResult<String> {
        let args: ContextOracleArgs = serde_json::from_value(args.clone())
            .map_err(|e| OracleError::InvalidArgument(format!("{TOOL_NAME}: {e}")))?;
        if args.query.trim().is_empty() {
            return Err(OracleError::InvalidArgument(format!(
                "{TOOL_NAME}: query must not be empty"
            )));
        }
        let max_related = args
            .max_related_symbols
            .unwrap_or(self.default_max_related);
        debug!("{TOOL_NAME} invoked with max_related_symbols={max_related}");
        self.assembler.assemble(&args.query, max_related)
    }
}
