//! Static tool registration table.
//!
//! Every tool kind maps to a constructor in [`BUILTIN_TOOLS`]. A
//! [`ToolRegistry`] loads that table on first use; calling
//! [`ToolRegistry::initialize`] again is a no-op.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OracleConfig;
use crate::errors::{OracleError, OracleResult};
use crate::query::context::ContextAssembler;
use crate::query::guards::DEFAULT_MAX_RELATED;
use crate::tools::context_oracle::{ContextOracleTool, TOOL_NAME as CONTEXT_ORACLE};
use crate::tools::Tool;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    ContextOracle,
}

impl ToolKind {
    pub const ALL: [ToolKind; 1] = [ToolKind::ContextOracle];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::ContextOracle => CONTEXT_ORACLE,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| OracleError::InvalidArgument(format!("unknown tool kind: {s:?}")))
    }
}

/// Dependencies handed to every tool constructor.
#[derive(Clone, Debug)]
pub struct ToolDeps {
    pub assembler: Arc<ContextAssembler>,
    pub default_max_related: usize,
}

impl ToolDeps {
    pub fn new(assembler: Arc<ContextAssembler>) -> Self {
        Self {
            assembler,
            default_max_related: DEFAULT_MAX_RELATED,
        }
    }

    /// Dependencies carrying the configured `max_related` default.
    pub fn from_config(assembler: Arc<ContextAssembler>, config: &OracleConfig) -> Self {
        Self::new(assembler).with_max_related(config.max_related)
    }

    pub fn with_max_related(mut self, max_related: usize) -> Self {
        self.default_max_related = max_related;
        self
    }
}

pub type ToolConstructor = fn(&ToolDeps) -> Box<dyn Tool>;

const BUILTIN_TOOLS: &[(ToolKind, ToolConstructor)] =
    &[(ToolKind::ContextOracle, ContextOracleTool::construct)];

#[derive(Default)]
struct RegistryState {
    constructors: IndexMap<ToolKind, ToolConstructor>,
    initialized: bool,
}

/// Explicitly constructed registry of tool constructors.
#[derive(Default)]
pub struct ToolRegistry {
    state: RwLock<RegistryState>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the builtin table. Returns the number of constructors added by
    /// this call, so repeated calls return 0.
    pub fn initialize(&self) -> usize {
        let mut state = self.state.write();
        if state.initialized {
            return 0;
        }
        let mut added = 0;
        for (kind, constructor) in BUILTIN_TOOLS {
            if !state.constructors.contains_key(kind) {
                state.constructors.insert(*kind, *constructor);
                added += 1;
            }
        }
        state.initialized = true;
        debug!("Tool registry initialized with {added} builtin tools");
        added
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Register or replace the constructor for `kind`.
    pub fn register(&self, kind: ToolKind, constructor: ToolConstructor) {
        self.state.write().constructors.insert(kind, constructor);
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> Vec<ToolKind> {
        self.initialize();
        self.state.read().constructors.keys().copied().collect()
    }

    pub fn build(&self, kind: ToolKind, deps: &ToolDeps) -> OracleResult<Box<dyn Tool>> {
        self.initialize();
        let constructor = self
            .state
            .read()
            .constructors
            .get(&kind)
            .copied()
            .ok_or_else(|| OracleError::Config(format!("no constructor registered for {kind}")))?;
        Ok(constructor(deps))
    }

    pub fn build_all(&self, deps: &ToolDeps) -> Vec<Box<dyn Tool>> {
        self.initialize();
        let constructors: Vec<ToolConstructor> =
            self.state.read().constructors.values().copied().collect();
        constructors.into_iter().map(|c| c(deps)).collect()
    }
}
