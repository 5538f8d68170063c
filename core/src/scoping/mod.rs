pub mod node;
pub mod resolver;
pub mod tree;

pub use node::{ContextDefinition, ContextEntry, NodeId, ScopeProviderNode, ScopeRules};
pub use resolver::ResolutionReport;
pub use tree::{ScopeProviderTree, ScopedElement};
