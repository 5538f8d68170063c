pub use crate::config::EngineConfig;
pub use crate::context::{ContextBuilder, ContextId, DataContext, RequestScope};
pub use crate::dependencies::{
    supplier_fn, DataCatalog, DataType, Dependency, Scope, Supplier, Supply, SupplyRef,
};
pub use crate::errors::{Result, ScopeError};
pub use crate::naming::{BindingState, NameManager, Runnable};
pub use crate::scoping::{
    ContextDefinition, NodeId, ResolutionReport, ScopeProviderTree, ScopeRules, ScopedElement,
};
