use crate::context::request::{ContextId, RequestScope};
use crate::dependencies::Dependency;
use crate::errors::{Result, ScopeError};
use crate::scoping::NodeId;
use std::any::Any;
use std::sync::Arc;

/// **DATA CONTEXT**
///
/// **PURPOSE**: Per-request scoped value store for one scope provider node.
/// **LOOKUP**: Local values first, then the parent chain. Never a sibling.
///
/// A `DataContext` is a cheap handle into its [`RequestScope`]; copies refer to the same
/// context.
#[derive(Clone, Copy)]
pub struct DataContext<'a> {
    request: &'a RequestScope,
    id: ContextId,
}

impl<'a> DataContext<'a> {
    pub(crate) fn new(request: &'a RequestScope, id: ContextId) -> Self {
        Self { request, id }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn request(&self) -> &'a RequestScope {
        self.request
    }

    /// Scope provider node this context was created for, if it marks a scope boundary.
    pub fn scope_provider(&self) -> Option<NodeId> {
        self.request.node_of(self.id)
    }

    pub fn parent(&self) -> Option<DataContext<'a>> {
        self.request
            .parent_of(self.id)
            .map(|parent| DataContext::new(self.request, parent))
    }

    /// Required lookup. Falls back to the missing-dependency path once before failing.
    pub fn get<T: Any + Send + Sync>(&self, scope_name: Option<&str>) -> Result<Arc<T>> {
        self.get_with::<T>(scope_name, true)?
            .ok_or_else(|| ScopeError::MissingDependency {
                dependency: Dependency::of::<T>(scope_name).to_string(),
            })
    }

    /// Optional lookup. Absent values resolve to `None` without self-healing.
    pub fn get_optional<T: Any + Send + Sync>(&self, scope_name: Option<&str>) -> Option<Arc<T>> {
        self.get_with::<T>(scope_name, false).ok().flatten()
    }

    pub fn get_with<T: Any + Send + Sync>(
        &self,
        scope_name: Option<&str>,
        required: bool,
    ) -> Result<Option<Arc<T>>> {
        let dependency = Dependency::of::<T>(scope_name);
        if let Some(value) = self.request.lookup(self.id, &dependency) {
            return downcast::<T>(value, &dependency).map(Some);
        }
        if !required {
            return Ok(None);
        }

        let builder = self
            .request
            .builder()
            .ok_or_else(|| ScopeError::MissingDependency {
                dependency: dependency.to_string(),
            })?;
        builder.add_missing_data(self.request, self.id, &dependency)?;

        match self.request.lookup(self.id, &dependency) {
            Some(value) => downcast::<T>(value, &dependency).map(Some),
            None => Err(ScopeError::MissingDependency {
                dependency: dependency.to_string(),
            }),
        }
    }

    /// Whether a value is visible from this context, without triggering self-healing.
    pub fn contains<T: Any + Send + Sync>(&self, scope_name: Option<&str>) -> bool {
        self.request
            .lookup(self.id, &Dependency::of::<T>(scope_name))
            .is_some()
    }

    /// Store `value` in this context (`level` 0) or in the ancestor `level` steps up.
    pub fn set<T: Any + Send + Sync>(
        &self,
        value: T,
        scope_name: Option<&str>,
        level: usize,
    ) -> Result<()> {
        let target = self
            .request
            .chain(self.id)
            .get(level)
            .copied()
            .ok_or_else(|| ScopeError::ContextNotFound {
                message: format!("{} has no ancestor {} levels up", self.id, level),
            })?;
        self.request
            .store(target, Dependency::of::<T>(scope_name), Arc::new(value))
    }

    /// New child context. Passing a scope provider starts a fresh scope boundary and runs
    /// that node's context definition in the child.
    pub fn create_child(&self, scope_provider: Option<NodeId>) -> Result<DataContext<'a>> {
        match scope_provider {
            None => {
                let id = self.request.attach(Some(self.id), None)?;
                Ok(DataContext::new(self.request, id))
            }
            Some(node) => {
                let builder = self.request.builder().ok_or_else(|| ScopeError::ContextNotFound {
                    message: format!("request {} has no context builder", self.request.id()),
                })?;
                builder.tree().node(node)?;
                let id = self.request.attach(Some(self.id), Some(node))?;
                builder.populate(self.request, id, node)?;
                Ok(DataContext::new(self.request, id))
            }
        }
    }

    /// Run `disposer` when the request tears this context down.
    pub fn on_dispose<F>(&self, disposer: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.request.push_disposer(self.id, Box::new(disposer))
    }
}

fn downcast<T: Any + Send + Sync>(
    value: Arc<dyn Any + Send + Sync>,
    dependency: &Dependency,
) -> Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| ScopeError::TypeMismatch {
        name: dependency.to_string(),
        expected: std::any::type_name::<T>(),
    })
}
