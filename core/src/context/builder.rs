//! # CONTEXT BUILDER
//!
//! **PURPOSE**: Materializes the live data context tree for one request from the resolved
//! scope provider tree, and learns dependencies nobody declared.
//! **ORDERING**: Parent contexts are built and populated before their children; within a
//! context, supplies run in declaration order and are never reordered.

use crate::context::data_context::DataContext;
use crate::context::request::{ContextId, RequestScope};
use crate::dependencies::Dependency;
use crate::errors::{Result, ScopeError};
use crate::scoping::{NodeId, ScopeProviderTree};
use std::sync::Arc;

#[derive(Clone)]
pub struct ContextBuilder {
    tree: Arc<ScopeProviderTree>,
}

impl ContextBuilder {
    pub fn new(tree: Arc<ScopeProviderTree>) -> Self {
        if !tree.is_resolved() {
            log::warn!("Context builder created over an unresolved scope tree");
        }
        Self { tree }
    }

    pub fn tree(&self) -> &Arc<ScopeProviderTree> {
        &self.tree
    }

    /// **SETUP DATA CONTEXT**
    ///
    /// Attach the full context tree to `request` and execute every node's definition.
    /// On error the partially built tree stays attached and is disposed with the request.
    pub fn setup_data_context<'a>(&self, request: &'a RequestScope) -> Result<DataContext<'a>> {
        request.attach_builder(self.clone())?;
        log::debug!(
            "Request {}: building data contexts for {} scope providers",
            request.id(),
            self.tree.len()
        );
        let root = self.build_data_context_tree(request, self.tree.root(), None)?;
        Ok(DataContext::new(request, root))
    }

    pub(crate) fn build_data_context_tree(
        &self,
        request: &RequestScope,
        node: NodeId,
        parent: Option<ContextId>,
    ) -> Result<ContextId> {
        let context = request.attach(parent, Some(node))?;
        self.populate(request, context, node)?;
        for &child in self.tree.node(node)?.children() {
            self.build_data_context_tree(request, child, Some(context))?;
        }
        Ok(context)
    }

    /// Execute `node`'s current definition inside `context`.
    pub(crate) fn populate(
        &self,
        request: &RequestScope,
        context: ContextId,
        node: NodeId,
    ) -> Result<()> {
        let definition = self.tree.definition(node)?;
        for entry in definition.entries() {
            request.mark_planned(context, entry.dependency.clone());
        }
        let data_context = DataContext::new(request, context);
        for entry in definition.entries() {
            log::debug!(
                "Request {}: {} supplies {} via {}",
                request.id(),
                node,
                entry.dependency,
                entry.supplier.name()
            );
            entry.supply.supply(&data_context)?;
        }
        Ok(())
    }

    /// **ADD MISSING DATA**
    ///
    /// Called when a required `get` found nothing. Finds a supplier, records it permanently
    /// in the owning node's definition and runs it for the current request.
    ///
    /// Fails with `MissingDependency` when self-healing is off, when no supplier exists, or
    /// when the dependency is already declared in this request's chain and simply has not
    /// been produced (a declaration-order mistake is not healed).
    pub fn add_missing_data(
        &self,
        request: &RequestScope,
        context: ContextId,
        dependency: &Dependency,
    ) -> Result<()> {
        request.note_missing_data_call();
        let missing = || ScopeError::MissingDependency {
            dependency: dependency.to_string(),
        };

        if !self.tree.config().self_healing {
            return Err(missing());
        }
        if request.is_planned_in_chain(context, dependency) {
            log::debug!(
                "Request {}: {} is declared but not yet produced",
                request.id(),
                dependency
            );
            return Err(missing());
        }

        let (owner_context, owner_node) =
            request
                .owning_context(context)
                .ok_or_else(|| ScopeError::ContextNotFound {
                    message: format!("{} is not inside a scope provider", context),
                })?;
        let supplier = self
            .tree
            .find_supplier_for(owner_node, dependency)
            .ok_or_else(missing)?;

        let (holder, entry) = self.tree.learn(owner_node, supplier, dependency)?;
        let target = request
            .chain(owner_context)
            .into_iter()
            .find(|candidate| request.node_of(*candidate) == Some(holder))
            .unwrap_or(owner_context);

        request.mark_planned(target, dependency.clone());
        entry.supply.supply(&DataContext::new(request, target))
    }
}
