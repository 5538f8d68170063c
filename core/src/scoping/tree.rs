//! # SCOPE PROVIDER TREE
//!
//! **PURPOSE**: Static arena of scope provider nodes mirroring the element hierarchy.
//! **OWNERSHIP**: The tree owns every node; parents and children refer to each other by
//! [`NodeId`] only, so there are no reference cycles.
//!
//! Structure is built with `&mut self` during configuration. Once the tree is shared
//! (`Arc`) only context definitions change, through the resolution pass and the
//! missing-dependency path.

use crate::config::EngineConfig;
use crate::dependencies::{DataCatalog, Dependency, SupplierRef};
use crate::errors::{Result, ScopeError};
use crate::scoping::node::{ContextDefinition, NodeId, ScopeProviderNode, ScopeRules};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// **ELEMENT CALLBACK SURFACE**
///
/// Implemented by pages, layouts and regions that introduce a scope. The tree calls
/// `declare_scope` once when the element is added, then recurses into `children`.
pub trait ScopedElement {
    fn element_name(&self) -> &str;

    fn declare_scope(&self, rules: &mut ScopeRules);

    fn children(&self) -> Vec<&dyn ScopedElement> {
        Vec::new()
    }
}

pub struct ScopeProviderTree {
    root: NodeId,
    nodes: HashMap<NodeId, ScopeProviderNode>,
    catalog: Arc<DataCatalog>,
    config: EngineConfig,
    resolved: AtomicBool,
    /// Serializes definition changes made while requests are in flight.
    pub(crate) learning: Mutex<()>,
}

impl ScopeProviderTree {
    pub fn new(catalog: Arc<DataCatalog>, config: EngineConfig) -> Self {
        let root = ScopeProviderNode::new("root", None, 0);
        let root_id = root.id();
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        log::debug!("Creating scope provider tree with root {}", root_id);
        Self {
            root: root_id,
            nodes,
            catalog,
            config,
            resolved: AtomicBool::new(false),
            learning: Mutex::new(()),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn catalog(&self) -> &Arc<DataCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    pub(crate) fn mark_resolved(&self) {
        self.resolved.store(true, Ordering::Release);
    }

    pub fn node(&self, id: NodeId) -> Result<&ScopeProviderNode> {
        self.nodes
            .get(&id)
            .ok_or(ScopeError::UnknownNode { node: id.value() })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut ScopeProviderNode> {
        self.nodes
            .get_mut(&id)
            .ok_or(ScopeError::UnknownNode { node: id.value() })
    }

    /// Registration surface of one node. Only available while the tree is unshared.
    pub fn rules_mut(&mut self, id: NodeId) -> Result<&mut ScopeRules> {
        Ok(self.node_mut(id)?.rules_mut())
    }

    pub fn add_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let depth = self.node(parent)?.depth() + 1;
        if depth > self.config.max_tree_depth {
            return Err(ScopeError::InvalidConfiguration {
                message: format!(
                    "node '{}' under {} exceeds max_tree_depth {}",
                    name, parent, self.config.max_tree_depth
                ),
            });
        }
        let node = ScopeProviderNode::new(name, Some(parent), depth);
        let id = node.id();
        self.nodes.insert(id, node);
        self.node_mut(parent)?.push_child(id);
        log::debug!("Added scope provider {} ({}) under {}", id, name, parent);
        Ok(id)
    }

    /// Add `element` and its descendants under `parent`, letting each declare its scope.
    pub fn add_element(&mut self, parent: NodeId, element: &dyn ScopedElement) -> Result<NodeId> {
        let id = self.add_child(parent, element.element_name())?;
        element.declare_scope(self.rules_mut(id)?);
        for child in element.children() {
            self.add_element(id, child)?;
        }
        Ok(id)
    }

    /// Node ids parent-before-children, siblings in insertion order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children().iter().rev().copied());
            }
        }
        order
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.nodes.get(&id).and_then(ScopeProviderNode::parent);
        while let Some(parent) = current {
            result.push(parent);
            current = self.nodes.get(&parent).and_then(ScopeProviderNode::parent);
        }
        result
    }

    /// Strict descendants of `id` in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&id) {
            Some(node) => node.children().iter().rev().copied().collect(),
            None => return result,
        };
        while let Some(current) = stack.pop() {
            result.push(current);
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children().iter().rev().copied());
            }
        }
        result
    }

    /// Copy of a node's current context definition.
    pub fn definition(&self, id: NodeId) -> Result<ContextDefinition> {
        let node = self.node(id)?;
        let guard = node.read_definition(self.config.lock_timeout())?;
        Ok(guard.clone())
    }

    /// Nearest self-or-ancestor node whose declared scopes claim `dependency`.
    pub fn claiming_node(&self, id: NodeId, dependency: &Dependency) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|candidate| {
                self.nodes
                    .get(candidate)
                    .map_or(false, |node| node.rules().claims(dependency))
            })
    }

    /// Node-local suppliers from `id` upward take precedence over the catalog.
    pub fn find_supplier_for(&self, id: NodeId, dependency: &Dependency) -> Option<SupplierRef> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|candidate| self.nodes.get(&candidate))
            .find_map(|node| node.rules().local_supplier(dependency))
            .or_else(|| self.catalog.find_supplier(dependency))
    }
}
