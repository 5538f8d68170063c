use crate::dependencies::{Dependency, Scope, Supplier, SupplierRef, SupplyRef};
use crate::errors::{Result, ScopeError};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Process-wide node id counter. Ids are never reused.
static NODE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a scope provider node, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NODE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// One resolved `(Supplier, Dependency)` pair together with the supply built for it.
#[derive(Clone)]
pub struct ContextEntry {
    pub supplier: SupplierRef,
    pub dependency: Dependency,
    pub supply: SupplyRef,
    /// Added at request time by the missing-dependency path.
    pub learned: bool,
}

impl fmt::Debug for ContextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextEntry")
            .field("supplier", &self.supplier.name())
            .field("dependency", &self.dependency)
            .field("learned", &self.learned)
            .finish()
    }
}

/// **CONTEXT DEFINITION**
///
/// **PURPOSE**: Ordered list of entries a node executes for every request.
/// **GUARANTEE**: At most one entry per dependency; execution follows list order.
#[derive(Debug, Clone, Default)]
pub struct ContextDefinition {
    entries: Vec<ContextEntry>,
}

impl ContextDefinition {
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, dependency: &Dependency) -> bool {
        self.find(dependency).is_some()
    }

    pub fn find(&self, dependency: &Dependency) -> Option<&ContextEntry> {
        self.entries
            .iter()
            .find(|entry| &entry.dependency == dependency)
    }

    pub fn position(&self, dependency: &Dependency) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| &entry.dependency == dependency)
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        self.entries
            .iter()
            .map(|entry| entry.dependency.clone())
            .collect()
    }

    /// `(supplier name, dependency)` pairs, suitable for comparing two resolutions.
    pub fn keys(&self) -> Vec<(String, Dependency)> {
        self.entries
            .iter()
            .map(|entry| (entry.supplier.name().to_string(), entry.dependency.clone()))
            .collect()
    }

    pub(crate) fn supplies(&self) -> Vec<SupplyRef> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(&entry.supply))
            .collect()
    }

    /// Appends unless an entry for the same dependency exists. Returns whether it was added.
    pub(crate) fn push(&mut self, entry: ContextEntry) -> bool {
        if self.contains(&entry.dependency) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Removes every entry whose dependency `remove` accepts and returns how many went.
    pub(crate) fn remove_where<F>(&mut self, mut remove: F) -> usize
    where
        F: FnMut(&Dependency) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| !remove(&entry.dependency));
        before - self.entries.len()
    }
}

/// **SCOPE RULES**
///
/// **PURPOSE**: Registration surface an element uses to describe its data needs.
/// - `add_scope`: claim responsibility for a class of dependencies
/// - `add_supplier`: node-local supplier consulted before the catalog
/// - `add_supply`: dependency this node must produce itself, in declaration order
/// - `add_consumer`: dependency this node reads, resolved at the nearest claiming scope
#[derive(Default)]
pub struct ScopeRules {
    scopes: Vec<Scope>,
    suppliers: Vec<SupplierRef>,
    supplies: Vec<Dependency>,
    consumers: Vec<Dependency>,
}

impl ScopeRules {
    pub fn add_scope(&mut self, scope: Scope) -> &mut Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    pub fn add_supplier<S: Supplier>(&mut self, supplier: S) -> &mut Self {
        self.suppliers.push(Arc::new(supplier));
        self
    }

    pub fn add_supplier_arc(&mut self, supplier: SupplierRef) -> &mut Self {
        self.suppliers.push(supplier);
        self
    }

    pub fn add_supply(&mut self, dependency: Dependency) -> &mut Self {
        if !self.supplies.contains(&dependency) {
            self.supplies.push(dependency);
        }
        self
    }

    pub fn add_consumer(&mut self, dependency: Dependency) -> &mut Self {
        if !self.consumers.contains(&dependency) {
            self.consumers.push(dependency);
        }
        self
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn supplies(&self) -> &[Dependency] {
        &self.supplies
    }

    pub fn consumers(&self) -> &[Dependency] {
        &self.consumers
    }

    /// Whether any declared scope claims `dependency`.
    pub fn claims(&self, dependency: &Dependency) -> bool {
        self.scopes.iter().any(|scope| scope.is_match(dependency))
    }

    pub(crate) fn local_supplier(&self, dependency: &Dependency) -> Option<SupplierRef> {
        self.suppliers
            .iter()
            .find(|supplier| supplier.can_supply(dependency))
            .cloned()
    }
}

/// **SCOPE PROVIDER NODE**
///
/// One node per scoping element. Structure (parent, children, rules) is fixed once the tree
/// is built; the context definition sits behind its own lock because the missing-dependency
/// path may append to it while requests are running.
pub struct ScopeProviderNode {
    id: NodeId,
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: usize,
    rules: ScopeRules,
    definition: RwLock<ContextDefinition>,
}

impl ScopeProviderNode {
    pub(crate) fn new(name: &str, parent: Option<NodeId>, depth: usize) -> Self {
        Self {
            id: NodeId::next(),
            name: name.to_string(),
            parent,
            children: Vec::new(),
            depth,
            rules: ScopeRules::default(),
            definition: RwLock::new(ContextDefinition::default()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn rules(&self) -> &ScopeRules {
        &self.rules
    }

    pub(crate) fn rules_mut(&mut self) -> &mut ScopeRules {
        &mut self.rules
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// Copy of the current definition.
    pub fn definition(&self) -> ContextDefinition {
        self.definition.read().clone()
    }

    pub(crate) fn read_definition(
        &self,
        timeout: Duration,
    ) -> Result<RwLockReadGuard<'_, ContextDefinition>> {
        self.definition
            .try_read_for(timeout)
            .ok_or_else(|| self.lock_timeout(timeout))
    }

    pub(crate) fn write_definition(
        &self,
        timeout: Duration,
    ) -> Result<RwLockWriteGuard<'_, ContextDefinition>> {
        self.definition
            .try_write_for(timeout)
            .ok_or_else(|| self.lock_timeout(timeout))
    }

    fn lock_timeout(&self, timeout: Duration) -> ScopeError {
        ScopeError::LockTimeout {
            resource: format!("context definition of {} ({})", self.id, self.name),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}
