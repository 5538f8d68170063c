//! # REQUEST ANCHOR
//!
//! **PURPOSE**: Owns every data context created for one request and tears them down as a
//! single unit.
//! **GUARANTEE**: Disposal runs exactly once, child before parent, on every exit path
//! (explicit [`RequestScope::dispose`] or `Drop`). A failing or panicking disposer is logged
//! and the teardown continues.
//!
//! Contexts live in an arena indexed by [`ContextId`]. A child is always created after its
//! parent, so reverse creation order is a valid child-before-parent order.

use crate::context::builder::ContextBuilder;
use crate::context::data_context::DataContext;
use crate::dependencies::Dependency;
use crate::errors::{Result, ScopeError};
use crate::scoping::NodeId;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) type StoredValue = Arc<dyn Any + Send + Sync>;
type Disposer = Box<dyn FnOnce() -> Result<()>>;

/// Index of a data context inside its request arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

impl ContextId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

struct ContextSlot {
    parent: Option<ContextId>,
    node: Option<NodeId>,
    values: HashMap<Dependency, StoredValue>,
    /// Dependencies this context's definition snapshot promised to produce.
    planned: HashSet<Dependency>,
    disposers: Vec<Disposer>,
}

pub struct RequestScope {
    id: u64,
    slots: RefCell<Vec<ContextSlot>>,
    node_contexts: RefCell<HashMap<NodeId, ContextId>>,
    builder: RefCell<Option<ContextBuilder>>,
    missing_data_calls: Cell<usize>,
    disposed: Cell<bool>,
}

impl RequestScope {
    pub fn new() -> Self {
        let id = REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        log::debug!("Creating request scope {}", id);
        Self {
            id,
            slots: RefCell::new(Vec::new()),
            node_contexts: RefCell::new(HashMap::new()),
            builder: RefCell::new(None),
            missing_data_calls: Cell::new(0),
            disposed: Cell::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// How many times this request fell back to the missing-dependency path.
    pub fn missing_data_calls(&self) -> usize {
        self.missing_data_calls.get()
    }

    pub fn context(&self, id: ContextId) -> Option<DataContext<'_>> {
        (id.0 < self.len()).then(|| DataContext::new(self, id))
    }

    pub fn root_context(&self) -> Option<DataContext<'_>> {
        self.context(ContextId(0))
    }

    /// Context built for `node` by the context builder.
    pub fn context_for(&self, node: NodeId) -> Option<DataContext<'_>> {
        let id = self.node_contexts.borrow().get(&node).copied()?;
        self.context(id)
    }

    /// Dispose every context, children first. Returns the first disposer error.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.replace(true) {
            return Ok(());
        }
        let count = self.len();
        log::debug!("Disposing request scope {} ({} contexts)", self.id, count);
        let mut first_error = None;
        for index in (0..count).rev() {
            let (disposers, values) = {
                let mut slots = self.slots.borrow_mut();
                let slot = &mut slots[index];
                (
                    std::mem::take(&mut slot.disposers),
                    std::mem::take(&mut slot.values),
                )
            };
            for disposer in disposers.into_iter().rev() {
                let outcome = match catch_unwind(AssertUnwindSafe(disposer)) {
                    Ok(result) => result,
                    Err(_) => Err(ScopeError::DisposeFailed {
                        context: index,
                        message: "disposer panicked".to_string(),
                    }),
                };
                if let Err(err) = outcome {
                    log::error!(
                        "Request {}: dispose of context-{} failed: {}",
                        self.id,
                        index,
                        err
                    );
                    first_error.get_or_insert(err);
                }
            }
            drop(values);
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub(crate) fn builder(&self) -> Option<ContextBuilder> {
        self.builder.borrow().clone()
    }

    pub(crate) fn attach_builder(&self, builder: ContextBuilder) -> Result<()> {
        let mut slot = self.builder.borrow_mut();
        if slot.is_some() || !self.is_empty() {
            return Err(ScopeError::InvalidConfiguration {
                message: format!("request scope {} is already set up", self.id),
            });
        }
        *slot = Some(builder);
        Ok(())
    }

    pub(crate) fn note_missing_data_call(&self) {
        self.missing_data_calls.set(self.missing_data_calls.get() + 1);
    }

    pub(crate) fn attach(
        &self,
        parent: Option<ContextId>,
        node: Option<NodeId>,
    ) -> Result<ContextId> {
        if self.is_disposed() {
            return Err(ScopeError::ContextNotFound {
                message: format!("request scope {} is disposed", self.id),
            });
        }
        let mut slots = self.slots.borrow_mut();
        if let Some(parent) = parent {
            if parent.0 >= slots.len() {
                return Err(ScopeError::ContextNotFound {
                    message: format!("parent {} does not exist", parent),
                });
            }
        }
        let id = ContextId(slots.len());
        slots.push(ContextSlot {
            parent,
            node,
            values: HashMap::new(),
            planned: HashSet::new(),
            disposers: Vec::new(),
        });
        if let Some(node) = node {
            self.node_contexts.borrow_mut().entry(node).or_insert(id);
        }
        Ok(id)
    }

    pub(crate) fn parent_of(&self, id: ContextId) -> Option<ContextId> {
        self.slots.borrow().get(id.0).and_then(|slot| slot.parent)
    }

    pub(crate) fn node_of(&self, id: ContextId) -> Option<NodeId> {
        self.slots.borrow().get(id.0).and_then(|slot| slot.node)
    }

    /// `id` followed by its ancestors, nearest first.
    pub(crate) fn chain(&self, id: ContextId) -> Vec<ContextId> {
        let slots = self.slots.borrow();
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(context) = current {
            match slots.get(context.0) {
                Some(slot) => {
                    chain.push(context);
                    current = slot.parent;
                }
                None => break,
            }
        }
        chain
    }

    pub(crate) fn lookup(&self, id: ContextId, dependency: &Dependency) -> Option<StoredValue> {
        let slots = self.slots.borrow();
        let mut current = Some(id);
        while let Some(context) = current {
            let slot = slots.get(context.0)?;
            if let Some(value) = slot.values.get(dependency) {
                return Some(Arc::clone(value));
            }
            current = slot.parent;
        }
        None
    }

    pub(crate) fn store(
        &self,
        id: ContextId,
        dependency: Dependency,
        value: StoredValue,
    ) -> Result<()> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(id.0).ok_or_else(|| ScopeError::ContextNotFound {
            message: format!("{} does not exist", id),
        })?;
        slot.values.insert(dependency, value);
        Ok(())
    }

    pub(crate) fn mark_planned(&self, id: ContextId, dependency: Dependency) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(id.0) {
            slot.planned.insert(dependency);
        }
    }

    pub(crate) fn is_planned_in_chain(&self, id: ContextId, dependency: &Dependency) -> bool {
        let slots = self.slots.borrow();
        self.chain(id)
            .into_iter()
            .any(|context| slots[context.0].planned.contains(dependency))
    }

    /// Nearest self-or-ancestor context bound to a scope provider node.
    pub(crate) fn owning_context(&self, id: ContextId) -> Option<(ContextId, NodeId)> {
        self.chain(id)
            .into_iter()
            .find_map(|context| self.node_of(context).map(|node| (context, node)))
    }

    pub(crate) fn push_disposer(&self, id: ContextId, disposer: Disposer) -> Result<()> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(id.0).ok_or_else(|| ScopeError::ContextNotFound {
            message: format!("{} does not exist", id),
        })?;
        slot.disposers.push(disposer);
        Ok(())
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            log::error!("Request scope {} disposed with errors: {}", self.id, err);
        }
    }
}
