//! # NAME MANAGER
//!
//! **PURPOSE**: Deferred name binding. Elements register under `(namespace, name)` while
//! the application is configured; references that cannot resolve yet are queued as
//! resolution handlers and run by [`NameManager::bind`].
//!
//! **STATE MACHINE**: `Registering -> Bound`, one way.
//!
//! **ERROR DISCIPLINE**: `bind` attempts every queued action and every initializer, logs
//! each failure, and returns the first one after the whole batch has run.

use crate::config::EngineConfig;
use crate::errors::{Result, ScopeError};
use crate::naming::validation::{generate_name, qualify, split_qualified, validate_name};
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type ElementRef = Arc<dyn Any + Send + Sync>;
type ResolutionAction = Box<dyn FnOnce(&NameManager) -> Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Registering,
    Bound,
}

/// Element with work to do once every name is known.
pub trait Runnable: Send + Sync + 'static {
    fn initialize(&self, names: &NameManager) -> Result<()>;
}

struct NameTables {
    state: BindingState,
    elements: HashMap<(String, String), ElementRef>,
    runnables: Vec<(String, Arc<dyn Runnable>)>,
}

pub struct NameManager {
    config: EngineConfig,
    tables: Mutex<NameTables>,
    pending: Mutex<Vec<ResolutionAction>>,
}

impl NameManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tables: Mutex::new(NameTables {
                state: BindingState::Registering,
                elements: HashMap::new(),
                runnables: Vec::new(),
            }),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> BindingState {
        self.tables.lock().state
    }

    pub fn len(&self) -> usize {
        self.tables.lock().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_actions(&self) -> usize {
        self.pending.lock().len()
    }

    /// **REGISTER ELEMENT**
    ///
    /// A blank `name` gets a generated one. Returns the name actually used.
    pub fn register<T: Any + Send + Sync>(
        &self,
        namespace: &str,
        name: &str,
        element: Arc<T>,
    ) -> Result<String> {
        self.insert(namespace, name, element, None)
    }

    /// Register an element whose [`Runnable::initialize`] runs during [`NameManager::bind`].
    pub fn register_runnable<T: Runnable>(
        &self,
        namespace: &str,
        name: &str,
        element: Arc<T>,
    ) -> Result<String> {
        let runnable: Arc<dyn Runnable> = element.clone();
        self.insert(namespace, name, element, Some(runnable))
    }

    fn insert(
        &self,
        namespace: &str,
        name: &str,
        element: ElementRef,
        runnable: Option<Arc<dyn Runnable>>,
    ) -> Result<String> {
        validate_name(namespace)?;
        let name = name.trim();
        let mut tables = self.lock_tables()?;
        if tables.state == BindingState::Bound {
            return Err(ScopeError::AlreadyBound {
                operation: "register",
            });
        }

        let name = if name.is_empty() {
            let mut generated = generate_name(&self.config.generated_name_prefix);
            while tables
                .elements
                .contains_key(&(namespace.to_string(), generated.clone()))
            {
                generated = generate_name(&self.config.generated_name_prefix);
            }
            generated
        } else {
            validate_name(name)?;
            name.to_string()
        };

        let key = (namespace.to_string(), name.clone());
        if tables.elements.contains_key(&key) {
            return Err(ScopeError::DuplicateRegistration {
                namespace: namespace.to_string(),
                name,
            });
        }
        tables.elements.insert(key, element);
        if let Some(runnable) = runnable {
            tables.runnables.push((qualify(namespace, &name), runnable));
        }
        log::debug!("Registered {}", qualify(namespace, &name));
        Ok(name)
    }

    /// Queue `action` for bind time. Once bound, the action runs immediately.
    pub fn add_resolution_handler<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&NameManager) -> Result<()> + Send + 'static,
    {
        let mut pending = self.lock_pending()?;
        if self.lock_tables()?.state == BindingState::Bound {
            drop(pending);
            return action(self);
        }
        pending.push(Box::new(action));
        Ok(())
    }

    /// **RESOLVE NAME**
    ///
    /// `name` may be qualified (`namespace:name`). Unqualified names without a namespace
    /// are searched across all namespaces and must match exactly one element of type `T`.
    pub fn resolve<T: Any + Send + Sync>(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Arc<T>> {
        let (qualifier, local) = split_qualified(name);
        let namespace = match (qualifier, namespace) {
            (Some(q), Some(ns)) if q != ns => {
                return Err(ScopeError::NameResolutionFailure {
                    namespace: ns.to_string(),
                    name: name.to_string(),
                    reason: format!("qualified with conflicting namespace '{}'", q),
                })
            }
            (Some(q), _) => Some(q),
            (None, ns) => ns,
        };

        let tables = self.lock_tables()?;
        match namespace {
            Some(namespace) => {
                let element = tables
                    .elements
                    .get(&(namespace.to_string(), local.to_string()))
                    .cloned()
                    .ok_or_else(|| ScopeError::NameResolutionFailure {
                        namespace: namespace.to_string(),
                        name: local.to_string(),
                        reason: "not registered".to_string(),
                    })?;
                element.downcast::<T>().map_err(|_| ScopeError::TypeMismatch {
                    name: qualify(namespace, local),
                    expected: std::any::type_name::<T>(),
                })
            }
            None => {
                let mut matches: Vec<Arc<T>> = tables
                    .elements
                    .iter()
                    .filter(|((_, candidate), _)| candidate == local)
                    .filter_map(|(_, element)| Arc::clone(element).downcast::<T>().ok())
                    .collect();
                match matches.len() {
                    1 => Ok(matches.remove(0)),
                    0 => Err(ScopeError::NameResolutionFailure {
                        namespace: "*".to_string(),
                        name: local.to_string(),
                        reason: "not registered".to_string(),
                    }),
                    n => Err(ScopeError::NameResolutionFailure {
                        namespace: "*".to_string(),
                        name: local.to_string(),
                        reason: format!("ambiguous across {} namespaces", n),
                    }),
                }
            }
        }
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.tables
            .lock()
            .elements
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    /// Registered names in `namespace`, sorted.
    pub fn names(&self, namespace: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .lock()
            .elements
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// **BIND**
    ///
    /// **STEP 1**: Drain and run every queued resolution action.
    /// **STEP 2**: Initialize every runnable element.
    /// **STEP 3**: Run actions queued by initializers, then switch to `Bound`.
    pub fn bind(&self) -> Result<()> {
        if self.lock_tables()?.state == BindingState::Bound {
            return Err(ScopeError::AlreadyBound { operation: "bind" });
        }
        let mut first_error: Option<ScopeError> = None;

        self.drain_pending(&mut first_error, false)?;

        let runnables = self.lock_tables()?.runnables.clone();
        for (name, runnable) in runnables {
            if let Err(err) = runnable.initialize(self) {
                log::error!("Initialization of {} failed: {}", name, err);
                first_error.get_or_insert(err);
            }
        }

        self.drain_pending(&mut first_error, true)?;
        log::debug!("Name manager bound with {} elements", self.len());

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn drain_pending(&self, first_error: &mut Option<ScopeError>, finish: bool) -> Result<()> {
        loop {
            let batch = {
                let mut pending = self.lock_pending()?;
                if pending.is_empty() {
                    if finish {
                        self.lock_tables()?.state = BindingState::Bound;
                    }
                    return Ok(());
                }
                std::mem::take(&mut *pending)
            };
            for action in batch {
                if let Err(err) = action(self) {
                    log::error!("Resolution handler failed: {}", err);
                    first_error.get_or_insert(err);
                }
            }
        }
    }

    fn lock_tables(&self) -> Result<MutexGuard<'_, NameTables>> {
        self.tables
            .try_lock_for(self.config.lock_timeout())
            .ok_or_else(|| ScopeError::LockTimeout {
                resource: "name tables".to_string(),
                timeout_ms: self.config.lock_timeout_ms,
            })
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, Vec<ResolutionAction>>> {
        self.pending
            .try_lock_for(self.config.lock_timeout())
            .ok_or_else(|| ScopeError::LockTimeout {
                resource: "pending resolution actions".to_string(),
                timeout_ms: self.config.lock_timeout_ms,
            })
    }
}

impl Default for NameManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
