use crate::dependencies::supplier::{Supplier, SupplierRef};
use crate::dependencies::types::Dependency;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

/// **SUPPLIER REGISTRY**
///
/// **PURPOSE**: Maps a dependency to the first registered supplier able to satisfy it.
/// **GUARANTEE**: Registration is idempotent per concrete supplier type and safe to call
/// from several configuring subsystems at once.
#[derive(Default)]
pub struct DataCatalog {
    inner: RwLock<CatalogInner>,
}

#[derive(Default)]
struct CatalogInner {
    suppliers: Vec<SupplierRef>,
    registered_types: HashSet<TypeId>,
}

impl DataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `supplier`. Returns `false` when a supplier of the same type is already present.
    pub fn register<S: Supplier>(&self, supplier: S) -> bool {
        self.register_arc(Arc::new(supplier))
    }

    pub fn register_arc<S: Supplier>(&self, supplier: Arc<S>) -> bool {
        let type_id = TypeId::of::<S>();
        let mut inner = self.inner.write();
        if !inner.registered_types.insert(type_id) {
            log::debug!("Supplier {} already registered", supplier.name());
            return false;
        }
        log::debug!("Registering supplier {}", supplier.name());
        inner.suppliers.push(supplier);
        true
    }

    /// First supplier in registration order whose `can_supply` accepts `dependency`.
    pub fn find_supplier(&self, dependency: &Dependency) -> Option<SupplierRef> {
        self.inner
            .read()
            .suppliers
            .iter()
            .find(|supplier| supplier.can_supply(dependency))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn supplier_names(&self) -> Vec<String> {
        self.inner
            .read()
            .suppliers
            .iter()
            .map(|supplier| supplier.name().to_string())
            .collect()
    }
}
