//! # SUPPLIER AND SUPPLY CONTRACTS
//!
//! A [`Supplier`] is a configuration-time singleton able to produce data for one or more
//! dependencies. For each resolved dependency it hands out a [`Supply`], the unit that runs
//! once per request against a live [`DataContext`].

use crate::context::DataContext;
use crate::dependencies::types::{DataType, Dependency};
use crate::errors::Result;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

pub type SupplierRef = Arc<dyn Supplier>;
pub type SupplyRef = Arc<dyn Supply>;

/// **DATA SUPPLIER**
///
/// **MANDATE**: Implementations are shared across concurrent requests and MUST NOT keep
/// per-request state. Everything a request produces goes into its data context.
pub trait Supplier: Send + Sync + 'static {
    /// Diagnostic name used in logs and definition listings.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn supplied_types(&self) -> Vec<DataType>;

    /// Scoped suppliers only answer for the scope names accepted by [`Supplier::supplies_scope`].
    fn is_scoped(&self) -> bool {
        false
    }

    fn supplies_scope(&self, scope_name: Option<&str>) -> bool {
        let _ = scope_name;
        true
    }

    fn can_supply(&self, dependency: &Dependency) -> bool {
        self.supplied_types().contains(&dependency.data_type)
            && (!self.is_scoped() || self.supplies_scope(dependency.scope_name()))
    }

    /// Build the supply for one dependency. `prior` holds the supplies already declared
    /// ahead of it in the same context definition.
    fn get_supply(&self, dependency: &Dependency, prior: &[SupplyRef]) -> Result<SupplyRef>;
}

/// **DEPENDENCY-BOUND EXECUTABLE**
pub trait Supply: Send + Sync {
    fn dependency(&self) -> &Dependency;

    /// Dependencies whose supplies must have run before this one.
    fn run_after(&self) -> &[Dependency] {
        &[]
    }

    /// Produce the value into `context`. Called once per request.
    fn supply(&self, context: &DataContext<'_>) -> Result<()>;
}

/// Closure-backed supplier producing values of type `T`.
///
/// Each closure has its own Rust type, so two `supplier_fn` call sites register as two
/// distinct suppliers while repeated registration from one call site is a no-op.
pub struct FactorySupplier<T, F> {
    factory: Arc<F>,
    scopes: Option<Vec<String>>,
    run_after: Vec<Dependency>,
    _marker: PhantomData<fn() -> T>,
}

/// Create a [`FactorySupplier`] answering every scope name for `T`.
pub fn supplier_fn<T, F>(factory: F) -> FactorySupplier<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&DataContext<'_>, &Dependency) -> Result<T> + Send + Sync + 'static,
{
    FactorySupplier {
        factory: Arc::new(factory),
        scopes: None,
        run_after: Vec::new(),
        _marker: PhantomData,
    }
}

impl<T, F> FactorySupplier<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&DataContext<'_>, &Dependency) -> Result<T> + Send + Sync + 'static,
{
    /// Restrict the supplier to these scope names. An empty name stands for the default scope.
    pub fn scoped<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Declare that supplies from this supplier must run after `dependency`'s supply.
    pub fn after(mut self, dependency: Dependency) -> Self {
        self.run_after.push(dependency);
        self
    }
}

impl<T, F> Supplier for FactorySupplier<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&DataContext<'_>, &Dependency) -> Result<T> + Send + Sync + 'static,
{
    fn supplied_types(&self) -> Vec<DataType> {
        vec![DataType::of::<T>()]
    }

    fn is_scoped(&self) -> bool {
        self.scopes.is_some()
    }

    fn supplies_scope(&self, scope_name: Option<&str>) -> bool {
        match &self.scopes {
            None => true,
            Some(names) => names
                .iter()
                .any(|name| name.as_str() == scope_name.unwrap_or("")),
        }
    }

    fn get_supply(&self, dependency: &Dependency, _prior: &[SupplyRef]) -> Result<SupplyRef> {
        Ok(Arc::new(FactorySupply::<T, F> {
            dependency: dependency.clone(),
            factory: Arc::clone(&self.factory),
            run_after: self.run_after.clone(),
            _marker: PhantomData,
        }))
    }
}

struct FactorySupply<T, F> {
    dependency: Dependency,
    factory: Arc<F>,
    run_after: Vec<Dependency>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Supply for FactorySupply<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&DataContext<'_>, &Dependency) -> Result<T> + Send + Sync + 'static,
{
    fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    fn run_after(&self) -> &[Dependency] {
        &self.run_after
    }

    fn supply(&self, context: &DataContext<'_>) -> Result<()> {
        let value = (self.factory)(context, &self.dependency)?;
        context.set(value, self.dependency.scope_name(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person;

    #[test]
    fn test_unscoped_factory_answers_any_scope() {
        let supplier = supplier_fn(|_, _| Ok(Person));
        assert!(!supplier.is_scoped());
        assert!(supplier.can_supply(&Dependency::of::<Person>(None)));
        assert!(supplier.can_supply(&Dependency::of::<Person>(Some("customer"))));
        assert!(!supplier.can_supply(&Dependency::of::<String>(None)));
    }

    #[test]
    fn test_scoped_factory_filters_names() {
        let supplier = supplier_fn(|_, _| Ok(Person)).scoped(["customer", ""]);
        assert!(supplier.is_scoped());
        assert!(supplier.can_supply(&Dependency::of::<Person>(Some("customer"))));
        assert!(supplier.can_supply(&Dependency::of::<Person>(None)));
        assert!(!supplier.can_supply(&Dependency::of::<Person>(Some("vendor"))));
    }

    #[test]
    fn test_supply_carries_dependency_and_ordering() {
        let after = Dependency::of::<String>(None);
        let supplier = supplier_fn(|_, _| Ok(Person)).after(after.clone());
        let dependency = Dependency::of::<Person>(Some("customer"));
        let supply = supplier.get_supply(&dependency, &[]).unwrap();
        assert_eq!(supply.dependency(), &dependency);
        assert_eq!(supply.run_after(), &[after]);
    }
}
