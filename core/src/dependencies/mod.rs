pub mod catalog;
pub mod supplier;
pub mod types;

pub use catalog::DataCatalog;
pub use supplier::{supplier_fn, FactorySupplier, Supplier, SupplierRef, Supply, SupplyRef};
pub use types::{DataType, Dependency, Scope};
