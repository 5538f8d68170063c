pub mod builder;
pub mod data_context;
pub mod request;

pub use builder::ContextBuilder;
pub use data_context::DataContext;
pub use request::{ContextId, RequestScope};
