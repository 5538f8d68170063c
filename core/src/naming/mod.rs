pub mod manager;
pub mod validation;

pub use manager::{BindingState, NameManager, Runnable};
pub use validation::{
    generate_name, is_valid_name, qualify, split_qualified, validate_name, QUALIFIER,
};
