mod registry;
mod role;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec};
pub use role::ModelRole;
pub use selectors::{Fallback, ModelSelection, ModelSelector, NoModelForRole};
