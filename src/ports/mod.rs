pub mod config_store;
pub mod task_api;

pub use config_store::*;
pub use task_api::*;
