pub mod error;
pub mod task_list_store;

pub use error::*;
pub use task_list_store::*;
