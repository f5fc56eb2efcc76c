pub mod board;
pub mod error;
pub mod filter;
pub mod pagination;
pub mod stats;
pub mod task;

pub use board::*;
pub use error::*;
pub use filter::*;
pub use pagination::*;
pub use stats::*;
pub use task::*;
