pub mod client;
pub mod dto;
pub mod task_api;

pub use client::*;
pub use dto::*;
pub use task_api::*;
