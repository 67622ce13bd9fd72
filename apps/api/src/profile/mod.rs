pub mod completeness;
pub mod gaps;
pub mod handlers;
pub mod locks;
pub mod memory;
pub mod models;
pub mod store;
