//! Cycle storage and derived-metric processors.
pub mod capacity;
pub mod dcir;
pub mod differential;
pub mod fade;
pub mod savgol;
pub mod store;
pub mod summary;

pub use store::CycleStore;
