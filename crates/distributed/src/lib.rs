//! Distributed - compute context and communicator wrapper
//!
//! Lets training code run unchanged in a single process or as one rank of a
//! data-parallel group.

pub mod communicator;
pub mod context;
pub mod wrapper;

pub use communicator::{Communicator, LocalCommunicator, LocalGroup};
pub use context::ComputeContext;
pub use convert_core::fs::immediate_dirs;
pub use wrapper::CommunicatorWrapper;
