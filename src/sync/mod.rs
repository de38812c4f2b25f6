pub mod error;
pub mod scheduler;
pub mod staging;
pub mod storage;
pub mod synchronizer;

pub use scheduler::Scheduler;
pub use synchronizer::Synchronizer;
