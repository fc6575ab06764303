pub mod buffer;
pub mod data_loader;
pub mod filters;
pub mod job;
pub mod operation;
pub mod worker;
