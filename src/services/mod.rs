pub mod orchestrator;
pub mod pricing;
pub mod providers;
pub mod registry;
pub mod storage;
