pub mod analysis;
pub mod item;
pub mod job;
