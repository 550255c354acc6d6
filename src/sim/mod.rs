pub mod event;
pub mod level;
pub mod records;
pub mod step;
pub mod world;
