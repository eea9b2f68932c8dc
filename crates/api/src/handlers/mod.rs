pub mod capacity;
pub mod featured;
pub mod sweep;
