pub mod shared;
pub mod system;
