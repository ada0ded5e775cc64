pub mod fs;
pub use fs::*;

pub mod device_path;
pub use device_path::*;
