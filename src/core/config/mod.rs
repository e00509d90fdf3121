pub mod data;
pub mod io;

pub use data::{path_display, Config, CustomModel};
pub use io::ConfigError;
