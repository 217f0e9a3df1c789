pub mod class;
pub mod loader;
pub mod package;
