pub mod bytes_ext;
pub mod names;
