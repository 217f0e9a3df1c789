pub const MAGIC: u32 = 0xCAFEBABE;

/// JDK 1.0.2
pub const MIN_MAJOR_VERSION: u16 = 45;
/// Java SE 21
pub const MAX_MAJOR_VERSION: u16 = 65;

/// Marks a class file that uses preview features of its major version.
pub const PREVIEW_MINOR_VERSION: u16 = 0xFFFF;
