mod define;
pub mod error;
pub mod object;
pub mod registry;
pub mod security;
pub mod source;

pub use error::LoadError;
pub use object::{
    class::ClassRecord,
    loader::{ClassDefinition, ClassFinder, Delegation, Loader, LoaderId, NoFinder},
    package::{Package, PackageDefinition},
};
pub use registry::{LoaderOptions, LoaderRegistry, ParentLoader, RegistryOptions};
pub use security::{DenyList, Operation, PermitAll, ProtectionDomain, SecurityPolicy};
pub use source::{ByteSource, ClassPath, DirectorySource, MemorySource, Origin, Resource};
