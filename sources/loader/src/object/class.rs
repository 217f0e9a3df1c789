use std::{fmt, sync::Arc};

use parse::classfile::ClassFile;

use crate::{
    define::VerifiedClass,
    object::{loader::LoaderId, package::Package},
    security::ProtectionDomain,
};

/// A successfully defined class. Lives as long as the loader that defined it.
pub struct ClassRecord {
    name: String,
    internal_name: String,
    loader: LoaderId,
    digest: [u8; 20],
    super_class: Option<String>,
    interfaces: Vec<String>,
    source_file: Option<String>,
    package: Option<Arc<Package>>,
    domain: ProtectionDomain,
    class_file: ClassFile,
}

impl ClassRecord {
    pub(crate) fn new(
        verified: VerifiedClass,
        loader: LoaderId,
        package: Option<Arc<Package>>,
        domain: ProtectionDomain,
    ) -> Self {
        Self {
            name: verified.name,
            internal_name: verified.internal_name,
            loader,
            digest: verified.digest,
            super_class: verified.super_class,
            interfaces: verified.interfaces,
            source_file: verified.source_file,
            package,
            domain,
            class_file: verified.class_file,
        }
    }

    /// The binary name, `a.b.C`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name as the class file spells it, `a/b/C`.
    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    /// The defining loader.
    pub fn loader(&self) -> LoaderId {
        self.loader
    }

    /// SHA-1 of the bytes the class was defined from.
    pub fn digest(&self) -> &[u8; 20] {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.super_class.as_deref()
    }

    pub fn interface_names(&self) -> &[String] {
        &self.interfaces
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn package(&self) -> Option<&Arc<Package>> {
        self.package.as_ref()
    }

    pub fn class_file(&self) -> &ClassFile {
        &self.class_file
    }

    // Reached through `Loader::protection_domain`, which consults the policy first
    pub(crate) fn domain(&self) -> &ProtectionDomain {
        &self.domain
    }
}

impl fmt::Debug for ClassRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRecord")
            .field("name", &self.name)
            .field("loader", &self.loader)
            .field("digest", &self.digest_hex())
            .field("super_class", &self.super_class)
            .finish()
    }
}
