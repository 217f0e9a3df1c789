use std::cmp::Ordering;

use anyhow::anyhow;

use crate::{error::LoadError, object::loader::LoaderId, source::Origin};

/// Everything needed to define a package. Unset fields stay unset on the package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDefinition {
    pub name: String,
    pub spec_title: Option<String>,
    pub spec_version: Option<String>,
    pub spec_vendor: Option<String>,
    pub impl_title: Option<String>,
    pub impl_version: Option<String>,
    pub impl_vendor: Option<String>,
    /// `None` leaves the package unsealed.
    pub seal_base: Option<Origin>,
}

impl PackageDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Package metadata, immutable once defined.
#[derive(Debug)]
pub struct Package {
    definition: PackageDefinition,
    loader: LoaderId,
}

impl Package {
    pub(crate) fn new(definition: PackageDefinition, loader: LoaderId) -> Self {
        Self { definition, loader }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// The loader that defined this package.
    pub fn loader(&self) -> LoaderId {
        self.loader
    }

    pub fn specification_title(&self) -> Option<&str> {
        self.definition.spec_title.as_deref()
    }

    pub fn specification_version(&self) -> Option<&str> {
        self.definition.spec_version.as_deref()
    }

    pub fn specification_vendor(&self) -> Option<&str> {
        self.definition.spec_vendor.as_deref()
    }

    pub fn implementation_title(&self) -> Option<&str> {
        self.definition.impl_title.as_deref()
    }

    pub fn implementation_version(&self) -> Option<&str> {
        self.definition.impl_version.as_deref()
    }

    pub fn implementation_vendor(&self) -> Option<&str> {
        self.definition.impl_vendor.as_deref()
    }

    pub fn seal_base(&self) -> Option<&Origin> {
        self.definition.seal_base.as_ref()
    }

    pub fn is_sealed(&self) -> bool {
        self.definition.seal_base.is_some()
    }

    /// Whether the package is sealed to exactly `origin`.
    pub fn is_sealed_with(&self, origin: &Origin) -> bool {
        self.seal_base() == Some(origin)
    }

    /// Compare the specification version against `desired`, both as dotted decimals.
    /// A package with no specification version is compatible with nothing.
    pub fn is_compatible_with(&self, desired: &str) -> Result<bool, LoadError> {
        let Some(ours) = self.specification_version() else {
            return Ok(false);
        };

        let ours = parse_version(ours)?;
        let desired = parse_version(desired)?;

        for idx in 0..ours.len().max(desired.len()) {
            let lhs = ours.get(idx).copied().unwrap_or(0);
            let rhs = desired.get(idx).copied().unwrap_or(0);

            match lhs.cmp(&rhs) {
                Ordering::Greater => return Ok(true),
                Ordering::Less => return Ok(false),
                Ordering::Equal => {}
            }
        }

        Ok(true)
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.loader == other.loader && self.definition == other.definition
    }
}

fn parse_version(version: &str) -> Result<Vec<u64>, LoadError> {
    version
        .split('.')
        .map(|part| {
            part.parse::<u64>()
                .map_err(|e| LoadError::Internal(anyhow!("bad version '{}': {}", version, e)))
        })
        .collect()
}
