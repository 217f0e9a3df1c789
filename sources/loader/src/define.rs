//! The pure half of class definition: everything that can be decided from the bytes alone.
//! Publishing the result into a loader's cache happens in [`crate::object::loader::Loader`].

use bytes::Bytes;
use parse::{attributes::SourceFileAttribute, classfile::ClassFile, parser::Parser};
use sha1::{Digest, Sha1};
use support::names::{self, to_binary};
use tracing::debug;

use crate::error::LoadError;

const PROHIBITED_PREFIX: &str = "java.";

pub(crate) struct VerifiedClass {
    pub name: String,
    pub internal_name: String,
    pub digest: [u8; 20],
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub source_file: Option<String>,
    pub class_file: ClassFile,
}

/// Cut `bytes[offset..offset + length]`, refusing ranges that leave the slice.
pub(crate) fn slice(bytes: &[u8], offset: usize, length: usize) -> Result<Bytes, LoadError> {
    let out_of_bounds = || LoadError::IndexOutOfBounds {
        offset,
        length,
        size: bytes.len(),
    };

    let end = offset.checked_add(length).ok_or_else(out_of_bounds)?;
    let range = bytes.get(offset..end).ok_or_else(out_of_bounds)?;

    Ok(Bytes::copy_from_slice(range))
}

/// Check `bytes` hold a well formed class, optionally named `expected`.
pub(crate) fn verify(expected: Option<&str>, bytes: Bytes) -> Result<VerifiedClass, LoadError> {
    let display_name = expected.unwrap_or("<unnamed>");
    let invalid = |e: anyhow::Error| LoadError::InvalidFormat {
        name: display_name.to_string(),
        reason: e.to_string(),
    };

    let mut digest = [0u8; 20];
    digest.copy_from_slice(&Sha1::digest(&bytes));

    let class_file = Parser::from_bytes(bytes).parse().map_err(invalid)?;

    let internal_name = class_file.this_class_name().map_err(invalid)?;
    let name = to_binary(&internal_name);

    if let Some(expected) = expected {
        if expected != name {
            return Err(LoadError::NameMismatch {
                expected: expected.to_string(),
                found: name,
            });
        }
    }

    if !names::is_binary_name(&name) {
        return Err(invalid(anyhow::anyhow!("illegal class name {}", internal_name)));
    }

    if name.starts_with(PROHIBITED_PREFIX) {
        let package = names::package_of(&name).unwrap_or(&name).to_string();
        return Err(LoadError::ProhibitedPackage(package));
    }

    let super_class = class_file
        .super_class_name()
        .map_err(invalid)?
        .map(|s| to_binary(&s));

    let interfaces = class_file
        .interface_names()
        .map_err(invalid)?
        .iter()
        .map(|s| to_binary(s))
        .collect();

    // A malformed SourceFile is a format error, a missing one is fine
    let source_file = match class_file.attributes.count::<SourceFileAttribute>() {
        Ok(0) => None,
        Ok(_) => Some(
            class_file
                .attributes
                .known_attribute::<SourceFileAttribute>(&class_file.constant_pool)
                .and_then(|attr| attr.try_name())
                .map_err(invalid)?,
        ),
        Err(e) => return Err(invalid(e)),
    };

    debug!("Verified {} ({} pool entries)", name, class_file.constant_pool.len());

    Ok(VerifiedClass {
        name,
        internal_name,
        digest,
        super_class,
        interfaces,
        source_file,
        class_file,
    })
}
