use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::{Arc, Weak},
};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use support::names;
use tracing::{debug, info};

use crate::{
    define,
    error::LoadError,
    internalise,
    object::{
        class::ClassRecord,
        package::{Package, PackageDefinition},
    },
    security::{Operation, ProtectionDomain, SecurityPolicy},
    source::Resource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub(crate) u64);

impl LoaderId {
    pub const SYSTEM: LoaderId = LoaderId(0);
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader#{}", self.0)
    }
}

/// Raw class bytes handed back by a [`ClassFinder`], ready to be defined.
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    /// The binary name the bytes are expected to define. `None` accepts whatever they declare.
    pub name: Option<String>,
    pub bytes: Bytes,
    /// `None` falls back to the loader's default domain.
    pub domain: Option<ProtectionDomain>,
}

/// The loader specific part of resolution: turn a name into bytes once delegation has failed.
pub trait ClassFinder: Send + Sync {
    fn find_class(&self, name: &str) -> Result<ClassDefinition, LoadError> {
        Err(LoadError::NotFound(name.to_string()))
    }

    fn find_resource(&self, _name: &str) -> Option<Resource> {
        None
    }

    fn find_resources(&self, _name: &str) -> Vec<Resource> {
        vec![]
    }

    fn find_library(&self, _name: &str) -> Option<PathBuf> {
        None
    }
}

/// A find step that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFinder;

impl ClassFinder for NoFinder {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delegation {
    /// Ask the parent before running our own find step.
    #[default]
    ParentFirst,
    /// Never consult the parent.
    SelfOnly,
}

#[derive(Debug, Default)]
struct AssertionStatus {
    default: bool,
    packages: HashMap<String, bool>,
    classes: HashMap<String, bool>,
}

pub struct Loader {
    id: LoaderId,
    name: Option<String>,
    parent: Option<Weak<Loader>>,
    system: Option<Weak<Loader>>,
    delegation: Delegation,
    finder: Box<dyn ClassFinder>,
    policy: Arc<dyn SecurityPolicy>,
    default_domain: ProtectionDomain,

    classes: RwLock<HashMap<String, Arc<ClassRecord>>>,
    packages: RwLock<HashMap<String, Arc<Package>>>,
    load_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    assertions: Mutex<AssertionStatus>,
}

pub(crate) struct LoaderParts {
    pub id: LoaderId,
    pub name: Option<String>,
    pub parent: Option<Weak<Loader>>,
    pub system: Option<Weak<Loader>>,
    pub delegation: Delegation,
    pub finder: Box<dyn ClassFinder>,
    pub policy: Arc<dyn SecurityPolicy>,
}

impl Loader {
    pub(crate) fn new(parts: LoaderParts) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            parent: parts.parent,
            system: parts.system,
            delegation: parts.delegation,
            finder: parts.finder,
            policy: parts.policy,
            default_domain: ProtectionDomain::default(),
            classes: RwLock::new(HashMap::new()),
            packages: RwLock::new(HashMap::new()),
            load_locks: Mutex::new(HashMap::new()),
            assertions: Mutex::new(AssertionStatus::default()),
        }
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn delegation(&self) -> Delegation {
        self.delegation
    }

    /// The delegation parent. Consults the policy, which may veto the lookup.
    pub fn parent(&self) -> Result<Option<Arc<Loader>>, LoadError> {
        self.policy.check_allowed(Operation::GetClassLoader)?;
        Ok(self.parent_unchecked())
    }

    // A parent that has been dropped behaves as if there were none
    fn parent_unchecked(&self) -> Option<Arc<Loader>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn delegate(&self) -> Option<Arc<Loader>> {
        match self.delegation {
            Delegation::ParentFirst => self.parent_unchecked(),
            Delegation::SelfOnly => None,
        }
    }

    /// Every loader from this one up to the root, in delegation order.
    pub(crate) fn ancestry(&self) -> Vec<Arc<Loader>> {
        let mut chain = vec![];
        let mut current = self.parent_unchecked();

        while let Some(loader) = current {
            current = loader.parent_unchecked();
            chain.push(loader);
        }

        chain
    }

    fn load_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.load_locks.lock();
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    // Drop the lock for `name` once nobody but the table and the caller holds it
    fn release_load_lock(&self, name: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.load_locks.lock();
        if Arc::strong_count(lock) == 2 {
            locks.remove(name);
        }
    }

    #[cfg(test)]
    pub(crate) fn load_lock_count(&self) -> usize {
        self.load_locks.lock().len()
    }

    /// Resolve `name`: our cache, then the parent chain, then our find step.
    ///
    /// Concurrent calls for one name are serialised so the find step runs at most once and
    /// every caller receives the same record.
    pub fn load_class(&self, name: &str) -> Result<Arc<ClassRecord>, LoadError> {
        if !names::is_binary_name(name) {
            return Err(LoadError::NotFound(name.to_string()));
        }

        if let Some(found) = self.find_loaded_class(name) {
            debug!("Fast path: {} ({})", name, self.id);
            return Ok(found);
        }

        let lock = self.load_lock(name);
        let result = {
            let _guard = lock.lock();
            self.load_class_locked(name)
        };

        self.release_load_lock(name, &lock);
        result
    }

    fn load_class_locked(&self, name: &str) -> Result<Arc<ClassRecord>, LoadError> {
        // Someone else may have defined it while we waited on the lock
        if let Some(found) = self.find_loaded_class(name) {
            debug!("Raced to {} ({}), using the existing definition", name, self.id);
            return Ok(found);
        }

        debug!("Slow path: {} ({})", name, self.id);

        if let Some(parent) = self.delegate() {
            match parent.load_class(name) {
                Ok(found) => return Ok(found),
                Err(LoadError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let mut definition = self.finder.find_class(name)?;

        let defines = definition.name.get_or_insert_with(|| name.to_string());
        if defines.as_str() != name {
            return Err(LoadError::NameMismatch {
                expected: name.to_string(),
                found: defines.clone(),
            });
        }

        match self.define(definition) {
            // An explicit define_class won the race, hand out its record
            Err(LoadError::DuplicateDefinition(_)) => self
                .find_loaded_class(name)
                .ok_or_else(|| LoadError::NotFound(name.to_string())),
            other => other,
        }
    }

    /// Only classes this loader defined itself.
    pub fn find_loaded_class(&self, name: &str) -> Option<Arc<ClassRecord>> {
        self.classes.read().get(name).cloned()
    }

    pub fn loaded_classes(&self) -> Vec<Arc<ClassRecord>> {
        let mut classes: Vec<_> = self.classes.read().values().cloned().collect();
        classes.sort_by(|a, b| a.name().cmp(b.name()));
        classes
    }

    /// Resolve through the system loader, regardless of this loader's chain.
    pub fn find_system_class(&self, name: &str) -> Result<Arc<ClassRecord>, LoadError> {
        match &self.system {
            Some(system) => system
                .upgrade()
                .ok_or_else(|| LoadError::NotFound(name.to_string()))?
                .load_class(name),
            // We are the system loader
            None => self.load_class(name),
        }
    }

    /// Define `bytes[offset..offset + length]` as a class of this loader.
    pub fn define_class(
        &self,
        name: Option<&str>,
        bytes: &[u8],
        offset: usize,
        length: usize,
        domain: Option<ProtectionDomain>,
    ) -> Result<Arc<ClassRecord>, LoadError> {
        let bytes = define::slice(bytes, offset, length)?;

        self.define(ClassDefinition {
            name: name.map(str::to_string),
            bytes,
            domain,
        })
    }

    /// Define the remaining contents of `buf` as a class of this loader.
    pub fn define_class_from_buf(
        &self,
        name: Option<&str>,
        buf: Bytes,
        domain: Option<ProtectionDomain>,
    ) -> Result<Arc<ClassRecord>, LoadError> {
        self.define(ClassDefinition {
            name: name.map(str::to_string),
            bytes: buf,
            domain,
        })
    }

    fn define(&self, definition: ClassDefinition) -> Result<Arc<ClassRecord>, LoadError> {
        let verified = define::verify(definition.name.as_deref(), definition.bytes)?;

        if self.classes.read().contains_key(&verified.name) {
            return Err(LoadError::DuplicateDefinition(verified.name));
        }

        let domain = definition
            .domain
            .unwrap_or_else(|| self.default_domain.clone());
        let package = self.package_for(&verified.name, &domain)?;
        let record = Arc::new(ClassRecord::new(verified, self.id, package, domain));

        // The duplicate check and the publish happen under one write lock
        let mut classes = self.classes.write();
        if classes.contains_key(record.name()) {
            return Err(LoadError::DuplicateDefinition(record.name().to_string()));
        }

        classes.insert(record.name().to_string(), Arc::clone(&record));
        drop(classes);

        info!("Defined {} in {} ({})", record.name(), self.id, record.digest_hex());
        Ok(record)
    }

    // Find or implicitly create the package a new class belongs to, enforcing sealing
    fn package_for(
        &self,
        class_name: &str,
        domain: &ProtectionDomain,
    ) -> Result<Option<Arc<Package>>, LoadError> {
        let Some(package_name) = names::package_of(class_name) else {
            return Ok(None);
        };

        let package = match self.get_package(package_name) {
            Some(existing) => existing,
            None => {
                let mut packages = self.packages.write();
                let package = packages.entry(package_name.to_string()).or_insert_with(|| {
                    debug!("Implicitly defining package {} in {}", package_name, self.id);
                    Arc::new(Package::new(PackageDefinition::named(package_name), self.id))
                });

                Arc::clone(package)
            }
        };

        if let Some(seal) = package.seal_base() {
            if domain.code_source() != Some(seal) {
                return Err(LoadError::SealingViolation {
                    package: package_name.to_string(),
                    sealed_to: seal.to_string(),
                });
            }
        }

        Ok(Some(package))
    }

    /// The protection domain `class` was defined with. Consults the policy.
    pub fn protection_domain(&self, class: &ClassRecord) -> Result<ProtectionDomain, LoadError> {
        self.policy.check_allowed(Operation::GetProtectionDomain)?;
        Ok(class.domain().clone())
    }

    /// Fails with `AlreadyDefined` if this loader or any ancestor already has the name.
    ///
    /// Ancestors are checked while our package table is write locked, so of two racing
    /// definitions in this loader exactly one succeeds. Loaders elsewhere in the chain are not
    /// locked: if one of them defines the same name concurrently both definitions stand, and
    /// `get_package` returns the one nearest the asking loader.
    pub fn define_package(&self, definition: PackageDefinition) -> Result<Arc<Package>, LoadError> {
        let mut packages = self.packages.write();

        let inherited = self
            .ancestry()
            .iter()
            .any(|l| l.own_package(&definition.name).is_some());

        if inherited || packages.contains_key(&definition.name) {
            return Err(LoadError::AlreadyDefined(definition.name));
        }

        let name = definition.name.clone();
        let package = Arc::new(Package::new(definition, self.id));
        packages.insert(name, Arc::clone(&package));
        drop(packages);

        info!("Defined package {} in {}", package.name(), self.id);
        Ok(package)
    }

    fn own_package(&self, name: &str) -> Option<Arc<Package>> {
        self.packages.read().get(name).cloned()
    }

    /// Look `name` up here, then through the parent chain.
    pub fn get_package(&self, name: &str) -> Option<Arc<Package>> {
        self.own_package(name)
            .or_else(|| self.ancestry().iter().find_map(|l| l.own_package(name)))
    }

    /// Packages visible to this loader. Our own definitions shadow the ancestors'.
    pub fn get_packages(&self) -> Vec<Arc<Package>> {
        let mut visible: HashMap<String, Arc<Package>> = HashMap::new();

        for loader in self.ancestry().iter().rev() {
            for (name, package) in loader.packages.read().iter() {
                visible.insert(name.clone(), Arc::clone(package));
            }
        }

        for (name, package) in self.packages.read().iter() {
            visible.insert(name.clone(), Arc::clone(package));
        }

        let mut packages: Vec<_> = visible.into_values().collect();
        packages.sort_by(|a, b| a.name().cmp(b.name()));
        packages
    }

    /// Find a resource, parent first.
    pub fn get_resource(&self, name: &str) -> Option<Resource> {
        if let Some(parent) = self.delegate() {
            if let Some(found) = parent.get_resource(name) {
                return Some(found);
            }
        }

        self.finder.find_resource(name)
    }

    /// Every resource called `name`, the parent's first.
    pub fn get_resources(&self, name: &str) -> Vec<Resource> {
        let mut found = self
            .delegate()
            .map(|parent| parent.get_resources(name))
            .unwrap_or_default();

        found.extend(self.finder.find_resources(name));
        found
    }

    pub fn get_resource_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, LoadError> {
        match self.get_resource(name) {
            Some(resource) => Ok(Some(resource.read().map_err(internalise!())?)),
            None => Ok(None),
        }
    }

    pub fn find_resource(&self, name: &str) -> Option<Resource> {
        self.finder.find_resource(name)
    }

    pub fn find_resources(&self, name: &str) -> Vec<Resource> {
        self.finder.find_resources(name)
    }

    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        self.finder.find_library(name)
    }

    pub fn set_default_assertion_status(&self, enabled: bool) {
        self.assertions.lock().default = enabled;
    }

    pub fn set_package_assertion_status(&self, package: &str, enabled: bool) {
        self.assertions
            .lock()
            .packages
            .insert(package.to_string(), enabled);
    }

    pub fn set_class_assertion_status(&self, class: &str, enabled: bool) {
        self.assertions
            .lock()
            .classes
            .insert(class.to_string(), enabled);
    }

    /// Reset to "disabled everywhere".
    pub fn clear_assertion_status(&self) {
        *self.assertions.lock() = AssertionStatus::default();
    }

    /// Class setting, else the closest enclosing package setting, else the default.
    pub fn desired_assertion_status(&self, class: &str) -> bool {
        let status = self.assertions.lock();

        if let Some(enabled) = status.classes.get(class) {
            return *enabled;
        }

        names::package_of(class)
            .into_iter()
            .flat_map(names::enclosing_packages)
            .find_map(|package| status.packages.get(package).copied())
            .unwrap_or(status.default)
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("delegation", &self.delegation)
            .field("classes", &self.classes.read().len())
            .finish()
    }
}
