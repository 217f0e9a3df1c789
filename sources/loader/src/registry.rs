use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tracing::info;

use crate::{
    error::LoadError,
    object::{
        class::ClassRecord,
        loader::{ClassFinder, Delegation, Loader, LoaderId, LoaderParts},
    },
    security::{Operation, PermitAll, SecurityPolicy},
    source::{ClassPath, Resource},
};

pub struct RegistryOptions {
    /// Where the system loader finds classes and resources.
    pub class_path: ClassPath,
    pub policy: Arc<dyn SecurityPolicy>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            class_path: ClassPath::new(),
            policy: Arc::new(PermitAll),
        }
    }
}

/// Which loader a new loader delegates to.
#[derive(Debug, Clone, Default)]
pub enum ParentLoader {
    #[default]
    System,
    /// No parent at all, the loader only ever consults its own find step.
    Detached,
    Loader(Arc<Loader>),
}

#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    pub name: Option<String>,
    pub parent: ParentLoader,
    pub delegation: Delegation,
}

impl LoaderOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: ParentLoader) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_delegation(mut self, delegation: Delegation) -> Self {
        self.delegation = delegation;
        self
    }
}

/// Owns every loader and the links between them. Loaders only hold weak references to their
/// parents, so the registry keeps them alive.
pub struct LoaderRegistry {
    policy: Arc<dyn SecurityPolicy>,
    system: Arc<Loader>,
    loaders: RwLock<HashMap<LoaderId, Arc<Loader>>>,
    next_id: AtomicU64,
}

impl LoaderRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        let system = Arc::new(Loader::new(LoaderParts {
            id: LoaderId::SYSTEM,
            name: Some("system".to_string()),
            parent: None,
            system: None,
            delegation: Delegation::ParentFirst,
            finder: Box::new(options.class_path),
            policy: Arc::clone(&options.policy),
        }));

        let mut loaders = HashMap::new();
        loaders.insert(LoaderId::SYSTEM, Arc::clone(&system));

        info!("Registry starting up");

        Self {
            policy: options.policy,
            system,
            loaders: RwLock::new(loaders),
            next_id: AtomicU64::new(LoaderId::SYSTEM.0 + 1),
        }
    }

    /// The system loader. Consults the policy, which may veto the lookup.
    pub fn system_loader(&self) -> Result<Arc<Loader>, LoadError> {
        self.policy.check_allowed(Operation::GetClassLoader)?;
        Ok(Arc::clone(&self.system))
    }

    /// A loader delegating to the system loader.
    pub fn new_loader(&self, finder: impl ClassFinder + 'static) -> Result<Arc<Loader>, LoadError> {
        self.new_loader_with(LoaderOptions::default(), finder)
    }

    pub fn new_loader_with(
        &self,
        options: LoaderOptions,
        finder: impl ClassFinder + 'static,
    ) -> Result<Arc<Loader>, LoadError> {
        // Nothing may be allocated or registered before the policy has had its say
        self.policy.check_allowed(Operation::CreateClassLoader)?;

        let parent = match options.parent {
            ParentLoader::System => Some(Arc::clone(&self.system)),
            ParentLoader::Detached => None,
            ParentLoader::Loader(parent) => {
                // Parents are fixed at construction and must already be registered here,
                // so a delegation chain can never loop back on itself
                let registered = self
                    .loaders
                    .read()
                    .get(&parent.id())
                    .map(|known| Arc::ptr_eq(known, &parent))
                    .unwrap_or(false);

                if !registered {
                    return Err(LoadError::UnknownLoader(parent.id()));
                }

                Some(parent)
            }
        };

        let id = LoaderId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let loader = Arc::new(Loader::new(LoaderParts {
            id,
            name: options.name,
            parent: parent.as_ref().map(Arc::downgrade),
            system: Some(Arc::downgrade(&self.system)),
            delegation: options.delegation,
            finder: Box::new(finder),
            policy: Arc::clone(&self.policy),
        }));

        self.loaders.write().insert(id, Arc::clone(&loader));

        info!(
            "Created {} ({}) with parent {}",
            id,
            loader.name().unwrap_or("unnamed"),
            parent
                .map(|p| p.id().to_string())
                .unwrap_or_else(|| "<none>".to_string())
        );

        Ok(loader)
    }

    pub fn get(&self, id: LoaderId) -> Option<Arc<Loader>> {
        self.loaders.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.loaders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.read().is_empty()
    }

    /// Stop tracking a loader. Children that still point at it will see no parent once the
    /// last strong reference goes away. The system loader cannot be removed.
    pub fn remove(&self, id: LoaderId) -> Option<Arc<Loader>> {
        if id == LoaderId::SYSTEM {
            return None;
        }

        self.loaders.write().remove(&id)
    }

    pub fn system_class(&self, name: &str) -> Result<Arc<ClassRecord>, LoadError> {
        self.system.load_class(name)
    }

    pub fn system_resource(&self, name: &str) -> Option<Resource> {
        self.system.get_resource(name)
    }

    pub fn system_resources(&self, name: &str) -> Vec<Resource> {
        self.system.get_resources(name)
    }

    pub fn system_resource_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, LoadError> {
        self.system.get_resource_bytes(name)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}
