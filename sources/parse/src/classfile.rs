use crate::{
    attributes::Attributes,
    flags::{ClassFileAccessFlags, FieldAccessFlags, MethodAccessFlags},
    pool::{
        ConstantClass, ConstantEntry, ConstantField, ConstantModule, ConstantNameAndType,
        ConstantPackage, ConstantPool, ConstantUtf8,
    },
};
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::{fmt, marker::PhantomData, sync::Arc};

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub constant_pool: ConstantPool,
    pub meta_data: MetaData,

    pub access_flags: ClassFileAccessFlags,
    pub this_class: Addressed<ConstantClass>,
    pub super_class: Option<Addressed<ConstantClass>>,

    pub interfaces: Interfaces,
    pub fields: Fields,
    pub methods: Methods,
    pub attributes: Attributes,
}

impl ClassFile {
    /// The internal name (`a/b/C`) this class file declares for itself.
    pub fn this_class_name(&self) -> Result<String> {
        self.this_class.try_resolve()?.try_name()
    }

    pub fn super_class_name(&self) -> Result<Option<String>> {
        match &self.super_class {
            Some(cls) => Ok(Some(cls.try_resolve()?.try_name()?)),
            None => Ok(None),
        }
    }

    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces
            .values
            .iter()
            .map(|cls| cls.try_resolve()?.try_name())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub flags: FieldAccessFlags,
    pub name: Addressed<ConstantUtf8>,
    pub descriptor: Addressed<ConstantUtf8>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct Fields {
    pub(crate) values: Vec<Field>,
}

impl Fields {
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub flags: MethodAccessFlags,
    pub name: Addressed<ConstantUtf8>,
    pub descriptor: Addressed<ConstantUtf8>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct Methods {
    pub(crate) values: Vec<Method>,
}

impl Methods {
    pub fn locate(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.values.iter().find(|v| {
            let matches = || -> Result<bool> {
                Ok(v.name.try_resolve()?.try_string()? == name
                    && v.descriptor.try_resolve()?.try_string()? == descriptor)
            };

            matches().unwrap_or(false)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Interfaces {
    pub(crate) values: Vec<Addressed<ConstantClass>>,
}

#[derive(Debug, Clone)]
pub struct MetaData {
    pub minor_version: u16,
    pub major_version: u16,
}

/// An index into a constant pool, typed by the entry it is expected to point at.
#[derive(Clone)]
pub struct Addressed<T> {
    phantom: PhantomData<T>,

    index: u16,
    entries: Arc<RwLock<Vec<ConstantEntry>>>,
}

impl<T> Addressed<T> {
    pub fn from(index: u16, pool: Arc<RwLock<Vec<ConstantEntry>>>) -> Self {
        Self {
            phantom: PhantomData,
            index,
            entries: pool,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    fn entry(&self) -> Result<ConstantEntry> {
        let entries = self.entries.read();
        let slot = usize::from(self.index)
            .checked_sub(1)
            .ok_or(anyhow!("constant pool index 0 is never valid"))?;

        entries
            .get(slot)
            .cloned()
            .ok_or(anyhow!("no value found @ {}", self.index))
    }
}

impl<T> fmt::Debug for Addressed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addressed {{ {} }}", self.index)
    }
}

pub trait Resolvable<T> {
    fn try_resolve(&self) -> Result<T>;
}

macro_rules! address {
    ($type: ty, $enum: ident, $accessor: ident) => {
        impl Resolvable<$type> for Addressed<$type> {
            fn try_resolve(&self) -> Result<$type> {
                let entry = self.entry()?;
                entry.$accessor().cloned().ok_or_else(|| {
                    anyhow!(
                        "expected {} got {} @ {}",
                        stringify!($enum),
                        entry.kind(),
                        self.index
                    )
                })
            }
        }
    };
}

impl Resolvable<ConstantEntry> for Addressed<ConstantEntry> {
    fn try_resolve(&self) -> Result<ConstantEntry> {
        let entry = self.entry()?;
        if entry.is_reserved() {
            return Err(anyhow!("{} is a reserved slot", self.index));
        }

        Ok(entry)
    }
}

address!(ConstantClass, Class, as_class);
address!(ConstantField, Field, as_field);
address!(ConstantNameAndType, NameAndType, as_name_and_type);
address!(ConstantUtf8, Utf8, as_utf8);
address!(ConstantModule, Module, as_module);
address!(ConstantPackage, Package, as_package);
