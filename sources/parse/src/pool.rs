use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use parking_lot::RwLock;
use support::bytes_ext::SafeBuf;

use crate::classfile::{Addressed, Resolvable};

#[derive(Debug, Clone)]
pub struct ConstantPool {
    pub entries: Arc<RwLock<Vec<ConstantEntry>>>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(vec![])),
        }
    }

    pub fn insert(&mut self, entry: ConstantEntry) {
        let mut pool = self.entries.write();
        pool.push(entry)
    }

    /// Entries are addressed from 1, mirroring the class file.
    pub fn get(&self, index: u16) -> Option<ConstantEntry> {
        let pool = self.entries.read();
        let slot = usize::from(index).checked_sub(1)?;
        pool.get(slot).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn address<T>(&self, for_index: u16) -> Addressed<T> {
        Addressed::from(for_index, Arc::clone(&self.entries))
    }

    /// Every cross reference inside the pool must point at an entry of the right kind.
    pub(crate) fn perform_format_checking(&self) -> Result<()> {
        let entries = self.entries.read().clone();
        for (slot, item) in entries.iter().enumerate() {
            let checked = match item {
                ConstantEntry::Class(data) => data.name.try_resolve().map(|_| ()),
                ConstantEntry::Field(data) => data
                    .class
                    .try_resolve()
                    .and_then(|_| data.name_and_type.try_resolve().map(|_| ())),
                ConstantEntry::Method(data) => data
                    .class
                    .try_resolve()
                    .and_then(|_| data.name_and_type.try_resolve().map(|_| ())),
                ConstantEntry::InterfaceMethod(data) => data
                    .class
                    .try_resolve()
                    .and_then(|_| data.name_and_type.try_resolve().map(|_| ())),
                ConstantEntry::String(data) => data.string.try_resolve().map(|_| ()),
                ConstantEntry::NameAndType(data) => data
                    .name
                    .try_resolve()
                    .and_then(|_| data.descriptor.try_resolve().map(|_| ())),
                ConstantEntry::MethodHandle(data) => {
                    if !(1..=9).contains(&data.kind) {
                        Err(anyhow!("bad method handle kind {}", data.kind))
                    } else {
                        data.reference.try_resolve().map(|_| ())
                    }
                }
                ConstantEntry::MethodType(data) => data.descriptor.try_resolve().map(|_| ()),
                ConstantEntry::Dynamic(data) => data.name_and_type.try_resolve().map(|_| ()),
                ConstantEntry::InvokeDynamic(data) => {
                    data.name_and_type.try_resolve().map(|_| ())
                }
                ConstantEntry::Module(data) => data.name.try_resolve().map(|_| ()),
                ConstantEntry::Package(data) => data.name.try_resolve().map(|_| ()),
                ConstantEntry::Utf8(data) => data.try_string().map(|_| ()),
                ConstantEntry::Integer(_)
                | ConstantEntry::Float(_)
                | ConstantEntry::Long(_)
                | ConstantEntry::Double(_)
                | ConstantEntry::Reserved => Ok(()),
            };

            checked.map_err(|e| anyhow!("constant pool entry #{}: {}", slot + 1, e))?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantTag {
    Class,
    Field,
    Method,
    InterfaceMethod,
    String,
    Integer,
    Float,
    Long,
    Double,
    NameAndType,
    Utf8,
    MethodHandle,
    MethodType,
    Dynamic,
    InvokeDynamic,
    Module,
    Package,
}

impl ConstantTag {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => ConstantTag::Utf8,
            3 => ConstantTag::Integer,
            4 => ConstantTag::Float,
            5 => ConstantTag::Long,
            6 => ConstantTag::Double,
            7 => ConstantTag::Class,
            8 => ConstantTag::String,
            9 => ConstantTag::Field,
            10 => ConstantTag::Method,
            11 => ConstantTag::InterfaceMethod,
            12 => ConstantTag::NameAndType,
            15 => ConstantTag::MethodHandle,
            16 => ConstantTag::MethodType,
            17 => ConstantTag::Dynamic,
            18 => ConstantTag::InvokeDynamic,
            19 => ConstantTag::Module,
            20 => ConstantTag::Package,
            _ => return Err(anyhow!("{} is an unknown constant pool tag", tag)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConstantClass {
    pub name: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantField {
    pub class: Addressed<ConstantClass>,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantMethod {
    pub class: Addressed<ConstantClass>,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantInterfaceMethod {
    pub class: Addressed<ConstantClass>,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantString {
    pub string: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantInteger {
    pub bytes: u32,
}

#[derive(Debug, Clone)]
pub struct ConstantFloat {
    pub bytes: f32,
}

#[derive(Debug, Clone)]
pub struct ConstantLong {
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ConstantDouble {
    pub bytes: f64,
}

#[derive(Debug, Clone)]
pub struct ConstantNameAndType {
    pub name: Addressed<ConstantUtf8>,
    pub descriptor: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantUtf8 {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ConstantMethodHandle {
    pub kind: u8,
    pub reference: Addressed<ConstantEntry>,
}

#[derive(Debug, Clone)]
pub struct ConstantMethodType {
    pub descriptor: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantDynamic {
    pub bootstrap_index: u16,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantInvokeDynamic {
    pub bootstrap_index: u16,
    pub name_and_type: Addressed<ConstantNameAndType>,
}

#[derive(Debug, Clone)]
pub struct ConstantModule {
    pub name: Addressed<ConstantUtf8>,
}

#[derive(Debug, Clone)]
pub struct ConstantPackage {
    pub name: Addressed<ConstantUtf8>,
}

// TODO: class files store modified UTF-8, this only accepts the standard encoding
impl ConstantUtf8 {
    pub fn try_string(&self) -> Result<String> {
        Ok(String::from_utf8(self.bytes.clone())?)
    }
}

impl ConstantString {
    pub fn try_string(&self) -> Result<String> {
        self.string.try_resolve()?.try_string()
    }
}

impl ConstantClass {
    pub fn try_name(&self) -> Result<String> {
        self.name.try_resolve()?.try_string()
    }
}

#[derive(EnumAsInner, Clone, Debug)]
pub enum ConstantEntry {
    Class(ConstantClass),
    Field(ConstantField),
    Method(ConstantMethod),
    InterfaceMethod(ConstantInterfaceMethod),
    String(ConstantString),
    Integer(ConstantInteger),
    Float(ConstantFloat),
    Long(ConstantLong),
    Double(ConstantDouble),
    NameAndType(ConstantNameAndType),
    Utf8(ConstantUtf8),
    MethodHandle(ConstantMethodHandle),
    MethodType(ConstantMethodType),
    Dynamic(ConstantDynamic),
    InvokeDynamic(ConstantInvokeDynamic),
    Module(ConstantModule),
    Package(ConstantPackage),
    Reserved,
}

impl ConstantEntry {
    /// Decode one entry from `buf`, its tag byte already consumed. References into `pool` are
    /// recorded but not resolved, the pool is still being filled.
    pub(crate) fn decode(tag: ConstantTag, buf: &mut Bytes, pool: &ConstantPool) -> Result<Self> {
        macro_rules! index {
            () => {
                pool.address(buf.try_get_u16()?)
            };
        }

        let entry = match tag {
            ConstantTag::Utf8 => {
                let length = buf.try_get_u16()?;
                let bytes = buf.try_take(length.into())?.to_vec();
                ConstantEntry::Utf8(ConstantUtf8 { bytes })
            }
            ConstantTag::Integer => ConstantEntry::Integer(ConstantInteger {
                bytes: buf.try_get_u32()?,
            }),
            ConstantTag::Float => ConstantEntry::Float(ConstantFloat {
                bytes: buf.try_get_f32()?,
            }),
            ConstantTag::Long => ConstantEntry::Long(ConstantLong {
                bytes: buf.try_get_u64()?,
            }),
            ConstantTag::Double => ConstantEntry::Double(ConstantDouble {
                bytes: buf.try_get_f64()?,
            }),
            ConstantTag::Class => ConstantEntry::Class(ConstantClass { name: index!() }),
            ConstantTag::String => ConstantEntry::String(ConstantString { string: index!() }),
            ConstantTag::MethodType => {
                ConstantEntry::MethodType(ConstantMethodType { descriptor: index!() })
            }
            ConstantTag::Module => ConstantEntry::Module(ConstantModule { name: index!() }),
            ConstantTag::Package => ConstantEntry::Package(ConstantPackage { name: index!() }),
            ConstantTag::Field => ConstantEntry::Field(ConstantField {
                class: index!(),
                name_and_type: index!(),
            }),
            ConstantTag::Method => ConstantEntry::Method(ConstantMethod {
                class: index!(),
                name_and_type: index!(),
            }),
            ConstantTag::InterfaceMethod => ConstantEntry::InterfaceMethod(ConstantInterfaceMethod {
                class: index!(),
                name_and_type: index!(),
            }),
            ConstantTag::NameAndType => ConstantEntry::NameAndType(ConstantNameAndType {
                name: index!(),
                descriptor: index!(),
            }),
            ConstantTag::MethodHandle => ConstantEntry::MethodHandle(ConstantMethodHandle {
                kind: buf.try_get_u8()?,
                reference: index!(),
            }),
            ConstantTag::Dynamic => ConstantEntry::Dynamic(ConstantDynamic {
                bootstrap_index: buf.try_get_u16()?,
                name_and_type: index!(),
            }),
            ConstantTag::InvokeDynamic => ConstantEntry::InvokeDynamic(ConstantInvokeDynamic {
                bootstrap_index: buf.try_get_u16()?,
                name_and_type: index!(),
            }),
        };

        Ok(entry)
    }

    /// Long and Double take two pool slots, the second of which is unusable.
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantEntry::Long(_) | ConstantEntry::Double(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConstantEntry::Class(_) => "Class",
            ConstantEntry::Field(_) => "Field",
            ConstantEntry::Method(_) => "Method",
            ConstantEntry::InterfaceMethod(_) => "InterfaceMethod",
            ConstantEntry::String(_) => "String",
            ConstantEntry::Integer(_) => "Integer",
            ConstantEntry::Float(_) => "Float",
            ConstantEntry::Long(_) => "Long",
            ConstantEntry::Double(_) => "Double",
            ConstantEntry::NameAndType(_) => "NameAndType",
            ConstantEntry::Utf8(_) => "Utf8",
            ConstantEntry::MethodHandle(_) => "MethodHandle",
            ConstantEntry::MethodType(_) => "MethodType",
            ConstantEntry::Dynamic(_) => "Dynamic",
            ConstantEntry::InvokeDynamic(_) => "InvokeDynamic",
            ConstantEntry::Module(_) => "Module",
            ConstantEntry::Package(_) => "Package",
            ConstantEntry::Reserved => "Reserved",
        }
    }
}
