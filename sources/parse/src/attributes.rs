use crate::{
    classfile::{Addressed, Resolvable},
    pool::{ConstantClass, ConstantPool, ConstantUtf8},
};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use support::bytes_ext::SafeBuf;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: Addressed<ConstantUtf8>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct Attributes {
    pub values: Vec<Attribute>,
}

impl Attributes {
    fn named(&self, id: &str) -> Result<Vec<&Attribute>> {
        let mut found = vec![];

        for attr in self.values.iter() {
            if attr.name.try_resolve()?.try_string()? == id {
                found.push(attr);
            }
        }

        Ok(found)
    }

    pub fn count<T>(&self) -> Result<usize>
    where
        T: KnownAttribute,
    {
        Ok(self.named(T::id())?.len())
    }

    pub fn known_attribute<T>(&self, constant_pool: &ConstantPool) -> Result<T>
    where
        T: KnownAttribute,
    {
        let found = self.named(T::id())?;
        let attr = found
            .first()
            .ok_or(anyhow!("could not locate known attribute {}", T::id()))?;

        T::decode(attr.data.clone(), constant_pool)
    }

    pub fn parse(bytes: &mut Bytes, constant_pool: &ConstantPool) -> Result<Self> {
        let length = bytes.try_get_u16()?;
        let mut attributes = Attributes {
            values: Vec::with_capacity(length.into()),
        };

        for _ in 0..length {
            let name: Addressed<ConstantUtf8> = constant_pool.address(bytes.try_get_u16()?);
            // Attribute names must always be Utf8 entries, even for attributes we skip
            name.try_resolve()?;

            let attr_length = bytes.try_get_u32()?;
            let data = bytes.try_take(attr_length as usize)?;

            attributes.values.push(Attribute { name, data });
        }

        Ok(attributes)
    }
}

pub trait KnownAttribute
where
    Self: Sized,
{
    fn decode(bytes: Bytes, constant_pool: &ConstantPool) -> Result<Self>;
    fn id() -> &'static str;
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Bytes,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: Option<Addressed<ConstantClass>>,
}

impl KnownAttribute for CodeAttribute {
    fn decode(mut bytes: Bytes, constant_pool: &ConstantPool) -> Result<Self> {
        let max_stack = bytes.try_get_u16()?;
        let max_locals = bytes.try_get_u16()?;

        let code_length = bytes.try_get_u32()?;
        if code_length == 0 || code_length >= 65536 {
            return Err(anyhow!("code length {} out of range", code_length));
        }

        let code = bytes.try_take(code_length as usize)?;

        let exception_length = bytes.try_get_u16()?;
        let mut exception_table = Vec::with_capacity(exception_length.into());
        for _ in 0..exception_length {
            let start_pc = bytes.try_get_u16()?;
            let end_pc = bytes.try_get_u16()?;
            let handler_pc = bytes.try_get_u16()?;

            if start_pc >= end_pc || u32::from(end_pc) > code_length {
                return Err(anyhow!("bad exception range {}..{}", start_pc, end_pc));
            }

            // 0 means "catch everything"
            let catch_type = match bytes.try_get_u16()? {
                0 => None,
                idx => {
                    let cls: Addressed<ConstantClass> = constant_pool.address(idx);
                    cls.try_resolve()?;
                    Some(cls)
                }
            };

            exception_table.push(ExceptionEntry {
                start_pc,
                end_pc,
                handler_pc,
                catch_type,
            });
        }

        let attributes = Attributes::parse(&mut bytes, constant_pool)?;

        if !bytes.is_empty() {
            return Err(anyhow!("Code attribute has {} trailing bytes", bytes.len()));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    fn id() -> &'static str {
        "Code"
    }
}

#[derive(Debug, Clone)]
pub struct SourceFileAttribute {
    pub source_file: Addressed<ConstantUtf8>,
}

impl SourceFileAttribute {
    pub fn try_name(&self) -> Result<String> {
        self.source_file.try_resolve()?.try_string()
    }
}

impl KnownAttribute for SourceFileAttribute {
    fn decode(mut bytes: Bytes, constant_pool: &ConstantPool) -> Result<Self> {
        let source_file: Addressed<ConstantUtf8> = constant_pool.address(bytes.try_get_u16()?);
        source_file.try_resolve()?;

        Ok(SourceFileAttribute { source_file })
    }

    fn id() -> &'static str {
        "SourceFile"
    }
}
