use anyhow::{anyhow, Result};
use bytes::Bytes;

use crate::attributes::{Attributes, CodeAttribute};
use crate::classfile::{
    Addressed, ClassFile, Field, Fields, Interfaces, MetaData, Method, Methods, Resolvable,
};
use crate::constants::{MAGIC, MAX_MAJOR_VERSION, MIN_MAJOR_VERSION, PREVIEW_MINOR_VERSION};
use crate::flags::{ClassFileAccessFlags, FieldAccessFlags, MethodAccessFlags};
use crate::pool::{ConstantClass, ConstantEntry, ConstantPool, ConstantTag};
use crate::result::ParseResult;
use support::bytes_ext::SafeBuf;

const JAVA_LANG_OBJECT: &str = "java/lang/Object";

pub struct Parser {
    bytes: Bytes,
}

impl Parser {
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(data),
        }
    }

    pub fn from_bytes(bytes: Bytes) -> Self {
        Self { bytes }
    }

    fn parse_constant_pool(&mut self) -> Result<ConstantPool> {
        let length = self.bytes.try_get_u16()?;
        if length == 0 {
            return Err(anyhow!("constant pool count must be at least 1"));
        }

        let mut pool = ConstantPool::new();

        let mut slot = 1;
        while slot < length {
            let tag = ConstantTag::from_tag(self.bytes.try_get_u8()?)?;
            let entry = ConstantEntry::decode(tag, &mut self.bytes, &pool)?;
            let wide = entry.is_wide();
            pool.insert(entry);

            if wide {
                if slot + 1 >= length {
                    return Err(anyhow!("64 bit constant overruns the constant pool"));
                }

                pool.insert(ConstantEntry::Reserved);
                slot += 1;
            }

            slot += 1;
        }

        Ok(pool)
    }

    fn parse_interfaces(&mut self, pool: &ConstantPool) -> Result<Interfaces> {
        let length = self.bytes.try_get_u16()?;
        let mut interfaces = Interfaces {
            values: Vec::with_capacity(length.into()),
        };

        for _ in 0..length {
            let interface: Addressed<ConstantClass> = pool.address(self.bytes.try_get_u16()?);
            interface.try_resolve()?;
            interfaces.values.push(interface);
        }

        Ok(interfaces)
    }

    fn parse_fields(&mut self, pool: &ConstantPool) -> Result<Fields> {
        let length = self.bytes.try_get_u16()?;
        let mut fields = Fields {
            values: Vec::with_capacity(length.into()),
        };

        for _ in 0..length {
            let field = Field {
                flags: FieldAccessFlags::from_raw(self.bytes.try_get_u16()?)?,
                name: pool.address(self.bytes.try_get_u16()?),
                descriptor: pool.address(self.bytes.try_get_u16()?),
                attributes: Attributes::parse(&mut self.bytes, pool)?,
            };

            field.name.try_resolve()?;
            field.descriptor.try_resolve()?;
            fields.values.push(field);
        }

        Ok(fields)
    }

    fn parse_methods(&mut self, pool: &ConstantPool) -> Result<Methods> {
        let length = self.bytes.try_get_u16()?;
        let mut methods = Methods {
            values: Vec::with_capacity(length.into()),
        };

        for _ in 0..length {
            let method = Method {
                flags: MethodAccessFlags::from_raw(self.bytes.try_get_u16()?)?,
                name: pool.address(self.bytes.try_get_u16()?),
                descriptor: pool.address(self.bytes.try_get_u16()?),
                attributes: Attributes::parse(&mut self.bytes, pool)?,
            };

            let name = method.name.try_resolve()?.try_string()?;
            method.descriptor.try_resolve()?;

            // Format checking: methods with a body carry exactly one Code attribute,
            // abstract and native methods carry none (JVMS §4.7.3)
            let code_count = method.attributes.count::<CodeAttribute>()?;
            let bodyless = method
                .flags
                .intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE);

            match (bodyless, code_count) {
                (true, 0) => {}
                (false, 1) => {
                    method.attributes.known_attribute::<CodeAttribute>(pool)?;
                }
                (true, n) => {
                    return Err(anyhow!("bodyless method {} has {} Code attributes", name, n))
                }
                (false, n) => return Err(anyhow!("method {} has {} Code attributes", name, n)),
            }

            methods.values.push(method);
        }

        Ok(methods)
    }

    pub fn parse(&mut self) -> ParseResult {
        let magic = self.bytes.try_get_u32()?;

        // Format checking: The first four bytes must contain the right magic number
        if magic != MAGIC {
            return Err(anyhow!("invalid magic value '{:#x}'", magic));
        }

        let minor = self.bytes.try_get_u16()?;
        let major = self.bytes.try_get_u16()?;

        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major) {
            return Err(anyhow!("unsupported class file version {}.{}", major, minor));
        }

        // From Java 12 onwards the minor version is either 0 or the preview marker
        if major >= 56 && minor != 0 && minor != PREVIEW_MINOR_VERSION {
            return Err(anyhow!("invalid minor version {} for major {}", minor, major));
        }

        let meta_data = MetaData {
            minor_version: minor,
            major_version: major,
        };

        let constant_pool = self.parse_constant_pool()?;
        // Format checking: The constant pool must satisfy the constraints documented throughout §4.4.
        constant_pool.perform_format_checking()?;

        let access_flags = ClassFileAccessFlags::from_raw(self.bytes.try_get_u16()?)?;
        let this_class: Addressed<ConstantClass> = constant_pool.address(self.bytes.try_get_u16()?);
        let this_name = this_class.try_resolve()?.try_name()?;

        let super_class_index = self.bytes.try_get_u16()?;
        let mut super_class: Option<Addressed<ConstantClass>> = None;
        if super_class_index != 0 {
            let cls: Addressed<ConstantClass> = constant_pool.address(super_class_index);
            cls.try_resolve()?;
            super_class = Some(cls);
        } else if this_name != JAVA_LANG_OBJECT {
            return Err(anyhow!("{} has no super class", this_name));
        }

        let interfaces = self.parse_interfaces(&constant_pool)?;
        let fields = self.parse_fields(&constant_pool)?;
        let methods = self.parse_methods(&constant_pool)?;
        let attributes = Attributes::parse(&mut self.bytes, &constant_pool)?;

        // Format checking: The class file must not be truncated or have extra bytes at the end
        if !self.bytes.is_empty() {
            return Err(anyhow!("classfile has extra bytes at the end"));
        }

        Ok(ClassFile {
            constant_pool,
            meta_data,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}
