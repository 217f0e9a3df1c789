use crate::classfile::ClassFile;

pub type ParseResult = anyhow::Result<ClassFile>;
