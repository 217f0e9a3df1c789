use anyhow::{anyhow, Result};
use bitflags::bitflags;

bitflags! {
    pub struct ClassFileAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

// Unassigned bits are reserved for future use and must be ignored (JVMS §4.1).
impl ClassFileAccessFlags {
    pub fn from_raw(bits: u16) -> Result<Self> {
        let flags = Self::from_bits_truncate(bits);

        if flags.contains(Self::MODULE) {
            return Err(anyhow!("module-info is not a loadable class"));
        }

        if flags.contains(Self::INTERFACE) {
            if !flags.contains(Self::ABSTRACT) {
                return Err(anyhow!("interface must also be abstract"));
            }

            if flags.intersects(Self::FINAL | Self::SUPER | Self::ENUM) {
                return Err(anyhow!("interface has illegal modifiers {:?}", flags));
            }
        } else {
            if flags.contains(Self::ANNOTATION) {
                return Err(anyhow!("annotation must also be an interface"));
            }

            if flags.contains(Self::FINAL | Self::ABSTRACT) {
                return Err(anyhow!("class cannot be both final and abstract"));
            }
        }

        Ok(flags)
    }

    pub fn is_interface(&self) -> bool {
        self.contains(Self::INTERFACE)
    }
}

impl FieldAccessFlags {
    pub fn from_raw(bits: u16) -> Result<Self> {
        let flags = Self::from_bits_truncate(bits);
        let visibility = flags & (Self::PUBLIC | Self::PRIVATE | Self::PROTECTED);

        if visibility.bits().count_ones() > 1 {
            return Err(anyhow!("field has conflicting visibility {:?}", visibility));
        }

        if flags.contains(Self::FINAL | Self::VOLATILE) {
            return Err(anyhow!("field cannot be both final and volatile"));
        }

        Ok(flags)
    }
}

impl MethodAccessFlags {
    pub fn from_raw(bits: u16) -> Result<Self> {
        let flags = Self::from_bits_truncate(bits);
        let visibility = flags & (Self::PUBLIC | Self::PRIVATE | Self::PROTECTED);

        if visibility.bits().count_ones() > 1 {
            return Err(anyhow!("method has conflicting visibility {:?}", visibility));
        }

        if flags.contains(Self::ABSTRACT)
            && flags.intersects(
                Self::PRIVATE | Self::STATIC | Self::FINAL | Self::SYNCHRONIZED | Self::NATIVE,
            )
        {
            return Err(anyhow!("abstract method has illegal modifiers {:?}", flags));
        }

        Ok(flags)
    }
}
