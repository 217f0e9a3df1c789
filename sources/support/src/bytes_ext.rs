use anyhow::{anyhow, Result};
use bytes::{Buf, Bytes};

/// Bounds checked reads over a [`Buf`]. The plain `get_*` family panics on underflow,
/// which is not acceptable when the bytes come from an untrusted class file.
pub trait SafeBuf: Buf {
    fn try_get_u8(&mut self) -> Result<u8>;
    fn try_get_u16(&mut self) -> Result<u16>;
    fn try_get_u32(&mut self) -> Result<u32>;
    fn try_get_u64(&mut self) -> Result<u64>;
    fn try_get_f32(&mut self) -> Result<f32>;
    fn try_get_f64(&mut self) -> Result<f64>;

    /// Split off the next `len` bytes as their own buffer.
    fn try_take(&mut self, len: usize) -> Result<Bytes>;
}

macro_rules! safe_get {
    ($ty: ident) => {
        paste::paste! {
            fn [<try_get_ $ty>](&mut self) -> Result<$ty> {
                let size = std::mem::size_of::<$ty>();
                if self.remaining() < size {
                    return Err(anyhow!(
                        "buffer underflow reading {} (wanted {} bytes, had {})",
                        stringify!($ty),
                        size,
                        self.remaining()
                    ));
                }

                Ok(self.[<get_ $ty>]())
            }
        }
    };
}

impl SafeBuf for Bytes {
    safe_get!(u8);
    safe_get!(u16);
    safe_get!(u32);
    safe_get!(u64);
    safe_get!(f32);
    safe_get!(f64);

    fn try_take(&mut self, len: usize) -> Result<Bytes> {
        if self.remaining() < len {
            return Err(anyhow!(
                "buffer underflow taking {} bytes (had {})",
                len,
                self.remaining()
            ));
        }

        Ok(self.split_to(len))
    }
}
