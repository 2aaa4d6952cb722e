use super::simd_generic::{store_4x2, supports_4x2, PackIsa};
use super::PackerBackend;
use crate::layout::{KernelSideFormat, SideOrder, SourceView};
use crate::packed::RegisterBlockDst;

/// Implementation of [`PackIsa`] using arrays, which the compiler can
/// autovectorize.
#[derive(Copy, Clone)]
pub struct GenericIsa {
    _private: (),
}

impl GenericIsa {
    pub fn new() -> Self {
        GenericIsa { _private: () }
    }
}

impl Default for GenericIsa {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: This uses only portable code.
unsafe impl PackIsa for GenericIsa {
    type U8x16 = [u8; 16];
    type U16x8 = [u16; 8];
    type I32x4 = [i32; 4];

    #[inline]
    unsafe fn load(self, ptr: *const u8) -> [u8; 16] {
        unsafe { ptr.cast::<[u8; 16]>().read_unaligned() }
    }

    #[inline]
    fn interleave_low(self, a: [u8; 16], b: [u8; 16]) -> [u8; 16] {
        std::array::from_fn(|i| if i % 2 == 0 { a[i / 2] } else { b[i / 2] })
    }

    #[inline]
    fn interleave_high(self, a: [u8; 16], b: [u8; 16]) -> [u8; 16] {
        std::array::from_fn(|i| if i % 2 == 0 { a[8 + i / 2] } else { b[8 + i / 2] })
    }

    #[inline]
    unsafe fn store_low_half(self, x: [u8; 16], ptr: *mut u8) {
        unsafe { std::ptr::copy_nonoverlapping(x.as_ptr(), ptr, 8) }
    }

    #[inline]
    unsafe fn store_high_half(self, x: [u8; 16], ptr: *mut u8) {
        unsafe { std::ptr::copy_nonoverlapping(x.as_ptr().add(8), ptr, 8) }
    }

    #[inline]
    fn widen_add_halves_u8(self, x: [u8; 16]) -> [u16; 8] {
        std::array::from_fn(|i| x[i] as u16 + x[i + 8] as u16)
    }

    #[inline]
    fn widen_add_halves_u16(self, x: [u16; 8]) -> [i32; 4] {
        std::array::from_fn(|i| (x[i] as u32 + x[i + 4] as u32) as i32)
    }

    #[inline]
    fn add_i32(self, a: [i32; 4], b: [i32; 4]) -> [i32; 4] {
        std::array::from_fn(|i| a[i].wrapping_add(b[i]))
    }

    #[inline]
    fn mul_i32(self, x: [i32; 4], n: i32) -> [i32; 4] {
        x.map(|x| x.wrapping_mul(n))
    }

    #[inline]
    unsafe fn load_i32(self, ptr: *const i32) -> [i32; 4] {
        unsafe { ptr.cast::<[i32; 4]>().read_unaligned() }
    }

    #[inline]
    unsafe fn store_i32(self, x: [i32; 4], ptr: *mut i32) {
        unsafe { ptr.cast::<[i32; 4]>().write_unaligned(x) }
    }
}

/// Backend using the vectorized store algorithm with portable code.
///
/// This is the fallback when no architecture-specific backend is available.
pub struct GenericBackend {
    isa: GenericIsa,
}

impl Default for GenericBackend {
    fn default() -> Self {
        GenericBackend {
            isa: GenericIsa::new(),
        }
    }
}

// Safety: Generic backend uses only portable code.
unsafe impl PackerBackend for GenericBackend {
    fn new() -> Option<Self> {
        Some(Self::default())
    }

    fn name(&self) -> &'static str {
        "generic"
    }

    fn is_specialized(&self, format: &KernelSideFormat, order: SideOrder) -> bool {
        supports_4x2(format, order)
    }

    fn store(&self, format: &KernelSideFormat, src: SourceView<u8>, dst: RegisterBlockDst) {
        store_4x2(self.isa, format, src, dst)
    }
}
