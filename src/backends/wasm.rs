use std::arch::wasm32::{
    i16x8_add, i32x4_add, i32x4_mul, i32x4_splat, u16x8_extend_high_u8x16,
    u16x8_extend_low_u8x16, u32x4_extend_high_u16x8, u32x4_extend_low_u16x8, u8x16_shuffle, v128,
    v128_load, v128_store, v128_store64_lane,
};

use super::simd_generic::{store_4x2, supports_4x2, PackIsa};
use super::PackerBackend;
use crate::layout::{KernelSideFormat, SideOrder, SourceView};
use crate::packed::RegisterBlockDst;

/// Implementation of [`PackIsa`] using WebAssembly SIMD.
#[derive(Copy, Clone)]
pub struct WasmIsa {
    _private: (),
}

impl WasmIsa {
    pub fn new() -> Option<Self> {
        Some(WasmIsa { _private: () })
    }
}

// Safety: This module is only compiled if simd128 is enabled.
unsafe impl PackIsa for WasmIsa {
    type U8x16 = v128;
    type U16x8 = v128;
    type I32x4 = v128;

    #[inline]
    unsafe fn load(self, ptr: *const u8) -> v128 {
        unsafe { v128_load(ptr as *const v128) }
    }

    #[inline]
    fn interleave_low(self, a: v128, b: v128) -> v128 {
        u8x16_shuffle::<0, 16, 1, 17, 2, 18, 3, 19, 4, 20, 5, 21, 6, 22, 7, 23>(a, b)
    }

    #[inline]
    fn interleave_high(self, a: v128, b: v128) -> v128 {
        u8x16_shuffle::<8, 24, 9, 25, 10, 26, 11, 27, 12, 28, 13, 29, 14, 30, 15, 31>(a, b)
    }

    #[inline]
    unsafe fn store_low_half(self, x: v128, ptr: *mut u8) {
        unsafe { v128_store64_lane::<0>(x, ptr as *mut u64) }
    }

    #[inline]
    unsafe fn store_high_half(self, x: v128, ptr: *mut u8) {
        unsafe { v128_store64_lane::<1>(x, ptr as *mut u64) }
    }

    #[inline]
    fn widen_add_halves_u8(self, x: v128) -> v128 {
        i16x8_add(u16x8_extend_low_u8x16(x), u16x8_extend_high_u8x16(x))
    }

    #[inline]
    fn widen_add_halves_u16(self, x: v128) -> v128 {
        i32x4_add(u32x4_extend_low_u16x8(x), u32x4_extend_high_u16x8(x))
    }

    #[inline]
    fn add_i32(self, a: v128, b: v128) -> v128 {
        i32x4_add(a, b)
    }

    #[inline]
    fn mul_i32(self, x: v128, n: i32) -> v128 {
        i32x4_mul(x, i32x4_splat(n))
    }

    #[inline]
    unsafe fn load_i32(self, ptr: *const i32) -> v128 {
        unsafe { v128_load(ptr as *const v128) }
    }

    #[inline]
    unsafe fn store_i32(self, x: v128, ptr: *mut i32) {
        unsafe { v128_store(ptr as *mut v128, x) }
    }
}

/// Backend for WebAssembly with SIMD support.
pub struct WasmBackend {
    isa: WasmIsa,
}

// Safety: This module is only compiled if simd128 is enabled.
unsafe impl PackerBackend for WasmBackend {
    fn new() -> Option<Self> {
        let isa = WasmIsa::new()?;
        Some(WasmBackend { isa })
    }

    fn name(&self) -> &'static str {
        "wasm32-simd128"
    }

    fn is_specialized(&self, format: &KernelSideFormat, order: SideOrder) -> bool {
        supports_4x2(format, order)
    }

    fn store(&self, format: &KernelSideFormat, src: SourceView<u8>, dst: RegisterBlockDst) {
        store_4x2(self.isa, format, src, dst)
    }
}
