use std::arch::aarch64::{
    int32x4_t, uint16x8_t, uint8x16_t, vaddl_u16, vaddl_u8, vaddq_s32, vget_high_u16,
    vget_high_u8, vget_low_u16, vget_low_u8, vld1q_s32, vld1q_u8, vmulq_n_s32,
    vreinterpretq_s32_u32, vst1_u8, vst1q_s32, vzip1q_u8, vzip2q_u8,
};

use super::simd_generic::{store_4x2, supports_4x2, PackIsa};
use super::PackerBackend;
use crate::layout::{KernelSideFormat, SideOrder, SourceView};
use crate::packed::RegisterBlockDst;

/// Implementation of [`PackIsa`] using Arm Neon instructions.
#[derive(Copy, Clone)]
pub struct ArmNeonIsa {
    _private: (),
}

impl ArmNeonIsa {
    pub fn new() -> Option<Self> {
        Some(ArmNeonIsa { _private: () })
    }
}

// Safety: Neon is always supported on aarch64.
unsafe impl PackIsa for ArmNeonIsa {
    type U8x16 = uint8x16_t;
    type U16x8 = uint16x8_t;
    type I32x4 = int32x4_t;

    #[inline]
    unsafe fn load(self, ptr: *const u8) -> uint8x16_t {
        unsafe { vld1q_u8(ptr) }
    }

    #[inline]
    fn interleave_low(self, a: uint8x16_t, b: uint8x16_t) -> uint8x16_t {
        unsafe { vzip1q_u8(a, b) }
    }

    #[inline]
    fn interleave_high(self, a: uint8x16_t, b: uint8x16_t) -> uint8x16_t {
        unsafe { vzip2q_u8(a, b) }
    }

    #[inline]
    unsafe fn store_low_half(self, x: uint8x16_t, ptr: *mut u8) {
        unsafe { vst1_u8(ptr, vget_low_u8(x)) }
    }

    #[inline]
    unsafe fn store_high_half(self, x: uint8x16_t, ptr: *mut u8) {
        unsafe { vst1_u8(ptr, vget_high_u8(x)) }
    }

    #[inline]
    fn widen_add_halves_u8(self, x: uint8x16_t) -> uint16x8_t {
        unsafe { vaddl_u8(vget_low_u8(x), vget_high_u8(x)) }
    }

    #[inline]
    fn widen_add_halves_u16(self, x: uint16x8_t) -> int32x4_t {
        unsafe { vreinterpretq_s32_u32(vaddl_u16(vget_low_u16(x), vget_high_u16(x))) }
    }

    #[inline]
    fn add_i32(self, a: int32x4_t, b: int32x4_t) -> int32x4_t {
        unsafe { vaddq_s32(a, b) }
    }

    #[inline]
    fn mul_i32(self, x: int32x4_t, n: i32) -> int32x4_t {
        unsafe { vmulq_n_s32(x, n) }
    }

    #[inline]
    unsafe fn load_i32(self, ptr: *const i32) -> int32x4_t {
        unsafe { vld1q_s32(ptr) }
    }

    #[inline]
    unsafe fn store_i32(self, x: int32x4_t, ptr: *mut i32) {
        unsafe { vst1q_s32(ptr, x) }
    }
}

/// Backend for Arm CPUs using Neon instructions.
pub struct ArmNeonBackend {
    isa: ArmNeonIsa,
}

// Safety: Neon is always supported on aarch64.
unsafe impl PackerBackend for ArmNeonBackend {
    fn new() -> Option<Self> {
        let isa = ArmNeonIsa::new()?;
        Some(ArmNeonBackend { isa })
    }

    fn name(&self) -> &'static str {
        "aarch64-neon"
    }

    fn is_specialized(&self, format: &KernelSideFormat, order: SideOrder) -> bool {
        supports_4x2(format, order)
    }

    fn store(&self, format: &KernelSideFormat, src: SourceView<u8>, dst: RegisterBlockDst) {
        store_4x2(self.isa, format, src, dst)
    }
}
