use std::arch::x86_64::{
    __m128i, _mm_add_epi16, _mm_add_epi32, _mm_loadu_si128, _mm_mullo_epi32, _mm_set1_epi32,
    _mm_setzero_si128, _mm_storel_epi64, _mm_storeu_si128, _mm_unpackhi_epi16,
    _mm_unpackhi_epi64, _mm_unpackhi_epi8, _mm_unpacklo_epi16, _mm_unpacklo_epi8,
};

use super::simd_generic::{store_4x2, supports_4x2, PackIsa};
use super::PackerBackend;
use crate::layout::{KernelSideFormat, SideOrder, SourceView};
use crate::packed::RegisterBlockDst;

/// Implementation of [`PackIsa`] using SSE 4.1 instructions.
#[derive(Copy, Clone)]
pub struct Sse41Isa {
    _private: (),
}

impl Sse41Isa {
    pub fn new() -> Option<Self> {
        if !is_x86_feature_detected!("sse4.1") {
            return None;
        }
        Some(Sse41Isa { _private: () })
    }
}

// Safety: Constructor checked for "sse4.1" feature support.
unsafe impl PackIsa for Sse41Isa {
    type U8x16 = __m128i;
    type U16x8 = __m128i;
    type I32x4 = __m128i;

    #[inline]
    unsafe fn load(self, ptr: *const u8) -> __m128i {
        unsafe { _mm_loadu_si128(ptr as *const __m128i) }
    }

    #[inline]
    fn interleave_low(self, a: __m128i, b: __m128i) -> __m128i {
        unsafe { _mm_unpacklo_epi8(a, b) }
    }

    #[inline]
    fn interleave_high(self, a: __m128i, b: __m128i) -> __m128i {
        unsafe { _mm_unpackhi_epi8(a, b) }
    }

    #[inline]
    unsafe fn store_low_half(self, x: __m128i, ptr: *mut u8) {
        unsafe { _mm_storel_epi64(ptr as *mut __m128i, x) }
    }

    #[inline]
    unsafe fn store_high_half(self, x: __m128i, ptr: *mut u8) {
        unsafe { _mm_storel_epi64(ptr as *mut __m128i, _mm_unpackhi_epi64(x, x)) }
    }

    #[inline]
    fn widen_add_halves_u8(self, x: __m128i) -> __m128i {
        unsafe {
            let zero = _mm_setzero_si128();
            _mm_add_epi16(_mm_unpacklo_epi8(x, zero), _mm_unpackhi_epi8(x, zero))
        }
    }

    #[inline]
    fn widen_add_halves_u16(self, x: __m128i) -> __m128i {
        unsafe {
            let zero = _mm_setzero_si128();
            _mm_add_epi32(_mm_unpacklo_epi16(x, zero), _mm_unpackhi_epi16(x, zero))
        }
    }

    #[inline]
    fn add_i32(self, a: __m128i, b: __m128i) -> __m128i {
        unsafe { _mm_add_epi32(a, b) }
    }

    #[inline]
    fn mul_i32(self, x: __m128i, n: i32) -> __m128i {
        #[target_feature(enable = "sse4.1")]
        #[inline]
        unsafe fn mul(x: __m128i, n: i32) -> __m128i {
            _mm_mullo_epi32(x, _mm_set1_epi32(n))
        }
        unsafe { mul(x, n) }
    }

    #[inline]
    unsafe fn load_i32(self, ptr: *const i32) -> __m128i {
        unsafe { _mm_loadu_si128(ptr as *const __m128i) }
    }

    #[inline]
    unsafe fn store_i32(self, x: __m128i, ptr: *mut i32) {
        unsafe { _mm_storeu_si128(ptr as *mut __m128i, x) }
    }
}

/// Backend for x86_64 CPUs with SSE 4.1 support.
pub struct Sse41Backend {
    isa: Sse41Isa,
}

// Safety: Backend can only be constructed if SSE 4.1 is supported.
unsafe impl PackerBackend for Sse41Backend {
    fn new() -> Option<Self> {
        let isa = Sse41Isa::new()?;
        Some(Sse41Backend { isa })
    }

    fn name(&self) -> &'static str {
        "x86_64-sse4.1"
    }

    fn is_specialized(&self, format: &KernelSideFormat, order: SideOrder) -> bool {
        supports_4x2(format, order)
    }

    fn store(&self, format: &KernelSideFormat, src: SourceView<u8>, dst: RegisterBlockDst) {
        #[target_feature(enable = "sse4.1")]
        unsafe fn store_sse41(
            isa: Sse41Isa,
            format: &KernelSideFormat,
            src: SourceView<u8>,
            dst: RegisterBlockDst,
        ) {
            store_4x2(isa, format, src, dst)
        }

        // Safety: SSE 4.1 is supported if the ISA was constructed.
        unsafe { store_sse41(self.isa, format, src, dst) }
    }
}
