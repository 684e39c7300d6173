#![allow(non_upper_case_globals)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const bfloat16: DType = DType::BF16;
pub const float16: DType = DType::F16;
pub const half: DType = DType::F16;
pub const float32: DType = DType::F32;
pub const float64: DType = DType::F64;
pub const bool: DType = DType::BOOL;
pub const uint8: DType = DType::U8;
pub const int32: DType = DType::I32;
pub const int64: DType = DType::I64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DType {
    BF16,
    F16,
    F32,
    F64,
    BOOL,
    U8,
    I32,
    I64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BF16 => "bf16",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::BOOL => "bool",
            Self::U8 => "u8",
            Self::I32 => "i32",
            Self::I64 => "i64",
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::BF16 => 2,
            Self::F16 => 2,
            Self::F32 => 4,
            Self::F64 => 8,
            Self::BOOL => 1,
            Self::U8 => 1,
            Self::I32 => 4,
            Self::I64 => 8,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Self::U8 | Self::I32 | Self::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::BF16 | Self::F16 | Self::F32 | Self::F64)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::BOOL)
    }

    /// Result dtype of a binary arithmetic op over `self` and `other`.
    ///
    /// Booleans behave like `u8`; any float wins over any integer and the wider
    /// type wins inside a family. `bf16` mixed with `f16` widens to `f32`.
    pub fn promote(self, other: DType) -> DType {
        let lhs = if self == DType::BOOL { DType::U8 } else { self };
        let rhs = if other == DType::BOOL { DType::U8 } else { other };

        match (lhs, rhs) {
            (a, b) if a == b => a,

            (_, DType::F64) | (DType::F64, _) => DType::F64,
            (_, DType::F32) | (DType::F32, _) => DType::F32,
            (DType::BF16, DType::F16) | (DType::F16, DType::BF16) => DType::F32,
            (_, DType::F16) | (DType::F16, _) => DType::F16,
            (_, DType::BF16) | (DType::BF16, _) => DType::BF16,

            (_, DType::I64) | (DType::I64, _) => DType::I64,
            (_, DType::I32) | (DType::I32, _) => DType::I32,

            (a, _) => a,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

thread_local! {
    static DEFAULT_DTYPE: std::cell::Cell<DType> = const { std::cell::Cell::new(DType::F32) };
}

pub fn get_default_dtype() -> DType {
    DEFAULT_DTYPE.with(|d| d.get())
}

pub fn set_default_dtype(dtype: DType) {
    DEFAULT_DTYPE.with(|d| d.set(dtype));
}
