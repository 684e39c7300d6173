use crate::dtype::DType;
use half::{bf16, f16};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! scalar_variants {
    ($($variant:ident => $type:ty),* $(,)?) => {
        /// A single tagged element value.
        #[derive(Debug, Clone, Copy, PartialEq)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum Scalar {
            BOOL(bool),
            $($variant($type),)*
        }

        impl Scalar {
            #[inline]
            pub fn new<T: Into<Self>>(value: T) -> Self {
                value.into()
            }

            #[inline]
            pub fn dtype(&self) -> DType {
                match self {
                    Self::BOOL(_) => DType::BOOL,
                    $(Self::$variant(_) => DType::$variant,)*
                }
            }

            // `as_f64` itself is generated below with the other accessors
            #[inline]
            fn widen(&self) -> f64 {
                match *self {
                    Self::BOOL(x) => if x { 1.0 } else { 0.0 },
                    $(Self::$variant(x) => scalar_variants!(@as_f64 $variant, x),)*
                }
            }

            $(
                paste::paste! {
                    #[inline]
                    pub fn [<as_ $variant:lower>](&self) -> $type {
                        match *self {
                            Self::$variant(x) => x,
                            _ => scalar_variants!(@convert $variant => self.widen()),
                        }
                    }
                }
            )*

            /// Builds a scalar of `dtype` from an `f64`, saturating integer targets.
            pub fn from_f64(value: f64, dtype: DType) -> Self {
                match dtype {
                    DType::BOOL => Self::BOOL(value != 0.0),
                    $(DType::$variant => Self::$variant(scalar_variants!(@convert $variant => value)),)*
                }
            }
        }

        $(
            impl From<$type> for Scalar {
                #[inline]
                fn from(x: $type) -> Self {
                    Self::$variant(x)
                }
            }
        )*
    };

    (@as_f64 BF16, $x:ident) => { f32::from($x) as f64 };
    (@as_f64 F16, $x:ident) => { f32::from($x) as f64 };
    (@as_f64 F32, $x:ident) => { $x as f64 };
    (@as_f64 F64, $x:ident) => { $x };
    (@as_f64 U8, $x:ident) => { $x as f64 };
    (@as_f64 I32, $x:ident) => { $x as f64 };
    (@as_f64 I64, $x:ident) => { $x as f64 };

    (@convert BF16 => $val:expr) => { bf16::from_f64($val) };
    (@convert F16 => $val:expr) => { f16::from_f64($val) };
    (@convert F32 => $val:expr) => { $val as f32 };
    (@convert F64 => $val:expr) => { $val };
    (@convert U8 => $val:expr) => { $val.clamp(0.0, u8::MAX as f64) as u8 };
    (@convert I32 => $val:expr) => { $val.clamp(i32::MIN as f64, i32::MAX as f64) as i32 };
    (@convert I64 => $val:expr) => { $val.clamp(i64::MIN as f64, i64::MAX as f64) as i64 };
}

scalar_variants! {
    BF16 => bf16,
    F16  => f16,
    F32  => f32,
    F64  => f64,
    U8   => u8,
    I32  => i32,
    I64  => i64,
}

impl Scalar {
    #[inline]
    pub fn is_float(&self) -> bool {
        self.dtype().is_float()
    }

    #[inline]
    pub fn is_int(&self) -> bool {
        self.dtype().is_int()
    }

    #[inline]
    pub fn as_bool(&self) -> bool {
        match *self {
            Self::BOOL(x) => x,
            other => other.as_f64() != 0.0,
        }
    }

    pub fn cast(self, dtype: DType) -> Self {
        if self.dtype() == dtype {
            self
        } else {
            Self::from_f64(self.as_f64(), dtype)
        }
    }
}

impl From<bool> for Scalar {
    #[inline]
    fn from(x: bool) -> Self {
        Self::BOOL(x)
    }
}

impl From<usize> for Scalar {
    #[inline]
    fn from(x: usize) -> Self {
        if x <= i64::MAX as usize {
            Scalar::I64(x as i64)
        } else {
            Scalar::F64(x as f64)
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BOOL(x) => write!(f, "{}", x),
            Self::BF16(x) => write!(f, "{}", x),
            Self::F16(x) => write!(f, "{}", x),
            Self::F32(x) => write!(f, "{}", x),
            Self::F64(x) => write!(f, "{}", x),
            Self::U8(x) => write!(f, "{}", x),
            Self::I32(x) => write!(f, "{}", x),
            Self::I64(x) => write!(f, "{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_saturate() {
        assert_eq!(Scalar::from(300.0f64).as_u8(), u8::MAX);
        assert_eq!(Scalar::from(-1.5f32).as_i32(), -1);
        assert_eq!(Scalar::from(true).as_f64(), 1.0);
        assert_eq!(Scalar::from_f64(2.5, DType::F16).as_f32(), 2.5);
    }

    #[test]
    fn cast_changes_dtype() {
        let s = Scalar::from(3i32).cast(DType::F64);
        assert_eq!(s, Scalar::F64(3.0));
        assert!(s.is_float());
        assert!(!Scalar::from(0u8).as_bool());
    }

    #[test]
    fn as_f64_from_every_dtype() {
        assert_eq!(Scalar::from(1.25f64).as_f64(), 1.25);
        assert_eq!(Scalar::from(-7i64).as_f64(), -7.0);
        assert_eq!(Scalar::from(0.5f32).as_f64(), 0.5);
        assert_eq!(Scalar::from(f16::from_f64(2.0)).as_f64(), 2.0);
        assert_eq!(Scalar::from(false).as_f64(), 0.0);
    }
}
