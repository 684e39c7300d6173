use crate::{
    dtype::DType,
    error::{Error, Result},
    scalar::Scalar,
    shape::{compute_size, compute_strides},
};
use half::{bf16, f16};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rust element types that can back an [`Array`].
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DType;

    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! storage {
    ($($variant:ident => $type:ty),* $(,)?) => {
        /// Contiguous typed element buffer.
        #[derive(Clone, PartialEq)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum Storage {
            $($variant(Vec<$type>),)*
        }

        impl Storage {
            pub fn dtype(&self) -> DType {
                match self {
                    $(Self::$variant(_) => DType::$variant,)*
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(v) => v.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            pub fn to_f64_vec(&self) -> Vec<f64> {
                match self {
                    $(Self::$variant(v) => v.iter().map(|&x| Element::to_f64(x)).collect(),)*
                }
            }

            pub fn from_f64_slice(data: &[f64], dtype: DType) -> Self {
                match dtype {
                    $(DType::$variant => Self::$variant(data.iter().map(|&x| <$type as Element>::from_f64(x)).collect()),)*
                }
            }

            pub fn get(&self, index: usize) -> Option<Scalar> {
                match self {
                    $(Self::$variant(v) => v.get(index).map(|&x| Scalar::from(x)),)*
                }
            }

            $(
                paste::paste! {
                    pub fn [<as_ $variant:lower _slice>](&self) -> Option<&[$type]> {
                        match self {
                            Self::$variant(v) => Some(v),
                            #[allow(unreachable_patterns)]
                            _ => None,
                        }
                    }
                }
            )*
        }
    };
}

storage! {
    BF16 => bf16,
    F16 => f16,
    F32 => f32,
    F64 => f64,
    BOOL => bool,
    U8 => u8,
    I32 => i32,
    I64 => i64,
}

macro_rules! impl_element {
    ($type:ty, $dtype:ident, |$x:ident| $to:expr, |$v:ident| $from:expr) => {
        impl Element for $type {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                let $x = self;
                $to
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                let $v = value;
                $from
            }
        }
    };
}

impl_element!(bf16, BF16, |x| x.to_f64(), |v| bf16::from_f64(v));
impl_element!(f16, F16, |x| x.to_f64(), |v| f16::from_f64(v));
impl_element!(f32, F32, |x| x as f64, |v| v as f32);
impl_element!(f64, F64, |x| x, |v| v);
impl_element!(bool, BOOL, |x| if x { 1.0 } else { 0.0 }, |v| v != 0.0);
impl_element!(u8, U8, |x| x as f64, |v| v.clamp(0.0, u8::MAX as f64) as u8);
impl_element!(i32, I32, |x| x as f64, |v| v.clamp(i32::MIN as f64, i32::MAX as f64) as i32);
impl_element!(i64, I64, |x| x as f64, |v| v.clamp(i64::MIN as f64, i64::MAX as f64) as i64);

/// A concrete, row-major, owned tensor value.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Array {
    shape: Vec<usize>,
    storage: Storage,
}

impl Array {
    pub fn from_storage(shape: &[usize], storage: Storage) -> Result<Self> {
        let expected = compute_size(shape);
        if storage.len() != expected {
            return Err(Error::IncompatibleShape(format!(
                "Shape {:?} needs {} elements, got {}",
                shape,
                expected,
                storage.len()
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            storage,
        })
    }

    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let data: Vec<f64> = data.into_iter().map(Element::to_f64).collect();
        Self::from_f64_vec(&data, shape, T::DTYPE)
    }

    pub fn from_f64_vec(data: &[f64], shape: &[usize], dtype: DType) -> Result<Self> {
        Self::from_storage(shape, Storage::from_f64_slice(data, dtype))
    }

    pub fn scalar(value: impl Into<Scalar>) -> Self {
        let value = value.into();
        Self {
            shape: vec![],
            storage: Storage::from_f64_slice(&[value.as_f64()], value.dtype()),
        }
    }

    pub fn full(shape: &[usize], value: impl Into<Scalar>, dtype: DType) -> Self {
        let value = value.into().as_f64();
        let data = vec![value; compute_size(shape)];
        Self {
            shape: shape.to_vec(),
            storage: Storage::from_f64_slice(&data, dtype),
        }
    }

    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        Self::full(shape, 0.0f64, dtype)
    }

    pub fn ones(shape: &[usize], dtype: DType) -> Self {
        Self::full(shape, 1.0f64, dtype)
    }

    pub fn eye(n: usize, dtype: DType) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self {
            shape: vec![n, n],
            storage: Storage::from_f64_slice(&data, dtype),
        }
    }

    pub fn linspace(start: f64, end: f64, steps: usize, dtype: DType) -> Self {
        let data: Vec<f64> = match steps {
            0 => vec![],
            1 => vec![start],
            _ => {
                let step = (end - start) / (steps - 1) as f64;
                (0..steps).map(|i| start + step * i as f64).collect()
            },
        };
        Self {
            shape: vec![steps],
            storage: Storage::from_f64_slice(&data, dtype),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> Vec<usize> {
        compute_strides(&self.shape)
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn size(&self) -> usize {
        self.storage.len()
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn cast(&self, dtype: DType) -> Self {
        if dtype == self.dtype() {
            return self.clone();
        }
        Self {
            shape: self.shape.clone(),
            storage: Storage::from_f64_slice(&self.storage.to_f64_vec(), dtype),
        }
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        if compute_size(shape) != self.size() {
            return Err(Error::IncompatibleShape(format!(
                "Cannot reshape array of shape {:?} to {:?}",
                self.shape, shape
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            storage: self.storage.clone(),
        })
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.storage.to_f64_vec()
    }

    pub fn to_vec<T: Element>(&self) -> Vec<T> {
        match self.storage.dtype() == T::DTYPE {
            true => self.storage.to_f64_vec().into_iter().map(T::from_f64).collect(),
            false => self.cast(T::DTYPE).storage.to_f64_vec().into_iter().map(T::from_f64).collect(),
        }
    }

    /// Element at a flat row-major index.
    pub fn get(&self, index: usize) -> Result<Scalar> {
        self.storage.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!("Index {} out of range for {} elements", index, self.size()))
        })
    }

    /// Element at a multi-dimensional index.
    pub fn at(&self, indices: &[usize]) -> Result<Scalar> {
        if indices.len() != self.ndim() || indices.iter().zip(&self.shape).any(|(&i, &d)| i >= d) {
            return Err(Error::InvalidArgument(format!(
                "Index {:?} out of range for shape {:?}",
                indices, self.shape
            )));
        }
        let offset = indices.iter().zip(self.strides()).map(|(&i, s)| i * s).sum();
        self.get(offset)
    }

    /// Value of a single-element array.
    pub fn item(&self) -> Result<Scalar> {
        if self.size() != 1 {
            return Err(Error::InvalidArgument(format!(
                "item() requires a single element, array has shape {:?}",
                self.shape
            )));
        }
        self.get(0)
    }

    pub fn all_close(&self, other: &Array, tolerance: f64) -> bool {
        self.shape == other.shape
            && self
                .to_f64_vec()
                .iter()
                .zip(other.to_f64_vec().iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Array(shape={:?}, dtype={}, data={:?})",
            self.shape,
            self.dtype(),
            self.to_f64_vec()
        )
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage({}, len={})", self.dtype(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation() -> Result<()> {
        let a = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2])?;
        assert_eq!(a.dtype(), DType::F32);
        assert_eq!(a.at(&[1, 0])?.as_f64(), 3.0);
        assert!(Array::from_vec(vec![1i32, 2, 3], &[2, 2]).is_err());

        let eye = Array::eye(2, DType::F64);
        assert_eq!(eye.to_vec::<f64>(), vec![1.0, 0.0, 0.0, 1.0]);

        let lin = Array::linspace(0.0, 1.0, 5, DType::F32);
        assert_eq!(lin.to_vec::<f32>(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);

        assert_eq!(Array::scalar(5.0f64).item()?.as_f64(), 5.0);
        Ok(())
    }

    #[test]
    fn cast_and_reshape() -> Result<()> {
        let a = Array::from_vec(vec![1.7f64, -2.2, 0.0], &[3])?;
        let b = a.cast(DType::I32);
        assert_eq!(b.to_vec::<i32>(), vec![1, -2, 0]);
        assert_eq!(a.cast(DType::BOOL).to_vec::<bool>(), vec![true, true, false]);

        let r = a.reshape(&[1, 3])?;
        assert_eq!(r.shape(), &[1, 3]);
        assert!(a.reshape(&[2, 2]).is_err());
        Ok(())
    }

    #[test]
    fn closeness() -> Result<()> {
        let a = Array::from_vec(vec![1.0f32, 2.0], &[2])?;
        let b = Array::from_vec(vec![1.0f64, 2.0000001], &[2])?;
        assert!(a.all_close(&b, 1e-5));
        assert!(!a.all_close(&b.reshape(&[1, 2])?, 1e-5));
        Ok(())
    }
}
