use crate::error::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Dimension value used for a dimension whose size is not known until runtime.
pub const UNKNOWN_DIM: i64 = -1;

/// Declared (static) shape of a graph variable. Dimensions equal to
/// [`UNKNOWN_DIM`] match any runtime size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape {
    dims: Vec<i64>,
}

impl Shape {
    pub fn new(dims: &[i64]) -> Self {
        Self { dims: dims.to_vec() }
    }

    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    pub fn from_concrete(dims: &[usize]) -> Self {
        Self {
            dims: dims.iter().map(|&d| d as i64).collect(),
        }
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_fully_defined(&self) -> bool {
        self.dims.iter().all(|&d| d >= 0)
    }

    /// Rank must match and every defined dimension must be equal.
    pub fn is_compatible_with(&self, concrete: &[usize]) -> bool {
        self.dims.len() == concrete.len()
            && self
                .dims
                .iter()
                .zip(concrete.iter())
                .all(|(&d, &c)| d == UNKNOWN_DIM || d == c as i64)
    }

    pub fn to_concrete(&self) -> Result<Vec<usize>> {
        if !self.is_fully_defined() {
            return Err(Error::IncompatibleShape(format!(
                "Shape {} has unknown dimensions",
                self
            )));
        }
        Ok(self.dims.iter().map(|&d| d as usize).collect())
    }

    pub fn size(&self) -> Option<usize> {
        if self.is_fully_defined() {
            Some(self.dims.iter().map(|&d| d as usize).product())
        } else {
            None
        }
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::from_concrete(dims)
    }
}

impl From<Vec<i64>> for Shape {
    fn from(dims: Vec<i64>) -> Self {
        Self { dims }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if *d == UNKNOWN_DIM {
                write!(f, "?")?;
            } else {
                write!(f, "{}", d)?;
            }
        }
        write!(f, "]")
    }
}

pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    if shape.is_empty() {
        return vec![];
    }

    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len() - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

pub fn compute_size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Numpy-style broadcast of two concrete shapes.
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    let mut out = vec![0; rank];

    for i in 0..rank {
        let a = if i < rank - lhs.len() { 1 } else { lhs[i - (rank - lhs.len())] };
        let b = if i < rank - rhs.len() { 1 } else { rhs[i - (rank - rhs.len())] };

        out[i] = if a == b || b == 1 {
            a
        } else if a == 1 {
            b
        } else {
            return Err(Error::IncompatibleShape(format!(
                "Cannot broadcast shapes {:?} and {:?}",
                lhs, rhs
            )));
        };
    }

    Ok(out)
}

/// Broadcast over declared shapes, keeping unknown dimensions unknown.
pub fn broadcast_declared(lhs: &Shape, rhs: &Shape) -> Option<Shape> {
    let (l, r) = (lhs.dims(), rhs.dims());
    let rank = l.len().max(r.len());
    let mut out = Vec::with_capacity(rank);

    for i in 0..rank {
        let a = if i < rank - l.len() { 1 } else { l[i - (rank - l.len())] };
        let b = if i < rank - r.len() { 1 } else { r[i - (rank - r.len())] };

        let d = match (a, b) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            (UNKNOWN_DIM, _) | (_, UNKNOWN_DIM) => UNKNOWN_DIM,
            _ => return None,
        };
        out.push(d);
    }

    Some(Shape::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_compatibility() {
        let declared = Shape::new(&[-1, 3]);
        assert!(declared.is_compatible_with(&[7, 3]));
        assert!(!declared.is_compatible_with(&[7, 4]));
        assert!(!declared.is_compatible_with(&[3]));
        assert!(!declared.is_fully_defined());
        assert!(declared.to_concrete().is_err());
        assert_eq!(declared.to_string(), "[?, 3]");
    }

    #[test]
    fn broadcasting() -> Result<()> {
        assert_eq!(broadcast_shapes(&[2, 3], &[3])?, vec![2, 3]);
        assert_eq!(broadcast_shapes(&[], &[4, 1])?, vec![4, 1]);
        assert_eq!(broadcast_shapes(&[2, 1], &[1, 5])?, vec![2, 5]);
        assert!(broadcast_shapes(&[2, 3], &[4]).is_err());

        let declared = broadcast_declared(&Shape::new(&[-1, 3]), &Shape::new(&[3]));
        assert_eq!(declared, Some(Shape::new(&[-1, 3])));
        Ok(())
    }

    #[test]
    fn strides() {
        assert_eq!(compute_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert!(compute_strides(&[]).is_empty());
        assert_eq!(compute_size(&[]), 1);
    }
}
