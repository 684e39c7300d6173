use crate::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    shape::compute_size,
};
use rand::{distributions::Distribution, Rng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scheme used to materialize a trainable variable that was declared without a value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WeightInit {
    Zero,
    One,
    Constant(f64),
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std: f64 },
    /// Glorot uniform over the first two dimensions (fan-in, fan-out).
    XavierUniform,
}

impl Default for WeightInit {
    fn default() -> Self {
        Self::XavierUniform
    }
}

impl WeightInit {
    pub fn create<R: Rng + ?Sized>(&self, shape: &[usize], dtype: DType, rng: &mut R) -> Result<Array> {
        let size = compute_size(shape);

        let data: Vec<f64> = match *self {
            Self::Zero => vec![0.0; size],
            Self::One => vec![1.0; size],
            Self::Constant(v) => vec![v; size],
            Self::Uniform { low, high } => {
                if !(low < high) {
                    return Err(Error::InvalidArgument(format!(
                        "Uniform init requires low < high, got [{}, {})",
                        low, high
                    )));
                }
                let uniform = rand_distr::Uniform::new(low, high);
                (0..size).map(|_| uniform.sample(rng)).collect()
            },
            Self::Normal { mean, std } => {
                let normal = rand_distr::Normal::new(mean, std).map_err(|e| {
                    Error::InvalidArgument(format!("Normal init with mean={} std={}: {}", mean, std, e))
                })?;
                (0..size).map(|_| normal.sample(rng)).collect()
            },
            Self::XavierUniform => {
                let (fan_in, fan_out) = match shape {
                    [] => (1, 1),
                    [n] => (*n, *n),
                    [a, b, ..] => (*a, *b),
                };
                let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
                let uniform = rand_distr::Uniform::new_inclusive(-limit, limit);
                (0..size).map(|_| uniform.sample(rng)).collect()
            },
        };

        Array::from_f64_vec(&data, shape, dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn seeded_init_is_deterministic() -> Result<()> {
        let init = WeightInit::Normal { mean: 0.0, std: 1.0 };
        let a = init.create(&[3, 4], DType::F32, &mut StdRng::seed_from_u64(7))?;
        let b = init.create(&[3, 4], DType::F32, &mut StdRng::seed_from_u64(7))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn xavier_within_limit() -> Result<()> {
        let a = WeightInit::XavierUniform.create(&[4, 2], DType::F64, &mut StdRng::seed_from_u64(1))?;
        let limit = 1.0f64;
        assert!(a.to_f64_vec().iter().all(|v| v.abs() <= limit));

        let bad = WeightInit::Uniform { low: 1.0, high: 1.0 };
        assert!(bad.create(&[2], DType::F32, &mut StdRng::seed_from_u64(1)).is_err());
        Ok(())
    }
}
