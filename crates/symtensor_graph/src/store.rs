use crate::variable::VarId;
use dashmap::DashMap;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Mutex;
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    init::WeightInit,
};

/// Arrays of CONSTANT and VARIABLE nodes, keyed by variable index.
///
/// Reads and lazy initialization only need `&self`, so several sessions can
/// resolve parameters concurrently through a shared graph.
#[derive(Debug)]
pub struct ArrayStore {
    arrays: DashMap<VarId, Array>,
    rng: Mutex<StdRng>,
}

impl ArrayStore {
    pub fn new(seed: u64) -> Self {
        Self {
            arrays: DashMap::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn get(&self, id: VarId) -> Option<Array> {
        self.arrays.get(&id).map(|a| a.value().clone())
    }

    pub fn contains(&self, id: VarId) -> bool {
        self.arrays.contains_key(&id)
    }

    pub fn insert(&self, id: VarId, array: Array) {
        self.arrays.insert(id, array);
    }

    pub(crate) fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Returns the stored array, creating it with `init` first if absent.
    /// Concurrent callers observe the same initialized value.
    pub fn get_or_init(&self, id: VarId, shape: &[usize], dtype: DType, init: &WeightInit) -> Result<Array> {
        let entry = self.arrays.entry(id).or_try_insert_with(|| {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| Error::internal("weight initializer lock poisoned"))?;
            init.create(shape, dtype, &mut *rng)
        })?;
        Ok(entry.value().clone())
    }
}
