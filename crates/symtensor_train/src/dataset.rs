use symtensor_core::{
    array::Array,
    error::{Error, Result},
};

/// One minibatch: feature and label arrays plus optional masks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiDataSet {
    pub features: Vec<Array>,
    pub labels: Vec<Array>,
    pub features_masks: Option<Vec<Array>>,
    pub labels_masks: Option<Vec<Array>>,
}

impl MultiDataSet {
    pub fn new(features: Vec<Array>, labels: Vec<Array>) -> Self {
        Self {
            features,
            labels,
            features_masks: None,
            labels_masks: None,
        }
    }

    pub fn with_masks(mut self, features_masks: Option<Vec<Array>>, labels_masks: Option<Vec<Array>>) -> Self {
        self.features_masks = features_masks;
        self.labels_masks = labels_masks;
        self
    }

    /// Number of examples, taken from the leading dimension of the first
    /// feature array.
    pub fn num_examples(&self) -> usize {
        self.features
            .first()
            .and_then(|f| f.shape().first().copied())
            .unwrap_or(0)
    }
}

/// Source of minibatches for training.
pub trait BatchIterator {
    fn next_batch(&mut self) -> Option<MultiDataSet>;

    fn reset_supported(&self) -> bool;

    /// Rewinds to the first batch.
    fn reset(&mut self) -> Result<()>;
}

/// In-memory batches, served in order.
#[derive(Clone, Debug)]
pub struct VecBatchIterator {
    batches: Vec<MultiDataSet>,
    cursor: usize,
    resettable: bool,
}

impl VecBatchIterator {
    pub fn new(batches: Vec<MultiDataSet>) -> Self {
        Self {
            batches,
            cursor: 0,
            resettable: true,
        }
    }

    /// An iterator that can only be consumed once, like a stream.
    pub fn non_resettable(batches: Vec<MultiDataSet>) -> Self {
        Self {
            resettable: false,
            ..Self::new(batches)
        }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl BatchIterator for VecBatchIterator {
    fn next_batch(&mut self) -> Option<MultiDataSet> {
        let batch = self.batches.get(self.cursor).cloned();
        if batch.is_some() {
            self.cursor += 1;
        }
        batch
    }

    fn reset_supported(&self) -> bool {
        self.resettable
    }

    fn reset(&mut self) -> Result<()> {
        if !self.resettable {
            return Err(Error::Configuration("batch iterator does not support reset".to_string()));
        }
        self.cursor = 0;
        Ok(())
    }
}
