use std::collections::HashMap;

use nalgebra::DMatrix;
use serde::Serialize;

use super::{BlockKey, Shape, TensorStore};

/// A dense block, first index running fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorBlock {
    shape: Shape,
    data: Vec<f64>,
    /// number of batched writes this block has received
    writes: usize,
}

impl TensorBlock {
    pub fn zeros(shape: Shape) -> Self {
        let size = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; size],
            writes: 0,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[super::linear_index(&self.shape, index)]
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn is_populated(&self) -> bool {
        self.writes > 0
    }

    /// Number of entries that are not exactly zero.
    pub fn nonzero(&self) -> usize {
        self.data.iter().filter(|&&value| value != 0.0).count()
    }
}

/// Serialisable overview of one block.
#[derive(Clone, Debug, Serialize)]
pub struct BlockSummary {
    pub tensor: &'static str,
    pub labels: String,
    pub shape: Vec<usize>,
    pub nonzero: usize,
    pub frobenius_norm: f64,
}

/// A [`TensorStore`] holding every block densely in this process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: HashMap<BlockKey, TensorBlock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, key: &BlockKey) -> Option<&TensorBlock> {
        self.blocks.get(key)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All declared keys in a stable order.
    pub fn keys(&self) -> Vec<&BlockKey> {
        let mut keys = self.blocks.keys().collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }

    /// A two-index block as a matrix, rows running over the first index.
    pub fn matrix(&self, key: &BlockKey) -> Option<DMatrix<f64>> {
        let block = self.blocks.get(key)?;
        let &[rows, cols] = block.shape() else {
            return None;
        };
        Some(DMatrix::from_column_slice(rows, cols, block.data()))
    }

    pub fn summary(&self) -> Vec<BlockSummary> {
        self.keys()
            .into_iter()
            .map(|key| {
                let block = &self.blocks[key];
                BlockSummary {
                    tensor: key.class.name(),
                    labels: key.labels(),
                    shape: block.shape().to_vec(),
                    nonzero: block.nonzero(),
                    frobenius_norm: block.data().iter().map(|v| v * v).sum::<f64>().sqrt(),
                }
            })
            .collect()
    }
}

impl TensorStore for MemoryStore {
    fn declare(&mut self, key: BlockKey, shape: Shape) {
        assert_eq!(
            shape.len(),
            key.class.rank(),
            "block {key} declared with the wrong rank"
        );
        log::trace!("declaring {key} with shape {shape:?}");
        self.blocks.insert(key, TensorBlock::zeros(shape));
    }

    fn shape(&self, key: &BlockKey) -> Option<Shape> {
        self.blocks.get(key).map(|block| block.shape.clone())
    }

    fn write_local_data(&mut self, key: &BlockKey, pairs: &[(usize, f64)]) {
        let block = self
            .blocks
            .get_mut(key)
            .unwrap_or_else(|| panic!("write to undeclared block {key}"));

        let size = block.data.len();
        for &(linear, value) in pairs {
            assert!(
                linear < size,
                "index {linear} is out of range for block {key} of size {size}"
            );
            block.data[linear] = value;
        }
        block.writes += 1;

        log::debug!("wrote {} entries to {key}", pairs.len());
    }

    fn get_local_data(&self, key: &BlockKey) -> Option<Vec<f64>> {
        self.blocks
            .get(key)
            .filter(|block| block.is_populated())
            .map(|block| block.data.clone())
    }
}
