use crate::error::{ZarrError, ZarrResult};
use crate::types::{cartesian_indices, linear_index, ZarrVectorValue};
use serde::{Deserialize, Serialize};

/// Transpose codec: reorders a chunk's axes by a permutation of axis indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransposeCodec {
    pub order: Vec<usize>,
}

impl TransposeCodec {
    pub fn new(order: Vec<usize>) -> Self {
        Self { order }
    }

    /// The order parameter must be a permutation of `0..rank`.
    pub fn validate(&self, rank: usize) -> ZarrResult<()> {
        if self.order.len() != rank {
            return Err(ZarrError::Configuration(format!(
                "Transpose order {:?} has length {}, expected rank {rank}",
                self.order,
                self.order.len()
            )));
        }
        let mut seen = vec![false; rank];
        for &axis in &self.order {
            if axis >= rank || seen[axis] {
                return Err(ZarrError::Configuration(format!(
                    "Transpose order {:?} is not a permutation of 0..{rank}",
                    self.order
                )));
            }
            seen[axis] = true;
        }
        Ok(())
    }

    /// Shape of the chunk after applying the permutation.
    pub fn permuted_shape(&self, shape: &[usize]) -> Vec<usize> {
        self.order.iter().map(|&axis| shape[axis]).collect()
    }

    /// Inverse permutation, used on decode.
    pub fn inverse(&self) -> TransposeCodec {
        let mut inv = vec![0usize; self.order.len()];
        for (i, &axis) in self.order.iter().enumerate() {
            inv[axis] = i;
        }
        TransposeCodec::new(inv)
    }

    /// Reorder the chunk's axes: output axis `i` is input axis `order[i]`.
    /// `shape` is the chunk's shape before the permutation.
    pub fn encode(&self, value: &ZarrVectorValue, shape: &[usize]) -> ZarrVectorValue {
        let out_shape = self.permuted_shape(shape);
        let mut source = vec![0usize; shape.len()];
        let index: Vec<usize> = cartesian_indices(&out_shape)
            .into_iter()
            .map(|pos| {
                for (i, &axis) in self.order.iter().enumerate() {
                    source[axis] = pos[i];
                }
                linear_index(shape, &source)
            })
            .collect();
        value.gather(&index)
    }

    /// Undo the permutation. `shape` is the chunk's shape before the
    /// permutation (the decoded shape).
    pub fn decode(&self, value: &ZarrVectorValue, shape: &[usize]) -> ZarrVectorValue {
        self.inverse().encode(value, &self.permuted_shape(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_non_permutations() {
        assert!(TransposeCodec::new(vec![1, 0, 2]).validate(3).is_ok());
        assert!(TransposeCodec::new(vec![0, 0, 1]).validate(3).is_err());
        assert!(TransposeCodec::new(vec![0, 1, 3]).validate(3).is_err());
        assert!(TransposeCodec::new(vec![0, 1]).validate(3).is_err());
    }

    #[test]
    fn transpose_2d() {
        // 2x3 chunk [[0,1,2],[3,4,5]] -> 3x2 [[0,3],[1,4],[2,5]].
        let chunk = ZarrVectorValue::VInt32(vec![0, 1, 2, 3, 4, 5]);
        let codec = TransposeCodec::new(vec![1, 0]);
        let transposed = codec.encode(&chunk, &[2, 3]);
        assert_eq!(transposed, ZarrVectorValue::VInt32(vec![0, 3, 1, 4, 2, 5]));
        assert_eq!(codec.decode(&transposed, &[2, 3]), chunk);
    }

    #[test]
    fn transpose_3d_round_trip() {
        let chunk = ZarrVectorValue::VInt32((0..24).collect());
        let codec = TransposeCodec::new(vec![2, 0, 1]);
        let shape = [2, 3, 4];
        let transposed = codec.encode(&chunk, &shape);
        assert_eq!(codec.permuted_shape(&shape), vec![4, 2, 3]);
        assert_eq!(codec.decode(&transposed, &shape), chunk);
    }
}
