//! Corpus loading and batching.
//!
//! Provides:
//! - `Dictionary` / `Corpus` - word-level tokenization of train/valid/test files
//! - `batchify` - column layout of a token stream for truncated BPTT
//! - `BatchedSplit` - fixed-length (inputs, targets) windows over a batchified split

mod corpus;

pub use corpus::{Corpus, Dictionary, EOS_TOKEN};

use crate::{ReinforceError, Result};
use tch::{Device, Tensor};

/// Arrange a token stream into `[rows, batch_size]` columns.
///
/// Each column is a contiguous slice of the stream; trailing tokens that do
/// not fill a whole row are dropped.
pub fn batchify(tokens: &[i64], batch_size: i64, device: Device) -> Result<Tensor> {
    if batch_size <= 0 {
        return Err(ReinforceError::config(format!(
            "batch size must be positive, got {}",
            batch_size
        )));
    }
    let rows = tokens.len() as i64 / batch_size;
    if rows < 2 {
        return Err(ReinforceError::Data(format!(
            "{} tokens cannot fill two rows of batch size {}",
            tokens.len(),
            batch_size
        )));
    }
    let used = (rows * batch_size) as usize;
    Ok(Tensor::from_slice(&tokens[..used])
        .view([batch_size, rows])
        .transpose(0, 1)
        .contiguous()
        .to_device(device))
}

/// A batchified split cut into BPTT windows.
pub struct BatchedSplit {
    data: Tensor,
    bptt: i64,
}

impl BatchedSplit {
    pub fn new(data: Tensor, bptt: i64) -> Result<Self> {
        if bptt <= 0 {
            return Err(ReinforceError::config(format!(
                "sequence length must be positive, got {}",
                bptt
            )));
        }
        if data.dim() != 2 || data.size()[0] < 2 {
            return Err(ReinforceError::Data(format!(
                "expected [rows >= 2, batch] tokens, got {:?}",
                data.size()
            )));
        }
        Ok(Self { data, bptt })
    }

    pub fn rows(&self) -> i64 {
        self.data.size()[0]
    }

    pub fn batch_size(&self) -> i64 {
        self.data.size()[1]
    }

    pub fn bptt(&self) -> i64 {
        self.bptt
    }

    /// Number of windows in one pass over the split
    pub fn num_windows(&self) -> usize {
        let span = self.rows() - 1;
        ((span + self.bptt - 1) / self.bptt) as usize
    }

    /// Window `index`: inputs are rows `[i, i + len)` and targets are rows
    /// `[i + 1, i + 1 + len)`, with `len = min(bptt, rows - 1 - i)`.
    pub fn window(&self, index: usize) -> Result<(Tensor, Tensor)> {
        if index >= self.num_windows() {
            return Err(ReinforceError::Data(format!(
                "window {} out of range ({} windows)",
                index,
                self.num_windows()
            )));
        }
        let start = index as i64 * self.bptt;
        let len = self.bptt.min(self.rows() - 1 - start);
        let inputs = self.data.narrow(0, start, len);
        let targets = self.data.narrow(0, start + 1, len);
        Ok((inputs, targets))
    }

    /// Iterate over every window in order
    pub fn windows(&self) -> impl Iterator<Item = Result<(Tensor, Tensor)>> + '_ {
        (0..self.num_windows()).map(move |i| self.window(i))
    }
}

/// Train/validation/test splits ready for the trainer
pub struct DataSplits {
    pub train: BatchedSplit,
    pub valid: BatchedSplit,
    pub test: BatchedSplit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batchify_columns() {
        let tokens: Vec<i64> = (0..11).collect();
        let data = batchify(&tokens, 2, Device::Cpu).unwrap();

        // 11 tokens, batch 2 -> 5 rows; column 0 is 0..5, column 1 is 5..10
        assert_eq!(data.size(), [5, 2]);
        let col0 = Vec::<i64>::try_from(data.select(1, 0).contiguous()).unwrap();
        let col1 = Vec::<i64>::try_from(data.select(1, 1).contiguous()).unwrap();
        assert_eq!(col0, vec![0, 1, 2, 3, 4]);
        assert_eq!(col1, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_batchify_too_short() {
        assert!(batchify(&[1, 2, 3], 2, Device::Cpu).is_err());
        assert!(batchify(&[1, 2, 3, 4], 0, Device::Cpu).is_err());
    }

    #[test]
    fn test_windows_cover_split() {
        let tokens: Vec<i64> = (0..20).collect();
        let split = BatchedSplit::new(batchify(&tokens, 2, Device::Cpu).unwrap(), 4).unwrap();

        // 10 rows -> 9 predictable rows -> windows of 4, 4, 1
        assert_eq!(split.num_windows(), 3);
        let lens: Vec<i64> = split
            .windows()
            .map(|w| w.unwrap().0.size()[0])
            .collect();
        assert_eq!(lens, vec![4, 4, 1]);
    }

    #[test]
    fn test_window_targets_are_shifted() {
        let tokens: Vec<i64> = (0..12).collect();
        let split = BatchedSplit::new(batchify(&tokens, 1, Device::Cpu).unwrap(), 5).unwrap();
        let (inputs, targets) = split.window(1).unwrap();

        let inputs = Vec::<i64>::try_from(inputs.flatten(0, -1)).unwrap();
        let targets = Vec::<i64>::try_from(targets.flatten(0, -1)).unwrap();
        assert_eq!(inputs, vec![5, 6, 7, 8, 9]);
        assert_eq!(targets, vec![6, 7, 8, 9, 10]);
        assert!(split.window(3).is_err());
    }
}
