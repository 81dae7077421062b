use ndarray::prelude::*;

use crate::{MlErr, Result};

/// A lookup table whose rows are averaged over every non padding token of a sequence.
#[derive(Debug, Clone)]
pub struct EmbeddingBag {
    n_vocab: usize,
    dim: usize,
    pad_id: u32,

    // Forward metadata
    tokens: Array2<u32>,
    counts: Vec<usize>,
}

impl EmbeddingBag {
    pub fn new(n_vocab: usize, dim: usize, pad_id: u32) -> Self {
        Self {
            n_vocab,
            dim,
            pad_id,
            tokens: Array2::zeros((0, 0)),
            counts: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.n_vocab * self.dim
    }

    /// The offset of the padding row inside this layer's parameters.
    pub fn pad_row(&self) -> std::ops::Range<usize> {
        let start = self.pad_id as usize * self.dim;
        start..start + self.dim
    }

    /// Averages the embeddings of each row of `tokens`.
    ///
    /// A row made only of padding produces a zero vector.
    pub fn forward(&mut self, params: &[f32], tokens: ArrayView2<u32>) -> Result<Array2<f32>> {
        let table = self.view_table(params)?;
        let mut out = Array2::zeros((tokens.nrows(), self.dim));
        let mut counts = Vec::with_capacity(tokens.nrows());

        for (row, mut acc) in tokens.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            let mut count = 0;

            for &token in row.iter().filter(|&&t| t != self.pad_id) {
                let idx = self.check_token(token)?;
                acc += &table.row(idx);
                count += 1;
            }

            if count > 0 {
                acc /= count as f32;
            }

            counts.push(count);
        }

        self.tokens = tokens.to_owned();
        self.counts = counts;
        Ok(out)
    }

    /// Scatters `d` back into the rows of the table that the last forward pass read.
    pub fn backward(&mut self, grad: &mut [f32], d: ArrayView2<f32>) -> Result<()> {
        let n_vocab = self.n_vocab;
        let dim = self.dim;
        let mut table = ArrayViewMut2::from_shape((n_vocab, dim), grad).map_err(|_| {
            MlErr::SizeMismatch {
                what: "embedding gradient",
                got: 0,
                expected: n_vocab * dim,
            }
        })?;

        for ((row, d_row), &count) in self
            .tokens
            .axis_iter(Axis(0))
            .zip(d.axis_iter(Axis(0)))
            .zip(&self.counts)
        {
            if count == 0 {
                continue;
            }

            let scale = 1. / count as f32;
            for &token in row.iter().filter(|&&t| t != self.pad_id) {
                table.row_mut(token as usize).scaled_add(scale, &d_row);
            }
        }

        Ok(())
    }

    fn view_table<'a>(&self, params: &'a [f32]) -> Result<ArrayView2<'a, f32>> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "embedding parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        ArrayView2::from_shape((self.n_vocab, self.dim), params).map_err(|_| MlErr::SizeMismatch {
            what: "embedding parameters",
            got: params.len(),
            expected: self.size(),
        })
    }

    fn check_token(&self, token: u32) -> Result<usize> {
        let idx = token as usize;
        if idx >= self.n_vocab {
            return Err(MlErr::TokenOutOfRange {
                token,
                vocab_size: self.n_vocab,
            });
        }

        Ok(idx)
    }
}
