use ndarray::Array2;

use super::Example;
use crate::{Device, vocab::PAD_ID};

/// A collated group of examples, with inputs right padded with `[PAD]` to the longest
/// sequence in the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub labels: Vec<usize>,
    pub enc_inputs: Array2<u32>,
    pub dec_inputs: Array2<u32>,
}

impl Batch {
    pub fn collate(examples: &[&Example]) -> Self {
        let labels = examples.iter().map(|ex| ex.label).collect();
        let enc_inputs = pad(examples, |ex| ex.enc_input.as_slice());
        let dec_inputs = pad(examples, |ex| ex.dec_input.as_slice());

        Self {
            labels,
            enc_inputs,
            dec_inputs,
        }
    }

    /// Moves the batch onto `device`.
    pub fn to(self, device: Device) -> Self {
        match device {
            Device::Cpu => self,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn pad<F>(examples: &[&Example], seq: F) -> Array2<u32>
where
    F: Fn(&Example) -> &[u32],
{
    let width = examples.iter().map(|ex| seq(ex).len()).max().unwrap_or(0).max(1);

    Array2::from_shape_fn((examples.len(), width), |(i, j)| {
        seq(examples[i]).get(j).copied().unwrap_or(PAD_ID)
    })
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn collate_pads_to_the_longest_sequence() {
        let a = Example::new(0, vec![5, 6, 7], 16);
        let b = Example::new(1, vec![8], 16);

        let batch = Batch::collate(&[&a, &b]);

        assert_eq!(batch.labels, vec![0, 1]);
        assert_eq!(batch.enc_inputs, array![[5, 6, 7], [8, PAD_ID, PAD_ID]]);
        assert_eq!(batch.dec_inputs.dim(), (2, 1));
    }

    #[test]
    fn empty_documents_still_get_a_column() {
        let a = Example::new(0, vec![], 16);
        let batch = Batch::collate(&[&a]);
        assert_eq!(batch.enc_inputs, array![[PAD_ID]]);
    }
}
