use std::ops::Range;

use ndarray::{Array2, Axis, concatenate, s};
use rand::rngs::StdRng;

use super::{
    Mode, Model, ParamGroup,
    activations::ActFn,
    layers::{Dense, Dropout, EmbeddingBag},
};
use crate::{
    MlErr, Result,
    data::Batch,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
    vocab::PAD_ID,
};

/// The hyperparameters of a `SequenceClassifier`.
#[derive(Debug, Clone)]
pub struct ClassifierSpec {
    pub n_enc_vocab: usize,
    pub n_dec_vocab: usize,
    pub d_embed: usize,
    pub d_hidden: usize,
    pub n_output: usize,
    pub dropout: f32,
    pub init_std: f32,
    pub act_fn: ActFn,
    /// Seeds the dropout masks.
    pub seed: u64,
}

/// Classifies a tokenized document given its encoder and decoder inputs.
///
/// Both inputs are reduced to the mean of their token embeddings, concatenated, and sent
/// through a hidden layer and a linear head that yields one score per class.
///
/// The flat parameter vector is laid out as
/// `enc_embedding | dec_embedding | hidden.weight | hidden.bias | head.weight | head.bias`.
#[derive(Debug, Clone)]
pub struct SequenceClassifier {
    spec: ClassifierSpec,
    enc: EmbeddingBag,
    dec: EmbeddingBag,
    hidden: Dense,
    dropout: Dropout,
    head: Dense,
    offsets: [Range<usize>; 4],
}

impl SequenceClassifier {
    pub fn new(spec: ClassifierSpec) -> Self {
        let enc = EmbeddingBag::new(spec.n_enc_vocab, spec.d_embed, PAD_ID);
        let dec = EmbeddingBag::new(spec.n_dec_vocab, spec.d_embed, PAD_ID);
        let hidden = Dense::new((2 * spec.d_embed, spec.d_hidden), Some(spec.act_fn.clone()));
        let dropout = Dropout::new(spec.dropout, spec.seed);
        let head = Dense::new((spec.d_hidden, spec.n_output), None);

        let mut start = 0;
        let offsets = [enc.size(), dec.size(), hidden.size(), head.size()].map(|size| {
            let range = start..start + size;
            start += size;
            range
        });

        Self {
            spec,
            enc,
            dec,
            hidden,
            dropout,
            head,
            offsets,
        }
    }

    fn check_params(&self, got: usize, what: &'static str) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for SequenceClassifier {
    fn size(&self) -> usize {
        self.offsets[3].end
    }

    fn param_groups(&self) -> Vec<ParamGroup> {
        let [enc, dec, hidden, head] = self.offsets.clone();
        let hidden_w = hidden.start + self.hidden.weights_len();
        let head_w = head.start + self.head.weights_len();

        vec![
            ParamGroup {
                name: "enc_embedding",
                range: enc,
                decay: true,
            },
            ParamGroup {
                name: "dec_embedding",
                range: dec,
                decay: true,
            },
            ParamGroup {
                name: "hidden.weight",
                range: hidden.start..hidden_w,
                decay: true,
            },
            ParamGroup {
                name: "hidden.bias",
                range: hidden_w..hidden.end,
                decay: false,
            },
            ParamGroup {
                name: "head.weight",
                range: head.start..head_w,
                decay: true,
            },
            ParamGroup {
                name: "head.bias",
                range: head_w..head.end,
                decay: false,
            },
        ]
    }

    /// Weights and embeddings are drawn from `N(0, init_std)`, biases and the padding rows
    /// start at zero.
    fn init_params(&self, rng: &mut StdRng) -> Result<Vec<f32>> {
        let mut params = Vec::with_capacity(self.size());

        for group in self.param_groups() {
            let len = group.range.len();
            let values = if group.decay {
                RandParamGen::normal(rng, len, 0., self.spec.init_std)?.sample_all()
            } else {
                ConstParamGen::new(0., len).sample_all()
            };
            params.extend(values);
        }

        for (bag, offset) in [(&self.enc, &self.offsets[0]), (&self.dec, &self.offsets[1])] {
            let pad = bag.pad_row();
            params[offset.start + pad.start..offset.start + pad.end].fill(0.);
        }

        Ok(params)
    }

    fn forward(&mut self, params: &[f32], batch: &Batch, mode: Mode) -> Result<Array2<f32>> {
        self.check_params(params.len(), "classifier parameters")?;
        let [enc, dec, hidden, head] = self.offsets.clone();

        let e = self.enc.forward(&params[enc], batch.enc_inputs.view())?;
        let d = self.dec.forward(&params[dec], batch.dec_inputs.view())?;
        let x = concatenate(Axis(1), &[e.view(), d.view()]).map_err(|_| MlErr::SizeMismatch {
            what: "decoder inputs",
            got: d.nrows(),
            expected: e.nrows(),
        })?;

        let h = self.hidden.forward(&params[hidden], x.view())?;
        let h = self.dropout.forward(h, mode);
        self.head.forward(&params[head], h.view())
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], d_logits: Array2<f32>) -> Result<()> {
        self.check_params(params.len(), "classifier parameters")?;
        self.check_params(grad.len(), "classifier gradient")?;
        let [enc, dec, hidden, head] = self.offsets.clone();

        let d_h = self.head.backward(&params[head.clone()], &mut grad[head], d_logits)?;
        let d_h = self.dropout.backward(d_h);
        let d_x = self.hidden.backward(&params[hidden.clone()], &mut grad[hidden], d_h)?;

        let d_embed = self.spec.d_embed;
        self.enc.backward(&mut grad[enc], d_x.slice(s![.., ..d_embed]))?;
        self.dec.backward(&mut grad[dec], d_x.slice(s![.., d_embed..]))?;
        Ok(())
    }
}
