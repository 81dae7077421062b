use std::{fs, num::NonZeroUsize, path::Path, path::PathBuf};

use machine_learning::{Device, arch::ClassifierSpec, arch::activations::ActFn};
use serde::{Deserialize, Serialize};

use crate::{
    cli::Args,
    error::{Result, TrainErr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Sigmoid,
    Tanh,
}

impl From<Activation> for ActFn {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Sigmoid => ActFn::sigmoid(1.),
            Activation::Tanh => ActFn::tanh(),
        }
    }
}

/// The model hyperparameters, read from the JSON configuration file.
///
/// Unknown keys are ignored, so configuration files written for larger models load as
/// long as the known ones make sense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(alias = "d_hidn")]
    pub d_embed: usize,
    #[serde(alias = "d_ff")]
    pub d_hidden: usize,
    pub n_output: usize,
    pub dropout: f32,
    #[serde(alias = "n_enc_seq")]
    pub max_seq: usize,
    pub init_std: f32,
    pub activation: Activation,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            d_embed: 64,
            d_hidden: 128,
            n_output: 2,
            dropout: 0.1,
            max_seq: 256,
            init_std: 0.02,
            activation: Activation::Sigmoid,
        }
    }
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| TrainErr::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| TrainErr::Format {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(TrainErr::InvalidConfig(msg.to_string()));

        if self.d_embed == 0 || self.d_hidden == 0 {
            return invalid("d_embed and d_hidden must be positive");
        }
        if self.n_output < 2 {
            return invalid("n_output must be at least 2");
        }
        if !(0. ..1.).contains(&self.dropout) {
            return invalid("dropout must be in [0, 1)");
        }
        if self.max_seq == 0 {
            return invalid("max_seq must be positive");
        }
        if !self.init_std.is_finite() || self.init_std < 0. {
            return invalid("init_std must be a finite non negative number");
        }

        Ok(())
    }
}

/// Everything a worker needs to know about the run. Built once at startup and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub epochs: usize,
    pub batch_size: NonZeroUsize,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub warmup_steps: u64,
    pub adam_epsilon: f32,
    pub seed: u64,
    pub device: Device,
    pub n_enc_vocab: usize,
    pub n_dec_vocab: usize,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub save_path: PathBuf,
    pub metrics_path: Option<PathBuf>,
}

impl TrainingConfig {
    /// Combines the model file, the command line and the size of the loaded vocabulary.
    ///
    /// # Returns
    /// The configuration, or an error if the device is unavailable or a value is out of
    /// range.
    pub fn new(model: ModelConfig, args: &Args, vocab_len: usize) -> Result<Self> {
        let batch_size = NonZeroUsize::new(args.batch)
            .ok_or_else(|| TrainErr::InvalidConfig("batch must be positive".to_string()))?;

        let device = match &args.gpu {
            Some(name) => name.parse()?,
            None => Device::Cpu,
        };

        if !(args.learning_rate.is_finite() && args.learning_rate > 0.) {
            return Err(TrainErr::InvalidConfig(
                "learning rate must be a positive number".to_string(),
            ));
        }

        Ok(Self {
            model,
            epochs: args.epoch,
            batch_size,
            learning_rate: args.learning_rate,
            weight_decay: args.weight_decay,
            warmup_steps: args.warmup_steps,
            adam_epsilon: args.adam_epsilon,
            seed: args.seed,
            device,
            n_enc_vocab: vocab_len,
            n_dec_vocab: vocab_len,
            train_path: args.train_data.clone(),
            test_path: args.test_data.clone(),
            save_path: args.save.clone(),
            metrics_path: args.metrics.clone(),
        })
    }

    /// The classifier hyperparameters for the worker at `rank`.
    ///
    /// Only the dropout stream depends on the rank, the initial parameters don't.
    pub fn classifier_spec(&self, rank: usize) -> ClassifierSpec {
        ClassifierSpec {
            n_enc_vocab: self.n_enc_vocab,
            n_dec_vocab: self.n_dec_vocab,
            d_embed: self.model.d_embed,
            d_hidden: self.model.d_hidden,
            n_output: self.model.n_output,
            dropout: self.model.dropout,
            init_std: self.model.init_std,
            act_fn: self.model.activation.into(),
            seed: self.seed.wrapping_add(1 + rank as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use machine_learning::MlErr;

    use super::*;

    #[test]
    fn model_config_accepts_partial_files_and_aliases() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"d_hidn": 16, "n_output": 3, "n_head": 4, "activation": "tanh"}}"#)
            .unwrap();

        let config = ModelConfig::load(file.path()).unwrap();
        assert_eq!(config.d_embed, 16);
        assert_eq!(config.n_output, 3);
        assert_eq!(config.activation, Activation::Tanh);
        assert_eq!(config.d_hidden, ModelConfig::default().d_hidden);
    }

    #[test]
    fn missing_config_is_an_io_error() {
        let err = ModelConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, TrainErr::Io { .. }));
    }

    #[test]
    fn invalid_dropout_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dropout": 1.5}}"#).unwrap();
        assert!(matches!(
            ModelConfig::load(file.path()),
            Err(TrainErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn accelerators_are_unavailable() {
        let args = Args::parse_from(["train", "--gpu", "0"]);
        let err = TrainingConfig::new(ModelConfig::default(), &args, 10).unwrap_err();
        assert!(matches!(err, TrainErr::Ml(MlErr::DeviceUnavailable(_))));
    }

    #[test]
    fn vocab_size_fills_both_vocabularies() {
        let args = Args::parse_from(["train", "--batch", "8"]);
        let config = TrainingConfig::new(ModelConfig::default(), &args, 123).unwrap();

        assert_eq!(config.n_enc_vocab, 123);
        assert_eq!(config.n_dec_vocab, 123);
        assert_eq!(config.batch_size.get(), 8);
        assert_eq!(config.device, Device::Cpu);
    }
}
