//! One pass of training or evaluation over a data loader.

use machine_learning::{
    arch::{Mode, Model, argmax_rows, loss::LossFn},
    data::DataLoader,
    optimization::{Optimizer, Scheduler},
};

use crate::{
    config::TrainingConfig,
    coordinator::Synchronizer,
    error::{Result, TrainErr},
    master::MasterGate,
    progress::RunningMean,
};

/// The outcome of one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochResult {
    pub epoch: usize,
    /// The mean training loss.
    pub loss: f32,
    /// The evaluation accuracy, in `[0, 1]`.
    pub score: f32,
}

/// Everything an optimization step touches besides the model and its parameters.
pub struct Learner<'s, L, O, S> {
    pub loss_fn: L,
    pub optimizer: O,
    pub scheduler: S,
    sync: &'s mut dyn Synchronizer,
    grad: Vec<f32>,
}

impl<'s, L, O, S> Learner<'s, L, O, S>
where
    L: LossFn,
    O: Optimizer,
    S: Scheduler,
{
    /// Creates a new `Learner` for a model of `size` parameters.
    ///
    /// # Arguments
    /// * `loss_fn` - The training criterion.
    /// * `optimizer` - Updates the parameters from the averaged gradient.
    /// * `scheduler` - Adjusts the learning rate after every step.
    /// * `sync` - Averages the gradient across workers before each update.
    /// * `size` - The amount of parameters of the model.
    pub fn new(
        loss_fn: L,
        optimizer: O,
        scheduler: S,
        sync: &'s mut dyn Synchronizer,
        size: usize,
    ) -> Self {
        Self {
            loss_fn,
            optimizer,
            scheduler,
            sync,
            grad: vec![0.; size],
        }
    }
}

/// Trains `model` for one pass over `loader`.
///
/// Every batch is moved to the configured device, then goes through a forward pass,
/// the loss, a backward pass, the gradient all-reduce, one optimizer step and one
/// scheduler step. Progress is only reported through `gate` by the master.
///
/// # Returns
/// The mean loss of the epoch, 0 if the loader is empty.
pub fn train_epoch<M, L, O, S>(
    config: &TrainingConfig,
    gate: &MasterGate,
    epoch: usize,
    model: &mut M,
    params: &mut [f32],
    learner: &mut Learner<'_, L, O, S>,
    loader: &mut DataLoader,
) -> Result<f32>
where
    M: Model + ?Sized,
    L: LossFn,
    O: Optimizer,
    S: Scheduler,
{
    let mut losses = RunningMean::default();
    let mut progress = gate.train_progress(epoch, loader.len());

    for (i, batch) in loader.batches().enumerate() {
        let batch = batch.to(config.device);

        learner.optimizer.zero_grad(&mut learner.grad);
        let logits = model.forward(params, &batch, Mode::Train)?;

        let loss = learner.loss_fn.loss(logits.view(), &batch.labels)?;
        if !loss.is_finite() {
            return Err(TrainErr::NonFiniteLoss { epoch, batch: i });
        }

        let d_logits = learner.loss_fn.loss_prime(logits.view(), &batch.labels)?;
        model.backward(params, &mut learner.grad, d_logits)?;

        learner.sync.reduce(&mut learner.grad)?;
        learner.optimizer.update_params(&learner.grad, params)?;
        learner.scheduler.step(&mut learner.optimizer);

        let mean = losses.push(loss as f64);
        progress.update(|| format!("Loss: {loss:.3} ({mean:.3})"));
    }

    Ok(losses.mean() as f32)
}

/// Measures the accuracy of `model` over one pass of `loader`.
///
/// Runs in evaluation mode and only reads `params`.
///
/// # Returns
/// The fraction of examples whose highest score is their label, 0 if the loader is
/// empty.
pub fn eval_epoch<M>(
    config: &TrainingConfig,
    gate: &MasterGate,
    model: &mut M,
    params: &[f32],
    loader: &mut DataLoader,
) -> Result<f32>
where
    M: Model + ?Sized,
{
    let mut correct = 0usize;
    let mut total = 0usize;
    let mut progress = gate.valid_progress(loader.len());

    for batch in loader.batches() {
        let batch = batch.to(config.device);
        let logits = model.forward(params, &batch, Mode::Eval)?;

        correct += argmax_rows(logits.view())
            .into_iter()
            .zip(&batch.labels)
            .filter(|(pred, label)| pred == *label)
            .count();
        total += batch.len();

        let running = accuracy(correct, total);
        progress.update(|| format!("Acc: {running:.3}"));
    }

    Ok(accuracy(correct, total))
}

fn accuracy(correct: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.;
    }

    (correct as f64 / total as f64) as f32
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

    use machine_learning::{
        Device,
        arch::{ClassifierSpec, SequenceClassifier, activations::ActFn, loss::CrossEntropy},
        data::{Example, InMemoryDataset, Sampler},
        optimization::{AdamW, LinearWarmup},
    };
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::ModelConfig,
        coordinator::{LocalSync, WorkerContext},
        metrics::LogMetrics,
    };

    fn config() -> TrainingConfig {
        TrainingConfig {
            model: ModelConfig::default(),
            epochs: 1,
            batch_size: NonZeroUsize::new(2).unwrap(),
            learning_rate: 0.05,
            weight_decay: 0.,
            warmup_steps: 0,
            adam_epsilon: 1e-8,
            seed: 0,
            device: Device::Cpu,
            n_enc_vocab: 6,
            n_dec_vocab: 6,
            train_path: PathBuf::new(),
            test_path: PathBuf::new(),
            save_path: PathBuf::new(),
            metrics_path: None,
        }
    }

    fn gate() -> MasterGate {
        MasterGate::new(WorkerContext::single(), Box::new(LogMetrics))
    }

    fn model() -> SequenceClassifier {
        SequenceClassifier::new(ClassifierSpec {
            n_enc_vocab: 6,
            n_dec_vocab: 6,
            d_embed: 4,
            d_hidden: 4,
            n_output: 2,
            dropout: 0.,
            init_std: 0.5,
            act_fn: ActFn::sigmoid(1.),
            seed: 0,
        })
    }

    fn loader(examples: Vec<Example>) -> DataLoader {
        DataLoader::new(
            Arc::new(InMemoryDataset::new(examples)),
            Sampler::Sequential,
            NonZeroUsize::new(2).unwrap(),
        )
    }

    // token 3 means class 0, token 4 means class 1
    fn separable() -> Vec<Example> {
        (0..8)
            .map(|i| Example::new(i % 2, vec![3 + (i % 2) as u32, 5], 8))
            .collect()
    }

    #[test]
    fn empty_split_scores_zero() {
        let mut model = model();
        let params = model.init_params(&mut StdRng::seed_from_u64(0)).unwrap();

        let score = eval_epoch(&config(), &gate(), &mut model, &params, &mut loader(vec![])).unwrap();
        assert_eq!(score, 0.);
    }

    #[test]
    fn training_lowers_the_loss_and_scores_stay_in_range() {
        let config = config();
        let gate = gate();
        let mut model = model();
        let mut params = model.init_params(&mut StdRng::seed_from_u64(0)).unwrap();

        let mut optimizer = AdamW::new(&model.param_groups(), config.learning_rate, 1e-8, 0.);
        let scheduler = LinearWarmup::new(&mut optimizer, 0, 1000);
        let mut sync = LocalSync;
        let mut learner = Learner::new(CrossEntropy, optimizer, scheduler, &mut sync, model.size());

        let mut train = loader(separable());
        let mut test = loader(separable());

        let first = train_epoch(&config, &gate, 0, &mut model, &mut params, &mut learner, &mut train)
            .unwrap();
        let mut last = first;
        for epoch in 1..30 {
            last = train_epoch(&config, &gate, epoch, &mut model, &mut params, &mut learner, &mut train)
                .unwrap();
        }

        assert!(last < first, "{last} >= {first}");
        assert_eq!(learner.scheduler.steps(), 30 * 4);

        let score = eval_epoch(&config, &gate, &mut model, &params, &mut test).unwrap();
        assert!((0. ..=1.).contains(&score));
        assert_eq!(score, 1.);
    }

    #[test]
    fn evaluation_leaves_parameters_untouched() {
        let mut model = model();
        let params = model.init_params(&mut StdRng::seed_from_u64(4)).unwrap();
        let before = params.clone();

        eval_epoch(&config(), &gate(), &mut model, &params, &mut loader(separable())).unwrap();
        assert_eq!(params, before);
    }
}
