//! The top level driver of a worker's run.
//!
//! `INIT -> RESTORE? -> (TRAIN -> EVAL -> MAYBE_CHECKPOINT) x epochs -> TEARDOWN`

use std::sync::Arc;

use log::{info, warn};
use machine_learning::{
    arch::{Model, SequenceClassifier, loss::CrossEntropy},
    data::{DataLoader, InMemoryDataset, Sampler},
    optimization::{AdamW, LinearWarmup},
    vocab::Vocab,
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    checkpoint::CheckpointManager,
    config::TrainingConfig,
    coordinator::{LocalSync, ProcessGroup, Rendezvous, Synchronizer, WorkerContext},
    epoch::{EpochResult, Learner, eval_epoch, train_epoch},
    error::Result,
    master::MasterGate,
    metrics::MetricLogger,
    state::{BestRecord, ModelState},
};

/// What a finished run went through.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rank: usize,
    /// One entry per epoch, in order.
    pub epochs: Vec<EpochResult>,
    pub best: BestRecord,
    /// The amount of checkpoints written during the run.
    pub checkpoints: usize,
}

/// Runs a whole training as the worker `rank`.
///
/// A process group is set up when `rendezvous` describes more than one worker and
/// released once every epoch is done. On failure the group is dropped without waiting
/// for the other workers, which then fail on their next collective.
///
/// # Arguments
/// * `config` - The run configuration.
/// * `vocab` - The vocabulary the datasets are encoded with.
/// * `rank` - This worker's rank, 0 for single worker runs.
/// * `rendezvous` - The meeting point of the group, if any.
/// * `logger` - The metrics sink, only used by the master.
///
/// # Returns
/// A summary of the run.
pub fn train_model(
    config: &TrainingConfig,
    vocab: &Vocab,
    rank: usize,
    rendezvous: Option<&Rendezvous>,
    logger: Box<dyn MetricLogger>,
) -> Result<RunSummary> {
    let mut group = match rendezvous {
        Some(rendezvous) if rendezvous.world_size > 1 => {
            Some(ProcessGroup::setup(rendezvous, rank)?)
        }
        _ => None,
    };

    let ctx = match &group {
        Some(group) => group.context(),
        None => WorkerContext::new(rank, rendezvous.map_or(0, |r| r.world_size)),
    };

    let summary = run(config, vocab, ctx, group.as_mut(), logger);

    match (summary, group) {
        (Ok(summary), Some(group)) => {
            group.teardown()?;
            Ok(summary)
        }
        (Err(e), Some(_)) => {
            warn!(rank = ctx.rank(); "abandoning process group: {e}");
            Err(e)
        }
        (summary, None) => summary,
    }
}

fn run(
    config: &TrainingConfig,
    vocab: &Vocab,
    ctx: WorkerContext,
    mut group: Option<&mut ProcessGroup>,
    logger: Box<dyn MetricLogger>,
) -> Result<RunSummary> {
    let rank = ctx.rank();
    info!(rank = rank; "{config:#?}");

    let max_seq = config.model.max_seq;
    let train = Arc::new(InMemoryDataset::from_json_lines(vocab, &config.train_path, max_seq)?);
    let test = Arc::new(InMemoryDataset::from_json_lines(vocab, &config.test_path, max_seq)?);

    let train_sampler = if ctx.is_distributed() {
        Sampler::distributed(config.seed, ctx.shard(), true)
    } else {
        Sampler::random(config.seed)
    };
    let mut train_loader = DataLoader::new(train, train_sampler, config.batch_size);
    let mut test_loader = DataLoader::new(test, Sampler::Sequential, config.batch_size);

    let mut model = SequenceClassifier::new(config.classifier_spec(rank));
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut state = ModelState::new(model.init_params(&mut rng)?);

    let checkpoints = CheckpointManager::new(&config.save_path);
    if let Some(best) = checkpoints.load(&mut state.params)? {
        state.best = best;
        info!("rank: {rank} load state dict from: {}", config.save_path.display());
    }

    if let Some(group) = group.as_deref_mut() {
        group.broadcast(&mut state.params)?;
    }

    let total_steps = (config.epochs * train_loader.len()) as u64;
    let mut optimizer = AdamW::new(
        &model.param_groups(),
        config.learning_rate,
        config.adam_epsilon,
        config.weight_decay,
    );
    let scheduler = LinearWarmup::new(&mut optimizer, config.warmup_steps, total_steps);

    let mut local = LocalSync;
    let sync: &mut dyn Synchronizer = match group {
        Some(group) => group,
        None => &mut local,
    };
    let mut learner = Learner::new(CrossEntropy, optimizer, scheduler, sync, model.size());

    let mut gate = MasterGate::new(ctx, logger);
    let mut summary = RunSummary {
        rank,
        epochs: Vec::with_capacity(config.epochs),
        best: state.best,
        checkpoints: 0,
    };

    let offset = state.best.epoch;
    for step in 0..config.epochs {
        let epoch = step + offset;
        if ctx.is_distributed() {
            train_loader.set_epoch(epoch as u64);
        }

        let loss = train_epoch(
            config,
            &gate,
            epoch,
            &mut model,
            &mut state.params,
            &mut learner,
            &mut train_loader,
        )?;
        let score = eval_epoch(config, &gate, &mut model, &state.params, &mut test_loader)?;

        let result = EpochResult { epoch, loss, score };
        gate.log_epoch(&result);

        if gate.maybe_checkpoint(&checkpoints, &mut state, &result)? {
            summary.checkpoints += 1;
        }

        summary.epochs.push(result);
    }

    summary.best = state.best;
    Ok(summary)
}
