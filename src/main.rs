use anyhow::Context;
use clap::Parser;
use log::info;
use machine_learning::vocab::Vocab;

use trainer::{
    cli::Args,
    config::{ModelConfig, TrainingConfig},
    launch, metrics, train_model,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.is_launcher() {
        return launch::launch(args.world_size()).context("distributed run failed");
    }

    let vocab = Vocab::load(&args.vocab)
        .with_context(|| format!("failed to load vocabulary {}", args.vocab.display()))?;
    let model = ModelConfig::load(&args.config)?;
    let config = TrainingConfig::new(model, &args, vocab.len())?;

    let rank = args.rank.unwrap_or(0);
    let rendezvous = (args.world_size() > 1).then(|| args.rendezvous());
    let logger = metrics::logger_for(config.metrics_path.as_deref())
        .context("failed to open the metrics file")?;

    let summary = train_model(&config, &vocab, rank, rendezvous.as_ref(), logger)
        .with_context(|| format!("worker {rank} failed"))?;

    info!(
        "rank {rank} done: best epoch={}, loss={:.3}, score={:.3}, checkpoints written={}",
        summary.best.epoch, summary.best.loss, summary.best.score, summary.checkpoints
    );

    Ok(())
}
