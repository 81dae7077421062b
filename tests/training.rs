use std::{
    fs,
    net::TcpListener,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use machine_learning::{
    Device,
    arch::{Model, SequenceClassifier},
    vocab::Vocab,
};
use tempfile::TempDir;
use trainer::{
    RunSummary, TrainErr,
    checkpoint::CheckpointManager,
    config::{ModelConfig, TrainingConfig},
    coordinator::Rendezvous,
    metrics::LogMetrics,
    state::BestRecord,
    train_model,
};

const POSITIVE: [&str; 3] = ["good", "great", "fun"];
const NEGATIVE: [&str; 3] = ["bad", "awful", "boring"];

/// Two examples with the same text and different labels, exactly one of them is
/// always classified right.
const AMBIGUOUS: [(&str, usize); 2] = [("movie plot", 0), ("movie plot", 1)];

fn write_split(path: &Path, examples: &[(String, usize)]) {
    let lines: Vec<_> = examples
        .iter()
        .map(|(doc, label)| serde_json::json!({ "doc": doc, "label": label }).to_string())
        .collect();

    fs::write(path, lines.join("\n")).unwrap();
}

fn separable(n: usize) -> Vec<(String, usize)> {
    (0..n)
        .map(|i| {
            let (words, label) = if i % 2 == 0 {
                (POSITIVE, 1)
            } else {
                (NEGATIVE, 0)
            };
            let doc = format!("the {} {} movie", words[i % 3], words[(i + 1) % 3]);
            (doc, label)
        })
        .collect()
}

fn ambiguous() -> Vec<(String, usize)> {
    AMBIGUOUS
        .iter()
        .map(|&(doc, label)| (doc.to_string(), label))
        .collect()
}

/// A small classification task laid out on disk.
struct Fixture {
    dir: TempDir,
    vocab: Vocab,
}

impl Fixture {
    fn new(test: &[(String, usize)]) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let tokens = ["the", "movie", "plot"]
            .into_iter()
            .chain(POSITIVE)
            .chain(NEGATIVE);
        let vocab = Vocab::new(tokens);

        write_split(&dir.path().join("train.json"), &separable(16));
        write_split(&dir.path().join("test.json"), test);

        Self { dir, vocab }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self, epochs: usize) -> TrainingConfig {
        let model = ModelConfig {
            d_embed: 8,
            d_hidden: 8,
            n_output: 2,
            max_seq: 16,
            init_std: 0.1,
            ..Default::default()
        };

        TrainingConfig {
            model,
            epochs,
            batch_size: NonZeroUsize::new(4).unwrap(),
            learning_rate: 0.01,
            weight_decay: 0.01,
            warmup_steps: 2,
            adam_epsilon: 1e-8,
            seed: 42,
            device: Device::Cpu,
            n_enc_vocab: self.vocab.len(),
            n_dec_vocab: self.vocab.len(),
            train_path: self.path("train.json"),
            test_path: self.path("test.json"),
            save_path: self.path("save_best.ckpt"),
            metrics_path: None,
        }
    }

    fn train(&self, config: &TrainingConfig) -> trainer::Result<RunSummary> {
        train_model(config, &self.vocab, 0, None, Box::new(LogMetrics))
    }
}

fn mixed_test_split() -> Vec<(String, usize)> {
    let mut test = separable(6);
    test.extend(ambiguous());
    test
}

#[test]
fn runs_with_the_same_seed_are_identical() {
    let first = Fixture::new(&mixed_test_split());
    let second = Fixture::new(&mixed_test_split());

    let a = first.train(&first.config(3)).unwrap();
    let b = second.train(&second.config(3)).unwrap();

    assert_eq!(a, b);
    assert_eq!(
        fs::read(first.path("save_best.ckpt")).unwrap(),
        fs::read(second.path("save_best.ckpt")).unwrap()
    );
}

#[test]
fn best_record_tracks_the_highest_score() {
    let fixture = Fixture::new(&mixed_test_split());
    let summary = fixture.train(&fixture.config(4)).unwrap();

    let epochs: Vec<_> = summary.epochs.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![0, 1, 2, 3]);

    let mut best = f32::MIN;
    let mut writes = 0;
    for result in &summary.epochs {
        assert!(result.loss.is_finite());
        assert!((0.0..=1.0).contains(&result.score));
        if result.score > best {
            best = result.score;
            writes += 1;
        }
    }

    assert_eq!(summary.best.score, best);
    assert_eq!(summary.checkpoints, writes);

    let mut params = vec![0.; checkpoint_len(&fixture.config(1))];
    let restored = CheckpointManager::new(fixture.path("save_best.ckpt"))
        .load(&mut params)
        .unwrap();
    assert_eq!(restored, Some(summary.best));
}

#[test]
fn equal_scores_are_saved_once() {
    let fixture = Fixture::new(&ambiguous());
    let summary = fixture.train(&fixture.config(3)).unwrap();

    assert!(summary.epochs.iter().all(|r| r.score == 0.5));
    assert_eq!(summary.checkpoints, 1);
    assert_eq!(summary.best.epoch, 0);
}

fn checkpoint_len(config: &TrainingConfig) -> usize {
    SequenceClassifier::new(config.classifier_spec(0)).size()
}

#[test]
fn resumed_runs_continue_from_the_best_epoch() {
    let fixture = Fixture::new(&mixed_test_split());
    let config = fixture.config(2);

    let record = BestRecord {
        epoch: 5,
        loss: 0.1,
        score: 1.0,
    };
    let params = vec![0.01; checkpoint_len(&config)];
    let manager = CheckpointManager::new(&config.save_path);
    manager.save(&params, &record).unwrap();
    let saved = fs::read(&config.save_path).unwrap();

    let summary = fixture.train(&config).unwrap();

    let epochs: Vec<_> = summary.epochs.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![5, 6]);
    assert_eq!(summary.checkpoints, 0);
    assert_eq!(summary.best, record);
    assert_eq!(fs::read(&config.save_path).unwrap(), saved);
}

#[test]
fn resumed_runs_overwrite_the_checkpoint_on_improvement() {
    let fixture = Fixture::new(&mixed_test_split());
    let config = fixture.config(1);

    let first = fixture.train(&config).unwrap();
    assert_eq!(first.checkpoints, 1);
    assert_eq!(first.best.epoch, 0);

    let manager = CheckpointManager::new(&config.save_path);
    let mut params = vec![0.; checkpoint_len(&config)];
    let stored = manager.load(&mut params).unwrap().unwrap();
    assert_eq!(stored, first.best);

    // the ambiguous pair keeps every accuracy above zero
    let lowered = BestRecord {
        score: 0.,
        ..stored
    };
    manager.save(&params, &lowered).unwrap();

    let resumed = fixture.train(&config).unwrap();

    let epochs: Vec<_> = resumed.epochs.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![0]);
    assert_eq!(resumed.checkpoints, 1);
    assert!(resumed.best.score > lowered.score);

    let mut reloaded = vec![0.; checkpoint_len(&config)];
    let on_disk = manager.load(&mut reloaded).unwrap().unwrap();
    assert_eq!(on_disk, resumed.best);
    assert_eq!(on_disk.epoch, 0);
}

#[test]
fn missing_data_fails_before_training() {
    let fixture = Fixture::new(&mixed_test_split());
    let mut config = fixture.config(2);
    config.train_path = fixture.path("missing.json");

    assert!(matches!(fixture.train(&config), Err(TrainErr::Ml(_))));
    assert!(!config.save_path.exists());
}

#[test]
fn corrupt_checkpoints_are_fatal() {
    let fixture = Fixture::new(&mixed_test_split());
    let config = fixture.config(2);
    fs::write(&config.save_path, b"definitely not a checkpoint").unwrap();

    assert!(matches!(
        fixture.train(&config),
        Err(TrainErr::Checkpoint(_))
    ));
}

#[test]
fn only_the_master_writes_in_a_group() {
    let fixture = Fixture::new(&mixed_test_split());
    let config = fixture.config(2);

    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let rendezvous = Rendezvous {
        addr: "127.0.0.1".to_string(),
        port,
        world_size: 2,
        timeout: Duration::from_secs(10),
    };

    let summaries = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|rank| {
                let (config, vocab, rendezvous) = (&config, &fixture.vocab, &rendezvous);
                s.spawn(move || {
                    train_model(config, vocab, rank, Some(rendezvous), Box::new(LogMetrics))
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect::<Vec<_>>()
    });

    let (master, other) = (&summaries[0], &summaries[1]);
    assert_eq!(master.rank, 0);
    assert_eq!(other.rank, 1);
    assert!(master.checkpoints >= 1);
    assert_eq!(other.checkpoints, 0);

    for summary in &summaries {
        let epochs: Vec<_> = summary.epochs.iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![0, 1]);
    }

    // Every rank evaluates the full test split with the same averaged parameters.
    let scores = |s: &RunSummary| s.epochs.iter().map(|r| r.score).collect::<Vec<_>>();
    assert_eq!(scores(master), scores(other));
    assert!(config.save_path.exists());
}
