//! Persistence of the best parameters seen so far.
//!
//! A checkpoint is a safetensors file with a single `F32` tensor named `params` and a
//! `checkpoint` metadata entry holding the JSON encoded `CheckpointMeta`.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use log::info;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};
use serde::{Deserialize, Serialize};

use crate::{
    epoch::EpochResult,
    error::CheckpointErr,
    state::{BestRecord, ModelState},
};

pub const FORMAT: &str = "classifier-ckpt/1";
const PARAMS_TENSOR: &str = "params";
const META_KEY: &str = "checkpoint";

type Result<T> = std::result::Result<T, CheckpointErr>;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointMeta {
    format: String,
    epoch: usize,
    loss: f32,
    score: f32,
}

/// Reads and writes the checkpoint of a run and decides when it has to be replaced.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an epoch scoring `score` supersedes `best`. Ties never do.
    pub fn is_improvement(best: &BestRecord, score: f32) -> bool {
        score > best.score
    }

    /// Saves `state.params` if `result` improves on `state.best`. The best record only
    /// advances once the checkpoint is on disk.
    ///
    /// # Returns
    /// Whether a checkpoint was written.
    pub fn maybe_save(&self, state: &mut ModelState, result: &EpochResult) -> Result<bool> {
        if !Self::is_improvement(&state.best, result.score) {
            return Ok(false);
        }

        let best = BestRecord {
            epoch: result.epoch,
            loss: result.loss,
            score: result.score,
        };
        self.save(&state.params, &best)?;

        state.best = best;
        Ok(true)
    }

    /// Writes `params` and `record`, replacing any previous checkpoint.
    ///
    /// The file is written next to its final location and then renamed over it, so a
    /// crash never leaves a half written checkpoint behind.
    pub fn save(&self, params: &[f32], record: &BestRecord) -> Result<()> {
        let bytes: Vec<u8> = params.iter().flat_map(|x| x.to_le_bytes()).collect();
        let view = TensorView::new(Dtype::F32, vec![params.len()], &bytes)
            .map_err(|e| self.corrupt(format!("{e:?}")))?;

        let meta = CheckpointMeta {
            format: FORMAT.to_string(),
            epoch: record.epoch,
            loss: record.loss,
            score: record.score,
        };
        let meta = serde_json::to_string(&meta).map_err(|e| self.corrupt(e.to_string()))?;
        let metadata = Some(HashMap::from([(META_KEY.to_string(), meta)]));

        let data = safetensors::tensor::serialize([(PARAMS_TENSOR, &view)], &metadata)
            .map_err(|e| self.corrupt(format!("{e:?}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, data).map_err(|e| self.io(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.io(e)
        })
    }

    /// Restores a checkpoint into `params`.
    ///
    /// # Returns
    /// The restored best record, `None` if there's no checkpoint, or an error if the
    /// file can't be read or doesn't belong to a model of `params.len()` parameters.
    pub fn load(&self, params: &mut [f32]) -> Result<Option<BestRecord>> {
        let buf = match fs::read(&self.path) {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io(e)),
        };

        let (_, metadata) =
            SafeTensors::read_metadata(&buf).map_err(|e| self.corrupt(format!("{e:?}")))?;
        let meta = metadata
            .metadata()
            .as_ref()
            .and_then(|m| m.get(META_KEY))
            .ok_or_else(|| self.corrupt(format!("missing `{META_KEY}` metadata")))?;
        let meta: CheckpointMeta =
            serde_json::from_str(meta).map_err(|e| self.corrupt(e.to_string()))?;

        if meta.format != FORMAT {
            return Err(self.corrupt(format!("unknown format {:?}", meta.format)));
        }

        let tensors =
            SafeTensors::deserialize(&buf).map_err(|e| self.corrupt(format!("{e:?}")))?;
        let tensor = tensors
            .tensor(PARAMS_TENSOR)
            .map_err(|e| self.corrupt(format!("{e:?}")))?;

        if tensor.dtype() != Dtype::F32 {
            return Err(self.corrupt(format!(
                "expected F32 parameters, found {:?}",
                tensor.dtype()
            )));
        }

        let found = tensor.shape().iter().product::<usize>();
        if found != params.len() {
            return Err(self.corrupt(format!(
                "expected {} parameters, found {found}",
                params.len()
            )));
        }

        for (p, chunk) in params.iter_mut().zip(tensor.data().chunks_exact(4)) {
            *p = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        info!(
            epoch = meta.epoch, loss = meta.loss, score = meta.score;
            "restored checkpoint from {}", self.path.display()
        );

        Ok(Some(BestRecord {
            epoch: meta.epoch,
            loss: meta.loss,
            score: meta.score,
        }))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io(&self, source: io::Error) -> CheckpointErr {
        CheckpointErr::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: String) -> CheckpointErr {
        CheckpointErr::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}
