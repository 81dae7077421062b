/// The best epoch seen so far, as stored in a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BestRecord {
    pub epoch: usize,
    pub loss: f32,
    pub score: f32,
}

/// The learned parameters of a worker together with its best record.
///
/// `best.score` never decreases once a run has started.
#[derive(Debug, Clone)]
pub struct ModelState {
    pub params: Vec<f32>,
    pub best: BestRecord,
}

impl ModelState {
    pub fn new(params: Vec<f32>) -> Self {
        Self {
            params,
            best: BestRecord::default(),
        }
    }
}
