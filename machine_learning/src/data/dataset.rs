use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use log::debug;
use serde::Deserialize;

use crate::{
    MlErr, Result,
    vocab::{BOS_ID, Vocab},
};

/// A single labelled example, already encoded into token ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub label: usize,
    pub enc_input: Vec<u32>,
    pub dec_input: Vec<u32>,
}

impl Example {
    /// Creates an example whose decoder input is the lone `[BOS]` token.
    pub fn new(label: usize, mut enc_input: Vec<u32>, max_seq: usize) -> Self {
        enc_input.truncate(max_seq);

        Self {
            label,
            enc_input,
            dec_input: vec![BOS_ID],
        }
    }
}

#[derive(Deserialize)]
struct Record {
    doc: String,
    label: usize,
}

/// A dataset fully held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    examples: Vec<Example>,
}

impl InMemoryDataset {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    /// Loads a JSON lines file where every line is an object with a `doc` string and an
    /// integer `label`. Extra fields are ignored and blank lines are skipped.
    ///
    /// # Arguments
    /// * `vocab` - The vocabulary used to encode the documents.
    /// * `path` - The path of the file.
    /// * `max_seq` - The maximum amount of tokens kept per document.
    ///
    /// # Returns
    /// The dataset or an error if the file can't be read or a line is malformed.
    pub fn from_json_lines(vocab: &Vocab, path: &Path, max_seq: usize) -> Result<Self> {
        let io_err = |source| MlErr::Io {
            path: path.to_path_buf(),
            source,
        };

        let reader = BufReader::new(File::open(path).map_err(io_err)?);
        let mut examples = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(&line).map_err(|source| MlErr::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })?;

            examples.push(Example::new(record.label, vocab.encode(&record.doc), max_seq));
        }

        debug!(examples = examples.len(); "loaded dataset from {}", path.display());
        Ok(Self { examples })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Example> {
        self.examples.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn json_lines_are_encoded_and_truncated() {
        let vocab = Vocab::new(["great", "film", "bad"]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id": 7, "doc": "great film great film", "label": 1}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"doc": "bad unseen", "label": 0}}"#).unwrap();

        let dataset = InMemoryDataset::from_json_lines(&vocab, file.path(), 3).unwrap();

        assert_eq!(dataset.len(), 2);
        let first = dataset.get(0).unwrap();
        assert_eq!(first.label, 1);
        assert_eq!(first.enc_input, vec![3, 4, 3]);
        assert_eq!(first.dec_input, vec![BOS_ID]);
        assert_eq!(dataset.get(1).unwrap().enc_input, vec![5, 1]);
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let vocab = Vocab::new(["a"]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"doc": "a", "label": 0}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        let err = InMemoryDataset::from_json_lines(&vocab, file.path(), 8).unwrap_err();
        assert!(matches!(err, MlErr::Parse { line: 2, .. }));
    }
}
