use std::{collections::HashMap, fs, path::Path};

use crate::{MlErr, Result};

pub const PAD: &str = "[PAD]";
pub const UNK: &str = "[UNK]";
pub const BOS: &str = "[BOS]";

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;

/// A token to id mapping.
///
/// The reserved tokens always take the first ids, in the order `[PAD]`, `[UNK]`, `[BOS]`.
#[derive(Debug, Clone)]
pub struct Vocab {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocab {
    /// Creates a new `Vocab` from a sequence of tokens.
    ///
    /// Duplicated tokens, including the reserved ones, keep their first id.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self {
            tokens: Vec::new(),
            ids: HashMap::new(),
        };

        for token in [PAD, UNK, BOS] {
            vocab.push(token.to_string());
        }

        for token in tokens {
            vocab.push(token.into());
        }

        vocab
    }

    /// Loads a vocabulary file.
    ///
    /// The file holds one token per line. Anything after a tab is ignored so that
    /// `token\tscore` files can be read as they are.
    ///
    /// # Arguments
    /// * `path` - The path of the vocabulary file.
    ///
    /// # Returns
    /// The loaded vocabulary or an error if the file can't be read or has no tokens.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| MlErr::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let tokens: Vec<_> = content
            .lines()
            .filter_map(|line| line.split('\t').next())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();

        if tokens.is_empty() {
            return Err(MlErr::EmptyVocab(path.to_path_buf()));
        }

        Ok(Self::new(tokens))
    }

    fn push(&mut self, token: String) {
        if self.ids.contains_key(&token) {
            return;
        }

        let id = self.tokens.len() as u32;
        self.ids.insert(token.clone(), id);
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns the id of `token`, or the id of `[UNK]` if it isn't known.
    pub fn id(&self, token: &str) -> u32 {
        self.ids.get(token).copied().unwrap_or(UNK_ID)
    }

    /// Splits `text` on whitespace and maps every piece to its id.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace().map(|piece| self.id(piece)).collect()
    }
}
