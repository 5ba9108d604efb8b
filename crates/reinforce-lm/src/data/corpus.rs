//! Word-level corpus.

use super::{batchify, BatchedSplit, DataSplits};
use crate::{ReinforceError, Result};
use std::collections::HashMap;
use std::path::Path;
use tch::Device;

/// Token appended at the end of every line
pub const EOS_TOKEN: &str = "<eos>";

/// Bidirectional word <-> id mapping
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    word2idx: HashMap<String, i64>,
    idx2word: Vec<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `word`, inserting it if unseen
    pub fn add_word(&mut self, word: &str) -> i64 {
        if let Some(&id) = self.word2idx.get(word) {
            return id;
        }
        let id = self.idx2word.len() as i64;
        self.idx2word.push(word.to_string());
        self.word2idx.insert(word.to_string(), id);
        id
    }

    pub fn id(&self, word: &str) -> Option<i64> {
        self.word2idx.get(word).copied()
    }

    pub fn word(&self, id: i64) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.idx2word.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.idx2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2word.is_empty()
    }
}

/// Tokenized train/valid/test streams sharing one dictionary
#[derive(Clone, Debug)]
pub struct Corpus {
    pub dictionary: Dictionary,
    pub train: Vec<i64>,
    pub valid: Vec<i64>,
    pub test: Vec<i64>,
}

impl Corpus {
    /// Read `train.txt`, `valid.txt` and `test.txt` from `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let read = |name: &str| -> Result<String> {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| {
                ReinforceError::Data(format!("failed to read {}: {}", path.display(), e))
            })
        };

        let corpus = Self::from_texts(&read("train.txt")?, &read("valid.txt")?, &read("test.txt")?);
        tracing::info!(
            dir = %dir.display(),
            vocab = corpus.vocab_size(),
            train = corpus.train.len(),
            valid = corpus.valid.len(),
            test = corpus.test.len(),
            "Loaded corpus"
        );
        Ok(corpus)
    }

    /// Tokenize in-memory texts
    pub fn from_texts(train: &str, valid: &str, test: &str) -> Self {
        let mut dictionary = Dictionary::new();
        let train = tokenize(&mut dictionary, train);
        let valid = tokenize(&mut dictionary, valid);
        let test = tokenize(&mut dictionary, test);
        Self {
            dictionary,
            train,
            valid,
            test,
        }
    }

    pub fn vocab_size(&self) -> i64 {
        self.dictionary.len() as i64
    }

    /// Batchify every split and cut it into BPTT windows
    pub fn splits(&self, batch_size: i64, bptt: i64, device: Device) -> Result<DataSplits> {
        Ok(DataSplits {
            train: BatchedSplit::new(batchify(&self.train, batch_size, device)?, bptt)?,
            valid: BatchedSplit::new(batchify(&self.valid, batch_size, device)?, bptt)?,
            test: BatchedSplit::new(batchify(&self.test, batch_size, device)?, bptt)?,
        })
    }
}

fn tokenize(dictionary: &mut Dictionary, text: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for line in text.lines() {
        for word in line.split_whitespace() {
            ids.push(dictionary.add_word(word));
        }
        ids.push(dictionary.add_word(EOS_TOKEN));
    }
    ids
}
