// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Fits, saves and loads the word-level tokenizer used by the
// next-word model.
//
// The vocabulary is counted here and written straight into a
// HuggingFace tokenizer JSON, then loaded back through the
// tokenizers crate. The same file ships inside the exported
// run so prediction encodes text exactly like training did.
//
// Id layout:
//   0            [PAD]
//   1            [UNK]  (every word outside the vocabulary)
//   2 ..         words, most frequent first; ties keep the
//                order in which words first appeared
//   < num_words  hard cap on the total number of ids
//
// Text is lower-cased and split on whitespace only; the
// normalizer has already separated punctuation.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load a previously saved tokenizer
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
    }

    /// Count words over `texts`, write tokenizer.json and load it back.
    pub fn fit_and_save(&self, texts: &[String], num_words: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let words = build_vocab(texts, num_words);

        let mut vocab = serde_json::json!({
            PAD_TOKEN: 0,
            UNK_TOKEN: 1,
        });
        for (idx, word) in words.iter().enumerate() {
            vocab[word.as_str()] = serde_json::json!(idx + 2);
        }

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0, "content": PAD_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 1, "content": UNK_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": { "type": "Lowercase" },
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!(
            "Tokenizer fitted: {} words (+2 special), saved to '{}'",
            words.len(),
            path.display()
        );

        self.load()
    }
}

/// Words ordered by id, starting at id 2. At most `num_words - 2` entries.
pub fn build_vocab(texts: &[String], num_words: usize) -> Vec<String> {
    // word → (count, first appearance)
    let mut freq: HashMap<String, (usize, usize)> = HashMap::new();
    let mut seen = 0usize;

    for text in texts {
        for word in text.split_whitespace() {
            if is_special(word) {
                continue;
            }
            let w = word.to_lowercase();
            let entry = freq.entry(w).or_insert((0, seen));
            entry.0 += 1;
            seen += 1;
        }
    }

    let mut words: Vec<(String, (usize, usize))> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    words.truncate(num_words.saturating_sub(2));
    words.into_iter().map(|(w, _)| w).collect()
}

fn is_special(word: &str) -> bool {
    word.eq_ignore_ascii_case(PAD_TOKEN) || word.eq_ignore_ascii_case(UNK_TOKEN)
}

/// Encode one text into ids, without special-token post-processing.
pub fn encode(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
    Ok(enc.get_ids().to_vec())
}

/// Every word of the vocabulary indexed by id, for the exported label encoder.
pub fn id_to_words(tokenizer: &Tokenizer, limit: usize) -> Vec<String> {
    (0..limit as u32)
        .map(|id| tokenizer.id_to_token(id).unwrap_or_else(|| UNK_TOKEN.to_string()))
        .collect()
}
