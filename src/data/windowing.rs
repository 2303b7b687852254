// ============================================================
// Layer 4 — Sequence Windowing
// ============================================================
// Turns tokenised sentences into next-word training samples.
//
// For a sentence encoded as
//   [cls] the cat sat [end]
// every position after [cls] and before [end] whose word is
// predictable yields one prefix:
//   [cls] the
//   [cls] the cat
//   [cls] the cat sat
// Each prefix is left-padded to input_shape + 1 tokens; the
// last token becomes the target, the rest the context.
//
// Predictable words are ids in 2..number_labels, where
//   number_labels = min(num_words, max_labels)
// Id 0 is padding and id 1 the out-of-vocabulary bucket; the
// model never learns to predict either of them.

use crate::data::dataset::SequenceSample;

pub const PAD_ID: u32 = 0;
pub const OOV_ID: u32 = 1;

/// Size of the output layer of the next-word model.
pub fn number_labels(num_words: usize, max_labels: usize) -> usize {
    num_words.min(max_labels)
}

pub fn is_predictable(id: u32, number_labels: usize) -> bool {
    id > OOV_ID && (id as usize) < number_labels
}

/// Every prefix ending on a predictable word, excluding the first and last token.
pub fn texts_to_sequences(encoded: &[u32], number_labels: usize) -> Vec<Vec<u32>> {
    (1..encoded.len().saturating_sub(1))
        .filter(|&idx| is_predictable(encoded[idx], number_labels))
        .map(|idx| encoded[..=idx].to_vec())
        .collect()
}

/// Left-pad with PAD_ID to `maxlen`; longer sequences keep their last `maxlen` tokens.
pub fn pad_pre(seq: &[u32], maxlen: usize) -> Vec<u32> {
    if seq.len() >= maxlen {
        return seq[seq.len() - maxlen..].to_vec();
    }
    let mut padded = vec![PAD_ID; maxlen - seq.len()];
    padded.extend_from_slice(seq);
    padded
}

/// Split a padded window into (context, target).
pub fn split_xy(mut padded: Vec<u32>) -> Option<(Vec<u32>, u32)> {
    let target = padded.pop()?;
    Some((padded, target))
}

/// Window every encoded sentence into fixed-size samples.
pub fn build_samples(
    encoded_texts: &[Vec<u32>],
    input_shape:   usize,
    number_labels: usize,
) -> Vec<SequenceSample> {
    encoded_texts
        .iter()
        .flat_map(|encoded| texts_to_sequences(encoded, number_labels))
        .filter_map(|seq| split_xy(pad_pre(&seq, input_shape + 1)))
        .map(|(input_ids, target)| SequenceSample { input_ids, target })
        .collect()
}
