// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between raw rows on disk and tensor batches.
//
// Classification:
//
//   JsonlLoader ─► TextNormalizer::clean_basic ─► LabelEncoder
//        │                                            │
//        ▼                                            ▼
//   HashingEmbedder (TextEmbedder) ──► ClassificationSample
//
// Generation:
//
//   JsonlLoader ─► TextNormalizer::clean_for_generation
//        │
//        ▼
//   word tokenizer (infra) ─► windowing ─► SequenceSample
//
// Both then go through:
//
//   splitter ─► TextDataset (burn Dataset) ─► batcher (burn Batcher)
//            ─► DataLoader ─► training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads JSON-lines / plain-text files into TextRecords
pub mod loader;

/// Text cleaning for classification and generation
pub mod normalizer;

/// Local sentence embedder behind the TextEmbedder trait
pub mod embedder;

/// Prefix windows, padding and next-word targets
pub mod windowing;

/// Seeded train/test/validation splits
pub mod splitter;

/// burn Dataset implementations and sample types
pub mod dataset;

/// burn Batcher implementations
pub mod batcher;
