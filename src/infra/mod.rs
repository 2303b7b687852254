// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of a run:
//
//   tokenizer_store.rs — word-level tokenizer fit/save/load
//                        (HuggingFace tokenizer.json)
//
//   checkpoint.rs      — model weights via Burn's CompactRecorder,
//                        periodic checkpoints, JSON configs
//
//   metrics.rs         — per-epoch CSV log and the History that
//                        becomes metrics.json
//
//   export.rs          — timestamped run directory, exported
//                        artifacts, zip archive, ModelBundle
//
//   tracking.rs        — ExperimentTracker implementations
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling with anyhow)

/// Tokenizer training, saving, and loading
pub mod tokenizer_store;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger and history
pub mod metrics;

/// Run directory layout, export and reload
pub mod export;

/// Experiment tracking sinks
pub mod tracking;
