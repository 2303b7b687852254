// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal per use case: train a classifier, train a next-word
// generator, or predict with an exported run.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file formats (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Text classification training
pub mod classify_use_case;

// Next-word generation training
pub mod generate_use_case;

// Prediction with an exported run
pub mod predict_use_case;
