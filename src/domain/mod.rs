// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that describe what the
// pipeline works with: text records, label kinds, the label
// encoder and the seams to external collaborators (embedding
// provider, record sources, experiment tracker).
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O
//   - Only plain data and behaviour over it
//
// Everything here is unit-testable without a backend.

// A single text row with its labels
pub mod record;

// Label kinds, task kinds, architectures and the label encoder
pub mod labels;

// Core abstractions other layers implement
pub mod traits;
