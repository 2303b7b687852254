// ============================================================
// Layer 5 — ML / Model Layer (burn)
// ============================================================
// All burn modules and training loops live here.
//
//   backbone.rs   — shared trunk: NN / GRU / CNN_NN / CNN_GRU_NN
//                   followed by Dense(128) + ReLU + Dropout
//   model.rs      — ClassifierModel (sentence vector in)
//                   GeneratorModel (token ids in)
//   loss.rs       — macro soft-F1 cost, BCE, cross-entropy,
//                   output probabilities
//   metrics.rs    — host-side macro F1, Hamming score, accuracy
//   trainer.rs    — epoch loops with validation, checkpoints
//   inferencer.rs — reload a run and predict
//
// Backend selection:
//   default        NdArray (CPU)
//   --features wgpu  Wgpu (GPU)
// Training always wraps the backend in Autodiff; validation and
// inference run on the inner backend via `model.valid()`.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

use burn::tensor::backend::Backend;

pub mod backbone;
pub mod model;
pub mod loss;
pub mod metrics;
pub mod trainer;
pub mod inferencer;

#[cfg(not(feature = "wgpu"))]
pub type InnerBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InnerBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InnerBackend>;

pub type Device = <InnerBackend as Backend>::Device;

pub fn default_device() -> Device {
    Default::default()
}
