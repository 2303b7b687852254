// ============================================================
// Layer 5 — Losses and Output Activations
// ============================================================
// Loss per label type:
//
//   binary-label   binary cross-entropy on the single logit
//   single-label   cross-entropy over the softmax classes
//   multi-label    macro soft-F1 cost on sigmoid outputs
//
// Macro soft-F1 replaces hard 0/1 predictions with the sigmoid
// probabilities so the F1 score becomes differentiable:
//
//   tp = Σ ŷ·y     fp = Σ ŷ·(1 − y)     fn = Σ (1 − ŷ)·y
//   soft_f1 = 2·tp / (2·tp + fn + fp + ε)      per label
//   cost    = mean over labels of (1 − soft_f1)
//
// Sums run over the batch dimension; ε = 1e-16 keeps labels
// absent from a batch from dividing by zero.

use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::activation::{log_sigmoid, sigmoid, softmax},
};

use crate::domain::labels::LabelType;

const SOFT_F1_EPSILON: f64 = 1e-16;

/// Macro soft-F1 cost. `y` and `y_hat` are `[batch, labels]`, y_hat in [0, 1].
pub fn macro_soft_f1<B: Backend>(y: Tensor<B, 2>, y_hat: Tensor<B, 2>) -> Tensor<B, 1> {
    let not_y     = y.clone().neg().add_scalar(1.0);
    let not_y_hat = y_hat.clone().neg().add_scalar(1.0);

    let tp  = (y_hat.clone() * y.clone()).sum_dim(0);
    let fp  = (y_hat * not_y).sum_dim(0);
    let fn_ = (not_y_hat * y).sum_dim(0);

    let soft_f1 = tp.clone().mul_scalar(2.0)
        / (tp.mul_scalar(2.0) + fn_ + fp).add_scalar(SOFT_F1_EPSILON);

    soft_f1.neg().add_scalar(1.0).mean()
}

/// Binary cross-entropy computed from logits, averaged over every element.
pub fn binary_cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_p     = log_sigmoid(logits.clone());
    let log_not_p = log_sigmoid(logits.neg());
    let not_t     = targets.clone().neg().add_scalar(1.0);

    (targets * log_p + not_t * log_not_p).mean().neg()
}

/// Sparse categorical cross-entropy over `[batch, classes]` logits.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, classes: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, classes)
}

pub fn classification_loss<B: Backend>(
    label_type: LabelType,
    logits:     Tensor<B, 2>,
    targets:    Tensor<B, 2>,
    classes:    Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    match label_type {
        LabelType::BinaryLabel => binary_cross_entropy(logits, targets),
        LabelType::SingleLabel => cross_entropy(logits, classes),
        LabelType::MultiLabel  => macro_soft_f1(targets, sigmoid(logits)),
    }
}

/// Output activation matching the loss: sigmoid, or softmax for single-label.
pub fn probabilities<B: Backend>(label_type: LabelType, logits: Tensor<B, 2>) -> Tensor<B, 2> {
    match label_type {
        LabelType::SingleLabel => softmax(logits, 1),
        LabelType::BinaryLabel | LabelType::MultiLabel => sigmoid(logits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn matrix(values: [[f32; 2]; 2]) -> Tensor<TestBackend, 2> {
        Tensor::from_floats(values, &Default::default())
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_soft_f1_perfect_prediction_costs_nothing() {
        let y = matrix([[1.0, 0.0], [0.0, 1.0]]);
        assert!(scalar(macro_soft_f1(y.clone(), y)).abs() < 1e-6);
    }

    #[test]
    fn test_soft_f1_inverted_prediction_costs_one() {
        let y     = matrix([[1.0, 0.0], [0.0, 1.0]]);
        let y_hat = matrix([[0.0, 1.0], [1.0, 0.0]]);
        assert!((scalar(macro_soft_f1(y, y_hat)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_soft_f1_uncertain_prediction() {
        // per label: tp = 0.5, fp = 0.5, fn = 0.5 → soft_f1 = 1 / 2
        let y     = matrix([[1.0, 0.0], [0.0, 1.0]]);
        let y_hat = matrix([[0.5, 0.5], [0.5, 0.5]]);
        assert!((scalar(macro_soft_f1(y, y_hat)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bce_at_zero_logit_is_ln2() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 2>::zeros([2, 1], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats([[1.0], [0.0]], &device);
        let loss    = scalar(binary_cross_entropy(logits, targets));
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_probabilities_softmax_rows_sum_to_one() {
        let probs = probabilities(LabelType::SingleLabel, matrix([[2.0, 0.0], [0.0, 0.0]]));
        let sums  = probs.sum_dim(1).into_data().to_vec::<f32>().unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_multi_label_loss_uses_soft_f1() {
        let targets = matrix([[1.0, 0.0], [0.0, 1.0]]);
        let logits  = matrix([[20.0, -20.0], [-20.0, 20.0]]);
        let classes = Tensor::<TestBackend, 1, Int>::from_ints([0, 1], &Default::default());
        let loss    = classification_loss(LabelType::MultiLabel, logits, targets, classes);
        assert!(scalar(loss) < 1e-4);
    }
}
