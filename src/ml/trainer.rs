// ============================================================
// Layer 5 — Training Loops
// ============================================================
// Train + validation loops using Burn's DataLoader.
//
// One loop per model family, same shape:
//
//   for epoch in 1..=epochs
//     train phase   forward → loss → backward → optimizer step
//     valid phase   model.valid() on the inner backend, no dropout
//     report        CSV row + tracker metrics + History entry
//     checkpoint    every `checkpoint_period` epochs and the last
//
// Optimizers:
//   binary-label  RMSProp + binary cross-entropy
//   multi-label   Adam    + macro soft-F1 cost
//   single-label  Adam    + cross-entropy
//   next-word     Adam    + cross-entropy
//
// Epoch metrics are computed over every row of the epoch, not
// averaged per batch; only the loss is a per-batch mean.
//
// Burn notes:
//   - Training uses TrainBackend (Autodiff<Inner>) for gradients
//   - model.valid() returns the model on InnerBackend
//   - Validation batchers must also use InnerBackend

use std::time::Instant;

use anyhow::{bail, Result};
use burn::{
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig},
    prelude::*,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{ClassificationBatcher, SequenceBatcher},
    dataset::{ClassificationSample, SequenceSample, TextDataset},
};
use crate::domain::{labels::LabelType, traits::ExperimentTracker};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, History, MetricsLogger},
};
use crate::ml::{
    loss::{classification_loss, cross_entropy, probabilities},
    metrics::{ClassAccumulator, RowAccumulator, Scores},
    model::{ClassifierConfig, ClassifierModel, GeneratorConfig, GeneratorModel},
    Device, InnerBackend, TrainBackend,
};

pub const DEFAULT_CHECKPOINT_PERIOD: usize = 5;

/// Loop hyperparameters shared by both model families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs:            usize,
    pub batch_size:        usize,
    pub lr:                f64,
    pub checkpoint_period: usize,
    pub seed:              u64,
    pub num_workers:       usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs:            10,
            batch_size:        32,
            lr:                1e-3,
            checkpoint_period: DEFAULT_CHECKPOINT_PERIOD,
            seed:              42,
            num_workers:       1,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            bail!("epochs must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            bail!("learning rate must be positive, got {}", self.lr);
        }
        Ok(())
    }

    fn should_checkpoint(&self, epoch: usize) -> bool {
        let period = self.checkpoint_period.max(1);
        epoch % period == 0 || epoch == self.epochs
    }
}

/// Where a training loop reports to.
pub struct TrainingContext<'a> {
    pub checkpoints: &'a CheckpointManager,
    pub logger:      &'a MetricsLogger,
    pub tracker:     &'a mut dyn ExperimentTracker,
}

impl TrainingContext<'_> {
    fn announce(&self) {
        tracing::info!("Epoch metrics go to '{}'", self.logger.csv_path().display());
    }

    fn report(&mut self, m: &EpochMetrics) -> Result<()> {
        self.logger.log(m)?;
        for (name, value) in m.named() {
            self.tracker.log_metric(name, value, Some(m.epoch))?;
        }
        Ok(())
    }
}

/// A trained model on the inference backend plus its per-epoch history.
pub struct Trained<M> {
    pub model:   M,
    pub history: History,
}

fn progress_bar(batches: usize, epoch: usize, epochs: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(batches as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {prefix} {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}")?,
    );
    pb.set_prefix(format!("epoch {epoch}/{epochs}"));
    Ok(pb)
}

fn batch_count(samples: usize, batch_size: usize) -> usize {
    samples.div_ceil(batch_size.max(1))
}

/// `history` holds the epochs before `m`.
fn log_epoch(m: &EpochMetrics, history: &History, epochs: usize, started: Instant) {
    let marker = if m.is_improvement(history.best_val_loss()) { " *" } else { "" };
    tracing::info!(
        "Epoch {:>3}/{} | loss={:.4} | val_loss={:.4}{} | macro_f1={:.4} | val_macro_f1={:.4} | val_acc={:.1}% | {:.1?}",
        m.epoch,
        epochs,
        m.loss,
        m.val_loss,
        marker,
        m.macro_f1,
        m.val_macro_f1,
        m.val_accuracy * 100.0,
        started.elapsed(),
    );
}

// ─── Classifier ───────────────────────────────────────────────────────────────
pub fn train_classifier(
    config:        &ClassifierConfig,
    label_type:    LabelType,
    number_labels: usize,
    train:         TextDataset<ClassificationSample>,
    val:           TextDataset<ClassificationSample>,
    opts:          &FitOptions,
    ctx:           &mut TrainingContext<'_>,
    device:        &Device,
) -> Result<Trained<ClassifierModel<InnerBackend>>> {
    opts.validate()?;
    label_type.validate(number_labels)?;

    match label_type {
        LabelType::BinaryLabel => {
            tracing::info!("Optimizer: RMSProp (lr={})", opts.lr);
            let optim = RmsPropConfig::new().init();
            fit_classifier(config, label_type, number_labels, train, val, opts, ctx, device, optim)
        }
        LabelType::SingleLabel | LabelType::MultiLabel => {
            tracing::info!("Optimizer: Adam (lr={})", opts.lr);
            let optim = AdamConfig::new().with_epsilon(1e-8).init();
            fit_classifier(config, label_type, number_labels, train, val, opts, ctx, device, optim)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn fit_classifier<O>(
    config:        &ClassifierConfig,
    label_type:    LabelType,
    number_labels: usize,
    train:         TextDataset<ClassificationSample>,
    val:           TextDataset<ClassificationSample>,
    opts:          &FitOptions,
    ctx:           &mut TrainingContext<'_>,
    device:        &Device,
    mut optim:     O,
) -> Result<Trained<ClassifierModel<InnerBackend>>>
where
    O: Optimizer<ClassifierModel<TrainBackend>, TrainBackend>,
{
    let mut model: ClassifierModel<TrainBackend> = config.init(device);
    let batches = batch_count(train.sample_count(), opts.batch_size);

    let train_loader = DataLoaderBuilder::new(
        ClassificationBatcher::<TrainBackend>::new(device.clone(), label_type, number_labels),
    )
    .batch_size(opts.batch_size)
    .shuffle(opts.seed)
    .num_workers(opts.num_workers)
    .build(train);

    let mut history = History::default();
    ctx.announce();

    for epoch in 1..=opts.epochs {
        let started = Instant::now();
        let pb      = progress_bar(batches, epoch, opts.epochs)?;

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_acc = RowAccumulator::default();
        for batch in train_loader.iter() {
            let logits = model.forward(batch.features);
            let loss   = classification_loss(
                label_type,
                logits.clone(),
                batch.targets.clone(),
                batch.classes,
            );

            let loss_val = loss.clone().into_scalar().elem::<f64>();
            train_acc.add(loss_val, batch.targets, probabilities(label_type, logits.detach()))?;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(opts.lr, model, grads);

            pb.set_message(format!("loss: {loss_val:.4}"));
            pb.inc(1);
        }
        pb.finish_and_clear();

        // ── Validation phase ──────────────────────────────────────────────────
        let val_scores = evaluate_classifier(
            &model.valid(),
            label_type,
            number_labels,
            &val,
            opts.batch_size,
            device,
        )?;

        let metrics = EpochMetrics::from_scores(epoch, &train_acc.finish(label_type), &val_scores);
        log_epoch(&metrics, &history, opts.epochs, started);
        ctx.report(&metrics)?;
        history.push(metrics);

        if opts.should_checkpoint(epoch) {
            ctx.checkpoints.save_model(&model, epoch)?;
            tracing::info!("Checkpoint saved for epoch {}", epoch);
        }
    }

    tracing::info!("Training complete! Best val_loss={:.4}", history.best_val_loss());
    Ok(Trained { model: model.valid(), history })
}

/// Loss and metrics of `model` over a whole dataset.
pub fn evaluate_classifier<B: Backend>(
    model:         &ClassifierModel<B>,
    label_type:    LabelType,
    number_labels: usize,
    dataset:       &TextDataset<ClassificationSample>,
    batch_size:    usize,
    device:        &B::Device,
) -> Result<Scores> {
    let batcher = ClassificationBatcher::<B>::new(device.clone(), label_type, number_labels);
    let mut acc = RowAccumulator::default();

    for chunk in dataset.samples().chunks(batch_size.max(1)) {
        let batch  = batcher.batch(chunk.to_vec());
        let logits = model.forward(batch.features);
        let loss   = classification_loss(
            label_type,
            logits.clone(),
            batch.targets.clone(),
            batch.classes,
        );
        acc.add(
            loss.into_scalar().elem::<f64>(),
            batch.targets,
            probabilities(label_type, logits),
        )?;
    }

    Ok(acc.finish(label_type))
}

// ─── Next-word generator ──────────────────────────────────────────────────────
pub fn train_generator(
    config: &GeneratorConfig,
    train:  TextDataset<SequenceSample>,
    val:    TextDataset<SequenceSample>,
    opts:   &FitOptions,
    ctx:    &mut TrainingContext<'_>,
    device: &Device,
) -> Result<Trained<GeneratorModel<InnerBackend>>> {
    opts.validate()?;
    if config.number_labels < 3 {
        bail!("Need at least one predictable word, got {} labels", config.number_labels);
    }

    let mut model: GeneratorModel<TrainBackend> = config.init(device);
    let mut optim   = AdamConfig::new().with_epsilon(1e-8).init();
    let batches     = batch_count(train.sample_count(), opts.batch_size);
    tracing::info!("Optimizer: Adam (lr={})", opts.lr);

    let train_loader = DataLoaderBuilder::new(SequenceBatcher::<TrainBackend>::new(device.clone()))
        .batch_size(opts.batch_size)
        .shuffle(opts.seed)
        .num_workers(opts.num_workers)
        .build(train);

    let mut history = History::default();
    ctx.announce();

    for epoch in 1..=opts.epochs {
        let started = Instant::now();
        let pb      = progress_bar(batches, epoch, opts.epochs)?;

        let mut train_acc = ClassAccumulator::default();
        for batch in train_loader.iter() {
            let logits = model.forward(batch.input_ids);
            let loss   = cross_entropy(logits.clone(), batch.targets.clone());

            let loss_val = loss.clone().into_scalar().elem::<f64>();
            train_acc.add(loss_val, batch.targets, logits.detach())?;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(opts.lr, model, grads);

            pb.set_message(format!("loss: {loss_val:.4}"));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let val_scores = evaluate_generator(&model.valid(), &val, opts.batch_size, device)?;

        let metrics = EpochMetrics::from_scores(epoch, &train_acc.finish(), &val_scores);
        log_epoch(&metrics, &history, opts.epochs, started);
        ctx.report(&metrics)?;
        history.push(metrics);

        if opts.should_checkpoint(epoch) {
            ctx.checkpoints.save_model(&model, epoch)?;
            tracing::info!("Checkpoint saved for epoch {}", epoch);
        }
    }

    tracing::info!("Training complete! Best val_loss={:.4}", history.best_val_loss());
    Ok(Trained { model: model.valid(), history })
}

pub fn evaluate_generator<B: Backend>(
    model:      &GeneratorModel<B>,
    dataset:    &TextDataset<SequenceSample>,
    batch_size: usize,
    device:     &B::Device,
) -> Result<Scores> {
    let batcher = SequenceBatcher::<B>::new(device.clone());
    let mut acc = ClassAccumulator::default();

    for chunk in dataset.samples().chunks(batch_size.max(1)) {
        let batch  = batcher.batch(chunk.to_vec());
        let logits = model.forward(batch.input_ids);
        let loss   = cross_entropy(logits.clone(), batch.targets.clone());
        acc.add(loss.into_scalar().elem::<f64>(), batch.targets, logits)?;
    }

    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels::Architecture;
    use crate::infra::tracking::NoopTracker;

    fn classification_rows() -> Vec<ClassificationSample> {
        (0..12)
            .map(|i| {
                let positive = i % 2 == 0;
                let features = if positive { vec![1.0, 0.0, 0.5, 0.0] } else { vec![0.0, 1.0, 0.0, 0.5] };
                ClassificationSample { features, label_ids: vec![usize::from(positive)] }
            })
            .collect()
    }

    #[test]
    fn test_should_checkpoint_period_and_last_epoch() {
        let opts = FitOptions { epochs: 7, checkpoint_period: 5, ..FitOptions::default() };
        let saved: Vec<usize> = (1..=7).filter(|e| opts.should_checkpoint(*e)).collect();
        assert_eq!(saved, vec![5, 7]);
    }

    #[test]
    fn test_validate_rejects_zero_epochs() {
        let opts = FitOptions { epochs: 0, ..FitOptions::default() };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_train_binary_classifier_end_to_end() {
        let dir         = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(dir.path().join("checkpoint")).unwrap();
        let logger      = MetricsLogger::new(dir.path().join("logs")).unwrap();
        let mut tracker = NoopTracker;
        let mut ctx     = TrainingContext { checkpoints: &checkpoints, logger: &logger, tracker: &mut tracker };

        let opts   = FitOptions { epochs: 2, batch_size: 4, checkpoint_period: 1, ..FitOptions::default() };
        let config = ClassifierConfig::new(Architecture::Nn, 4, 1);
        let device = crate::ml::default_device();

        let trained = train_classifier(
            &config,
            LabelType::BinaryLabel,
            2,
            TextDataset::new(classification_rows()),
            TextDataset::new(classification_rows()),
            &opts,
            &mut ctx,
            &device,
        )
        .unwrap();

        assert_eq!(trained.history.epochs.len(), 2);
        assert!(trained.history.epochs.iter().all(|m| m.loss.is_finite()));
        assert_eq!(checkpoints.latest_epoch().unwrap(), 2);
    }

    fn three_class_rows(multi: bool) -> Vec<ClassificationSample> {
        (0..18)
            .map(|i| {
                let class = i % 3;
                let mut features = vec![0.0; 6];
                features[class * 2] = 1.0;
                let label_ids = if multi && class == 2 { vec![0, 2] } else { vec![class] };
                ClassificationSample { features, label_ids }
            })
            .collect()
    }

    fn train_three_classes(label_type: LabelType) -> (Trained<ClassifierModel<InnerBackend>>, usize) {
        let dir         = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(dir.path().join("checkpoint")).unwrap();
        let logger      = MetricsLogger::new(dir.path().join("logs")).unwrap();
        let mut tracker = NoopTracker;
        let mut ctx     = TrainingContext { checkpoints: &checkpoints, logger: &logger, tracker: &mut tracker };

        let multi  = label_type == LabelType::MultiLabel;
        let opts   = FitOptions { epochs: 3, batch_size: 6, lr: 1e-2, ..FitOptions::default() };
        let config = ClassifierConfig::new(Architecture::Nn, 6, label_type.output_units(3));
        let device = crate::ml::default_device();

        let trained = train_classifier(
            &config,
            label_type,
            3,
            TextDataset::new(three_class_rows(multi)),
            TextDataset::new(three_class_rows(multi)),
            &opts,
            &mut ctx,
            &device,
        )
        .unwrap();
        let rows = std::fs::read_to_string(logger.csv_path()).unwrap().lines().count();
        (trained, rows)
    }

    #[test]
    fn test_train_multi_label_classifier() {
        let (trained, csv_lines) = train_three_classes(LabelType::MultiLabel);
        assert_eq!(trained.history.epochs.len(), 3);
        assert_eq!(csv_lines, 4);
        for m in &trained.history.epochs {
            // soft-F1 cost lives in [0, 1]
            assert!((0.0..=1.0).contains(&m.loss));
            assert!((0.0..=1.0).contains(&m.val_macro_f1));
        }
        assert_eq!(trained.model.head.weight.val().dims()[1], 3);
    }

    #[test]
    fn test_train_single_label_classifier() {
        let (trained, _) = train_three_classes(LabelType::SingleLabel);
        let last = trained.history.last().unwrap();
        assert!(last.loss.is_finite() && last.loss > 0.0);
        assert!((0.0..=1.0).contains(&last.val_accuracy));
        assert!(trained.history.best_val_loss() <= trained.history.epochs[0].val_loss);
    }

    #[test]
    fn test_binary_rejects_three_classes() {
        let dir         = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(dir.path().join("checkpoint")).unwrap();
        let logger      = MetricsLogger::new(dir.path().join("logs")).unwrap();
        let mut tracker = NoopTracker;
        let mut ctx     = TrainingContext { checkpoints: &checkpoints, logger: &logger, tracker: &mut tracker };

        let result = train_classifier(
            &ClassifierConfig::new(Architecture::Nn, 6, 1),
            LabelType::BinaryLabel,
            3,
            TextDataset::new(three_class_rows(false)),
            TextDataset::new(three_class_rows(false)),
            &FitOptions::default(),
            &mut ctx,
            &crate::ml::default_device(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_train_generator_end_to_end() {
        let dir         = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointManager::new(dir.path().join("checkpoint")).unwrap();
        let logger      = MetricsLogger::new(dir.path().join("logs")).unwrap();
        let mut tracker = NoopTracker;
        let mut ctx     = TrainingContext { checkpoints: &checkpoints, logger: &logger, tracker: &mut tracker };

        let samples: Vec<SequenceSample> = (0..8)
            .map(|i| SequenceSample { input_ids: vec![0, 2, 3 + (i % 3)], target: 3 + ((i + 1) % 3) })
            .collect();

        let opts   = FitOptions { epochs: 1, batch_size: 4, ..FitOptions::default() };
        let config = GeneratorConfig::new(Architecture::Gru, 10, 3, 8).with_embed_dim(4);
        let device = crate::ml::default_device();

        let trained = train_generator(
            &config,
            TextDataset::new(samples.clone()),
            TextDataset::new(samples),
            &opts,
            &mut ctx,
            &device,
        )
        .unwrap();

        let last = trained.history.last().unwrap();
        assert!(last.val_loss.is_finite());
        assert!((0.0..=1.0).contains(&last.val_accuracy));
    }
}
