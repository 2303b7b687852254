use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::domain::labels::Architecture;
use crate::ml::backbone::{Backbone, BackboneConfig, DENSE_UNITS};

// ─── Classifier ───────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub architecture:  Architecture,
    pub embedding_dim: usize,
    pub output_units:  usize,
    #[config(default = 0.2)]
    pub dropout:       f64,
}

impl ClassifierConfig {
    /// The sentence vector is fed as a single step of `embedding_dim` channels.
    pub fn backbone(&self) -> BackboneConfig {
        BackboneConfig::new(self.architecture, 1, self.embedding_dim).with_dropout(self.dropout)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassifierModel<B> {
        ClassifierModel {
            backbone: self.backbone().init(device),
            head:     LinearConfig::new(DENSE_UNITS, self.output_units).init(device),
        }
    }

    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!("Input: sentence embedding [{}]", self.embedding_dim)];
        lines.push(format!("Reshape            → [1, {}]", self.embedding_dim));
        lines.extend(self.backbone().layer_summary());
        lines.push(format!("Dense({}) output", self.output_units));
        lines
    }
}

#[derive(Module, Debug)]
pub struct ClassifierModel<B: Backend> {
    pub backbone: Backbone<B>,
    pub head:     Linear<B>,
}

impl<B: Backend> ClassifierModel<B> {
    /// features: [batch, embedding_dim] → logits: [batch, output_units]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, dim] = features.dims();
        let x = features.reshape([batch, 1, dim]);
        self.head.forward(self.backbone.forward(x))
    }
}

// ─── Next-word generator ──────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct GeneratorConfig {
    pub architecture:  Architecture,
    pub vocab_size:    usize,
    pub input_shape:   usize,
    pub number_labels: usize,
    #[config(default = 64)]
    pub embed_dim:     usize,
    #[config(default = 0.2)]
    pub dropout:       f64,
}

impl GeneratorConfig {
    pub fn backbone(&self) -> BackboneConfig {
        BackboneConfig::new(self.architecture, self.input_shape, self.embed_dim)
            .with_dropout(self.dropout)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> GeneratorModel<B> {
        GeneratorModel {
            embedding: EmbeddingConfig::new(self.vocab_size, self.embed_dim).init(device),
            backbone:  self.backbone().init(device),
            head:      LinearConfig::new(DENSE_UNITS, self.number_labels).init(device),
        }
    }

    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!("Input: token ids [{}]", self.input_shape)];
        lines.push(format!("Embedding({}, {})", self.vocab_size, self.embed_dim));
        lines.extend(self.backbone().layer_summary());
        lines.push(format!("Dense({}) output", self.number_labels));
        lines
    }
}

#[derive(Module, Debug)]
pub struct GeneratorModel<B: Backend> {
    pub embedding: Embedding<B>,
    pub backbone:  Backbone<B>,
    pub head:      Linear<B>,
}

impl<B: Backend> GeneratorModel<B> {
    /// input_ids: [batch, input_shape] → logits: [batch, number_labels]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let x = self.embedding.forward(input_ids);
        self.head.forward(self.backbone.forward(x))
    }
}
