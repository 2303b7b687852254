use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        gru::{Gru, GruConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig1d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::labels::Architecture;

pub const CONV1_FILTERS: usize = 512;
pub const CONV2_FILTERS: usize = 256;
pub const GRU_UNITS:     usize = 128;
pub const DENSE_UNITS:   usize = 128;
const KERNEL_SIZE: usize = 3;

/// Trunk shared by both models. Input is `[batch, steps, channels]`.
#[derive(Config, Debug)]
pub struct BackboneConfig {
    pub architecture: Architecture,
    pub steps:        usize,
    pub channels:     usize,
    #[config(default = 0.2)]
    pub dropout:      f64,
}

impl BackboneConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        let arch = self.architecture;

        let conv1 = arch.uses_convolution().then(|| {
            Conv1dConfig::new(self.channels, CONV1_FILTERS, KERNEL_SIZE)
                .with_padding(PaddingConfig1d::Same)
                .init(device)
        });
        let conv2 = (arch == Architecture::CnnGruNn).then(|| {
            Conv1dConfig::new(CONV1_FILTERS, CONV2_FILTERS, KERNEL_SIZE)
                .with_padding(PaddingConfig1d::Same)
                .init(device)
        });
        let gru = arch.uses_recurrence().then(|| {
            let d_input = if arch == Architecture::CnnGruNn { CONV2_FILTERS } else { self.channels };
            GruConfig::new(d_input, GRU_UNITS, true).init(device)
        });

        let dense   = LinearConfig::new(self.trunk_dim(), DENSE_UNITS).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();

        Backbone { conv1, conv2, gru, dense, dropout }
    }

    /// Width of the trunk output, before the dense layer.
    pub fn trunk_dim(&self) -> usize {
        match self.architecture {
            Architecture::Nn                         => self.steps * self.channels,
            Architecture::CnnNn                      => CONV1_FILTERS,
            Architecture::Gru | Architecture::CnnGruNn => GRU_UNITS,
        }
    }

    /// Human-readable layer list for the exported model summary.
    pub fn layer_summary(&self) -> Vec<String> {
        let mut layers = Vec::new();
        match self.architecture {
            Architecture::Nn => layers.push(format!("Flatten            → {}", self.trunk_dim())),
            Architecture::Gru => layers.push(format!("GRU({GRU_UNITS}), last step → {GRU_UNITS}")),
            Architecture::CnnNn => {
                layers.push(format!("Conv1d({CONV1_FILTERS}, k={KERNEL_SIZE}, same) + ReLU"));
                layers.push(format!("GlobalMaxPool1d    → {CONV1_FILTERS}"));
            }
            Architecture::CnnGruNn => {
                layers.push(format!("Conv1d({CONV1_FILTERS}, k={KERNEL_SIZE}, same) + ReLU"));
                layers.push(format!("Conv1d({CONV2_FILTERS}, k={KERNEL_SIZE}, same) + ReLU"));
                layers.push(format!("GRU({GRU_UNITS}), last step → {GRU_UNITS}"));
            }
        }
        layers.push(format!("Dense({DENSE_UNITS}) + ReLU"));
        layers.push(format!("Dropout({})", self.dropout));
        layers
    }
}

#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub conv1:   Option<Conv1d<B>>,
    pub conv2:   Option<Conv1d<B>>,
    pub gru:     Option<Gru<B>>,
    pub dense:   Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> Backbone<B> {
    /// `[batch, steps, channels]` → `[batch, DENSE_UNITS]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, steps, channels] = x.dims();

        let trunk = match (&self.conv1, &self.gru) {
            (None, None) => x.reshape([batch, steps * channels]),
            (None, Some(gru)) => last_step(gru.forward(x, None)),
            (Some(conv1), gru) => {
                // Conv1d wants channels first: [batch, channels, steps]
                let mut h = relu(conv1.forward(x.swap_dims(1, 2)));
                if let Some(conv2) = &self.conv2 {
                    h = relu(conv2.forward(h));
                }
                match gru {
                    Some(gru) => last_step(gru.forward(h.swap_dims(1, 2), None)),
                    None => {
                        let [b, c, _] = h.dims();
                        h.max_dim(2).reshape([b, c])
                    }
                }
            }
        };

        self.dropout.forward(relu(self.dense.forward(trunk)))
    }
}

/// Hidden state of the final time step: `[batch, steps, d]` → `[batch, d]`
fn last_step<B: Backend>(h: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch, steps, d] = h.dims();
    h.slice([0..batch, steps - 1..steps, 0..d]).reshape([batch, d])
}
