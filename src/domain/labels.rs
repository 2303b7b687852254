// ============================================================
// Layer 3 — Labels, Tasks and Architectures
// ============================================================
// The enums here travel all the way from the CLI flags to the
// exported model.json, so each one:
//   - parses from the strings users type (FromStr, used by clap)
//   - serialises to the same strings (serde rename)
//
// LabelEncoder maps class names to contiguous indices. Classes
// are kept sorted so two fits over the same data always give
// the same indices, no matter the row order.

use std::{collections::BTreeSet, fmt, str::FromStr};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ─── LabelType ────────────────────────────────────────────────────────────────
/// How the labels of a classification run are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelType {
    /// Two classes, one sigmoid unit
    BinaryLabel,
    /// Exactly one class per row, softmax over all classes
    SingleLabel,
    /// Any number of classes per row, one sigmoid unit per class
    MultiLabel,
}

impl LabelType {
    /// Number of units of the output layer for `number_labels` classes.
    pub fn output_units(&self, number_labels: usize) -> usize {
        match self {
            LabelType::BinaryLabel => 1,
            _ => number_labels,
        }
    }

    /// Check that the fitted classes make sense for this label type.
    pub fn validate(&self, number_labels: usize) -> Result<()> {
        if number_labels == 0 {
            bail!("no labels found in the dataset");
        }
        if *self == LabelType::BinaryLabel && number_labels > 2 {
            bail!(
                "binary-label needs at most 2 classes, found {}",
                number_labels
            );
        }
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelType::BinaryLabel => "binary-label",
            LabelType::SingleLabel => "single-label",
            LabelType::MultiLabel  => "multi-label",
        }
    }
}

impl FromStr for LabelType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "binary-label" => Ok(LabelType::BinaryLabel),
            "single" | "single-label" => Ok(LabelType::SingleLabel),
            "multi"  | "multi-label"  => Ok(LabelType::MultiLabel),
            other => bail!(
                "unknown label type '{other}' (expected binary-label, single-label or multi-label)"
            ),
        }
    }
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Task ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Classification,
    Generation,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Classification => f.write_str("classification"),
            Task::Generation     => f.write_str("generation"),
        }
    }
}

// ─── Architecture ─────────────────────────────────────────────────────────────
/// Which trunk sits between the input representation and the dense head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "NN")]
    Nn,
    #[serde(rename = "GRU")]
    Gru,
    #[serde(rename = "CNN_NN")]
    CnnNn,
    #[serde(rename = "CNN_GRU_NN")]
    CnnGruNn,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Nn       => "NN",
            Architecture::Gru      => "GRU",
            Architecture::CnnNn    => "CNN_NN",
            Architecture::CnnGruNn => "CNN_GRU_NN",
        }
    }

    pub fn uses_convolution(&self) -> bool {
        matches!(self, Architecture::CnnNn | Architecture::CnnGruNn)
    }

    pub fn uses_recurrence(&self) -> bool {
        matches!(self, Architecture::Gru | Architecture::CnnGruNn)
    }
}

impl FromStr for Architecture {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "NN"         => Ok(Architecture::Nn),
            "GRU"        => Ok(Architecture::Gru),
            "CNN_NN"     => Ok(Architecture::CnnNn),
            "CNN_GRU_NN" => Ok(Architecture::CnnGruNn),
            other => bail!(
                "unknown architecture '{other}' (expected NN, GRU, CNN_NN or CNN_GRU_NN)"
            ),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── LabelEncoder ─────────────────────────────────────────────────────────────
/// Bidirectional class name ↔ index mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on every label seen, sorted and de-duplicated.
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    /// Use an explicit, already ordered class list.
    /// The generation vocabulary is built this way: index i is word id i.
    pub fn from_classes(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    /// Encode every label of a row, failing on unknown classes.
    pub fn transform_all(&self, labels: &[String]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|l| match self.transform(l) {
                Some(idx) => Ok(idx),
                None => bail!("label '{l}' was not seen while fitting the encoder"),
            })
            .collect()
    }

    pub fn inverse(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
