//! Inputs for the protocol benches.
//!
//! Every input is tagged with a size class. The benches read the class to budget criterion's
//! sampling, so large inputs take fewer samples over a longer measurement window.

use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InputSize {
    Small,
    Normal,
    Large,
}

impl InputSize {
    pub fn sample_size(self) -> usize {
        match self {
            InputSize::Small => 200,
            InputSize::Normal => 100,
            InputSize::Large => 50,
        }
    }

    pub fn measurement_time(self) -> Duration {
        match self {
            InputSize::Small => Duration::from_secs(3),
            InputSize::Normal => Duration::from_secs(5),
            InputSize::Large => Duration::from_secs(8),
        }
    }
}

/// A labelled query string or route template.
#[derive(Debug, Copy, Clone)]
pub struct BenchInput {
    label: &'static str,
    size: InputSize,
    content: &'static str,
}

impl BenchInput {
    pub const fn small(label: &'static str, content: &'static str) -> Self {
        Self { label, size: InputSize::Small, content }
    }

    pub const fn normal(label: &'static str, content: &'static str) -> Self {
        Self { label, size: InputSize::Normal, content }
    }

    pub const fn large(label: &'static str, content: &'static str) -> Self {
        Self { label, size: InputSize::Large, content }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn size(&self) -> InputSize {
        self.size
    }

    pub fn content(&self) -> &'static str {
        self.content
    }
}
