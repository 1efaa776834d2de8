use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A face embedding: a dense vector of floating point numbers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Embedding {
    data: Vec<f32>,
}

impl Embedding {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    /// Build an embedding from caller-supplied values, rejecting empty or non-finite input
    pub fn try_new(data: Vec<f32>) -> Result<Self> {
        let embedding = Self { data };
        embedding.validate()?;
        Ok(embedding)
    }

    /// Check that the embedding is non-empty and every element is finite
    pub fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(Error::InvalidInput("embedding is empty".to_string()));
        }
        if let Some(pos) = self.data.iter().position(|x| !x.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "embedding element {} is not a finite number",
                pos
            )));
        }
        Ok(())
    }

    /// Parse the comma-separated text form, e.g. `"0.12,-0.5,0.33"`
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("embedding is empty".to_string()));
        }

        let data = trimmed
            .split(',')
            .enumerate()
            .map(|(i, part)| {
                part.trim().parse::<f32>().map_err(|_| {
                    Error::InvalidInput(format!("embedding element {} is not numeric", i))
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        Self::try_new(data)
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        dot(&self.data, &self.data).sqrt() as f32
    }

    /// Cosine similarity with another embedding.
    ///
    /// A zero-norm operand yields exactly `0.0`, never NaN. Mismatched
    /// dimensions also yield `0.0`; matchers exclude those before scoring.
    /// Sums are taken in f64 so finite inputs of any magnitude neither
    /// overflow nor flush to zero.
    #[inline]
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }

        let norm_a = dot(&self.data, &self.data).sqrt();
        let norm_b = dot(&other.data, &other.data).sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        (dot(&self.data, &other.data) / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(data: Vec<f32>) -> Self {
        Embedding::new(data)
    }
}

/// Dot product in f64 with four independent accumulators for better pipelining
#[inline]
fn dot(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());

    let mut acc = [0.0f64; 4];
    let chunks_a = a.chunks_exact(4);
    let chunks_b = b.chunks_exact(4);
    let tail_a = chunks_a.remainder();
    let tail_b = chunks_b.remainder();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        acc[0] += f64::from(ca[0]) * f64::from(cb[0]);
        acc[1] += f64::from(ca[1]) * f64::from(cb[1]);
        acc[2] += f64::from(ca[2]) * f64::from(cb[2]);
        acc[3] += f64::from(ca[3]) * f64::from(cb[3]);
    }

    let tail: f64 = tail_a
        .iter()
        .zip(tail_b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    (acc[0] + acc[1]) + (acc[2] + acc[3]) + tail
}
