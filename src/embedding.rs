//! # Embedding providers
//!
//! The store never computes embeddings itself; it consumes anything implementing
//! [`EmbeddingProvider`]. The crate ships one implementation, [`MiniLm`], which runs
//! `sentence-transformers/all-MiniLM-L6-v2` locally with Candle (pure Rust, no Python).
//!
//! ## Pipeline
//! 1. Tokenize (the tokenizer truncates at 512 tokens).
//! 2. BERT forward pass.
//! 3. Mean pooling over the attention mask.
//! 4. L2 normalization.
//!
//! ```no_run
//! use vect::embedding::{EmbeddingProvider, MiniLm};
//!
//! # fn main() -> vect::error::Result<()> {
//! let model = MiniLm::load("sentence-transformers/all-MiniLM-L6-v2", "main")?;
//! let v = model.embed("Rust is great!")?;
//! assert_eq!(v.len(), model.dimension());
//! # Ok(()) }
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::Deserialize;
use std::fmt::Display;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::error::{Result, VectError};

/// BERT position embeddings stop here; longer inputs are cut.
const MAX_TOKENS: usize = 512;

/// Something that turns text into fixed-length vectors.
pub trait EmbeddingProvider {
    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts. The output is 1:1 and in the same order as `texts`.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

fn embedding_err(e: impl Display) -> VectError {
    VectError::Embedding(e.to_string())
}

#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

/// all-MiniLM-L6-v2 sentence embeddings via Candle.
pub struct MiniLm {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl MiniLm {
    /// Fetch (or reuse the cached) model files from the Hugging Face hub and load them.
    ///
    /// # Errors
    /// [`VectError::Embedding`] if the download, tokenizer or weights fail to load.
    pub fn load(model_id: &str, revision: &str) -> Result<Self> {
        let device = Device::Cpu;

        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
        let api = Api::new().map_err(embedding_err)?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo.get("config.json").map_err(embedding_err)?;
        let tokenizer_filename = api_repo.get("tokenizer.json").map_err(embedding_err)?;
        let weights_filename = api_repo.get("model.safetensors").map_err(embedding_err)?;

        let raw_config = std::fs::read_to_string(config_filename)?;
        let config: Config = serde_json::from_str(&raw_config).map_err(embedding_err)?;
        let HiddenSize { hidden_size } =
            serde_json::from_str(&raw_config).map_err(embedding_err)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_filename).map_err(embedding_err)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(embedding_err)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)
                .map_err(embedding_err)?
        };
        let model = BertModel::load(vb, &config).map_err(embedding_err)?;

        info!(model_id, revision, dimension = hidden_size, "Loaded embedding model");

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension: hidden_size,
        })
    }

    fn encode(&self, text: &str) -> candle_core::Result<Vec<f32>> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| candle_core::Error::Msg(format!("Tokenization error: {e}")))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;
        let pooled = self.mean_pooling(&output, tokens.get_attention_mask())?;
        let norm = pooled.sqr()?.sum_all()?.sqrt()?;

        pooled.broadcast_div(&norm)?.to_vec1::<f32>()
    }

    /// Mean over the sequence dimension, ignoring padded positions.
    fn mean_pooling(&self, embeddings: &Tensor, attention_mask: &[u32]) -> candle_core::Result<Tensor> {
        // [1, seq_len, 1] so the mask broadcasts over the hidden dimension.
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;

        sum.broadcast_div(&count)?.squeeze(0)
    }
}

impl EmbeddingProvider for MiniLm {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.encode(text).map_err(embedding_err)?;
        debug!(chars = text.len(), "Embedded text");
        Ok(vector)
    }
}
