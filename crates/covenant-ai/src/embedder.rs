//! Local sentence embeddings with ONNX Runtime.
//!
//! Mean-pooled, L2-normalised embeddings from a sentence-transformers export
//! (e.g. all-MiniLM-L6-v2). The model directory must contain `model.onnx`
//! and `tokenizer.json`.

use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::capability::{CapabilityError, Embedder};
use crate::similarity::{mean_pool, normalize};

/// Token limit of MiniLM-style encoders.
const MAX_TOKENS: usize = 256;

fn backend(e: impl Display) -> CapabilityError {
    CapabilityError::Backend(e.to_string())
}

/// Clause embedder backed by a local ONNX model.
///
/// Inference is CPU-bound, so batches run on the blocking pool and the
/// session is shared behind a mutex.
pub struct OnnxEmbedder {
    model: Arc<Mutex<Model>>,
    dim: usize,
}

struct Model {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

impl OnnxEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self, CapabilityError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(backend(format!("model.onnx not found in {model_dir:?}")));
        }
        if !tokenizer_path.exists() {
            return Err(backend(format!("tokenizer.json not found in {model_dir:?}")));
        }

        let session = Session::builder()
            .map_err(backend)?
            .commit_from_file(&model_path)
            .map_err(backend)?;
        let dim = output_dim(session.outputs()[0].dtype()).unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(backend)?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(backend)?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        info!(dim, model = %model_path.display(), "loaded clause embedding model");
        Ok(Self {
            model: Arc::new(Mutex::new(Model {
                session,
                tokenizer,
                dim,
            })),
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let model = Arc::clone(&self.model);

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| backend("embedding model mutex poisoned"))?;
            model.run(owned)
        })
        .await
        .map_err(backend)?
    }
}

impl Model {
    fn run(&mut self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let batch_size = texts.len();
        let dim = self.dim;
        let encodings = self.tokenizer.encode_batch(texts, true).map_err(backend)?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat [batch_size, seq_len] inputs.
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            let fields = encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids());
            for (j, ((&id, &mask), &type_id)) in fields.enumerate() {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = mask as i64;
                token_type_ids[row + j] = type_id as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids = Tensor::from_array((shape, input_ids.into_boxed_slice())).map_err(backend)?;
        let mask = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))
            .map_err(backend)?;
        let types =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice())).map_err(backend)?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
                "token_type_ids" => types,
            ])
            .map_err(backend)?;

        // Token embeddings: [batch_size, seq_len, dim].
        let (dims, data) = outputs[0].try_extract_tensor::<f32>().map_err(backend)?;
        let dims: &[i64] = dims;
        if dims.len() != 3 || dims[0] as usize != batch_size || dims[2] as usize != dim {
            return Err(backend(format!(
                "unexpected output shape {dims:?}, expected [{batch_size}, {seq_len}, {dim}]"
            )));
        }
        let out_len = dims[1] as usize;

        // Mean over unmasked tokens, then unit length.
        let embeddings = (0..batch_size)
            .map(|i| {
                let tokens = (0..out_len.min(seq_len))
                    .filter(|&j| attention_mask[i * seq_len + j] != 0)
                    .map(|j| {
                        let offset = (i * out_len + j) * dim;
                        &data[offset..offset + dim]
                    });
                let mut pooled = mean_pool(dim, tokens);
                normalize(&mut pooled);
                pooled
            })
            .collect();

        Ok(embeddings)
    }
}

/// Last dimension of the model's first output, if static.
fn output_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
