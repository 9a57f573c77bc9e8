//! ONNX Runtime sentiment pipeline for sequence-classification models.
//!
//! Targets DistilBERT fine-tuned on SST-2 (or any model with the same
//! interface). The model directory must contain `model.onnx` and
//! `tokenizer.json`; `config.json` is optional and supplies `id2label`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use sentiscope_core::{LocalPipeline, PipelineLoader, RawOutput};
use tokenizers::Tokenizer;
use tracing::info;

use crate::labels::LabelMap;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const CONFIG_FILE: &str = "config.json";
const MAX_TOKENS: usize = 512;

/// Sentiment classifier backed by an ONNX Runtime session.
pub struct OnnxSentiment {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: LabelMap,
    wants_token_types: bool,
}

impl OnnxSentiment {
    /// Load a classifier from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        anyhow::ensure!(model_path.exists(), "{MODEL_FILE} not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "{TOKENIZER_FILE} not found in {model_dir:?}"
        );

        let session = Session::builder()?.commit_from_file(&model_path)?;

        // BERT-style exports take token_type_ids; DistilBERT does not.
        let wants_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        let labels = LabelMap::load(model_dir)?;

        info!(
            labels = labels.len(),
            wants_token_types,
            model = %model_path.display(),
            "loaded sentiment model"
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            wants_token_types,
        })
    }

    fn run(&self, text: &str) -> anyhow::Result<RawOutput> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encoding.get_ids().len();
        let shape = [1i64, seq_len as i64];
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = if self.wants_token_types {
            let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let type_tensor = Tensor::from_array((shape, type_ids.into_boxed_slice()))?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [1, num_labels].
        let (output_shape, logits) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2 && dims[0] == 1,
            "unexpected output shape: {dims:?}, expected [1, {}]",
            self.labels.len()
        );

        self.labels.pick(logits)
    }
}

impl LocalPipeline for OnnxSentiment {
    fn classify(&self, text: &str) -> anyhow::Result<RawOutput> {
        self.run(text)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Loads [`OnnxSentiment`] from a model directory, fetching missing files first
/// when a download base URL is configured.
pub struct OnnxLoader {
    model_dir: PathBuf,
    base_url: Option<String>,
}

impl OnnxLoader {
    pub fn new(model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            base_url: None,
        }
    }

    /// Fetch missing model files from `base_url` (e.g. a Hugging Face
    /// `resolve/main/` URL). Files already on disk are reused.
    pub fn with_download(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    async fn fetch_missing(&self, base_url: &str) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .with_context(|| format!("create {}", self.model_dir.display()))?;

        let client = reqwest::Client::new();
        for (file, required) in [(MODEL_FILE, true), (TOKENIZER_FILE, true), (CONFIG_FILE, false)] {
            let dest = self.model_dir.join(file);
            if dest.exists() {
                continue;
            }

            let url = format!("{base_url}/{file}");
            info!(url = %url, "fetching model file");
            let resp = client.get(&url).send().await.with_context(|| format!("GET {url}"))?;
            let status = resp.status();
            if !status.is_success() {
                anyhow::ensure!(!required, "GET {url} returned {status}");
                continue;
            }

            let bytes = resp.bytes().await.with_context(|| format!("read {url}"))?;
            // A partial download must never sit under the final name.
            let partial = dest.with_extension("partial");
            tokio::fs::write(&partial, &bytes)
                .await
                .with_context(|| format!("write {}", partial.display()))?;
            tokio::fs::rename(&partial, &dest)
                .await
                .with_context(|| format!("rename into {}", dest.display()))?;
            info!(file, bytes = bytes.len(), "model file cached");
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineLoader for OnnxLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn LocalPipeline>> {
        if let Some(base_url) = &self.base_url {
            self.fetch_missing(base_url).await?;
        }

        let dir = self.model_dir.clone();
        let pipeline = tokio::task::spawn_blocking(move || OnnxSentiment::load(&dir))
            .await
            .context("model load task")??;
        Ok(Arc::new(pipeline))
    }
}
