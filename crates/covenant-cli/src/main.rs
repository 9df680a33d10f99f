use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use covenant_ai::{
    CapabilityError, ClauseClassifier, GenerateSummarizer, HfClassifier, HfEmbedder,
    HfRiskAssessor, InferenceClient, RiskAssessor, Summarizer,
};
use covenant_core::AnalysisConfig;
use covenant_pipeline::Pipeline;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod display;

const DEFAULT_CLASSIFIER_URL: &str =
    "https://api-inference.huggingface.co/models/nlpaueb/legal-bert-base-uncased";
const DEFAULT_RISK_URL: &str = "https://api-inference.huggingface.co/models/google/flan-t5-large";
const DEFAULT_EMBEDDING_URL: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2";

#[derive(Parser)]
#[command(name = "covenant")]
#[command(about = "Clause segmentation and compliance risk analysis for contracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a contract document (.txt/.md text, or a .json block file)
    Analyze(AnalyzeArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Report,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Document to analyse
    path: PathBuf,

    /// TOML analysis config; unset fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "report")]
    format: Format,

    /// Merge adjacent clauses with similar embeddings
    #[arg(long)]
    semantic_merge: bool,

    /// Maximum concurrent calls per stage (0 = unbounded)
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value = "60")]
    request_timeout: u64,

    #[arg(long, env = "HF_API_KEY", hide_env_values = true)]
    hf_api_key: Option<String>,

    #[arg(long, env = "COVENANT_CLASSIFIER_URL", default_value = DEFAULT_CLASSIFIER_URL)]
    classifier_url: String,

    #[arg(long, env = "COVENANT_RISK_URL", default_value = DEFAULT_RISK_URL)]
    risk_url: String,

    #[arg(long, env = "COVENANT_EMBEDDING_URL", default_value = DEFAULT_EMBEDDING_URL)]
    embedding_url: String,

    /// Local sentence-embedding model directory (model.onnx + tokenizer.json)
    #[cfg(feature = "onnx")]
    #[arg(long)]
    embedding_model: Option<PathBuf>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Summary `generate` endpoint; without one the canned advisory is used
    #[arg(long, env = "COVENANT_SUMMARY_URL")]
    summary_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => analyze(args).await,
    }
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref(), &args)?;
    let timeout = Duration::from_secs(args.request_timeout);

    let hf = InferenceClient::new(args.hf_api_key.clone(), timeout)
        .context("building inference client")?;
    let classifier: Arc<dyn ClauseClassifier> =
        Arc::new(HfClassifier::new(hf.clone(), &args.classifier_url));
    let assessor: Arc<dyn RiskAssessor> = Arc::new(HfRiskAssessor::new(
        hf.clone(),
        &args.risk_url,
        config.frameworks.clone(),
    ));
    let summarizer: Arc<dyn Summarizer> = match &args.summary_url {
        Some(url) => {
            let client = InferenceClient::new(args.gemini_api_key.clone(), timeout)
                .context("building summary client")?;
            Arc::new(GenerateSummarizer::new(client, url))
        }
        None => {
            warn!("COVENANT_SUMMARY_URL not set; advisory will use the canned summary");
            Arc::new(NoSummarizer)
        }
    };

    let mut builder = Pipeline::builder(config.clone(), classifier, assessor, summarizer);
    if config.segmenter.semantic_merge {
        builder = builder.embedder(embedder(&args, hf)?);
    }
    let pipeline = builder.build();

    info!(path = %args.path.display(), "covenant v{}", env!("CARGO_PKG_VERSION"));
    let state = pipeline
        .analyze(&args.path)
        .await
        .with_context(|| format!("analysing {}", args.path.display()))?;

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        Format::Report => print!("{}", display::render_report(&state)),
    }
    Ok(())
}

fn load_config(path: Option<&Path>, args: &AnalyzeArgs) -> anyhow::Result<AnalysisConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };

    if args.semantic_merge {
        config.segmenter.semantic_merge = true;
    }
    if let Some(n) = args.max_concurrency {
        config.stages.max_concurrency = n;
    }
    anyhow::ensure!(
        !config.frameworks.is_empty(),
        "config must name at least one framework"
    );
    Ok(config)
}

#[cfg(not(feature = "onnx"))]
fn embedder(
    args: &AnalyzeArgs,
    client: InferenceClient,
) -> anyhow::Result<Arc<dyn covenant_ai::Embedder>> {
    Ok(Arc::new(HfEmbedder::new(client, &args.embedding_url)))
}

#[cfg(feature = "onnx")]
fn embedder(
    args: &AnalyzeArgs,
    client: InferenceClient,
) -> anyhow::Result<Arc<dyn covenant_ai::Embedder>> {
    match &args.embedding_model {
        Some(dir) => {
            let model = covenant_ai::OnnxEmbedder::load(dir)
                .with_context(|| format!("loading embedding model from {}", dir.display()))?;
            Ok(Arc::new(model))
        }
        None => Ok(Arc::new(HfEmbedder::new(client, &args.embedding_url))),
    }
}

/// Stands in when no summary endpoint is configured.
struct NoSummarizer;

#[async_trait]
impl Summarizer for NoSummarizer {
    async fn summarize(&self, _prompt: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Backend(
            "no summary endpoint configured".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(extra: &[&str]) -> AnalyzeArgs {
        let mut argv = vec!["covenant", "analyze", "contract.txt"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Analyze(args) => args,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "frameworks = [\"GDPR\"]\n[stages]\nmax_concurrency = 2\nitem_timeout_secs = 10\n"
        )
        .unwrap();

        let args = args(&["--semantic-merge", "--max-concurrency", "4"]);
        let config = load_config(Some(file.path()), &args).unwrap();

        assert!(config.segmenter.semantic_merge);
        assert_eq!(config.stages.max_concurrency, 4);
        assert_eq!(config.stages.item_timeout_secs, 10);
        assert_eq!(config.primary_framework(), "GDPR");
    }

    #[test]
    fn defaults_without_config_file() {
        let config = load_config(None, &args(&[])).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn empty_framework_list_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "frameworks = []\n").unwrap();
        assert!(load_config(Some(file.path()), &args(&[])).is_err());
    }

    #[test]
    fn format_flag_parses() {
        assert!(matches!(args(&[]).format, Format::Report));
        assert!(matches!(args(&["--format", "json"]).format, Format::Json));
    }
}
