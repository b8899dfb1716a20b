//! The `docvision extract` command.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use docvision_core::{
    BatchSummary, Config, InferenceClient, InferenceMode, InferenceRequestItem, TransmitMode,
};

const DEFAULT_INSTRUCTION: &str = "retrieve document data. return response in JSON format";

/// Arguments for the `extract` command.
#[derive(Args, Debug, Default)]
pub struct ExtractArgs {
    /// Image files to extract from
    #[arg(required_unless_present_any = ["batch", "static_mode"])]
    pub files: Vec<String>,

    /// Instruction sent with every image
    #[arg(short, long, default_value = DEFAULT_INSTRUCTION)]
    pub instruction: String,

    /// JSON file holding a list of {"file_paths": [...], "text_input": "..."} items
    #[arg(long, conflicts_with = "files")]
    pub batch: Option<PathBuf>,

    /// Return the canned result without calling the endpoint
    #[arg(long = "static")]
    pub static_mode: bool,

    /// Chat-completions endpoint URL
    #[arg(long, env = "DOCVISION_URL")]
    pub url: Option<String>,

    /// API key for the endpoint
    #[arg(long, env = "DOCVISION_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum concurrent requests
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Which image bytes are sent
    #[arg(long, value_enum)]
    pub transmit: Option<TransmitArg>,

    /// Write results to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TransmitArg {
    Original,
    Resized,
}

impl From<TransmitArg> for TransmitMode {
    fn from(arg: TransmitArg) -> Self {
        match arg {
            TransmitArg::Original => TransmitMode::Original,
            TransmitArg::Resized => TransmitMode::Resized,
        }
    }
}

/// Execute the extract command against the config loaded by `main`.
pub async fn execute(args: ExtractArgs, mut config: Config) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args);

    let items = build_items(&args)?;
    let mode = if args.static_mode {
        InferenceMode::Static
    } else {
        InferenceMode::Live
    };

    let client = InferenceClient::from_config(&config);
    let results = client.inference(&items, mode).await?;

    let summary = BatchSummary::from_results(&results);
    tracing::info!(
        "Processed {} images: {} succeeded, {} unparsed, {} failed",
        summary.total(),
        summary.succeeded,
        summary.unparsed,
        summary.failed
    );

    let rendered = serde_json::to_string_pretty(&results)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &ExtractArgs) {
    if let Some(url) = &args.url {
        config.endpoint.url = url.clone();
    }
    if let Some(key) = &args.api_key {
        config.endpoint.api_key = key.clone();
    }
    if let Some(model) = &args.model {
        config.endpoint.model = model.clone();
    }
    if let Some(parallel) = args.parallel {
        config.batch.parallel = parallel.max(1);
    }
    if let Some(transmit) = args.transmit {
        config.image.transmit = transmit.into();
    }
}

fn build_items(args: &ExtractArgs) -> anyhow::Result<Vec<InferenceRequestItem>> {
    if let Some(path) = &args.batch {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file {}", path.display()))?;
        let items: Vec<InferenceRequestItem> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid batch file {}", path.display()))?;
        return Ok(items);
    }

    if args.files.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![InferenceRequestItem::new(
        args.files.iter().cloned(),
        args.instruction.clone(),
    )])
}
