use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, RunOutcome};
use crate::services::{CancelFlag, IndexingPipeline, PipelineContext, PipelineOptions};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Maximum number of candidates to fetch this run
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,

    /// Records per upsert batch
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    /// Concurrent embedding requests
    #[arg(long, short = 'p')]
    pub max_parallel: Option<usize>,

    /// Ids requested per page while reading the vector store
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Directory for validation_failures.json and vector_run_summary.json
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Do not write report files
    #[arg(long, conflicts_with = "report_dir")]
    pub no_report: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(limit) = self.limit {
            config.pipeline.limit = Some(limit);
        }
        if let Some(batch_size) = self.batch_size {
            config.pipeline.batch_size = batch_size;
        }
        if let Some(max_parallel) = self.max_parallel {
            config.pipeline.max_parallel_embeddings = max_parallel;
        }
        if let Some(page_size) = self.page_size {
            config.pipeline.page_size = page_size;
        }
        if let Some(ref dir) = self.report_dir {
            config.logging.dir = dir.clone();
        }
    }
}

pub async fn handle_run(
    args: RunArgs,
    config: &Config,
    format: OutputFormat,
    cancel: CancelFlag,
) -> Result<()> {
    let formatter = get_formatter(format);

    let mut config = config.clone();
    args.apply(&mut config);
    config.validate().context("invalid run options")?;

    let mut options = PipelineOptions::from_config(&config);
    if args.no_report {
        options.report_dir = None;
    }

    let context = PipelineContext::connect(&config)
        .await
        .context("failed to initialize pipeline")?;
    let pipeline = IndexingPipeline::new(context, options);

    let spinner = if format == OutputFormat::Text {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "Indexing into {}",
            pipeline.context().vector_store.collection()
        ));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = pipeline.run(&cancel).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    pipeline.context().close().await;

    let summary = result.context("indexing run aborted")?;
    println!("{}", formatter.format_summary(&summary));

    if format == OutputFormat::Text
        && !args.no_report
        && summary.outcome == RunOutcome::PartialSuccess
    {
        eprintln!(
            "Some records were not indexed; see {}",
            config.logging.dir.display()
        );
    }

    Ok(())
}
