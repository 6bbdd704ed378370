use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dicomflow_api_client::upload::{
    walk, CancellationToken, OverallProgress, ProgressSink, RetryPolicy, RetryScope,
    UploadOrchestrator,
};
use dicomflow_api_client::ApiClient;
use dicomflow_cli::{format_bytes, init_tracing, truncate_string};
use dicomflow_core::validation::UploadLimit;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RetryMode {
    /// Retry only the file that failed, with exponential backoff
    PerFile,
    /// Start the whole upload over after a fixed delay
    WholeUpload,
}

#[derive(Parser, Debug)]
#[command(name = "upload_folder")]
#[command(about = "Upload DICOM files and folders as one order")]
struct Args {
    /// Files and folders to upload
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Patient the order belongs to
    #[arg(long, value_name = "UUID")]
    patient_id: Uuid,

    /// Files uploaded at the same time
    #[arg(long, default_value = "3")]
    concurrency: usize,

    #[arg(long, value_enum, default_value = "per-file")]
    retry: RetryMode,

    /// Retries before giving up
    #[arg(long, default_value = "1")]
    max_retries: u32,

    /// Walk and validate only; nothing is sent
    #[arg(long)]
    dry_run: bool,
}

fn progress_printer() -> ProgressSink {
    let last_percent = AtomicU8::new(u8::MAX);
    Arc::new(move |p: OverallProgress| {
        if last_percent.swap(p.percent, Ordering::Relaxed) != p.percent {
            eprintln!(
                "  {:>3}%  {} / {}  ({}/{} files)",
                p.percent,
                format_bytes(p.loaded),
                format_bytes(p.total),
                p.files_completed,
                p.files_total
            );
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let report = walk(&args.paths).await;
    for skipped in &report.skipped {
        eprintln!("Skipped {}: {}", skipped.path.display(), skipped.error);
    }
    if report.candidates.is_empty() {
        anyhow::bail!("No files found under the given paths");
    }

    println!(
        "Found {} file(s), {} total",
        report.candidates.len(),
        format_bytes(report.total_bytes())
    );

    if args.dry_run {
        let mut invalid = 0;
        for file in &report.candidates {
            let result =
                dicomflow_api_client::upload::inspect_file(file, UploadLimit::FolderUpload).await;
            if let Some(reason) = result.reason {
                invalid += 1;
                println!(
                    "  INVALID  {:<50} {}",
                    truncate_string(&file.relative_path_string(), 50),
                    reason
                );
            }
        }
        println!("{} valid, {} invalid", report.candidates.len() - invalid, invalid);
        return Ok(());
    }

    let client = ApiClient::from_env()
        .context("Failed to create API client. Set DICOMFLOW_TOKEN and DICOMFLOW_API_URL")?;

    let retry = RetryPolicy {
        scope: match args.retry {
            RetryMode::PerFile => RetryScope::PerFile,
            RetryMode::WholeUpload => RetryScope::WholeUpload,
        },
        max_retries: args.max_retries,
        ..RetryPolicy::default()
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current group of files...");
            on_ctrl_c.cancel();
        }
    });

    let outcome = UploadOrchestrator::new(Arc::new(client))
        .with_concurrency(args.concurrency)
        .with_retry(retry)
        .with_cancellation(cancel)
        .with_progress(progress_printer())
        .upload_folder(&report.candidates, args.patient_id)
        .await;

    if outcome.success {
        println!(
            "Uploaded {} file(s) as order {}",
            outcome.uploaded,
            outcome
                .order_id
                .map(|id| id.to_string())
                .unwrap_or_default()
        );
        Ok(())
    } else {
        if let Some(order_id) = outcome.order_id {
            eprintln!(
                "Order {} was created; {} file(s) reached the server before the failure",
                order_id, outcome.uploaded
            );
        }
        Err(anyhow::anyhow!(
            "{}",
            outcome
                .error
                .unwrap_or_else(|| "Upload failed".to_string())
        ))
    }
}
