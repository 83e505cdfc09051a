//! mediaforge: operate the media pipeline from the command line.
//!
//! Configuration comes from MEDIAFORGE_* environment variables (a `.env`
//! file is honored). Commands that touch metadata need the database; upload,
//! probe, and resolve work against storage alone where they can.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use mediaforge_cli::{init_tracing, InlineDispatcher, ServiceUnitHandler};
use mediaforge_core::models::{OwnerRegistry, ResizeMode};
use mediaforge_core::AppConfig;
use mediaforge_db::{setup_database, AssetFilter, AssetRepository};
use mediaforge_processing::{FfmpegService, FileInfoProbe, VideoTransformEngine};
use mediaforge_services::{
    AssetStats, BatchCoordinator, CompressService, DedupService, LogSink, MetadataStore,
    NamedSizeManager, RefreshReconciler, SizeAction, SizeVariantGenerator, UploadOrchestrator,
    UploadRequest,
};
use mediaforge_storage::{create_storage, paths, Storage};

#[derive(Parser)]
#[command(name = "mediaforge", about = "Media ingestion pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file, record it, run the compress pass, and derive variants
    Upload {
        /// Owner model the record belongs to, e.g. shop.ProductModel
        owner_type: String,
        /// Primary key of the owning row
        owner_id: i64,
        /// Field on the owner that references the file
        owner_field: String,
        /// Path to the local file
        file: std::path::PathBuf,
        /// Directory prefix the file is stored under; defaults to
        /// {owner_field}/{owner_id}
        #[arg(long)]
        owner_dir: Option<String>,
        /// Folded into the stored file name, e.g. --tag hero
        #[arg(long)]
        tag: Option<String>,
        /// Resize mode for this upload (contain, cover, crop); defaults to
        /// the configured mode
        #[arg(long)]
        fit: Option<String>,
        /// Store the file verbatim, skipping the compress pass
        #[arg(long)]
        no_resize: bool,
    },
    /// Recompress stored originals in place
    Compress {
        /// Report savings without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Restrict to one owner type
        #[arg(long)]
        owner_type: Option<String>,
        /// Records fetched per database round trip
        #[arg(long, default_value_t = 100)]
        chunk_size: i64,
    },
    /// Reconcile metadata records with owners and storage
    Refresh {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        owner_type: Option<String>,
        #[arg(long, default_value_t = 100)]
        chunk_size: i64,
    },
    /// Find and remove duplicate metadata records
    Dedup {
        #[arg(long)]
        dry_run: bool,
    },
    /// Roll a named size out to (or back from) every stored image
    Size {
        action: SizeActionArg,
        /// Size name, e.g. thumb
        name: String,
        #[arg(long)]
        dry_run: bool,
        /// Skip the declared-in-config check
        #[arg(long)]
        force: bool,
        #[arg(long, default_value_t = 100)]
        chunk_size: i64,
    },
    /// Print the serving URL for a stored key
    Resolve {
        key: String,
        /// Named size to resolve instead of the original
        #[arg(long)]
        size: Option<String>,
    },
    /// Print live facts about a stored object
    Probe { key: String },
    /// Count records whose file exceeds a size threshold
    Stats {
        #[arg(long, default_value_t = 1_048_576)]
        min_size: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SizeActionArg {
    Add,
    Remove,
}

impl From<SizeActionArg> for SizeAction {
    fn from(value: SizeActionArg) -> Self {
        match value {
            SizeActionArg::Add => SizeAction::Add,
            SizeActionArg::Remove => SizeAction::Remove,
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Everything a database-backed command needs.
struct App {
    config: AppConfig,
    storage: Arc<dyn Storage>,
    repo: AssetRepository,
    store: Arc<dyn MetadataStore>,
}

impl App {
    async fn connect(config: AppConfig, storage: Arc<dyn Storage>) -> anyhow::Result<Self> {
        let pool = setup_database(&config.database)
            .await
            .context("Failed to connect to the metadata database")?;
        let repo = AssetRepository::new(pool);
        let store: Arc<dyn MetadataStore> = Arc::new(repo.clone());
        Ok(Self {
            config,
            storage,
            repo,
            store,
        })
    }

    fn dispatcher(&self) -> anyhow::Result<Arc<InlineDispatcher>> {
        let ffmpeg = FfmpegService::new(
            self.config.video.ffmpeg_path.clone(),
            self.config.video.ffprobe_path.clone(),
        );
        let handler = Arc::new(ServiceUnitHandler::new(
            self.storage.clone(),
            self.repo.clone(),
            self.variants(),
            CompressService::new(
                self.storage.clone(),
                self.store.clone(),
                self.config.compression_policy()?,
            ),
            RefreshReconciler::new(self.storage.clone(), self.store.clone(), OwnerRegistry::new()),
            VideoTransformEngine::new(ffmpeg),
            self.config.size_specs()?,
            self.config.compression_policy()?,
            self.config.video_policy()?,
        ));
        Ok(Arc::new(InlineDispatcher::new(handler)))
    }

    fn variants(&self) -> SizeVariantGenerator {
        SizeVariantGenerator::new(
            self.storage.clone(),
            Some(self.config.storage.cache_control.clone()),
        )
    }

    fn filter(owner_type: Option<String>) -> AssetFilter {
        AssetFilter {
            owner_type,
            ..AssetFilter::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // Pure path resolution needs neither storage nor database.
    if let Commands::Resolve { key, size } = &cli.command {
        let url = paths::resolve_url(&config.storage.base_url, key, size.as_deref());
        print_json(&serde_json::json!({ "url": url }))?;
        return Ok(());
    }

    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage")?;

    if let Commands::Probe { key } = &cli.command {
        let info = FileInfoProbe::new(storage).probe(key).await?;
        print_json(&serde_json::json!({
            "size": info.size,
            "mime_type": info.mime_type,
            "width": info.width,
            "height": info.height,
        }))?;
        return Ok(());
    }

    let app = App::connect(config, storage).await?;

    match cli.command {
        Commands::Upload {
            owner_type,
            owner_id,
            owner_field,
            file,
            owner_dir,
            tag,
            fit,
            no_resize,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("File has no usable name")?;
            let owner_dir =
                owner_dir.unwrap_or_else(|| format!("{}/{}", owner_field, owner_id));
            let fit_mode = fit.as_deref().map(ResizeMode::parse).transpose()?;
            let orchestrator = UploadOrchestrator::new(
                app.storage.clone(),
                app.store.clone(),
                app.dispatcher()?,
                app.config.compression_policy()?,
                app.config.size_specs()?,
                &app.config.storage,
                &app.config.worker,
            );
            let uploaded = orchestrator
                .upload_and_derive(
                    &UploadRequest {
                        owner_type: &owner_type,
                        owner_id,
                        owner_field: &owner_field,
                        owner_dir: &owner_dir,
                        file_name,
                        tag: tag.as_deref(),
                        fit_mode,
                        do_resize: !no_resize,
                    },
                    data.into(),
                )
                .await?;
            print_json(&serde_json::json!({
                "stored_path": uploaded.stored_path,
                "serving_url": uploaded.serving_url,
                "mime_type": uploaded.mime_type,
            }))?;
        }
        Commands::Compress {
            dry_run,
            owner_type,
            chunk_size,
        } => {
            let service = CompressService::new(
                app.storage.clone(),
                app.store.clone(),
                app.config.compression_policy()?,
            );
            let coordinator =
                BatchCoordinator::new(app.config.batch.clone(), Arc::new(LogSink));
            let summary = service
                .compress_all(
                    &App::filter(owner_type),
                    chunk_size,
                    dry_run,
                    Some(&coordinator),
                )
                .await?;
            println!("{}", summary);
        }
        Commands::Refresh {
            dry_run,
            owner_type,
            chunk_size,
        } => {
            let reconciler = RefreshReconciler::new(
                app.storage.clone(),
                app.store.clone(),
                OwnerRegistry::new(),
            );
            let summary = reconciler
                .refresh_all(&App::filter(owner_type), chunk_size, dry_run)
                .await?;
            println!("{}", summary);
        }
        Commands::Dedup { dry_run } => {
            let report = DedupService::new(app.store.clone()).run(dry_run).await?;
            print_json(&serde_json::json!({
                "groups": report.groups.len(),
                "removed": report.removed,
                "remaining_groups": report.remaining_groups,
                "dry_run": report.dry_run,
            }))?;
            if !report.clean() {
                anyhow::bail!("duplicate groups remain, re-run dedup");
            }
        }
        Commands::Size {
            action,
            name,
            dry_run,
            force,
            chunk_size,
        } => {
            let manager = NamedSizeManager::new(
                app.store.clone(),
                app.variants(),
                app.config.size_specs()?,
                app.config.compression_policy()?,
            );
            let summary = manager
                .apply(action.into(), &name, chunk_size, dry_run, force)
                .await?;
            println!("{}", summary);
        }
        Commands::Stats { min_size } => {
            let stats = AssetStats::new(app.store.clone(), min_size, Duration::from_secs(60));
            print_json(&serde_json::json!({
                "min_size": min_size,
                "oversized": stats.oversized_count().await?,
            }))?;
        }
        Commands::Resolve { .. } | Commands::Probe { .. } => unreachable!("handled above"),
    }

    Ok(())
}
