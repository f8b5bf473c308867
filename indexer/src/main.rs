use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use jobrank_core::catalog::MemoryCatalog;
use jobrank_core::compose::Indexable;
use jobrank_core::config::EngineConfig;
use jobrank_core::maintainer::{IndexOutcome, RebuildProgress};
use jobrank_core::model::{CandidateRecord, JobRecord};
use jobrank_core::persist::{load_meta, save_meta, IndexPaths, MetaFile, SledStore};
use jobrank_core::search::{JobSearch, SearchRequest};
use jobrank_core::source::read_records;
use jobrank_core::{DocId, IndexKind, IndexMaintainer, IndexStore, Mode, RebuildReport};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect the BM25 job and candidate indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BuildArgs {
    /// Input path (JSON/JSONL file or a directory of them)
    #[arg(long)]
    input: PathBuf,
    /// Index root directory
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Truncate the index before rebuilding
    #[arg(long, default_value_t = false)]
    fresh: bool,
    /// Reindex only this record; fails if it has no indexable content
    #[arg(long)]
    id: Option<DocId>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the job index from job records
    Jobs(BuildArgs),
    /// Rebuild the candidate index from candidate records
    Candidates(BuildArgs),
    /// Print statistics for both indexes
    Stats {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
    },
    /// Run an ad-hoc job search against a built index
    Search {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Job records used for open-job filtering
        #[arg(long)]
        jobs: PathBuf,
        #[arg(long)]
        query: String,
        /// BM25 term frequency saturation
        #[arg(long)]
        k1: Option<f64>,
        /// BM25 length normalization
        #[arg(long)]
        b: Option<f64>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Jobs(args) => build::<JobRecord>(IndexKind::Job, args),
        Commands::Candidates(args) => build::<CandidateRecord>(IndexKind::Candidate, args),
        Commands::Stats { index } => stats(&index),
        Commands::Search { index, jobs, query, k1, b, page } => search(&index, &jobs, query, k1, b, page),
    }
}

fn build<R: Indexable + DeserializeOwned>(kind: IndexKind, args: BuildArgs) -> Result<()> {
    let records: Vec<R> = read_records(&args.input)
        .with_context(|| format!("reading {} records from {}", kind, args.input.display()))?;
    tracing::info!(%kind, records = records.len(), "loaded records");

    let paths = IndexPaths::new(&args.index);
    let store: Arc<dyn IndexStore> = Arc::new(SledStore::open(&paths, kind)?);
    let maintainer = IndexMaintainer::new(kind, store.clone());

    if let Some(id) = args.id {
        let Some(record) = records.iter().find(|r| r.document_id() == id) else {
            bail!("{kind} {id} not found in {}", args.input.display());
        };
        match maintainer.index(record, Mode::Explicit)? {
            IndexOutcome::Indexed { doc_length } => println!("indexed {kind} {id} ({doc_length} terms)"),
            IndexOutcome::Removed => println!("{kind} {id} is not eligible; removed from index"),
            IndexOutcome::NoContent => println!("{kind} {id} has no indexable content"),
        }
        store.flush()?;
        return Ok(());
    }

    let report = maintainer.rebuild(records, args.fresh, |p: &RebuildProgress| {
        tracing::trace!(processed = p.processed, indexed = p.indexed, skipped = p.skipped, "progress");
    })?;
    save_meta(&paths, &MetaFile::for_rebuild(&report, store.stats()?.documents))?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RebuildReport) {
    println!("{} index rebuilt{} in {} ms", report.kind, if report.fresh { " (fresh)" } else { "" }, report.elapsed_ms);
    println!("  processed:       {}", report.processed);
    println!("  indexed:         {}", report.indexed);
    println!("  removed:         {}", report.removed);
    println!("  skipped:         {}", report.skipped.len());
    for skipped in &report.skipped {
        println!("    {} {}: {}", report.kind, skipped.document_id, skipped.reason);
    }
    println!("  unique terms:    {}", report.unique_terms);
    println!("  avg doc length:  {:.2}", report.avg_doc_length);
}

fn stats(index: &Path) -> Result<()> {
    let paths = IndexPaths::new(index);
    for kind in [IndexKind::Job, IndexKind::Candidate] {
        if !paths.store(kind).exists() {
            println!("{kind}: no index");
            continue;
        }
        let store = SledStore::open(&paths, kind)?;
        let stats = store.stats()?;
        println!(
            "{kind}: {} documents, {} unique terms, avg length {:.2}",
            stats.documents,
            stats.unique_terms,
            stats.avg_doc_length()
        );
        if let Some(meta) = load_meta(&paths, kind)? {
            println!("  last rebuild {} (format v{})", meta.built_at, meta.version);
        }
    }
    Ok(())
}

fn search(index: &Path, jobs: &Path, query: String, k1: Option<f64>, b: Option<f64>, page: usize) -> Result<()> {
    let records: Vec<JobRecord> = read_records(jobs).with_context(|| format!("reading jobs from {}", jobs.display()))?;
    let catalog = Arc::new(MemoryCatalog::from_records(records, vec![], vec![]));
    let store = Arc::new(SledStore::open(&IndexPaths::new(index), IndexKind::Job)?);
    let config = EngineConfig::default().with_bm25_overrides(k1, b);
    let search = JobSearch::with_config(catalog, store, &config);

    let today = OffsetDateTime::now_utc().date();
    let results = search.search(&SearchRequest { query: query.clone(), page, ..Default::default() }, today)?;
    println!(
        "{:?} results for {:?}: page {}/{} of {} (k1={}, b={})",
        results.mode,
        query,
        results.page.current_page,
        results.page.last_page,
        results.page.total,
        search.params().k1(),
        search.params().b()
    );
    for hit in &results.page.items {
        match hit.score {
            Some(score) => println!("{:>10.4}  #{:<6} {}", score, hit.job.id, hit.job.title),
            None => println!("{:>10}  #{:<6} {}", "-", hit.job.id, hit.job.title),
        }
    }
    Ok(())
}
