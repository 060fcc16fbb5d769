use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hymnal_catalog::aggregate::{aggregate_by_field, filter_groups, find_group, EntityField};
use hymnal_catalog::catalog::Catalog;
use hymnal_catalog::document::{generate_hymnal_pdf, GenerateOptions};
use hymnal_catalog::models::{non_empty, Hymn, HymnalReference};
use hymnal_catalog::progress::{create_spinner, format_duration, set_log_only, PhaseProgress};
use hymnal_catalog::related::related_hymns;
use hymnal_catalog::safety::validate_output_path;
use hymnal_catalog::scoring::SearchMode;
use hymnal_catalog::search::{search, search_with};
use hymnal_catalog::snapshot::write_snapshot;
use hymnal_catalog::store::{DirectoryStore, SqliteStore};

#[derive(Parser)]
#[command(name = "hymnal-catalog")]
#[command(about = "Search, browse and print a digitized hymnal catalog")]
struct Cli {
    /// Processed data directory (metadata/, hymnals/, hymns/)
    #[arg(long, global = true, default_value = "data/processed", conflicts_with = "snapshot")]
    data: PathBuf,

    /// Read from a packed SQLite snapshot instead of the data directory
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Worker threads for parallel loading (0 = one per core)
    #[arg(long, global = true, default_value = "0")]
    workers: usize,

    /// Hide progress bars and log progress lines instead
    #[arg(long, global = true)]
    log_only: bool,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List hymnals in catalog order
    Hymnals,
    /// List one hymnal's hymns, a page at a time
    Hymns {
        /// Hymnal ID or URL slug
        hymnal: String,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50")]
        page_size: usize,
    },
    /// Show one hymn by compound ID (e.g. SDAH-en-001)
    Hymn { id: String },
    /// Ranked free-text search
    Search {
        query: String,
        /// Restrict to one hymnal (ID or slug)
        #[arg(long)]
        hymnal: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Scoring: relevance or weighted (default depends on --hymnal)
        #[arg(long)]
        mode: Option<SearchMode>,
    },
    /// Grouped listing of authors, composers, tunes, meters or themes
    Browse {
        field: EntityField,
        /// Keep groups whose name contains this text
        #[arg(long)]
        filter: Option<String>,
        /// Show only the largest N groups
        #[arg(long)]
        top: Option<usize>,
        /// Show the hymns of one group
        #[arg(long)]
        group: Option<String>,
    },
    /// Hymns sharing a tune, composer, author or theme
    Related {
        id: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Render a hymnal to PDF
    Pdf {
        /// Hymnal ID or URL slug
        hymnal: String,
        /// Output file (default: {abbreviation}_{year}.pdf)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load every record once and report what resolved
    Warm,
    /// Pack the catalog into a SQLite snapshot
    Pack { output: PathBuf },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("HYMNAL_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn open_catalog(cli: &Cli) -> Result<Catalog> {
    if let Some(path) = &cli.snapshot {
        let store = SqliteStore::open(path)
            .with_context(|| format!("Failed to open snapshot {}", path.display()))?;
        let catalog = Catalog::new(store);
        info!("Reading {}", catalog.describe());
        return Ok(catalog);
    }
    if !cli.data.is_dir() {
        bail!("Data directory not found: {}", cli.data.display());
    }
    let catalog = Catalog::new(DirectoryStore::new(&cli.data));
    info!("Reading {}", catalog.describe());
    Ok(catalog)
}

/// Paths an output file must never overwrite or land inside.
fn protected_sources(cli: &Cli) -> (Vec<&Path>, Vec<&Path>) {
    match &cli.snapshot {
        Some(path) => (vec![path.as_path()], Vec::new()),
        None => (Vec::new(), vec![cli.data.as_path()]),
    }
}

/// Accepts either a hymnal ID or its URL slug.
fn resolve_hymnal(catalog: &Catalog, key: &str) -> Result<Arc<HymnalReference>> {
    catalog
        .hymnal_reference(key)
        .or_else(|_| catalog.hymnal_reference_by_slug(key))
        .with_context(|| format!("Unknown hymnal '{}'", key))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_hymn(hymn: &Hymn) {
    println!("{}. {}", hymn.number, hymn.title);
    let credits: Vec<String> = [
        ("Author", &hymn.author),
        ("Composer", &hymn.composer),
        ("Tune", &hymn.tune),
        ("Meter", &hymn.meter),
    ]
    .iter()
    .filter_map(|(label, value)| non_empty(value).map(|v| format!("{}: {}", label, v)))
    .collect();
    if !credits.is_empty() {
        println!("{}", credits.join(" \u{2022} "));
    }
    for verse in &hymn.verses {
        println!("\n{}. {}", verse.number, verse.text);
    }
    if let Some(chorus) = &hymn.chorus {
        println!("\nChorus: {}", chorus.text);
    }
    let meta = &hymn.metadata;
    if let Some(copyright) = non_empty(&meta.copyright) {
        println!("\nCopyright: {}", copyright);
    }
    if !meta.scripture_references.is_empty() {
        println!("Scripture: {}", meta.scripture_references.join(", "));
    }
    if !meta.themes.is_empty() {
        println!("Themes: {}", meta.themes.join(", "));
    }
}

#[derive(Serialize)]
struct GroupSummary<'a> {
    label: &'a str,
    count: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    set_log_only(cli.log_only);

    if cli.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let catalog = open_catalog(&cli)?;

    match &cli.command {
        Command::Hymnals => {
            let references = catalog.references();
            if cli.json {
                return print_json(&references.hymnals);
            }
            for h in &references.hymnals {
                let year = h.year.map(|y| y.to_string()).unwrap_or_default();
                println!("{:<8} {:>4} {:>5}  {} ({})", h.id, year, h.total_songs, h.name, h.url_slug);
            }
        }

        Command::Hymns {
            hymnal,
            page,
            page_size,
        } => {
            let reference = resolve_hymnal(&catalog, hymnal)?;
            let listing = catalog.hymnal_hymns(&reference.id, *page, *page_size)?;
            if cli.json {
                return print_json(&listing);
            }
            for hymn in &listing.hymns {
                println!("{:>4}. {}", hymn.number, hymn.title);
            }
            println!(
                "Page {} of {} ({} hymns in {})",
                page, listing.total_pages, listing.total, reference.name
            );
        }

        Command::Hymn { id } => {
            let hymn = catalog.hymn(id)?;
            if cli.json {
                return print_json(&hymn);
            }
            print_hymn(&hymn);
        }

        Command::Search {
            query,
            hymnal,
            limit,
            mode,
        } => {
            let scope = match hymnal {
                Some(key) => Some(resolve_hymnal(&catalog, key)?.id.clone()),
                None => None,
            };
            let hits = match mode {
                Some(mode) => search_with(&catalog, mode.strategy(), query, scope.as_deref(), *limit)?,
                None => search(&catalog, query, scope.as_deref(), *limit)?,
            };
            if cli.json {
                return print_json(&hits);
            }
            if hits.is_empty() {
                println!("No results found.");
            }
            for hit in &hits {
                println!(
                    "{:>5}  {:<6} #{:<4} {}  /{}/{}",
                    hit.score,
                    hit.hymnal.id,
                    hit.hymn.number,
                    hit.hymn.title,
                    hit.hymnal.url_slug,
                    hit.hymn.slug()
                );
            }
        }

        Command::Browse {
            field,
            filter,
            top,
            group,
        } => {
            let groups = aggregate_by_field(&catalog, *field)?;

            if let Some(label) = group {
                let Some(found) = find_group(&groups, *field, label) else {
                    bail!("No {} matching '{}'", field, label);
                };
                if cli.json {
                    return print_json(found);
                }
                println!("{} ({} hymns)", found.label, found.count);
                for entry in &found.hymns {
                    println!("  {:<6} #{:<4} {}", entry.hymnal.id, entry.hymn.number, entry.hymn.title);
                }
                return Ok(());
            }

            let mut shown = filter_groups(&groups, *field, filter.as_deref().unwrap_or(""));
            if let Some(n) = top {
                shown.truncate(*n);
            }
            if cli.json {
                let summary: Vec<GroupSummary> = shown
                    .iter()
                    .map(|g| GroupSummary {
                        label: &g.label,
                        count: g.count,
                    })
                    .collect();
                return print_json(&summary);
            }
            for g in &shown {
                println!("{:>5}  {}", g.count, g.label);
            }
            println!("{} of {} {} groups", shown.len(), groups.len(), field);
        }

        Command::Related { id, limit } => {
            let related = related_hymns(&catalog, id, *limit)?;
            if cli.json {
                return print_json(&related);
            }
            if related.is_empty() {
                println!("No related hymns found.");
            }
            for r in &related {
                println!(
                    "{:<28} {:<6} #{:<4} {}",
                    r.label, r.hymnal.id, r.hymn.number, r.hymn.title
                );
            }
        }

        Command::Pdf { hymnal, output } => {
            let start = Instant::now();
            let reference = resolve_hymnal(&catalog, hymnal)?;

            let spinner = create_spinner(&format!("Rendering {}", reference.name));
            let rendered = generate_hymnal_pdf(&catalog, &reference.id, &GenerateOptions::default())?;
            spinner.finish_and_clear();

            let output = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&rendered.filename));
            let (files, dirs) = protected_sources(&cli);
            validate_output_path(&output, "pdf", &files, &dirs)?;
            std::fs::write(&output, &rendered.bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            if cli.json {
                #[derive(Serialize)]
                struct PdfSummary<'a> {
                    output: &'a Path,
                    pages: usize,
                    bytes: usize,
                }
                return print_json(&PdfSummary {
                    output: &output,
                    pages: rendered.page_count,
                    bytes: rendered.bytes.len(),
                });
            }
            println!(
                "Wrote {} ({} pages, {:.1} KB) in {}",
                output.display(),
                rendered.page_count,
                rendered.bytes.len() as f64 / 1024.0,
                format_duration(start.elapsed())
            );
        }

        Command::Warm => {
            let progress = PhaseProgress::new("Warming cache", catalog.entry_count() as u64);
            let stats = catalog.warm(|| progress.tick());
            progress.finish(&format!("{} hymns loaded", stats.hymns));
            if cli.json {
                return print_json(&stats);
            }
            println!(
                "Hymnals: {}  Hymns: {}  Unresolvable: {}  Cached records: {}",
                stats.hymnals,
                stats.hymns,
                stats.missing,
                catalog.cache().len()
            );
        }

        Command::Pack { output } => {
            let (files, dirs) = protected_sources(&cli);
            validate_output_path(output, "sqlite3", &files, &dirs)?;

            let start = Instant::now();
            let progress = PhaseProgress::new("Packing snapshot", catalog.entry_count() as u64);
            let stats = write_snapshot(catalog.store(), output, || progress.tick())
                .with_context(|| format!("Failed to pack snapshot {}", output.display()))?;
            progress.finish(&format!("{} hymns packed", stats.hymns));

            if cli.json {
                return print_json(&stats);
            }
            let file_size = std::fs::metadata(output)?.len();
            println!("\n{:=<60}", "");
            println!("Snapshot complete!");
            println!("  Hymnals: {}", stats.hymnals);
            println!("  Hymns: {}", stats.hymns);
            println!("  Skipped: {}", stats.skipped);
            println!("  Output size: {:.2} MB", file_size as f64 / 1_048_576.0);
            println!("  Elapsed: {}", format_duration(start.elapsed()));
            println!("{:=<60}", "");
        }
    }

    Ok(())
}
