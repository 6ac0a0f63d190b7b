//! basalt - restyle EPUB sections for display

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use basalt::blobs::MemoryBlobStore;
use basalt::prefs::{JsonPreferenceStore, PreferenceStore, StyleScope};
use basalt::{
    Appearance, NavigationTemplate, PipelineOptions, ReaimMode, SectionPipeline, TocIndex,
    read_epub,
};

#[derive(Parser)]
#[command(name = "basalt")]
#[command(version, about = "Restyle EPUB sections for display", long_about = None)]
#[command(after_help = "EXAMPLES:
    basalt -i book.epub                      Show book metadata and spine
    basalt book.epub out.html                Render the first linear section
    basalt -s 3 -a assets book.epub 3.html   Render section 3, writing its resources to assets/")]
struct Cli {
    /// Input EPUB
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output HTML file
    #[arg(value_name = "OUTPUT", required_unless_present = "info")]
    output: Option<PathBuf>,

    /// Show book metadata and spine without rendering
    #[arg(short, long)]
    info: bool,

    /// Spine index to render (default: first linear section)
    #[arg(short, long)]
    section: Option<usize>,

    /// Write stylesheets and media to this directory and link them from the output
    #[arg(short, long, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// Style preferences JSON file
    #[arg(short, long, value_name = "FILE")]
    prefs: Option<PathBuf>,

    /// Oldest Firefox version the output must support
    #[arg(long, default_value_t = basalt::css::DEFAULT_FIREFOX_VERSION)]
    firefox: u32,

    /// Only rewrite the first html/body selector of each rule
    #[arg(long)]
    first_occurrence: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = if cli.info {
        show_info(&cli.input)
    } else {
        render(&cli)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn show_info(path: &Path) -> basalt::Result<()> {
    let book = read_epub(path)?;
    let toc = TocIndex::build(&book)?;

    let meta = &book.metadata;
    println!("File: {}", path.display());
    println!("Title: {}", meta.title);
    if !meta.authors.is_empty() {
        println!("Authors: {}", meta.authors.join(", "));
    }
    if !meta.language.is_empty() {
        println!("Language: {}", meta.language);
    }
    if !meta.identifier.is_empty() {
        println!("Identifier: {}", meta.identifier);
    }
    println!("Resources: {}", book.resources.len());
    println!("TOC entries: {}", toc.len());
    println!("Spine:");
    for (i, item) in book.spine.iter().enumerate() {
        let linear = if item.linear { "" } else { " (non-linear)" };
        println!("  {i:>3}  {}{linear}", item.href);
    }
    Ok(())
}

fn render(cli: &Cli) -> basalt::Result<()> {
    let Some(output) = cli.output.as_deref() else {
        return Err(basalt::Error::Internal("no output file".to_string()));
    };
    let book = read_epub(&cli.input)?;
    let toc = TocIndex::build(&book)?;
    let template = NavigationTemplate::from_toc(&toc)?;
    let index = cli.section.or_else(|| book.first_linear()).unwrap_or(0);

    let style = match &cli.prefs {
        Some(path) => {
            let scope = StyleScope::Book(book.metadata.identifier.clone());
            JsonPreferenceStore::open(path)?.effective(&scope)?
        }
        None => Default::default(),
    };
    let options = PipelineOptions {
        reaim_mode: if cli.first_occurrence {
            ReaimMode::FirstOccurrence
        } else {
            ReaimMode::AllOccurrences
        },
        firefox_version: cli.firefox,
        appearance: Appearance {
            style,
            ..Appearance::default()
        },
    };

    let mut store = MemoryBlobStore::new();
    let prepared = SectionPipeline::new(&book, &toc, &template).prepare(index, &options, &mut store)?;

    let mut html = prepared.html;
    if let Some(dir) = &cli.assets {
        fs::create_dir_all(dir)?;
        // Longest URLs first so blob:basalt/1 never clobbers blob:basalt/12.
        let mut names: Vec<(&str, String)> = prepared
            .blobs
            .iter()
            .filter_map(|url| store.get(url).map(|(mime, _)| (url.as_str(), asset_name(url, mime))))
            .collect();
        names.sort_by_key(|(url, _)| std::cmp::Reverse(url.len()));

        for (url, name) in &names {
            let Some((mime, bytes)) = store.get(url) else {
                continue;
            };
            if mime == "text/css" {
                let mut css = String::from_utf8_lossy(bytes).into_owned();
                for (inner, inner_name) in &names {
                    css = css.replace(inner, inner_name);
                }
                fs::write(dir.join(name), css)?;
            } else {
                fs::write(dir.join(name), bytes)?;
            }
            html = html.replace(url, &dir.join(name).to_string_lossy());
        }
    }
    fs::write(output, html)?;

    log::info!(
        "rendered section {index} ({}) to {} with {} resources",
        prepared.writing_mode,
        output.display(),
        prepared.blobs.len()
    );
    Ok(())
}

fn asset_name(url: &str, mime: &str) -> String {
    let stem = url.rsplit('/').next().unwrap_or(url);
    let ext = match mime {
        "text/css" => "css",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        "font/woff" => "woff",
        "font/woff2" => "woff2",
        "font/ttf" => "ttf",
        "font/otf" => "otf",
        _ => "bin",
    };
    format!("{stem}.{ext}")
}
