//! mangadl CLI - MangaDex chapter downloader.

use anyhow::{Context, anyhow};
use clap::Parser;
use mangadl::catalog::{Catalog, MangaDexClient, parse_manga_id};
use mangadl::config::Config;
use mangadl::console::Console;
use mangadl::disambiguation::{Disambiguator, PreferenceSet, SameChapterPolicy};
use mangadl::driver::{
    DownloadUnit, Driver, DriverOptions, HttpPages, TerminalArbiter, plan_batches,
};
use mangadl::error::Result;
use mangadl::listing::{Mode, fetch_listing};
use mangadl::progress::PageProgress;
use mangadl::selection::select;
use mangadl::utils::clean_title;
use std::io;
use std::path::PathBuf;

/// Download manga chapters from MangaDex.
#[derive(Parser, Debug)]
#[command(name = "mangadl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MangaDex title URL or manga id. Asked for when omitted.
    manga: Option<String>,

    /// Language code of the translation to download.
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Select and group by volumes instead of chapters.
    #[arg(short = 'v', long)]
    volumes: bool,

    /// Download the compressed data-saver images.
    #[arg(short = 'd', long)]
    data_saver: bool,

    /// Pack each chapter (or volume) into a .cbz archive.
    #[arg(short = 'a', long)]
    archive: bool,

    /// Output directory.
    #[arg(short = 'o', long)]
    outdir: Option<PathBuf>,

    /// What to do when several releases share a chapter number.
    #[arg(short = 's', long, value_enum)]
    same_chapter: Option<SameChapterPolicy>,

    /// Preferred scanlation groups, comma separated.
    #[arg(short = 'g', long)]
    groups: Option<String>,

    /// Preferred uploaders, comma separated. Checked before groups.
    #[arg(short = 'u', long)]
    users: Option<String>,

    /// Use this config file instead of the default one.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Overrides config values with the flags that were given.
    fn apply(&self, config: &mut Config) {
        if let Some(lang) = &self.lang {
            config.download.language = lang.clone();
        }
        if let Some(outdir) = &self.outdir {
            config.download.output_directory = outdir.clone();
        }
        if self.data_saver {
            config.download.data_saver = true;
        }
        if self.archive {
            config.download.archive = true;
        }
        if let Some(policy) = self.same_chapter {
            config.download.same_chapter = Some(policy);
        }
        if let Some(groups) = &self.groups {
            config.preferences.groups = PreferenceSet::parse_list(groups);
        }
        if let Some(users) = &self.users {
            config.preferences.users = PreferenceSet::parse_list(users);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    console.section(&format!("mangadl v{}", env!("CARGO_PKG_VERSION")));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let input = match &args.manga {
        Some(manga) => manga.clone(),
        None => console
            .prompt_nonempty("Enter manga URL or ID:")?
            .ok_or_else(|| anyhow!("No manga given"))?,
    };
    let manga_id = parse_manga_id(&input)?;

    let client =
        MangaDexClient::new(config.catalog.clone()).context("Failed to create HTTP client")?;
    let lang = config.download.language.clone();

    let uuid = client.resolve_id(&manga_id).await?;
    let title = client
        .title(&uuid, &lang)
        .await
        .context("Failed to fetch manga title")?;
    console.info(&format!("TITLE: {}", html_escape::decode_html_entities(&title)));

    // Chapter listing
    let mode = if args.volumes { Mode::Volumes } else { Mode::Chapters };
    let listing = match fetch_listing(&client, &uuid, &lang, mode).await {
        Ok(listing) => listing,
        Err(e) if e.is_nothing_to_download() => {
            console.warning("No chapters available to download!");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to fetch chapter list"),
    };

    println!("Available {}s:", mode.noun());
    println!("{}", listing.summary());

    let answer = console
        .prompt_nonempty(&format!("\nEnter {}(s) to download:", mode.noun()))?
        .ok_or_else(|| anyhow!("No selection given"))?;
    let selection = select(&listing, &answer);
    for skip in &selection.skipped {
        console.warning(&skip.to_string());
    }
    if selection.records.is_empty() {
        console.warning("Nothing selected.");
        return Ok(());
    }

    // Resolve releases sharing a chapter number
    let preferences = PreferenceSet::new(
        config.preferences.users.clone(),
        config.preferences.groups.clone(),
    );
    let policy = config.same_chapter_policy(mode == Mode::Volumes);

    console.step("Preparing...");
    let preparing = PageProgress::new(selection.records.len() as u64);
    let releases = {
        let bar = preparing.clone();
        let mut disambiguator = Disambiguator::new(&client, &preferences, policy).on_progress(
            move |done, total| {
                bar.update(
                    done as u64,
                    total as u64,
                    format!("Preparing [{}/{}]", done, total),
                )
            },
        );
        let stdin = io::stdin();
        let mut arbiter =
            TerminalArbiter::new(&console, stdin.lock()).with_progress(preparing.clone());
        disambiguator
            .resolve(&selection.records, &mut arbiter)
            .await
            .context("Failed to look up release credits")?
    };
    preparing.finish();

    let units: Vec<DownloadUnit> = releases.into_iter().map(DownloadUnit::new).collect();
    if units.is_empty() {
        console.warning("Nothing to download.");
        return Ok(());
    }

    // Download
    let total_pages: u64 = units.iter().map(|u| u64::from(u.release.record.pages)).sum();
    let options = DriverOptions {
        output_directory: config.download.output_directory.clone(),
        title: clean_title(&title),
        mode,
        archive: config.download.archive,
        data_saver: config.download.data_saver,
        page_delay_sec: config.download.delay_between_pages_sec,
        retry_backoff_sec: config.download.retry_backoff_sec,
    };
    let pages = HttpPages::new(client.http().clone());

    console.step(&download_heading(&units, mode));
    let driver = Driver::new(&client, &pages, &console, PageProgress::new(total_pages), options);
    let report = driver.run(&units).await.context("Download failed")?;

    if !report.skipped.is_empty() {
        console.error(&format!("{} page(s) could not be downloaded", report.skipped.len()));
    }
    console.success(&format!(
        "Downloaded {} page(s)",
        console.count(report.pages_downloaded)
    ));
    for path in report.archives.iter().chain(&report.folders) {
        println!("  {}", console.muted(&path.display().to_string()));
    }
    console.section("Done.");
    Ok(())
}

/// `Downloading 3 volume(s)...`, counting volumes rather than chapters in
/// volume mode.
fn download_heading(units: &[DownloadUnit], mode: Mode) -> String {
    format!(
        "Downloading {} {}(s)...",
        plan_batches(units, mode).len(),
        mode.noun()
    )
}
