//! Fetch and package driver.
//!
//! Walks the resolved download units in order, fetches every page of each
//! unit into its destination folder, and optionally packs finished folders
//! into `.cbz` archives. Requests are strictly sequential.

use crate::archive;
use crate::catalog::{Catalog, rate_limit};
use crate::console::Console;
use crate::disambiguation::{Arbiter, Release, RunChoice, describe_run, parse_run_choice};
use crate::error::DownloadError;
use crate::listing::{Mode, NO_VOLUME_LABEL};
use crate::progress::{PageProgress, download_label};
use crate::utils::{page_extension, sanitize, uniquify, zpad};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::BufRead;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A resolved release together with the names used on disk.
#[derive(Debug, Clone)]
pub struct DownloadUnit {
    pub release: Release,

    /// `c001`, `c010.5` or `Oneshot`.
    pub chapter_label: String,

    /// `v001`, or `vN-A` when the release has no volume.
    pub volume_label: String,

    /// ` [Group A & Group B]`, or empty when nobody is credited.
    pub credit: String,
}

impl DownloadUnit {
    pub fn new(release: Release) -> Self {
        let record = &release.record;
        let chapter_label = match record.chapter.as_deref() {
            Some(number) => sanitize(&format!("c{}", zpad(number))),
            None => "Oneshot".to_string(),
        };
        let volume_label = match record.volume.as_deref() {
            Some(volume) => sanitize(&format!("v{}", zpad(volume))),
            None => sanitize(&format!("v{}", NO_VOLUME_LABEL)),
        };
        let credit = match release.credit() {
            [] => String::new(),
            names => format!(" [{}]", sanitize(&names.join(" & "))),
        };

        Self {
            release,
            chapter_label,
            volume_label,
            credit,
        }
    }

    fn volume(&self) -> Option<&str> {
        self.release.record.volume.as_deref()
    }
}

/// Groups units into the folders they are written to.
///
/// Chapter mode gives every unit its own folder; volume mode shares one
/// folder between contiguous units of the same volume.
pub fn plan_batches(units: &[DownloadUnit], mode: Mode) -> Vec<Range<usize>> {
    let mut batches: Vec<Range<usize>> = Vec::new();

    for (i, unit) in units.iter().enumerate() {
        let extends_last = mode == Mode::Volumes
            && batches
                .last()
                .is_some_and(|last| units[last.end - 1].volume() == unit.volume());

        match batches.last_mut() {
            Some(last) if extends_last => last.end = i + 1,
            _ => batches.push(i..i + 1),
        }
    }

    batches
}

/// Writes one page to disk.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Downloads `url` into `dest`. Any error is treated as transient.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Streams pages over HTTP.
pub struct HttpPages {
    client: reqwest::Client,
}

impl HttpPages {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPages {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::BadStatus(status.as_u16()));
        }

        // The page only appears under `dest` once the whole body is on disk.
        let partial = partial_path(dest);
        match stream_to_file(response, &partial).await {
            Ok(()) => {
                tokio::fs::rename(&partial, dest).await?;
                Ok(())
            }
            Err(e) => {
                remove_if_exists(&partial).await?;
                Err(e)
            }
        }
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<(), DownloadError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

/// `dest` with `.part` appended to the full file name.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> Result<(), DownloadError> {
    if tokio::fs::try_exists(path).await? {
        tokio::fs::remove_file(path).await?;
    }
    Ok(())
}

/// Settings for one download run.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub output_directory: PathBuf,

    /// Manga title, already cleaned for use in paths.
    pub title: String,

    pub mode: Mode,
    pub archive: bool,
    pub data_saver: bool,
    pub page_delay_sec: f64,
    pub retry_backoff_sec: f64,
}

/// A page that failed twice and was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPage {
    pub chapter: String,
    pub page: usize,
    pub reason: String,
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub pages_downloaded: usize,
    pub skipped: Vec<SkippedPage>,

    /// Folders left on disk with loose pages.
    pub folders: Vec<PathBuf>,

    /// Archives written.
    pub archives: Vec<PathBuf>,
}

/// Position of a unit within the run, for the progress label.
struct UnitPosition {
    chapter: (usize, usize),
    volume: Option<(usize, usize)>,
}

/// Downloads units page by page.
pub struct Driver<'a, C: Catalog + ?Sized, F: PageFetcher + ?Sized> {
    catalog: &'a C,
    fetcher: &'a F,
    console: &'a Console,
    progress: PageProgress,
    options: DriverOptions,
}

impl<'a, C: Catalog + ?Sized, F: PageFetcher + ?Sized> Driver<'a, C, F> {
    pub fn new(
        catalog: &'a C,
        fetcher: &'a F,
        console: &'a Console,
        progress: PageProgress,
        options: DriverOptions,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            console,
            progress,
            options,
        }
    }

    /// Downloads every unit, in order.
    pub async fn run(&self, units: &[DownloadUnit]) -> Result<DownloadReport, DownloadError> {
        let title_dir = self.options.output_directory.join(&self.options.title);
        let batches = plan_batches(units, self.options.mode);
        let total_pages: u64 = units.iter().map(|u| u64::from(u.release.record.pages)).sum();

        let mut report = DownloadReport::default();
        let mut done = 0u64;

        for (batch_index, batch) in batches.iter().enumerate() {
            let batch_units = &units[batch.clone()];
            let first = &batch_units[0];
            let (start, end) = match self.options.mode {
                Mode::Chapters => (first.chapter_label.as_str(), first.credit.as_str()),
                Mode::Volumes => (first.volume_label.as_str(), ""),
            };

            let folder = self.open_folder(&title_dir, start, end).await?;

            for (unit_index, unit) in batch_units.iter().enumerate() {
                let position = match self.options.mode {
                    Mode::Chapters => UnitPosition {
                        chapter: (batch_index + 1, batches.len()),
                        volume: None,
                    },
                    Mode::Volumes => UnitPosition {
                        chapter: (unit_index + 1, batch_units.len()),
                        volume: Some((batch_index + 1, batches.len())),
                    },
                };
                self.download_unit(unit, &folder, &position, &mut done, total_pages, &mut report)
                    .await?;
            }

            if self.options.archive {
                let archive_path = uniquify(
                    &title_dir,
                    &format!("{} {}", self.options.title, start),
                    &format!("{}.cbz", end),
                );
                archive::pack_and_remove(&folder, &archive_path)?;
                report.archives.push(archive_path);
            } else {
                report.folders.push(folder);
            }
        }

        self.progress.finish();
        Ok(report)
    }

    /// Creates the folder for a batch: a fresh `tmp` when archiving,
    /// otherwise a uniquified `<start><end>`.
    async fn open_folder(&self, title_dir: &Path, start: &str, end: &str) -> Result<PathBuf, DownloadError> {
        let folder = if self.options.archive {
            let tmp = title_dir.join("tmp");
            if tokio::fs::try_exists(&tmp).await? {
                tokio::fs::remove_dir_all(&tmp).await?;
            }
            tmp
        } else {
            uniquify(title_dir, start, end)
        };

        tokio::fs::create_dir_all(&folder).await?;
        Ok(folder)
    }

    async fn download_unit(
        &self,
        unit: &DownloadUnit,
        folder: &Path,
        position: &UnitPosition,
        done: &mut u64,
        total_pages: u64,
        report: &mut DownloadReport,
    ) -> Result<(), DownloadError> {
        let record = &unit.release.record;
        let session = self.catalog.delivery_session(&record.id).await?;
        let urls = session.page_urls(self.options.data_saver);
        let volume_name = record.volume.as_deref().unwrap_or(NO_VOLUME_LABEL);

        for (i, url) in urls.iter().enumerate() {
            let page = i + 1;
            let label = download_label(
                (page, urls.len()),
                (record.display_number(), position.chapter.0, position.chapter.1),
                position.volume.map(|(index, count)| (volume_name, index, count)),
            );
            self.progress.update(*done, total_pages.max(*done + 1), label);

            let dest = self.page_path(unit, folder, page, url);
            match self.fetch_with_retry(url, &dest).await {
                Ok(()) => report.pages_downloaded += 1,
                Err(e) => {
                    self.progress.suspend(|| {
                        self.console
                            .warning(&format!("Skipping download of page {} - {}.", page, e))
                    });
                    report.skipped.push(SkippedPage {
                        chapter: record.display_number().to_string(),
                        page,
                        reason: e.to_string(),
                    });
                }
            }

            rate_limit(self.options.page_delay_sec).await;
            *done += 1;
        }

        Ok(())
    }

    /// `1.jpg` in chapter mode, `c001 p001 [Group].jpg` in volume mode.
    fn page_path(&self, unit: &DownloadUnit, folder: &Path, page: usize, url: &str) -> PathBuf {
        let ext = page_extension(url);
        match self.options.mode {
            Mode::Chapters => folder.join(format!("{}{}", page, ext)),
            Mode::Volumes => uniquify(
                folder,
                &unit.chapter_label,
                &format!(" p{}{}{}", zpad(&page.to_string()), unit.credit, ext),
            ),
        }
    }

    /// One silent retry after the backoff. A page that fails twice leaves
    /// nothing under `dest`.
    async fn fetch_with_retry(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        if self.fetcher.fetch(url, dest).await.is_ok() {
            return Ok(());
        }
        rate_limit(self.options.retry_backoff_sec).await;

        let result = self.fetcher.fetch(url, dest).await;
        if result.is_err() {
            remove_if_exists(dest).await?;
        }
        result
    }
}

/// Asks on the terminal which releases of a run to keep.
pub struct TerminalArbiter<'a, R: BufRead> {
    console: &'a Console,
    input: R,
    progress: Option<PageProgress>,
}

impl<'a, R: BufRead> TerminalArbiter<'a, R> {
    pub fn new(console: &'a Console, input: R) -> Self {
        Self {
            console,
            input,
            progress: None,
        }
    }

    /// Clears `progress` while a question is on screen.
    pub fn with_progress(mut self, progress: PageProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    fn ask(&mut self, run: &[Release]) -> Vec<usize> {
        let chapter = run
            .first()
            .map(|r| r.record.display_number().to_string())
            .unwrap_or_default();

        println!("Chapter {} has multiple entries:", chapter);
        for line in describe_run(run) {
            println!("{}", line);
        }

        loop {
            let answer = match self
                .console
                .prompt_from(&mut self.input, "Choose entries to download (e.g. 1, 3-4):")
            {
                Ok(Some(answer)) => answer,
                Ok(None) | Err(_) => return Vec::new(),
            };

            match parse_run_choice(run.len(), &answer) {
                RunChoice::Picked(indices) => return indices,
                RunChoice::Retry => self.console.warning("Undecipherable input. Try again."),
            }
        }
    }
}

impl<R: BufRead> Arbiter for TerminalArbiter<'_, R> {
    fn choose(&mut self, run: &[Release]) -> Vec<usize> {
        match self.progress.clone() {
            Some(progress) => progress.suspend(|| self.ask(run)),
            None => self.ask(run),
        }
    }
}
