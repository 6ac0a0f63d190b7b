//! The reader session: which book is open, which page is showing, and which
//! blob URLs are still needed.
//!
//! Every page change goes through [`Session::begin_render`] and
//! [`Session::commit_render`]. A render that is no longer the latest by the
//! time it is committed is thrown away, so a slow section can never replace
//! one the reader asked for later.

use std::io::Cursor;

use crate::blobs::{BlobStore, BlobTracker, JobId};
use crate::book::{Book, TocIndex};
use crate::css::{DEFAULT_FIREFOX_VERSION, ReaimMode};
use crate::epub::read_epub_from_reader;
use crate::error::{Error, Result};
use crate::inject::{Appearance, NavigationTemplate, Theme};
use crate::message::HostMessage;
use crate::pipeline::{PipelineOptions, SectionPipeline, prepare_host_page};
use crate::prefs::{PreferenceStore, StyleRecord, StyleScope};

/// Where rendered pages go. Implemented by the host.
pub trait DisplaySurface {
    /// Replace the displayed document, then scroll to `fragment` if given.
    fn display(&mut self, job: JobId, html: &str, fragment: Option<&str>) -> Result<()>;
    /// Scroll the displayed document without reloading it.
    fn scroll_to_fragment(&mut self, fragment: Option<&str>);
    fn clear(&mut self);
}

/// A document shown on a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shown {
    pub job: JobId,
    pub html: String,
    pub fragment: Option<String>,
}

/// [`DisplaySurface`] that records what it is asked to show.
#[derive(Debug, Default)]
pub struct MemorySurface {
    pub shown: Option<Shown>,
    /// Number of documents displayed so far.
    pub displays: usize,
    pub scrolls: Vec<Option<String>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySurface for MemorySurface {
    fn display(&mut self, job: JobId, html: &str, fragment: Option<&str>) -> Result<()> {
        self.shown = Some(Shown {
            job,
            html: html.to_string(),
            fragment: fragment.map(str::to_string),
        });
        self.displays += 1;
        Ok(())
    }

    fn scroll_to_fragment(&mut self, fragment: Option<&str>) {
        self.scrolls.push(fragment.map(str::to_string));
    }

    fn clear(&mut self) {
        self.shown = None;
    }
}

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Messages from any other origin are ignored.
    pub origin: String,
    pub firefox_version: u32,
    pub reaim_mode: ReaimMode,
    pub theme: Theme,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            origin: "basalt://reader".to_string(),
            firefox_version: DEFAULT_FIREFOX_VERSION,
            reaim_mode: ReaimMode::default(),
            theme: Theme::default(),
        }
    }
}

/// Markup of the pages that are not book sections.
#[derive(Debug, Clone)]
pub struct HostTemplates {
    pub library: String,
    pub style_editor: String,
}

impl Default for HostTemplates {
    fn default() -> Self {
        Self {
            library: concat!(
                "<!DOCTYPE html><html><head><title>Library</title></head>",
                "<body><h1>Library</h1><p>Open an EPUB to start reading.</p></body></html>"
            )
            .to_string(),
            style_editor: concat!(
                "<!DOCTYPE html><html><head><title>Style editor</title></head>",
                "<body><h1>Style editor</h1>",
                "<label>Font <input name=\"font\"></label>",
                "<label>Custom CSS <textarea name=\"customCssNoOverride\"></textarea></label>",
                "</body></html>"
            )
            .to_string(),
        }
    }
}

/// What the display surface shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Section(usize),
    Library,
    StyleEditor,
}

/// Identifies one call to [`Session::begin_render`]. Only the latest ticket
/// may be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RenderTicket(u64);

/// A rendered page waiting to be committed.
#[derive(Debug)]
#[must_use = "a pending render holds blob URLs until it is committed"]
pub struct PendingRender {
    ticket: RenderTicket,
    job: JobId,
    page: Page,
    /// Scope of the book a section page belongs to.
    book: Option<StyleScope>,
    html: String,
    fragment: Option<String>,
}

impl PendingRender {
    pub fn ticket(&self) -> RenderTicket {
        self.ticket
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

struct OpenBook {
    book: Book,
    toc: TocIndex,
    template: NavigationTemplate,
    scope: StyleScope,
}

impl OpenBook {
    fn new(book: Book) -> Result<Self> {
        if book.spine.is_empty() {
            return Err(Error::MalformedBook("book has no sections".to_string()));
        }
        let toc = TocIndex::build(&book)?;
        let template = NavigationTemplate::from_toc(&toc)?;
        let id = if book.metadata.identifier.is_empty() {
            book.metadata.title.clone()
        } else {
            book.metadata.identifier.clone()
        };
        Ok(Self {
            book,
            toc,
            template,
            scope: StyleScope::Book(id),
        })
    }
}

/// The reader.
pub struct Session<D: DisplaySurface, B: BlobStore, P: PreferenceStore> {
    config: SessionConfig,
    templates: HostTemplates,
    surface: D,
    store: B,
    prefs: P,
    open: Option<OpenBook>,
    /// The last closed book and the section it was closed on.
    closed: Option<(OpenBook, usize)>,
    page: Option<Page>,
    /// Book the visible section page was rendered from.
    page_book: Option<StyleScope>,
    section: Option<usize>,
    next_job: u64,
    latest_ticket: u64,
    visible: Option<JobId>,
    tracker: BlobTracker,
}

impl<D: DisplaySurface, B: BlobStore, P: PreferenceStore> Session<D, B, P> {
    pub fn new(config: SessionConfig, surface: D, store: B, prefs: P) -> Self {
        Self {
            config,
            templates: HostTemplates::default(),
            surface,
            store,
            prefs,
            open: None,
            closed: None,
            page: None,
            page_book: None,
            section: None,
            next_job: 0,
            latest_ticket: 0,
            visible: None,
            tracker: BlobTracker::new(),
        }
    }

    pub fn with_templates(mut self, templates: HostTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    pub fn tracker(&self) -> &BlobTracker {
        &self.tracker
    }

    pub fn book(&self) -> Option<&Book> {
        self.open.as_ref().map(|open| &open.book)
    }

    pub fn toc(&self) -> Option<&TocIndex> {
        self.open.as_ref().map(|open| &open.toc)
    }

    pub fn page(&self) -> Option<Page> {
        self.page
    }

    /// Section last shown for the open book.
    pub fn current_section(&self) -> Option<usize> {
        self.section
    }

    pub fn visible_job(&self) -> Option<JobId> {
        self.visible
    }

    /// Open `book` at its first linear section.
    ///
    /// A book whose sections are all non-linear opens at section 0. If the
    /// first section cannot be shown, the session keeps the book and page it
    /// had.
    pub fn open_book(&mut self, book: Book) -> Result<()> {
        let open = OpenBook::new(book)?;
        let first = open.book.first_linear().unwrap_or_else(|| {
            log::warn!("no linear section in the spine, opening section 0");
            0
        });
        log::debug!(
            "opening {:?} ({} sections, {} TOC entries)",
            open.book.metadata.title,
            open.book.spine.len(),
            open.toc.len()
        );
        self.show_book(open, first).map_err(|(_, e)| e)?;
        self.closed = None;
        Ok(())
    }

    /// Open an EPUB container held in memory.
    pub fn open_book_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        let book = read_epub_from_reader(Cursor::new(bytes))?;
        self.open_book(book)
    }

    /// Show section `index`. If that section of this book is already
    /// showing, only scroll.
    pub fn display_section(&mut self, index: usize, fragment: Option<&str>) -> Result<()> {
        let open = self.open.as_ref().ok_or_else(no_book)?;
        open.book.section(index)?;
        if self.page == Some(Page::Section(index))
            && self.page_book.as_ref() == Some(&open.scope)
        {
            self.surface.scroll_to_fragment(fragment);
            return Ok(());
        }
        self.render(Page::Section(index), fragment)
    }

    /// Show the next linear section. Does nothing on the last one.
    pub fn next_section(&mut self) -> Result<()> {
        let (open, current) = self.reading()?;
        match open.book.next_linear(current) {
            Some(next) => self.display_section(next, None),
            None => Ok(()),
        }
    }

    /// Show the previous linear section. Does nothing on the first one.
    pub fn prev_section(&mut self) -> Result<()> {
        let (open, current) = self.reading()?;
        match open.book.prev_linear(current) {
            Some(prev) => self.display_section(prev, None),
            None => Ok(()),
        }
    }

    /// Close the open book and clear the surface. Every blob URL of the
    /// session is revoked.
    pub fn close_book(&mut self) -> Result<()> {
        let open = self.open.take().ok_or_else(no_book)?;
        self.closed = self.section.take().map(|section| (open, section));
        self.latest_ticket += 1;
        self.page = None;
        self.page_book = None;
        self.visible = None;
        self.surface.clear();
        self.tracker.mark_visible(JobId(self.next_job));
        let revoked = self.tracker.sweep(&mut self.store);
        log::debug!("closed book, revoked {revoked} blob URLs");
        Ok(())
    }

    /// Reopen the last closed book where it was left. Does nothing if no
    /// book was closed.
    pub fn resume_book(&mut self) -> Result<()> {
        let Some((open, section)) = self.closed.take() else {
            log::warn!("no book to resume");
            return Ok(());
        };
        if let Err((failed, e)) = self.show_book(open, section) {
            self.closed = failed.map(|open| (open, section));
            return Err(e);
        }
        Ok(())
    }

    /// Switch between the style editor and the page it was opened from.
    pub fn toggle_style_editor(&mut self) -> Result<()> {
        if self.page == Some(Page::StyleEditor) {
            match (&self.open, self.section) {
                (Some(_), Some(section)) => self.render(Page::Section(section), None),
                _ => self.render(Page::Library, None),
            }
        } else {
            self.render(Page::StyleEditor, None)
        }
    }

    pub fn show_library(&mut self) -> Result<()> {
        self.render(Page::Library, None)
    }

    /// Save `record` under `scope` and re-render whatever is showing.
    pub fn update_style(&mut self, scope: &StyleScope, record: &StyleRecord) -> Result<()> {
        self.prefs.save(scope, record)?;
        match self.page {
            Some(page) => self.render(page, None),
            None => Ok(()),
        }
    }

    /// Dispatch a message received from `origin`. Messages from any origin
    /// but the session's own are dropped.
    pub fn handle_message(&mut self, message: HostMessage, origin: &str) -> Result<()> {
        if origin != self.config.origin {
            log::warn!("ignoring {} from {origin:?}", message.kind());
            return Ok(());
        }
        log::debug!("handling {}", message.kind());
        match message {
            HostMessage::BasaltDisplaySection { index, fragment } => {
                self.display_section(index, fragment.as_deref())
            }
            HostMessage::BasaltNextSection => self.next_section(),
            HostMessage::BasaltPrevSection => self.prev_section(),
            HostMessage::BasaltOpenBook { book } => self.open_book_bytes(book),
            HostMessage::BasaltCloseBook => self.close_book(),
            HostMessage::BasaltResumeBook => self.resume_book(),
            HostMessage::BasaltToggleStyleEditor => self.toggle_style_editor(),
            HostMessage::BasaltUpdateStyle { scope, style } => self.update_style(&scope, &style),
        }
    }

    /// Render `page` without showing it. Its blob URLs are tracked under a
    /// fresh job and the returned ticket supersedes every earlier one.
    pub fn begin_render(&mut self, page: Page, fragment: Option<&str>) -> Result<PendingRender> {
        self.latest_ticket += 1;
        let ticket = RenderTicket(self.latest_ticket);
        let job = JobId(self.next_job);
        self.next_job += 1;

        let appearance = Appearance {
            theme: self.config.theme.clone(),
            style: self.prefs.effective(&self.scope_of(page))?,
        };
        let book = match page {
            Page::Section(_) => self.open.as_ref().map(|open| open.scope.clone()),
            Page::Library | Page::StyleEditor => None,
        };
        let (html, blobs) = match page {
            Page::Section(index) => {
                let open = self.open.as_ref().ok_or_else(no_book)?;
                let options = PipelineOptions {
                    reaim_mode: self.config.reaim_mode,
                    firefox_version: self.config.firefox_version,
                    appearance,
                };
                let prepared = SectionPipeline::new(&open.book, &open.toc, &open.template)
                    .prepare(index, &options, &mut self.store)?;
                (prepared.html, prepared.blobs)
            }
            Page::Library | Page::StyleEditor => {
                let template = if page == Page::Library {
                    &self.templates.library
                } else {
                    &self.templates.style_editor
                };
                let prepared = prepare_host_page(template, &appearance, &mut self.store)?;
                (prepared.html, prepared.blobs)
            }
        };
        for url in blobs {
            self.tracker.track(job, url);
        }

        Ok(PendingRender {
            ticket,
            job,
            page,
            book,
            html,
            fragment: fragment.map(str::to_string),
        })
    }

    /// Show a pending render, unless a newer one has begun since.
    ///
    /// Returns whether it was shown. A superseded render's blob URLs are
    /// revoked right away. Once shown, every older job is done displaying
    /// and its URLs are revoked.
    pub fn commit_render(&mut self, pending: PendingRender) -> Result<bool> {
        if pending.ticket != RenderTicket(self.latest_ticket) {
            log::debug!("dropping superseded render of {:?}", pending.page);
            self.tracker.discard(pending.job, &mut self.store);
            return Ok(false);
        }
        if let Err(e) = self
            .surface
            .display(pending.job, &pending.html, pending.fragment.as_deref())
        {
            self.tracker.discard(pending.job, &mut self.store);
            return Err(e);
        }

        self.visible = Some(pending.job);
        self.page = Some(pending.page);
        self.page_book = pending.book;
        if let Page::Section(index) = pending.page {
            self.section = Some(index);
        }
        self.tracker.mark_visible(pending.job);
        let revoked = self.tracker.sweep(&mut self.store);
        log::debug!(
            "showing {:?} as job {}, revoked {revoked} blob URLs",
            pending.page,
            pending.job.0
        );
        Ok(true)
    }

    fn render(&mut self, page: Page, fragment: Option<&str>) -> Result<()> {
        let pending = self.begin_render(page, fragment)?;
        self.commit_render(pending)?;
        Ok(())
    }

    /// Make `open` the open book, showing `index`. On failure the previous
    /// book is put back and the one that failed is handed back.
    fn show_book(
        &mut self,
        open: OpenBook,
        index: usize,
    ) -> std::result::Result<(), (Option<OpenBook>, Error)> {
        let previous = self.open.replace(open);
        let shown = self
            .begin_render(Page::Section(index), None)
            .and_then(|pending| self.commit_render(pending));
        match shown {
            Ok(_) => Ok(()),
            Err(e) => {
                let failed = std::mem::replace(&mut self.open, previous);
                Err((failed, e))
            }
        }
    }

    fn scope_of(&self, page: Page) -> StyleScope {
        match (page, &self.open) {
            (Page::Library, _) => StyleScope::Library,
            (_, Some(open)) => open.scope.clone(),
            (_, None) => StyleScope::Global,
        }
    }

    /// The open book and the section being read.
    fn reading(&self) -> Result<(&OpenBook, usize)> {
        let open = self.open.as_ref().ok_or_else(no_book)?;
        let current = self
            .section
            .ok_or_else(|| Error::Internal("no section has been displayed".to_string()))?;
        Ok((open, current))
    }
}

fn no_book() -> Error {
    Error::Internal("no book is open".to_string())
}
