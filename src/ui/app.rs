use super::components::render_browser;
use super::{map_key, AppEvent, TerminalManager};
use crate::browser::navigator::Entry;
use crate::browser::{BrowserState, Effect, Navigator, Transition};
use crate::library::Library;
use crate::playback::{Outcome, Playback};
use crate::search::{BigramIndex, IndexCache};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[cfg(feature = "discogs")]
use crate::metadata::discogs::{Rater, StdioPrompt};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct App {
    terminal: TerminalManager,
    navigator: Navigator,
    playback: Playback,
    #[cfg(feature = "discogs")]
    rater: Option<Rater>,
    state: BrowserState,

    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    indexes: IndexCache,
    should_quit: bool,
}

impl App {
    pub fn new(mut navigator: Navigator, playback: Playback, start: Entry) -> Result<Self> {
        let state = navigator.enter(start)?;
        let terminal = TerminalManager::new()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            terminal,
            navigator,
            playback,
            #[cfg(feature = "discogs")]
            rater: None,
            state,
            events_tx,
            events_rx,
            indexes: IndexCache::new(),
            should_quit: false,
        };
        app.fit_state()?;
        Ok(app)
    }

    #[cfg(feature = "discogs")]
    pub fn with_rater(mut self, rater: Option<Rater>) -> Self {
        self.rater = rater;
        self
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("browsing {}", self.state.mode());

        while !self.should_quit {
            let state = &self.state;
            self.terminal.draw(|f| render_browser(f, state))?;

            self.spawn_background_work();

            if event::poll(POLL_INTERVAL)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if let Some(key) = map_key(key) {
                            let shown = self.state.generation();
                            let state = std::mem::take(&mut self.state);
                            let transition = self.navigator.on_key(state, key)?;
                            self.apply(transition, shown).await?;
                        }
                    }
                    Event::Resize(width, height) => {
                        if self.state.on_resize(width, height) {
                            self.terminal.clear()?;
                        }
                    }
                    _ => {}
                }
            }

            while let Ok(ev) = self.events_rx.try_recv() {
                self.handle_background(ev);
            }
        }

        info!("bye");
        Ok(())
    }

    /// Install the state a transition produced and carry out its effect.
    /// `shown` is the generation of the state on screen before the key.
    async fn apply(&mut self, transition: Transition, shown: u64) -> Result<()> {
        let Transition { state, effect } = transition;
        self.install(state, shown)?;

        match effect {
            Effect::None => {}
            Effect::Clear => self.terminal.clear()?,
            Effect::Quit => self.should_quit = true,
            Effect::Play { relpath, then } => {
                self.terminal.suspend()?;
                let outcome = self.playback.play(&relpath)?;

                match outcome {
                    Outcome::Resume => {
                        info!("exiting so the player can resume {}", relpath);
                        self.should_quit = true;
                        return Ok(());
                    }
                    Outcome::Completed => self.rate(&relpath).await,
                    Outcome::Failed => {}
                }

                self.terminal.resume()?;
                let shown = self.state.generation();
                let state = std::mem::take(&mut self.state);
                let next = self.navigator.after_playback(state, then)?;
                self.install(next.state, shown)?;
                if next.effect == Effect::Clear {
                    self.terminal.clear()?;
                }
            }
        }
        Ok(())
    }

    fn install(&mut self, state: BrowserState, shown: u64) -> Result<()> {
        let replaced = state.generation() != shown;
        self.state = state;
        if replaced {
            self.fit_state()?;
        }
        Ok(())
    }

    #[cfg(feature = "discogs")]
    async fn rate(&self, relpath: &str) {
        match &self.rater {
            Some(rater) => rater.after_album(relpath, &mut StdioPrompt).await,
            None => debug!("rating disabled"),
        }
    }

    #[cfg(not(feature = "discogs"))]
    async fn rate(&self, _relpath: &str) {}

    /// Feed a freshly built state the current terminal size. The first
    /// report never clears the screen.
    fn fit_state(&mut self) -> Result<()> {
        let (width, height) = self.terminal.size()?;
        self.state.on_resize(width, height);
        Ok(())
    }

    fn spawn_background_work(&mut self) {
        let wanted = self.state.take_preview_requests();
        if !wanted.is_empty() {
            spawn_previews(
                self.navigator.library().clone(),
                self.state.generation(),
                wanted,
                self.events_tx.clone(),
            );
        }

        if self.indexes.prepare(self.state.search_mut()) {
            let search = self.state.search();
            spawn_index(search.fingerprint(), search.corpus(), self.events_tx.clone());
        }
    }

    fn handle_background(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::Previews {
                generation,
                previews,
            } => {
                if !self.state.set_previews(generation, previews) {
                    debug!("dropping stale previews (generation {})", generation);
                }
            }
            AppEvent::IndexReady { fingerprint, index } => {
                let search = self.state.search_mut();
                search.attach_bigrams(fingerprint, Arc::clone(&index));
                debug!("search strategy: {:?}", search.strategy());
                self.indexes.ready(fingerprint, index);
            }
            AppEvent::IndexFailed { fingerprint } => {
                // stays on exact search; not retried for this corpus
                debug!("bigram index build failed for corpus {:x}", fingerprint);
                self.indexes.failed(fingerprint);
            }
        }
    }
}

fn spawn_previews(
    library: Library,
    generation: u64,
    relpaths: Vec<String>,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::task::spawn_blocking(move || {
        let previews = relpaths
            .into_iter()
            .map(|relpath| {
                let children = library.preview(&relpath).unwrap_or_default();
                (relpath, children)
            })
            .collect();
        let _ = tx.send(AppEvent::Previews {
            generation,
            previews,
        });
    });
}

fn spawn_index(fingerprint: u64, corpus: Arc<Vec<String>>, tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let started = std::time::Instant::now();
        let built = tokio::task::spawn_blocking(move || BigramIndex::build(corpus.as_slice())).await;
        let ev = match built {
            Ok(index) => {
                debug!(
                    "bigram index over {} items ({} shingles) in {:?}",
                    index.corpus_len(),
                    index.shingle_count(),
                    started.elapsed()
                );
                AppEvent::IndexReady {
                    fingerprint,
                    index: Arc::new(index),
                }
            }
            Err(_) => AppEvent::IndexFailed { fingerprint },
        };
        let _ = tx.send(ev);
    });
}
