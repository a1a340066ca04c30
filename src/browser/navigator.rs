// State transitions that reach outside the BrowserState: entering modes
// (filesystem and queue reads), Enter/Cancel/mode-switch dispatch, and
// recovering when the library changes underneath a session.

use anyhow::{ensure, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::{AfterPlayback, BrowserState, Effect, Key, Mode};
use crate::library::{split_relpath, Library};
use crate::playback::probe::ProcessProbe;
use crate::queue::{QueueError, QueueStore};
use crate::resume::ResumeTracker;

/// The outcome of handling one key.
#[derive(Debug)]
pub struct Transition {
    pub state: BrowserState,
    pub effect: Effect,
}

impl Transition {
    fn stay(state: BrowserState) -> Self {
        Self {
            state,
            effect: Effect::None,
        }
    }

    fn to(state: BrowserState, effect: Effect) -> Self {
        Self { state, effect }
    }
}

/// Which screen to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Queue,
    Artists,
    Albums { artist: String, allow_back: bool },
}

pub struct Navigator {
    library: Library,
    queue: QueueStore,
    resume: ResumeTracker,
    probe: Box<dyn ProcessProbe + Send>,
    sample_size: usize,
    bigram_threshold: usize,
    first_queue: bool,
    next_generation: u64,
}

impl Navigator {
    pub fn new(
        library: Library,
        queue: QueueStore,
        resume: ResumeTracker,
        probe: Box<dyn ProcessProbe + Send>,
        sample_size: usize,
        bigram_threshold: usize,
    ) -> Self {
        Self {
            library,
            queue,
            resume,
            probe,
            sample_size,
            bigram_threshold,
            first_queue: true,
            next_generation: 0,
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn enter(&mut self, entry: Entry) -> Result<BrowserState> {
        match entry {
            Entry::Queue => self.enter_queue(),
            Entry::Artists => self.enter_artists(),
            Entry::Albums { artist, allow_back } => self.enter_albums(&artist, allow_back),
        }
    }

    /// A queue sample. The first queue of the process shows the interrupted
    /// album instead, if the player left one behind.
    pub fn enter_queue(&mut self) -> Result<BrowserState> {
        if self.first_queue {
            self.first_queue = false;
            if let Some(relpath) = self.resume.find_resumable() {
                info!("resuming: {}", relpath);
                return Ok(self.build(Mode::Queue, vec![relpath]));
            }
        }

        let items = match self.queue.sample(self.sample_size) {
            Ok(items) => items,
            Err(QueueError::OutOfRange {
                requested,
                available,
            }) => {
                warn!("queue holds {} entries, wanted {}", available, requested);
                self.queue.sample(available)?
            }
            Err(e) => return Err(e.into()),
        };
        self.library.audit(&items);

        Ok(self.build(Mode::Queue, items))
    }

    pub fn enter_artists(&mut self) -> Result<BrowserState> {
        let artists = self.library.artists()?;
        debug!("{} artists", artists.len());
        Ok(self.build(Mode::Artists, artists))
    }

    /// Albums of `artist`, flagged against the queue. Falls back to a fresh
    /// queue if the artist is gone.
    pub fn enter_albums(&mut self, artist: &str, allow_back: bool) -> Result<BrowserState> {
        if !self.library.is_dir(artist) {
            warn!("artist disappeared: {}", artist);
            return self.enter_queue();
        }

        let albums = self.library.albums(artist)?;
        let queued: HashSet<String> = self.queue.read()?.into_iter().collect();
        let flags: HashMap<String, bool> = albums
            .iter()
            .map(|album| (album.clone(), queued.contains(album)))
            .collect();

        Ok(self
            .build(Mode::Albums, albums)
            .with_artist(artist)
            .with_queued(flags)
            .with_allow_back(allow_back))
    }

    /// A fresh queue if `state` is an Albums screen whose artist directory
    /// no longer exists.
    pub fn revalidate(&mut self, state: &BrowserState) -> Result<Option<BrowserState>> {
        if state.mode() != Mode::Albums {
            return Ok(None);
        }
        match state.artist() {
            Some(artist) if !self.library.is_dir(artist) => {
                warn!("artist disappeared: {}", artist);
                Ok(Some(self.enter_queue()?))
            }
            _ => Ok(None),
        }
    }

    pub fn on_key(&mut self, mut state: BrowserState, key: Key) -> Result<Transition> {
        if let Some(fresh) = self.revalidate(&state)? {
            return Ok(Transition::to(fresh, Effect::Clear));
        }

        match key {
            Key::Char(c) => {
                state.push_char(c);
            }
            Key::Backspace => state.backspace(),
            Key::DeleteWord => state.delete_word(),
            Key::Up => state.move_up(),
            Key::Down => state.move_down(),
            Key::PageUp => state.page_up(),
            Key::PageDown => state.page_down(),
            Key::SwitchMode => {
                if state.mode() == Mode::Queue && !self.probe.is_running() {
                    return Ok(Transition::to(self.enter_artists()?, Effect::Clear));
                }
            }
            Key::Cancel => {
                if state.allow_back() {
                    return Ok(Transition::to(self.enter_queue()?, Effect::Clear));
                }
                info!("quitting");
                return Ok(Transition::to(state, Effect::Quit));
            }
            Key::Enter => return self.select(state),
        }

        Ok(Transition::stay(state))
    }

    /// Where to continue once the player has exited.
    pub fn after_playback(&mut self, state: BrowserState, then: AfterPlayback) -> Result<Transition> {
        if then == AfterPlayback::FreshQueue {
            return Ok(Transition::to(self.enter_queue()?, Effect::Clear));
        }
        match self.revalidate(&state)? {
            Some(fresh) => Ok(Transition::to(fresh, Effect::Clear)),
            None => Ok(Transition::to(state, Effect::Clear)),
        }
    }

    fn select(&mut self, state: BrowserState) -> Result<Transition> {
        let Some(selected) = state.selected().map(str::to_string) else {
            return Ok(Transition::stay(state));
        };

        match state.mode() {
            Mode::Artists => Ok(Transition::to(
                self.enter_albums(&selected, false)?,
                Effect::Clear,
            )),
            Mode::Queue => self.detour(selected),
            Mode::Albums if self.probe.is_running() => self.enqueue(state, selected),
            Mode::Albums => Ok(Transition::to(
                state,
                Effect::Play {
                    relpath: selected,
                    then: AfterPlayback::FreshQueue,
                },
            )),
        }
    }

    // Queue -> Albums of the selected album's artist, playing the album.
    fn detour(&mut self, selected: String) -> Result<Transition> {
        let artist = match split_relpath(&selected) {
            Some((artist, album)) if !artist.is_empty() && !album.is_empty() => {
                if self.library.exists(&selected) {
                    Some(artist)
                } else {
                    warn!("not exist: {}", selected);
                    None
                }
            }
            _ => {
                warn!("not an artist/album path: {:?}", selected);
                None
            }
        };
        let Some(artist) = artist else {
            return self.drop_entry(&selected);
        };

        let mut albums = self.enter_albums(artist, true)?;
        // removed from the queue once playback finishes
        albums.mark_queued(&selected, false);

        Ok(Transition::to(
            albums,
            Effect::Play {
                relpath: selected,
                then: AfterPlayback::Stay,
            },
        ))
    }

    // A queue entry that cannot be played: forget it and resample.
    fn drop_entry(&mut self, selected: &str) -> Result<Transition> {
        if self.queue.contains(selected)? {
            self.queue.take(selected)?;
        }
        Ok(Transition::to(self.enter_queue()?, Effect::Clear))
    }

    // Another instance is playing: add the album to its queue and leave.
    fn enqueue(&mut self, state: BrowserState, selected: String) -> Result<Transition> {
        if !self.library.exists(&selected) {
            warn!("not exist: {}", selected);
        } else if self.queue.contains(&selected)? {
            info!("already queued: {}", selected);
        } else {
            let before = self.queue.len()?;
            self.queue.push(&selected)?;
            let after = self.queue.len()?;
            ensure!(
                after == before + 1,
                "queue grew from {} to {} entries while adding {}",
                before,
                after,
                selected
            );
        }
        Ok(Transition::to(state, Effect::Quit))
    }

    fn build(&mut self, mode: Mode, items: Vec<String>) -> BrowserState {
        self.next_generation += 1;
        BrowserState::new(mode, items, self.bigram_threshold).with_generation(self.next_generation)
    }
}
