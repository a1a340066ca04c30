// Navigation state: one BrowserState per screen (Queue, Artists, Albums).
//
// Everything here is pure: keystrokes that only touch the filter, cursor or
// viewport are handled on the state itself. Transitions that need the
// filesystem, the queue or the process table live in `navigator`.

pub mod navigator;

pub use navigator::{Navigator, Transition};

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::library::basename;
use crate::search::SearchIndex;

/// Rows taken by the input line and the pane margin.
const CHROME_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Queue,
    Artists,
    Albums,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Queue => "queue",
            Mode::Artists => "artists",
            Mode::Albums => "albums",
        };
        f.write_str(name)
    }
}

/// Keys the browser reacts to, already decoded from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    DeleteWord,
    Up,
    Down,
    PageUp,
    PageDown,
    SwitchMode,
    Cancel,
    Enter,
}

/// Where to go once the player exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterPlayback {
    /// Keep the state the transition produced.
    Stay,
    /// Replace it with a freshly sampled queue.
    FreshQueue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// The screen should be cleared before the next draw.
    Clear,
    Play {
        relpath: String,
        then: AfterPlayback,
    },
    Quit,
}

#[derive(Debug, Clone)]
pub struct BrowserState {
    mode: Mode,
    items: Vec<String>,
    queued: HashMap<String, bool>,
    filter: String,
    matches: Vec<usize>,
    cursor: usize,
    offset: usize,
    allow_back: bool,
    artist: Option<String>,

    width: u16,
    height: u16,
    sized: bool,

    search: SearchIndex,
    previews: HashMap<String, Vec<String>>,
    requested: HashSet<String>,
    generation: u64,
}

impl BrowserState {
    /// A state over `items` with everything matching. Albums mode searches
    /// basenames; the other modes search the items as shown.
    pub fn new(mode: Mode, items: Vec<String>, bigram_threshold: usize) -> Self {
        let haystack = match mode {
            Mode::Albums => items.iter().map(|item| basename(item).to_string()).collect(),
            Mode::Queue | Mode::Artists => items.clone(),
        };
        let matches = (0..items.len()).collect();

        Self {
            mode,
            items,
            queued: HashMap::new(),
            filter: String::new(),
            matches,
            cursor: 0,
            offset: 0,
            allow_back: false,
            artist: None,
            width: 0,
            height: 0,
            sized: false,
            search: SearchIndex::new(haystack, bigram_threshold),
            previews: HashMap::new(),
            requested: HashSet::new(),
            generation: 0,
        }
    }

    pub fn with_allow_back(mut self, allow_back: bool) -> Self {
        self.allow_back = allow_back;
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_queued(mut self, queued: HashMap<String, bool>) -> Self {
        self.queued = queued;
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn allow_back(&self) -> bool {
        self.allow_back
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn is_queued(&self, relpath: &str) -> bool {
        self.queued.get(relpath).copied().unwrap_or(false)
    }

    /// Whether any item of this state is in the queue. Only Albums states
    /// carry queue flags.
    pub fn any_queued(&self) -> bool {
        self.queued.values().any(|&q| q)
    }

    pub fn mark_queued(&mut self, relpath: &str, queued: bool) {
        self.queued.insert(relpath.to_string(), queued);
    }

    /// The item under the cursor.
    pub fn selected(&self) -> Option<&str> {
        self.matches
            .get(self.cursor)
            .and_then(|&idx| self.items.get(idx))
            .map(String::as_str)
    }

    pub fn search_mut(&mut self) -> &mut SearchIndex {
        &mut self.search
    }

    pub fn search(&self) -> &SearchIndex {
        &self.search
    }

    /// Visible list rows.
    pub fn rows(&self) -> usize {
        (self.height as usize).saturating_sub(CHROME_ROWS).max(1)
    }

    /// Indices into `matches` currently on screen.
    pub fn visible(&self) -> std::ops::Range<usize> {
        let start = self.offset.min(self.matches.len());
        let end = (start + self.rows()).min(self.matches.len());
        start..end
    }

    /// Append a printable character. Ignored once nothing matches, so the
    /// filter cannot grow into a dead end.
    pub fn push_char(&mut self, c: char) -> bool {
        if self.matches.is_empty() {
            return false;
        }
        self.filter.push(c);
        self.refilter();
        true
    }

    pub fn backspace(&mut self) {
        if self.filter.pop().is_some() {
            self.refilter();
        }
    }

    /// Drop the last word: trailing spaces first, then everything after the
    /// last remaining space.
    pub fn delete_word(&mut self) {
        let trimmed = self.filter.trim_end_matches(' ');
        let keep = trimmed.rfind(' ').map(|i| i + 1).unwrap_or(0);
        self.filter.truncate(keep);
        self.refilter();
    }

    pub fn move_up(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.cursor = match self.cursor {
            0 => self.matches.len() - 1,
            c => c - 1,
        };
        self.follow_cursor();
    }

    pub fn move_down(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.cursor = if self.cursor + 1 >= self.matches.len() {
            0
        } else {
            self.cursor + 1
        };
        self.follow_cursor();
    }

    pub fn page_up(&mut self) {
        self.offset = self.offset.saturating_sub(self.rows());
        self.cursor = self.offset;
    }

    pub fn page_down(&mut self) {
        let last = self.matches.len().saturating_sub(1);
        self.offset = (self.offset + self.rows()).min(last);
        self.cursor = self.offset;
    }

    /// Record new terminal dimensions. Returns whether the screen should be
    /// cleared: never on the first report for this state, afterwards only
    /// when the width changed.
    pub fn on_resize(&mut self, width: u16, height: u16) -> bool {
        let first = !self.sized;
        let clear = !first && width != self.width;
        self.sized = true;
        self.width = width;
        self.height = height;
        self.follow_cursor();
        clear
    }

    /// Apply the filter text to the search index. Cursor and viewport go
    /// back to the top.
    pub fn refilter(&mut self) {
        self.matches = self.search.matches(&self.filter);
        self.cursor = 0;
        self.offset = 0;
    }

    pub fn preview(&self, relpath: &str) -> Option<&[String]> {
        self.previews.get(relpath).map(Vec::as_slice)
    }

    /// Visible items whose previews have not been asked for yet. Each item
    /// is handed out once.
    pub fn take_preview_requests(&mut self) -> Vec<String> {
        let mut wanted = Vec::new();
        for pos in self.visible() {
            let item = &self.items[self.matches[pos]];
            if !self.previews.contains_key(item) && self.requested.insert(item.clone()) {
                wanted.push(item.clone());
            }
        }
        wanted
    }

    /// Store previews computed in the background. Results for an older
    /// state are dropped.
    pub fn set_previews(&mut self, generation: u64, previews: HashMap<String, Vec<String>>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.previews.extend(previews);
        true
    }

    fn follow_cursor(&mut self) {
        let rows = self.rows();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + rows {
            self.offset = self.cursor + 1 - rows;
        }
    }
}

impl Default for BrowserState {
    fn default() -> Self {
        Self::new(Mode::Queue, Vec::new(), usize::MAX)
    }
}
