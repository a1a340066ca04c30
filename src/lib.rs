// plaque library - the pieces behind the terminal navigator
// Each module owns one concern; the ui module wires them together

pub mod browser;   // per-screen state and key transitions
pub mod config;    // settings, defaults, startup validation
pub mod library;   // artist/album directory layout
pub mod metadata;  // search queries and (optionally) Discogs rating
pub mod playback;  // external player hand-off and process probe
pub mod queue;     // the persistent queue file
pub mod resume;    // mpv watch_later markers
pub mod search;    // exact and bigram filtering
pub mod ui;        // terminal interface

// Export the stuff other modules actually use
pub use browser::{BrowserState, Mode, Navigator};
pub use config::Config;
pub use library::Library;
pub use queue::QueueStore;
pub use resume::ResumeTracker;
