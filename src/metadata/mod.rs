// Turning an "artist/album" directory pair into a metadata search query.
//
// Directory names carry decorations the metadata service does not know
// about: a translated artist name in parentheses, a " (YYYY)" year suffix,
// and for classical recordings a " [performers]" suffix on the album.

#[cfg(feature = "discogs")]
pub mod discogs;

use unicode_normalization::UnicodeNormalization;

use crate::library::{album_year, split_relpath};

/// Length of a "(YYYY)" suffix.
const YEAR_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// The artist directory without a translation suffix.
    pub artist: String,
    /// Search text for the artist; includes performers for classical albums.
    pub search_artist: String,
    pub album: String,
    /// The album carried a "[performers]" suffix.
    pub classical: bool,
}

impl Query {
    /// Derive a query from a library-relative album path.
    pub fn from_relpath(relpath: &str) -> Option<Self> {
        let (artist, album) = split_relpath(relpath)?;
        let artist = strip_translation(artist);
        let album = strip_year(album);
        let classical = album.ends_with(']');

        let (search_artist, album) = if classical {
            move_performers_to_artist(artist, album)
        } else {
            (artist.to_string(), album.to_string())
        };

        Some(Self {
            artist: artist.to_string(),
            search_artist,
            album,
            classical,
        })
    }
}

/// "Artist (Translation)" -> "Artist".
pub fn strip_translation(artist: &str) -> &str {
    if !artist.ends_with(')') {
        return artist;
    }
    match artist.rfind('(') {
        Some(i) if i > 0 => artist[..i].trim_end(),
        _ => artist,
    }
}

/// "Album (1999)" -> "Album".
pub fn strip_year(album: &str) -> &str {
    if album_year(album).is_none() {
        return album;
    }
    album[..album.len() - YEAR_SUFFIX_LEN].trim_end()
}

/// ("a", "b [c]") -> ("a c", "b"). Albums without a bracketed suffix are
/// returned unchanged.
pub fn move_performers_to_artist(artist: &str, album: &str) -> (String, String) {
    match album.split_once(" [") {
        Some((title, performers)) => {
            let performers = performers.trim_end_matches(']');
            (format!("{} {}", artist, performers), title.to_string())
        }
        None => (artist.to_string(), album.to_string()),
    }
}

/// ASCII letters, digits and spaces only. Accents are stripped via
/// canonical decomposition; punctuation becomes a space and everything
/// else (symbols such as `$` or `+`, non-Latin letters) is dropped.
pub fn alnum(s: &str) -> String {
    s.nfd()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' {
                Some(c)
            } else if is_punctuation(c) {
                Some(' ')
            } else {
                None
            }
        })
        .collect()
}

/// Characters of the Unicode punctuation categories (P*) likely to show up
/// in directory names.
fn is_punctuation(c: char) -> bool {
    if c.is_ascii() {
        // ASCII symbols (category S*) are not punctuation
        return c.is_ascii_punctuation() && !matches!(c, '$' | '+' | '<' | '=' | '>' | '^' | '`' | '|' | '~');
    }
    matches!(
        c,
        '¡' | '§' | '«' | '¶' | '·' | '»' | '¿'
            | '\u{2010}'..='\u{2027}'
            | '\u{2030}'..='\u{2043}'
            | '\u{2045}'..='\u{2051}'
            | '\u{2053}'..='\u{205E}'
            | '\u{3001}'..='\u{3003}'
            | '\u{3008}'..='\u{3011}'
            | '\u{3014}'..='\u{301F}'
            | '\u{FF01}'..='\u{FF03}'
            | '\u{FF05}'..='\u{FF0A}'
            | '\u{FF0C}'..='\u{FF0F}'
    )
}
