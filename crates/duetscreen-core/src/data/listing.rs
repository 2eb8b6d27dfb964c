//! Directory listings shown by the panel (print jobs, macros, filaments)

use super::bounded::BoundedList;
use super::bounded_text;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest file name kept for a listing row
pub const MAX_ENTRY_NAME_LEN: usize = 48;

/// Which of the three listings a directory belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingKind {
    /// `0:/gcodes` and its subdirectories
    Jobs,
    /// `0:/macros`
    Macros,
    /// `0:/filaments`
    Filaments,
}

impl ListingKind {
    /// Root directory on the controller's SD card
    pub fn root_directory(&self) -> &'static str {
        match self {
            Self::Jobs => "0:/gcodes",
            Self::Macros => "0:/macros",
            Self::Filaments => "0:/filaments",
        }
    }

    /// Slot count for this listing
    pub fn capacity(&self) -> usize {
        match self {
            Self::Jobs => 64,
            Self::Macros => 32,
            Self::Filaments => 16,
        }
    }

    /// Pick the listing a requested directory feeds
    ///
    /// The volume prefix is optional (`/macros/sub` and `0:/macros/sub` both
    /// map to [`ListingKind::Macros`]).
    pub fn from_directory(dir: &str) -> Option<Self> {
        let path = match dir.split_once(':') {
            Some((_, rest)) => rest,
            None => dir,
        };
        let top = path.trim_start_matches('/').split('/').next()?;
        match top {
            "gcodes" => Some(Self::Jobs),
            "macros" => Some(Self::Macros),
            "filaments" => Some(Self::Filaments),
            _ => None,
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jobs => write!(f, "jobs"),
            Self::Macros => write!(f, "macros"),
            Self::Filaments => write!(f, "filaments"),
        }
    }
}

/// Row type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Folder,
    /// Placeholder row (no name or unrecognised type)
    Empty,
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub modified: Option<String>,
}

impl ListingEntry {
    /// Build an entry, truncating the name to [`MAX_ENTRY_NAME_LEN`]
    pub fn new(name: &str, kind: EntryKind) -> Self {
        let kind = if name.is_empty() { EntryKind::Empty } else { kind };
        Self {
            name: bounded_text(name, MAX_ENTRY_NAME_LEN),
            kind,
            size: None,
            modified: None,
        }
    }
}

/// A directory's contents as last fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub kind: ListingKind,
    /// Directory the entries came from (may be a subdirectory of the root)
    pub directory: String,
    pub entries: BoundedList<ListingEntry>,
    /// Set once the first successful fetch populated the listing
    pub fetched: bool,
}

impl Listing {
    pub fn new(kind: ListingKind) -> Self {
        Self {
            kind,
            directory: kind.root_directory().to_string(),
            entries: BoundedList::new(kind.capacity()),
            fetched: false,
        }
    }

    /// Drop every entry and repopulate from `entries`
    pub fn refresh<I>(&mut self, directory: &str, entries: I) -> usize
    where
        I: IntoIterator<Item = ListingEntry>,
    {
        self.directory = directory.to_string();
        let dropped = self.entries.replace_with(entries);
        self.fetched = true;
        dropped
    }
}

/// The three listings the panel keeps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listings {
    pub jobs: Listing,
    pub macros: Listing,
    pub filaments: Listing,
}

impl Listings {
    pub fn get(&self, kind: ListingKind) -> &Listing {
        match kind {
            ListingKind::Jobs => &self.jobs,
            ListingKind::Macros => &self.macros,
            ListingKind::Filaments => &self.filaments,
        }
    }

    pub fn get_mut(&mut self, kind: ListingKind) -> &mut Listing {
        match kind {
            ListingKind::Jobs => &mut self.jobs,
            ListingKind::Macros => &mut self.macros,
            ListingKind::Filaments => &mut self.filaments,
        }
    }
}

impl Default for Listings {
    fn default() -> Self {
        Self {
            jobs: Listing::new(ListingKind::Jobs),
            macros: Listing::new(ListingKind::Macros),
            filaments: Listing::new(ListingKind::Filaments),
        }
    }
}
