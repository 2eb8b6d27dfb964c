//! Tests for listing refreshes through the snapshot

use duetscreen_core::{EntryKind, ListingEntry, ListingKind, MachineSnapshot};
use proptest::prelude::*;

fn entries(names: &[String]) -> Vec<ListingEntry> {
    names
        .iter()
        .map(|n| ListingEntry::new(n, EntryKind::File))
        .collect()
}

#[test]
fn test_subdirectory_refresh_replaces_root() {
    let mut snapshot = MachineSnapshot::new();
    let jobs = snapshot.listings.get_mut(ListingKind::Jobs);
    jobs.refresh(
        "0:/gcodes",
        vec![
            ListingEntry::new("parts", EntryKind::Folder),
            ListingEntry::new("benchy.gcode", EntryKind::File),
        ],
    );
    jobs.refresh(
        "0:/gcodes/parts",
        vec![ListingEntry::new("bracket.gcode", EntryKind::File)],
    );

    let jobs = snapshot.listings.get(ListingKind::Jobs);
    assert_eq!(jobs.directory, "0:/gcodes/parts");
    assert_eq!(jobs.entries.len(), 1);
    assert_eq!(jobs.entries.get(0).unwrap().name, "bracket.gcode");
    assert!(!snapshot.listings.macros.fetched);
}

#[test]
fn test_overlong_name_truncated() {
    let name = "a".repeat(100);
    let entry = ListingEntry::new(&name, EntryKind::File);
    assert_eq!(entry.name.len(), duetscreen_core::data::MAX_ENTRY_NAME_LEN);
}

proptest! {
    #[test]
    fn prop_second_refresh_wins(
        first in proptest::collection::vec("[a-z]{1,12}", 0..40),
        second in proptest::collection::vec("[a-z]{1,12}", 0..40),
    ) {
        let mut snapshot = MachineSnapshot::new();
        let listing = snapshot.listings.get_mut(ListingKind::Filaments);
        let capacity = listing.entries.capacity();

        listing.refresh("0:/filaments", entries(&first));
        let dropped = listing.refresh("0:/filaments", entries(&second));

        let kept: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        let expected: Vec<&str> = second.iter().take(capacity).map(String::as_str).collect();
        prop_assert_eq!(kept, expected);
        prop_assert_eq!(dropped, second.len().saturating_sub(capacity));
    }
}
