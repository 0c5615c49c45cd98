use crate::descriptors::{builtin_descriptors, PlaylistDescriptor, BY_MONTH, BY_YEAR};
use crate::library::{Album, Item, Record};
use crate::tracker::DirtyTracker;

fn album(id: i64, playlists: Option<&str>) -> Album {
    Album {
        id,
        albumartist: "Bass Man".to_string(),
        album: format!("Release {id}"),
        year: Some(2020),
        genre: "Rock".to_string(),
        playlists: playlists.map(str::to_string),
        listen: None,
        plays_nb: None,
    }
}

fn names(descriptors: &[PlaylistDescriptor]) -> Vec<&str> {
    descriptors.iter().map(|d| d.name.as_str()).collect()
}

#[test]
fn test_first_match_schedules_regeneration() {
    let mut tracker = DirtyTracker::new(builtin_descriptors());
    assert!(!tracker.needs_regeneration());

    assert!(tracker.album_changed(&album(1, Some("2024-05"))));
    assert!(tracker.needs_regeneration());
    assert_eq!(tracker.matched().len(), 2);
    assert!(tracker.pending().is_empty());

    // Later matches do not schedule again.
    assert!(!tracker.album_changed(&album(2, Some("2024-06"))));
    assert!(tracker.needs_regeneration());
}

#[test]
fn test_non_matching_album_is_ignored() {
    let mut tracker = DirtyTracker::new(builtin_descriptors());
    assert!(!tracker.album_changed(&album(1, None)));
    assert!(!tracker.album_changed(&album(2, Some(""))));
    assert!(!tracker.album_changed(&album(3, Some("someday"))));
    assert!(!tracker.needs_regeneration());
    assert_eq!(tracker.pending().len(), 2);
}

#[test]
fn test_family_matched_once() {
    // Only by_year matches a bare year tag, so by_month stays pending.
    let mut tracker = DirtyTracker::new(builtin_descriptors());
    assert!(tracker.album_changed(&album(1, Some("2024"))));
    assert_eq!(tracker.matched().iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec![BY_YEAR]);
    assert_eq!(tracker.pending().iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec![BY_MONTH]);

    // by_month joins the matched set later without rescheduling.
    assert!(!tracker.album_changed(&album(2, Some("2024-01"))));
    assert_eq!(tracker.matched().len(), 2);
}

#[test]
fn test_drain_happens_once() {
    let mut tracker = DirtyTracker::new(builtin_descriptors());
    tracker.album_changed(&album(1, Some("2024-05")));

    let drained = tracker.drain();
    assert_eq!(names(&drained), vec![BY_MONTH, BY_YEAR]);
    assert!(tracker.drain().is_empty());
    assert!(!tracker.needs_regeneration());
}

#[test]
fn test_item_changes_are_ignored() {
    let mut tracker = DirtyTracker::new(builtin_descriptors());
    let item = Item {
        id: 1,
        album_id: 1,
        disc: 1,
        track: 1,
        title: "Track 1".to_string(),
        path: "/music/2024-05.flac".into(),
    };
    assert!(!tracker.record_changed(&Record::Item(item)));
    assert!(!tracker.needs_regeneration());
    assert!(tracker.record_changed(&Record::Album(album(1, Some("2024-05")))));
}

#[test]
fn test_invalid_query_is_skipped() {
    let descriptors = vec![PlaylistDescriptor::new("broken", "playlists::["), PlaylistDescriptor::new(BY_YEAR, "playlists::[1-2][0-9]{3}")];
    let mut tracker = DirtyTracker::new(descriptors);
    assert!(tracker.album_changed(&album(1, Some("2024-05"))));
    assert_eq!(names(&tracker.drain()), vec![BY_YEAR]);
    assert_eq!(tracker.pending().len(), 1);
}

#[test]
fn test_forget() {
    let mut tracker = DirtyTracker::new(builtin_descriptors());
    tracker.album_changed(&album(1, Some("2024-05")));
    tracker.forget(&builtin_descriptors());
    assert!(!tracker.needs_regeneration());
    assert!(tracker.drain().is_empty());
    assert_eq!(tracker.pending().len(), 2);

    // Forgotten families can be matched again.
    assert!(!tracker.album_changed(&album(2, Some("2024-06"))));
    assert!(tracker.needs_regeneration());
    assert_eq!(names(&tracker.drain()), vec![BY_MONTH, BY_YEAR]);
}
