use chrono::NaiveDate;

use crate::change::*;
use crate::descriptors::MONTH_PATTERN;
use crate::error::{ListenError, ListenExpectedError};
use crate::library::Album;

fn tokens(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

fn may_2024() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
}

fn request(xs: &[&str]) -> ChangeRequest {
    ChangeRequest::new(&tokens(xs), ChangeOptions::default(), ChangePolicy::default(), "{0}-{1:>02}", MONTH_PATTERN, may_2024()).unwrap()
}

fn album(playlists: Option<&str>) -> Album {
    Album {
        id: 1,
        albumartist: "Techno Man".to_string(),
        album: "Release 1".to_string(),
        year: Some(2023),
        genre: "Techno".to_string(),
        playlists: playlists.map(str::to_string),
        listen: None,
        plays_nb: None,
    }
}

#[test]
fn test_explicit_tags_and_query() {
    let req = request(&["@2024-05", "genre:rock"]);
    assert_eq!(req.explicit_tags(), &["2024-05".to_string()]);
    assert_eq!(req.query(), &["genre:rock".to_string()]);
    assert_eq!(req.playlists(), vec!["2024-05"]);
}

#[test]
fn test_default_playlist_fallback() {
    let req = request(&["genre:rock"]);
    assert!(req.explicit_tags().is_empty());
    assert_eq!(req.playlists(), vec!["2024-05"]);
    assert_eq!(req.default_playlist(), "2024-05");
}

#[test]
fn test_malformed_tags_are_dropped() {
    let req = request(&["@2024-13", "@lala", "@2024-05x", "album:foo"]);
    assert!(req.explicit_tags().is_empty());
    assert_eq!(req.query(), &["album:foo".to_string()]);
    assert_eq!(req.playlists(), vec!["2024-05"]);
}

#[test]
fn test_tag_must_match_whole_pattern() {
    // A valid tag followed by extra text is not a tag, even though its prefix is.
    let req = request(&["@2024-05x", "@2024-051", "@2024-05"]);
    assert_eq!(req.explicit_tags(), &["2024-05".to_string()]);
    assert!(req.query().is_empty());
}

#[test]
fn test_duplicate_tags_collapse() {
    let req = request(&["@2024-05", "@2024-01", "@2024-05"]);
    assert_eq!(req.playlists(), vec!["2024-05", "2024-01"]);
    assert!(req.query().is_empty());
}

#[test]
fn test_invalid_tag_pattern() {
    let err = ChangeRequest::new(&tokens(&["@2024-05"]), ChangeOptions::default(), ChangePolicy::default(), "{0}-{1:>02}", "(unclosed", may_2024()).unwrap_err();
    assert!(matches!(err, ListenError::Expected(ListenExpectedError::InvalidTagPattern { .. })));
}

#[test]
fn test_invalid_template() {
    let err = ChangeRequest::new(&[], ChangeOptions::default(), ChangePolicy::default(), "{2}", MONTH_PATTERN, may_2024()).unwrap_err();
    assert!(matches!(err, ListenError::Expected(ListenExpectedError::InvalidConfigValue { ref key, .. }) if key == "pl_tag_template"));
}

#[test]
fn test_tri_state_options() {
    let policy = ChangePolicy {
        write: true,
        move_files: false,
        confirm: true,
    };
    let req = ChangeRequest::new(&[], ChangeOptions::default(), policy, "{0}-{1:>02}", MONTH_PATTERN, may_2024()).unwrap();
    assert!(req.write());
    assert!(!req.move_files());
    assert!(req.confirm());

    let options = ChangeOptions {
        write: Some(false),
        move_files: Some(true),
        confirm: Some(false),
    };
    let req = ChangeRequest::new(&[], options, policy, "{0}-{1:>02}", MONTH_PATTERN, may_2024()).unwrap();
    assert!(!req.write());
    assert!(req.move_files());
    assert!(!req.confirm());
}

#[test]
fn test_resolve() {
    assert!(resolve(None, true));
    assert!(!resolve(None, false));
    assert!(!resolve(Some(false), true));
    assert!(resolve(Some(true), false));
}

#[test]
fn test_format_tag_template() {
    assert_eq!(format_tag_template("{0}-{1:>02}", 2024, 5).unwrap(), "2024-05");
    assert_eq!(format_tag_template("{0}-{1:>02}", 2024, 11).unwrap(), "2024-11");
    assert_eq!(format_tag_template("{0}-{1:02}", 2024, 5).unwrap(), "2024-05");
    assert_eq!(format_tag_template("{0}/{1}", 2024, 5).unwrap(), "2024/5");
    assert_eq!(format_tag_template("{1:*^5}", 2024, 5).unwrap(), "**5**");
    assert_eq!(format_tag_template("{{{0}}}", 2024, 5).unwrap(), "{2024}");
    assert!(format_tag_template("{0", 2024, 5).is_err());
    assert!(format_tag_template("{0}}", 2024, 5).is_err());
    assert!(format_tag_template("{1:>x}", 2024, 5).is_err());
}

#[test]
fn test_add_mods() {
    let mods = AlbumMods::add(&album(Some("2024-04")), &tokens(&["2024-05"]), ",");
    assert_eq!(
        mods,
        AlbumMods {
            listen: true,
            playlists: "2024-04,2024-05".to_string(),
            plays_nb: 2,
        }
    );
}

#[test]
fn test_add_mods_sorts_and_dedupes() {
    let mods = AlbumMods::add(&album(Some("2024-05;2023-01")), &tokens(&["2024-05", "2024-02"]), ";");
    assert_eq!(mods.playlists, "2023-01;2024-02;2024-05");
    assert_eq!(mods.plays_nb, 3);
}

#[test]
fn test_add_mods_to_untagged_album() {
    let mods = AlbumMods::add(&album(None), &tokens(&["2024-05"]), ",");
    assert_eq!(mods.playlists, "2024-05");
    assert_eq!(mods.plays_nb, 1);
    assert!(mods.listen);
}

#[test]
fn test_remove_last_tag() {
    let mods = AlbumMods::remove(&album(Some("2024-04")), &tokens(&["2024-04"]), ",");
    assert_eq!(
        mods,
        AlbumMods {
            listen: false,
            playlists: String::new(),
            plays_nb: 0,
        }
    );
}

#[test]
fn test_remove_keeps_other_tags() {
    let mods = AlbumMods::remove(&album(Some("2024-04,2024-05")), &tokens(&["2024-04"]), ",");
    assert_eq!(mods.playlists, "2024-05");
    assert!(mods.listen);
    assert_eq!(mods.plays_nb, 1);
}

#[test]
fn test_apply_reports_changes() {
    let mut a = album(Some("2024-04"));
    let changes = AlbumMods::add(&a, &tokens(&["2024-05"]), ",").apply(&mut a);
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[0].to_string(), "playlists: 2024-04 -> 2024-04,2024-05");
    assert_eq!(a.playlists.as_deref(), Some("2024-04,2024-05"));
    assert_eq!(a.listen, Some(true));
    assert_eq!(a.plays_nb, Some(2));

    // Applying the same modification again is a no-op.
    let changes = AlbumMods::add(&a, &tokens(&["2024-05"]), ",").apply(&mut a);
    assert!(changes.is_empty());
}

#[test]
fn test_removing_from_untagged_album_changes_nothing() {
    let mut a = album(None);
    let changes = AlbumMods::remove(&a, &tokens(&["2024-05"]), ",").apply(&mut a);
    assert!(changes.is_empty());
    assert_eq!(a.playlists, None);
}

#[test]
fn test_split_tags() {
    assert!(split_tags("", ",").is_empty());
    assert_eq!(split_tags("2024-05,,2024-01", ",").into_iter().collect::<Vec<_>>(), vec!["2024-01", "2024-05"]);
}
