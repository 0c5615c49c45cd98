use std::collections::BTreeSet;

use tracing::info;

use crate::change::{AlbumMods, ChangeRequest, FieldChange};
use crate::error::{ListenExpectedError, Result};
use crate::generator::GenerationReport;
use crate::library::{Album, AlbumStore, Record, SyncOptions};
use crate::orphans::{remove_orphans, Removal, RemovalReport};
use crate::query::parse_query_parts;
use crate::session::ListenSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Add,
    Remove,
}

/// An album with its pending modifications applied, and what they changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumChange {
    pub album: Album,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// No album matched, or no matched album needed a change.
    NothingToDo,
    /// The operator turned every change down.
    Declined,
    Stored { albums: usize },
}

/// The confirmation question for a request, e.g. `Really modify and write tags`.
pub fn confirm_prompt(request: &ChangeRequest) -> String {
    let extra = match (request.write(), request.move_files()) {
        (true, true) => ", move and write tags",
        (true, false) => " and write tags",
        (false, true) => " and move",
        (false, false) => "",
    };
    format!("Really modify{extra}")
}

/// Compute the modifications of `change` for every album the request selects, let `confirm`
/// narrow them down when the request asks for confirmation, then store what is left.
///
/// `confirm` receives the prompt and the changes and returns the changes to keep.
pub fn change_membership<F>(
    session: &mut ListenSession,
    store: &mut dyn AlbumStore,
    request: &ChangeRequest,
    change: MembershipChange,
    confirm: F,
) -> Result<ChangeOutcome>
where
    F: FnOnce(&str, Vec<AlbumChange>) -> Result<Vec<AlbumChange>>,
{
    let (query, sort) = parse_query_parts(request.query()).map_err(ListenExpectedError::from)?;
    let albums = store.albums(&query, &sort)?;
    info!("Modifying {} albums.", albums.len());

    let playlists = request.playlists();
    let separator = session.config().pl_tag_separator.clone();
    let mut changed = Vec::new();
    for mut album in albums {
        let mods = match change {
            MembershipChange::Add => AlbumMods::add(&album, &playlists, &separator),
            MembershipChange::Remove => AlbumMods::remove(&album, &playlists, &separator),
        };
        let changes = mods.apply(&mut album);
        if changes.is_empty() {
            continue;
        }
        info!("{}", album.logtext());
        for c in &changes {
            info!("  {}", c);
        }
        changed.push(AlbumChange { album, changes });
    }

    if changed.is_empty() {
        info!("No changes to make.");
        return Ok(ChangeOutcome::NothingToDo);
    }

    if request.confirm() {
        changed = confirm(&confirm_prompt(request), changed)?;
        if changed.is_empty() {
            return Ok(ChangeOutcome::Declined);
        }
    }

    let albums: Vec<Album> = changed.into_iter().map(|c| c.album).collect();
    store.store(
        &albums,
        SyncOptions {
            write: request.write(),
            move_files: request.move_files(),
        },
    )?;
    for album in &albums {
        session.record_changed(&Record::Album(album.clone()));
    }

    Ok(ChangeOutcome::Stored { albums: albums.len() })
}

pub fn add_membership<F>(session: &mut ListenSession, store: &mut dyn AlbumStore, request: &ChangeRequest, confirm: F) -> Result<ChangeOutcome>
where
    F: FnOnce(&str, Vec<AlbumChange>) -> Result<Vec<AlbumChange>>,
{
    change_membership(session, store, request, MembershipChange::Add, confirm)
}

pub fn remove_membership<F>(session: &mut ListenSession, store: &mut dyn AlbumStore, request: &ChangeRequest, confirm: F) -> Result<ChangeOutcome>
where
    F: FnOnce(&str, Vec<AlbumChange>) -> Result<Vec<AlbumChange>>,
{
    change_membership(session, store, request, MembershipChange::Remove, confirm)
}

/// Regenerate every family, or only the named ones.
pub fn regenerate(session: &mut ListenSession, store: &dyn AlbumStore, names: &[String]) -> Result<GenerationReport> {
    let report = session.regenerate(store, names)?;
    report.ensure_complete()?;
    Ok(report)
}

/// Regenerate every family, then delete the stale playlists the operator agrees to remove.
/// Playlists that should exist but do not are never touched.
pub fn prune<F>(session: &mut ListenSession, store: &dyn AlbumStore, removal: Removal, confirm: F) -> Result<(GenerationReport, Option<RemovalReport>)>
where
    F: FnOnce(&BTreeSet<String>) -> Result<bool>,
{
    let report = regenerate(session, store, &[])?;
    let stale = match &report.orphans {
        Some(orphans) if !orphans.stale.is_empty() => orphans.stale.clone(),
        _ => return Ok((report, None)),
    };
    if !confirm(&stale)? {
        return Ok((report, None));
    }
    let removed = remove_orphans(&session.config().playlist_dir, &stale, removal);
    Ok((report, Some(removed)))
}
