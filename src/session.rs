use tracing::{debug, info, warn};

use crate::change::{ChangeOptions, ChangeRequest};
use crate::config::Config;
use crate::descriptors::{builtin_descriptors, PlaylistDescriptor, MONTH_PATTERN};
use crate::error::{ListenError, ListenExpectedError, Result};
use crate::families::FamilyRegistry;
use crate::generator::{GenerationReport, Generator};
use crate::library::{AlbumStore, Record};
use crate::tracker::DirtyTracker;

/// State of one invocation: the configured families and the playlists they need regenerated.
///
/// The host delivers notifications by calling [`ListenSession::record_changed`] for every stored
/// record and [`ListenSession::session_ending`] once before exiting.
pub struct ListenSession {
    config: Config,
    registry: FamilyRegistry,
    descriptors: Vec<PlaylistDescriptor>,
    tracker: DirtyTracker,
}

impl ListenSession {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_families(config, FamilyRegistry::builtin(), builtin_descriptors())
    }

    /// Build a session over custom families. Every descriptor needs a registered rule and a query
    /// that parses.
    pub fn with_families(config: Config, registry: FamilyRegistry, descriptors: Vec<PlaylistDescriptor>) -> Result<Self> {
        config.validate()?;
        registry.ensure_registered(&descriptors)?;
        for descriptor in &descriptors {
            descriptor.query().map_err(ListenExpectedError::from)?;
        }

        let tracker = DirtyTracker::new(descriptors.iter().cloned());
        Ok(ListenSession {
            config,
            registry,
            descriptors,
            tracker,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &FamilyRegistry {
        &self.registry
    }

    pub fn descriptors(&self) -> &[PlaylistDescriptor] {
        &self.descriptors
    }

    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    /// Parse the tokens of a membership command against the configured tag template.
    pub fn change_request(&self, tokens: &[String], options: ChangeOptions) -> Result<ChangeRequest> {
        ChangeRequest::today(tokens, options, self.config.change_policy(), &self.config.pl_tag_template, MONTH_PATTERN)
    }

    /// "Record changed" notification. A no-op unless automatic tracking is enabled.
    pub fn record_changed(&mut self, record: &Record) {
        if !self.config.auto {
            return;
        }
        if self.tracker.record_changed(record) {
            debug!("Scheduled smart playlist regeneration for the end of the session");
        }
    }

    /// "Session ending" notification: regenerate whatever the session's changes touched. Returns
    /// `None` when nothing was scheduled.
    pub fn session_ending(&mut self, store: &dyn AlbumStore) -> Result<Option<GenerationReport>> {
        if !self.tracker.needs_regeneration() {
            return Ok(None);
        }
        let dirty = self.tracker.drain();
        let report = Generator::from_config(store, &self.registry, &self.config).generate(&dirty)?;
        Ok(Some(report))
    }

    /// Close the session after a command ran: regenerate what its stored changes touched, hand the
    /// report to `on_report`, and escalate missing playlist files. The command's own error wins
    /// over a regeneration error.
    pub fn finish<T>(&mut self, store: &dyn AlbumStore, outcome: Result<T>, on_report: impl FnOnce(&GenerationReport)) -> Result<T> {
        let regenerated = match self.session_ending(store) {
            Ok(Some(report)) => {
                on_report(&report);
                report.ensure_complete()
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        match (outcome, regenerated) {
            (Err(e), Err(regen)) => {
                warn!("Playlist regeneration failed after the command failed: {}", regen);
                Err(e)
            }
            (outcome, regenerated) => regenerated.and(outcome),
        }
    }

    /// Regenerate families by hand: the ones named in `names`, or all of them when empty.
    pub fn regenerate(&mut self, store: &dyn AlbumStore, names: &[String]) -> Result<GenerationReport> {
        let descriptors = self.select(names)?;
        info!("Regenerating {} smart playlist families", descriptors.len());
        self.tracker.forget(&descriptors);
        Generator::from_config(store, &self.registry, &self.config).generate(&descriptors)
    }

    fn select(&self, names: &[String]) -> Result<Vec<PlaylistDescriptor>> {
        if names.is_empty() {
            return Ok(self.descriptors.clone());
        }
        names
            .iter()
            .map(|name| {
                self.descriptors
                    .iter()
                    .find(|d| &d.name == name)
                    .cloned()
                    .ok_or_else(|| ListenError::from(ListenExpectedError::UnknownFamily { name: name.clone() }))
            })
            .collect()
    }
}
