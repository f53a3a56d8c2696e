//! Status reconciliation: keeps one stats message on the platform in sync
//! with the latest report of every status kind.
//!
//! The game server sends each kind on its own cadence. Reports are cached per
//! kind and the whole display is re-rendered from the cache on every ingest,
//! so a `playtimes` update never wipes the player list. The display message
//! is edited in place when possible; if it has been deleted or cannot be
//! reached, a new one is posted and its id persisted.

use crate::config::ConfigStore;
use crate::display::{Display, Section, StatusKind};
use crate::platform::{MessageId, Platform};
use log::{debug, error, info, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Latest report received for one status kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub kind: StatusKind,
    pub raw_payload: String,
    pub rendered_title: String,
    pub rendered_body: String,
}

/// What happened to the display during one ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceSync {
    Edited(MessageId),
    Created(MessageId),
    /// No stats channel in the configuration.
    Unconfigured,
    /// Neither edit nor create succeeded; the next ingest tries again.
    Failed,
}

pub struct StatusReconciler {
    reports: HashMap<StatusKind, StatusReport>,
    playtime_limit: usize,
}

impl StatusReconciler {
    pub fn new(playtime_limit: usize) -> Self {
        Self {
            reports: HashMap::new(),
            playtime_limit,
        }
    }

    pub fn report(&self, kind: StatusKind) -> Option<&StatusReport> {
        self.reports.get(&kind)
    }

    /// Renders `raw` and replaces the cached report for `kind`.
    pub fn update(&mut self, kind: StatusKind, raw: &str) -> &StatusReport {
        let report = StatusReport {
            kind,
            raw_payload: raw.to_string(),
            rendered_title: kind.title().to_string(),
            rendered_body: kind.render(raw, self.playtime_limit),
        };
        match self.reports.entry(kind) {
            Entry::Occupied(mut entry) => {
                entry.insert(report);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(report),
        }
    }

    /// Builds the full display, one section per status kind. Kinds with no
    /// report yet render as if an empty payload had arrived.
    pub fn composite(&self) -> Display {
        let sections = StatusKind::ALL
            .iter()
            .map(|kind| match self.reports.get(kind) {
                Some(report) => Section {
                    title: report.rendered_title.clone(),
                    body: report.rendered_body.clone(),
                },
                None => Section {
                    title: kind.title().to_string(),
                    body: kind.render("", self.playtime_limit),
                },
            })
            .collect();

        Display::new(sections)
    }

    /// Caches a new report and pushes the merged display to the platform.
    ///
    /// Platform failures are logged and reported through the returned
    /// [`SurfaceSync`]; the cache update is kept either way.
    pub async fn ingest<P: Platform + ?Sized>(
        &mut self,
        kind: StatusKind,
        raw: &str,
        platform: &P,
        store: &mut ConfigStore,
    ) -> SurfaceSync {
        self.update(kind, raw);
        let display = self.composite();
        self.sync_surface(&display, platform, store).await
    }

    async fn sync_surface<P: Platform + ?Sized>(
        &self,
        display: &Display,
        platform: &P,
        store: &mut ConfigStore,
    ) -> SurfaceSync {
        let Some(surface) = store.surface() else {
            warn!("No stats channel configured, stats display not updated");
            return SurfaceSync::Unconfigured;
        };
        let channel = surface.channel_id;

        if let Some(message) = surface.message_id {
            let edited = match platform.fetch_message(channel, message).await {
                Ok(()) => platform.edit_display(channel, message, display).await,
                Err(e) => Err(e),
            };
            match edited {
                Ok(()) => {
                    debug!("Edited stats message {} in channel {}", message, channel);
                    return SurfaceSync::Edited(message);
                }
                Err(e) => warn!(
                    "Stats message {} in channel {} is unusable ({}), posting a new one",
                    message, channel, e
                ),
            }
        }

        match platform.send_display(channel, display).await {
            Ok(message) => {
                info!("Posted stats message {} in channel {}", message, channel);
                if let Err(e) = store.set_surface_message_id(Some(message)) {
                    error!("Failed to save stats message id {}: {}", message, e);
                }
                SurfaceSync::Created(message)
            }
            Err(e) => {
                error!("Could not post stats message in channel {}: {}", channel, e);
                SurfaceSync::Failed
            }
        }
    }
}
