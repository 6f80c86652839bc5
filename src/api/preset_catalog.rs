use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::core::{PeriodPreset, builtin_fallback_preset, default_presets};
use crate::error::{ChartError, ChartResult};
use crate::extensions::PresetCatalogListener;

/// Read access to the current preset list.
///
/// Controllers and resolvers depend on this seam rather than on a global store.
pub trait PresetRepository {
    fn presets(&self) -> &[PeriodPreset];

    /// Bumped on every whole-list replacement.
    fn revision(&self) -> u64;

    fn find(&self, uid: &str) -> Option<&PeriodPreset> {
        find_matching_index(uid, self.presets()).map(|index| &self.presets()[index])
    }
}

/// Returns the index whose `uid` equals `target_uid`.
///
/// Matching is on identity only, never on name or duration.
#[must_use]
pub fn find_matching_index(target_uid: &str, candidates: &[PeriodPreset]) -> Option<usize> {
    candidates.iter().position(|preset| preset.uid == target_uid)
}

/// First candidate, or the built-in "Last 24 Hours" preset for an empty list.
#[must_use]
pub fn fallback_preset(candidates: &[PeriodPreset]) -> PeriodPreset {
    candidates
        .first()
        .cloned()
        .unwrap_or_else(builtin_fallback_preset)
}

/// Ordered list of user-editable period presets.
#[derive(Default)]
pub struct PeriodPresetCatalog {
    presets: Vec<PeriodPreset>,
    revision: u64,
    listeners: Vec<Box<dyn PresetCatalogListener>>,
}

impl PeriodPresetCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the built-in default preset set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog = Self::default();
        catalog.presets = default_presets();
        catalog.revision = 1;
        catalog
    }

    /// Replaces the entire list and notifies listeners.
    ///
    /// An empty list is stored as-is; callers substitute defaults first
    /// (see [`Self::set_presets_or_default`]).
    pub fn set_presets(&mut self, presets: Vec<PeriodPreset>) -> ChartResult<()> {
        let mut uids = IndexSet::with_capacity(presets.len());
        let mut validated = Vec::with_capacity(presets.len());
        for preset in presets {
            let preset = preset.validate()?;
            if !uids.insert(preset.uid.clone()) {
                return Err(ChartError::InvalidData(format!(
                    "duplicate preset uid `{}`",
                    preset.uid
                )));
            }
            validated.push(preset);
        }

        if validated.is_empty() {
            warn!("preset catalog replaced with an empty list");
        }

        self.presets = validated;
        self.revision += 1;
        debug!(
            revision = self.revision,
            count = self.presets.len(),
            "preset catalog replaced"
        );

        for listener in &mut self.listeners {
            listener.on_presets_replaced(self.revision, &self.presets);
        }
        Ok(())
    }

    /// Replaces the list, substituting the built-in set when `presets` is empty.
    pub fn set_presets_or_default(&mut self, presets: Vec<PeriodPreset>) -> ChartResult<()> {
        if presets.is_empty() {
            debug!("empty preset list received; using built-in defaults");
            return self.set_presets(default_presets());
        }
        self.set_presets(presets)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, uid: &str) -> Option<usize> {
        find_matching_index(uid, &self.presets)
    }

    #[must_use]
    pub fn fallback(&self) -> PeriodPreset {
        fallback_preset(&self.presets)
    }

    /// Registers a listener with unique identifier.
    pub fn register_listener(
        &mut self,
        listener: Box<dyn PresetCatalogListener>,
    ) -> ChartResult<()> {
        let listener_id = listener.id().to_owned();
        if listener_id.is_empty() {
            return Err(ChartError::InvalidData(
                "preset listener id must not be empty".to_owned(),
            ));
        }
        if self.listeners.iter().any(|entry| entry.id() == listener_id) {
            return Err(ChartError::InvalidData(format!(
                "preset listener with id `{listener_id}` is already registered"
            )));
        }
        self.listeners.push(listener);
        Ok(())
    }

    /// Unregisters a listener by id. Returns `true` when removed.
    pub fn unregister_listener(&mut self, listener_id: &str) -> bool {
        if let Some(position) = self
            .listeners
            .iter()
            .position(|entry| entry.id() == listener_id)
        {
            self.listeners.remove(position);
            return true;
        }
        false
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl PresetRepository for PeriodPresetCatalog {
    fn presets(&self) -> &[PeriodPreset] {
        &self.presets
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

impl PresetRepository for [PeriodPreset] {
    fn presets(&self) -> &[PeriodPreset] {
        self
    }

    fn revision(&self) -> u64 {
        0
    }
}

impl PresetRepository for Vec<PeriodPreset> {
    fn presets(&self) -> &[PeriodPreset] {
        self
    }

    fn revision(&self) -> u64 {
        0
    }
}
