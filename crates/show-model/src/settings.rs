//! Per-element playback settings and the master values they are scaled by.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::slot::SlotKey;

/// Settings applied to a surface before its first frame is shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSettings {
    /// Linear gain in `[0.0, 1.0]`.
    pub volume: f64,
    /// Opacity in `[0.0, 1.0]`.
    pub opacity: f64,
    /// Uniform scale factor, `1.0` = fit.
    pub scale: f64,
    /// Clockwise rotation in degrees, `[0, 360)`.
    pub rotation: f64,
    /// Playback rate, `1.0` = normal speed.
    pub speed: f64,
}

impl Default for ElementSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            opacity: 1.0,
            scale: 1.0,
            rotation: 0.0,
            speed: 1.0,
        }
    }
}

/// Show-wide values every element is combined with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterSettings {
    pub volume: f64,
    pub opacity: f64,
    pub scale: f64,
    pub rotation: f64,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            opacity: 1.0,
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

/// Personal settings per slot plus the master values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsManager {
    #[serde(default)]
    pub master: MasterSettings,

    #[serde(default)]
    pub personal: BTreeMap<SlotKey, ElementSettings>,
}

impl SettingsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn final_volume(&self, personal: f64) -> f64 {
        (personal * self.master.volume).clamp(0.0, 1.0)
    }

    pub fn final_opacity(&self, personal: f64) -> f64 {
        (personal * self.master.opacity).clamp(0.0, 1.0)
    }

    pub fn final_scale(&self, personal: f64) -> f64 {
        (personal * self.master.scale).max(0.0)
    }

    pub fn final_rotation(&self, personal: f64) -> f64 {
        (personal + self.master.rotation).rem_euclid(360.0)
    }

    /// Personal settings for a slot, defaulting when none were stored.
    pub fn personal(&self, key: &SlotKey) -> ElementSettings {
        self.personal.get(key).copied().unwrap_or_default()
    }

    pub fn set_personal(&mut self, key: SlotKey, settings: ElementSettings) {
        self.personal.insert(key, settings);
    }

    /// Drop the personal settings of a deleted slot.
    pub fn forget(&mut self, key: &SlotKey) {
        self.personal.remove(key);
    }

    /// Personal settings combined with the master values.
    pub fn resolve(&self, key: &SlotKey) -> ElementSettings {
        let p = self.personal(key);
        ElementSettings {
            volume: self.final_volume(p.volume),
            opacity: self.final_opacity(p.opacity),
            scale: self.final_scale(p.scale),
            rotation: self.final_rotation(p.rotation),
            speed: p.speed.max(0.0),
        }
    }
}

/// Source of resolved element settings for the engine.
pub trait SettingsSource: Send + Sync {
    fn final_settings(&self, key: &SlotKey) -> ElementSettings;
}

/// A [`SettingsManager`] behind a lock, editable while the show runs.
#[derive(Debug, Default)]
pub struct SharedSettings {
    inner: RwLock<SettingsManager>,
}

impl SharedSettings {
    pub fn new(manager: SettingsManager) -> Self {
        Self {
            inner: RwLock::new(manager),
        }
    }

    /// Apply an edit under the write lock.
    pub fn update<R>(&self, edit: impl FnOnce(&mut SettingsManager) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        edit(&mut guard)
    }

    pub fn snapshot(&self) -> SettingsManager {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SettingsSource for SharedSettings {
    fn final_settings(&self, key: &SlotKey) -> ElementSettings {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .resolve(key)
    }
}

impl SettingsSource for SettingsManager {
    fn final_settings(&self, key: &SlotKey) -> ElementSettings {
        self.resolve(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_values_combine_with_master() {
        let mut manager = SettingsManager::new();
        manager.master = MasterSettings {
            volume: 0.5,
            opacity: 0.8,
            scale: 2.0,
            rotation: 300.0,
        };
        assert!((manager.final_volume(0.8) - 0.4).abs() < 1e-9);
        assert!((manager.final_opacity(1.0) - 0.8).abs() < 1e-9);
        assert!((manager.final_scale(0.5) - 1.0).abs() < 1e-9);
        assert!((manager.final_rotation(90.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_uses_defaults_for_unknown_slot() {
        let manager = SettingsManager::new();
        assert_eq!(manager.resolve(&SlotKey::grid(9, 9)), ElementSettings::default());
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut manager = SettingsManager::new();
        manager.set_personal(
            SlotKey::grid(0, 0),
            ElementSettings {
                volume: 3.0,
                ..ElementSettings::default()
            },
        );
        assert_eq!(manager.resolve(&SlotKey::grid(0, 0)).volume, 1.0);
    }

    #[test]
    fn test_shared_settings_update() {
        let shared = SharedSettings::new(SettingsManager::new());
        shared.update(|m| m.master.volume = 0.25);
        assert!((shared.final_settings(&SlotKey::grid(0, 0)).volume - 0.25).abs() < 1e-9);
    }
}
