use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::KeyCode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings at {json_path}: {source}")]
    Parse {
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub enable: bool,
    pub disable_in_hideout: bool,
    pub debug: bool,
    pub silence_errors: bool,
    pub proximity: ProximitySettings,
    pub blade_flurry: ChannelSettings,
    pub scourge_arrow: ChannelSettings,
    pub blood_rage: BuffSkillSettings,
    pub steel_skin: BuffSkillSettings,
    pub immortal_call: BuffSkillSettings,
    pub molten_shell: BuffSkillSettings,
    pub vaal_molten_shell: VaalSkillSettings,
    pub phase_run: PhaseRunSettings,
    pub withering_step: MovementSkillSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enable: true,
            disable_in_hideout: true,
            debug: false,
            silence_errors: false,
            proximity: ProximitySettings::default(),
            blade_flurry: ChannelSettings::default(),
            scourge_arrow: ChannelSettings::default(),
            blood_rage: BuffSkillSettings {
                key: KeyCode::E,
                max_mp_percent: Some(100.0),
                ..BuffSkillSettings::default()
            },
            steel_skin: BuffSkillSettings {
                key: KeyCode::W,
                ..BuffSkillSettings::default()
            },
            immortal_call: BuffSkillSettings {
                key: KeyCode::R,
                ..BuffSkillSettings::default()
            },
            molten_shell: BuffSkillSettings {
                key: KeyCode::T,
                ..BuffSkillSettings::default()
            },
            vaal_molten_shell: VaalSkillSettings::default(),
            phase_run: PhaseRunSettings::default(),
            withering_step: MovementSkillSettings {
                key: KeyCode::G,
                ..MovementSkillSettings::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    pub require_min_count: bool,
    pub min_count: u32,
    pub max_distance: f32,
    pub magic_min_count: u32,
    pub rare_min_count: u32,
    pub unique_min_count: u32,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            require_min_count: false,
            min_count: 1,
            max_distance: 500.0,
            magic_min_count: 0,
            rare_min_count: 0,
            unique_min_count: 0,
        }
    }
}

/// Release settings for channelled skills that build charges while held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub enabled: bool,
    pub min_charges: u32,
    pub wait_for_infused: bool,
    pub use_left_click: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_charges: 6,
            wait_for_infused: false,
            use_left_click: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffSkillSettings {
    pub enabled: bool,
    pub key: KeyCode,
    pub max_hp_percent: f32,
    pub max_mp_percent: Option<f32>,
}

impl Default for BuffSkillSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            key: KeyCode::Q,
            max_hp_percent: 100.0,
            max_mp_percent: None,
        }
    }
}

/// Vaal Molten Shell reuses the Molten Shell HP ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaalSkillSettings {
    pub enabled: bool,
    pub key: KeyCode,
}

impl Default for VaalSkillSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            key: KeyCode::Q,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementSkillSettings {
    pub enabled: bool,
    pub key: KeyCode,
    pub max_hp_percent: f32,
    pub min_move_time_ms: u64,
}

impl Default for MovementSkillSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            key: KeyCode::F,
            max_hp_percent: 100.0,
            min_move_time_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseRunSettings {
    #[serde(flatten)]
    pub movement: MovementSkillSettings,
    /// Zero disables the Blade Vortex stack requirement.
    pub min_blade_vortex_stacks: u32,
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let distance = self.proximity.max_distance;
        if !distance.is_finite() || distance < 0.0 {
            return Err(ConfigError::Invalid {
                field: "proximity.max_distance",
                reason: format!("expected a finite non-negative distance, got {distance}"),
            });
        }

        let ceilings = [
            ("blood_rage.max_hp_percent", Some(self.blood_rage.max_hp_percent)),
            ("blood_rage.max_mp_percent", self.blood_rage.max_mp_percent),
            ("steel_skin.max_hp_percent", Some(self.steel_skin.max_hp_percent)),
            ("steel_skin.max_mp_percent", self.steel_skin.max_mp_percent),
            ("immortal_call.max_hp_percent", Some(self.immortal_call.max_hp_percent)),
            ("immortal_call.max_mp_percent", self.immortal_call.max_mp_percent),
            ("molten_shell.max_hp_percent", Some(self.molten_shell.max_hp_percent)),
            ("molten_shell.max_mp_percent", self.molten_shell.max_mp_percent),
            ("phase_run.max_hp_percent", Some(self.phase_run.movement.max_hp_percent)),
            ("withering_step.max_hp_percent", Some(self.withering_step.max_hp_percent)),
        ];
        for (field, value) in ceilings {
            if let Some(value) = value {
                if !(0.0..=100.0).contains(&value) {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: format!("expected a percentage in 0..=100, got {value}"),
                    });
                }
            }
        }
        Ok(())
    }
}

pub fn parse_settings(raw: &str) -> Result<EngineSettings, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let settings = match serde_path_to_error::deserialize::<_, EngineSettings>(&mut deserializer) {
        Ok(settings) => settings,
        Err(error) => {
            let path = error.path().to_string();
            let json_path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            return Err(ConfigError::Parse {
                json_path,
                source: error.into_inner(),
            });
        }
    };
    settings.validate()?;
    Ok(settings)
}

pub fn load_settings(path: &Path) -> Result<EngineSettings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&raw)
}
