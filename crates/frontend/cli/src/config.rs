use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Sleep to the nominal 59.73 Hz
    Realtime,
    /// Never sleep
    Unpaced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// None: realtime unless a replay is driving input
    pub pacing: Option<Pacing>,
    pub vblank_write_budget: usize,
    pub sprite_line_cap: usize,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    /// Directory of `<game>.sav` battery files; None keeps saves in memory
    pub nv_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            pacing: None,
            vblank_write_budget: 512,
            sprite_line_cap: 10,
            log_level: None,
            log_file: None,
            nv_dir: None,
        }
    }
}

impl HostConfig {
    /// `host.json` next to the executable
    pub fn config_path() -> PathBuf {
        let mut path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("host.json");
        path
    }

    /// Load a config file. A missing file gives the defaults silently, an
    /// unreadable or malformed one gives the defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("cannot read {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("failed to parse {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Pacing in effect, given whether a replay drives input
    pub fn effective_pacing(&self, replaying: bool) -> Pacing {
        self.pacing.unwrap_or(if replaying {
            Pacing::Unpaced
        } else {
            Pacing::Realtime
        })
    }

    /// Battery file for `game`, if saves go to disk
    pub fn save_path(&self, game: &str) -> Option<PathBuf> {
        self.nv_dir.as_ref().map(|dir| dir.join(format!("{}.sav", game)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: HostConfig =
            serde_json::from_str(r#"{"pacing": "unpaced", "sprite_line_cap": 40}"#).unwrap();
        assert_eq!(config.pacing, Some(Pacing::Unpaced));
        assert_eq!(config.sprite_line_cap, 40);
        assert_eq!(config.vblank_write_budget, 512);
        assert_eq!(config.nv_dir, None);
    }

    #[test]
    fn test_replay_defaults_to_unpaced() {
        let config = HostConfig::default();
        assert_eq!(config.effective_pacing(true), Pacing::Unpaced);
        assert_eq!(config.effective_pacing(false), Pacing::Realtime);

        let forced = HostConfig {
            pacing: Some(Pacing::Realtime),
            ..HostConfig::default()
        };
        assert_eq!(forced.effective_pacing(true), Pacing::Realtime);
    }

    #[test]
    fn test_save_path() {
        let config = HostConfig {
            nv_dir: Some(PathBuf::from("saves")),
            ..HostConfig::default()
        };
        assert_eq!(
            config.save_path("clicker"),
            Some(PathBuf::from("saves").join("clicker.sav"))
        );
        assert_eq!(HostConfig::default().save_path("clicker"), None);
    }
}
