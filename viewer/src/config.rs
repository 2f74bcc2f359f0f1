use std::fs;
use std::path::{Path, PathBuf};

use anyhow::*;
use log::warn;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "viewer.toml";
pub const RES_DIR_ENV: &str = "DRONE_VIEWER_RES";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub position: [f32; 3],
    pub min_distance: f32,
    pub controls_enabled: bool,
    pub damping: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy: 70.0,
            znear: 0.2,
            zfar: 1000.0,
            position: [8.0, -15.0, 0.0],
            min_distance: 10.0,
            controls_enabled: false,
            damping: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub intensity: f32,
    pub luminance_threshold: f32,
    pub radius: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            intensity: 1.5,
            luminance_threshold: 0.1,
            radius: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    /// Edge length of the square shadow map in texels
    pub map_size: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            map_size: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub dataset_file: String,
    pub model_file: String,
    pub background_file: String,
    /// Base rotation of every model part, in degrees (XYZ)
    pub part_rotation: [f32; 3],
    pub part_scale: [f32; 3],
    pub camera: CameraConfig,
    pub bloom: BloomConfig,
    pub shadows: ShadowConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Drone Fleet".to_string(),
            width: 1400,
            height: 800,
            target_fps: 60,
            dataset_file: "data.json".to_string(),
            model_file: "drone.obj".to_string(),
            background_file: "bg.png".to_string(),
            part_rotation: [0.0, 0.0, 0.0],
            part_scale: [1.0, 1.0, 1.0],
            camera: CameraConfig::default(),
            bloom: BloomConfig::default(),
            shadows: ShadowConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Reads `viewer.toml` from `res_dir`. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(res_dir: P) -> Result<Self> {
        let path = res_dir.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            warn!("No {:?} found, using default configuration", path);
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("Couldn't open {:?}", path))?;
        Self::from_toml(&raw).with_context(|| format!("Couldn't deserialize {:?}", path))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: ViewerConfig = toml::from_str(raw)?;
        ensure!(config.target_fps > 0, "target_fps must be positive");
        Ok(config)
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.target_fps as f64)
    }
}

/// Resource directory: `$DRONE_VIEWER_RES` if set, otherwise the copy made by the build script.
pub fn res_dir() -> PathBuf {
    match std::env::var_os(RES_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => Path::new(env!("OUT_DIR")).join("res"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(ViewerConfig::from_toml("").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = ViewerConfig::from_toml(
            r#"
            target_fps = 30
            [camera]
            fovy = 50.0
            "#,
        )
        .unwrap();
        assert_eq!(config.target_fps, 30);
        assert_eq!(config.camera.fovy, 50.0);
        assert_eq!(config.camera.position, [8.0, -15.0, 0.0]);
        assert_eq!(config.bloom, BloomConfig::default());
    }

    #[test]
    fn shadows_can_be_switched_off() {
        let config = ViewerConfig::from_toml("[shadows]\nenabled = false\n").unwrap();
        assert_eq!(
            config.shadows,
            ShadowConfig {
                enabled: false,
                map_size: 2048,
            }
        );
    }

    #[test]
    fn zero_fps_is_rejected() {
        assert!(ViewerConfig::from_toml("target_fps = 0").is_err());
    }

    #[test]
    fn frame_interval_matches_rate() {
        let config = ViewerConfig::default();
        assert_eq!(config.frame_interval().as_micros(), 16_666);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ViewerConfig::load(dir.path()).unwrap(), ViewerConfig::default());
    }

    #[test]
    fn file_in_res_dir_is_read() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "title = \"Hangar\"\n[bloom]\nradius = 0.2\n").unwrap();
        let config = ViewerConfig::load(dir.path()).unwrap();
        assert_eq!(config.title, "Hangar");
        assert_eq!(config.bloom.radius, 0.2);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "target_fps = \"fast\"\n[camera\n").unwrap();
        let err = ViewerConfig::load(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(CONFIG_FILE));
    }
}
