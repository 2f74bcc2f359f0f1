use std::path::Path;

use anyhow::{Error, Result};
use log::{error, info};

use crate::model::Asset;
use crate::texture::Texture;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadStage {
    /// Nothing requested yet; frames show only the loading indicator
    Pending,
    Loading,
    Ready,
}

/// Counts finished items and reports progress through the log.
#[derive(Debug)]
pub struct LoadingManager {
    total: usize,
    loaded: usize,
    failed: usize,
}

impl LoadingManager {
    pub fn start(total: usize) -> Self {
        info!("Started loading {} items", total);
        Self {
            total,
            loaded: 0,
            failed: 0,
        }
    }

    pub fn item_loaded(&mut self, name: &str) {
        self.loaded += 1;
        info!("Loaded {}: {}% loaded", name, self.percent());
        if self.is_done() {
            info!("Loading complete");
        }
    }

    pub fn item_failed(&mut self, name: &str, err: &Error) {
        self.failed += 1;
        error!("There was an error loading {}: {:?}", name, err);
    }

    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        (self.loaded * 100 / self.total) as u32
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn is_done(&self) -> bool {
        self.loaded + self.failed >= self.total
    }
}

/// Loads the drone model. A failure is logged and leaves the scene without parts.
pub fn load_model(path: &Path, manager: &mut LoadingManager) -> Option<Asset> {
    match Asset::load(path) {
        Ok(asset) => {
            manager.item_loaded(&path.display().to_string());
            Some(asset)
        }
        Err(e) => {
            manager.item_failed(&path.display().to_string(), &e);
            None
        }
    }
}

/// Loads the sky texture, falling back to plain white.
pub fn load_background(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
    manager: &mut LoadingManager,
) -> Result<Texture> {
    match Texture::load(device, queue, path) {
        Ok(texture) => {
            manager.item_loaded(&path.display().to_string());
            Ok(texture)
        }
        Err(e) => {
            manager.item_failed(&path.display().to_string(), &e);
            Texture::solid(device, queue, [255, 255, 255, 255], "sky_fallback")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_counts_loaded_items() {
        let mut manager = LoadingManager::start(2);
        assert_eq!(manager.percent(), 0);
        manager.item_loaded("drone.obj");
        assert_eq!(manager.percent(), 50);
        assert!(!manager.is_done());
        manager.item_failed("bg.png", &anyhow::anyhow!("missing"));
        assert!(manager.is_done());
        assert_eq!(manager.failed(), 1);
        assert_eq!(manager.percent(), 50);
    }

    #[test]
    fn missing_model_is_not_fatal() {
        let mut manager = LoadingManager::start(1);
        assert!(load_model(Path::new("/nonexistent/drone.obj"), &mut manager).is_none());
        assert_eq!(manager.failed(), 1);
    }

    #[test]
    fn nothing_to_load_is_complete() {
        let manager = LoadingManager::start(0);
        assert!(manager.is_done());
        assert_eq!(manager.percent(), 100);
    }
}
