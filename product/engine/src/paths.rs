use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_dir: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn scraper_config_path(&self) -> PathBuf {
        self.config_dir().join("scraper.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn request_log_path(&self) -> PathBuf {
        self.logs_dir().join("requests.jsonl")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.base_dir.join("static")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.static_dir())?;
        Ok(())
    }

    pub fn normalize_base_dir(base_dir: &Path) -> PathBuf {
        if base_dir.is_absolute() {
            return base_dir.to_path_buf();
        }
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(base_dir),
            Err(_) => base_dir.to_path_buf(),
        }
    }
}
