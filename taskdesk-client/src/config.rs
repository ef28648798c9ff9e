use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(name = "taskdesk")]
pub struct ClientArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub server_host: String,
    #[arg(long, default_value_t = 8080)]
    pub server_port: u16,

    /// Override the data directory holding the documents and media folders.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Submit one task from the on-disk documents once the connection opens.
    #[arg(long, default_value_t = false)]
    pub start_task: bool,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub dirs: DataDirs,
}

impl ClientConfig {
    pub fn resolve(args: &ClientArgs) -> Result<Self, String> {
        let server_url = server_url(&args.server_host, args.server_port);
        Url::parse(&server_url).map_err(|err| format!("invalid server URL {server_url}: {err}"))?;

        let dirs = DataDirs::resolve(args.data_dir.clone());
        dirs.ensure_layout()
            .map_err(|err| format!("data directory setup failed: {err}"))?;
        Ok(Self { server_url, dirs })
    }
}

pub fn server_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}/ws")
}

/// On-disk layout: the configuration documents plus the staging folders
/// file references resolve against.
#[derive(Debug, Clone)]
pub struct DataDirs {
    root: PathBuf,
}

impl DataDirs {
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn resolve(override_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = override_dir {
            return Self::at(dir);
        }
        if let Some(dir) = std::env::var_os("TASKDESK_DATA_DIR") {
            return Self::at(PathBuf::from(dir));
        }

        let base = std::env::var_os("LOCALAPPDATA")
            .or_else(|| std::env::var_os("XDG_DATA_HOME"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::at(base.join("TaskDesk"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mailing and auto-responder media staged for embedding.
    pub fn photos(&self) -> PathBuf {
        self.root.join("photos")
    }

    /// Target base lists.
    pub fn bases(&self) -> PathBuf {
        self.root.join("bases")
    }

    /// Session files and photos for staged account submissions.
    pub fn accounts(&self) -> PathBuf {
        self.root.join("accounts")
    }

    /// Attachments staged from the chat window.
    pub fn user_media(&self) -> PathBuf {
        self.root.join("user_media")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn accounts_file(&self) -> PathBuf {
        self.root.join("account_data.json")
    }

    pub fn ensure_layout(&self) -> io::Result<()> {
        for dir in [
            self.root.clone(),
            self.photos(),
            self.bases(),
            self.accounts(),
            self.user_media(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Number of files staged in a folder.
    pub fn count_files(&self, dir: &Path) -> io::Result<usize> {
        Ok(std::fs::read_dir(dir)?.count())
    }

    /// Drop everything staged in the media folders.
    pub fn clear_staged_media(&self) -> io::Result<()> {
        for dir in [self.photos(), self.user_media()] {
            if !dir.exists() {
                continue;
            }
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                } else {
                    std::fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_url_targets_the_ws_endpoint() {
        assert_eq!(server_url("192.168.0.5", 9001), "ws://192.168.0.5:9001/ws");
    }

    #[test]
    fn layout_is_created_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = DataDirs::at(dir.path().join("data"));
        dirs.ensure_layout().unwrap();
        assert!(dirs.photos().is_dir());
        assert!(dirs.bases().is_dir());
        assert!(dirs.accounts().is_dir());
        assert!(dirs.user_media().is_dir());
    }

    #[test]
    fn clear_staged_media_empties_only_the_media_folders() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = DataDirs::at(dir.path().to_path_buf());
        dirs.ensure_layout().unwrap();
        std::fs::write(dirs.photos().join("a.jpg"), b"a").unwrap();
        std::fs::write(dirs.bases().join("base.txt"), b"b").unwrap();

        dirs.clear_staged_media().unwrap();
        assert_eq!(dirs.count_files(&dirs.photos()).unwrap(), 0);
        assert_eq!(dirs.count_files(&dirs.bases()).unwrap(), 1);
    }
}
