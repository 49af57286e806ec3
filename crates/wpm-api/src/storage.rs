use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Extensions accepted for uploads, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Manages the on-disk content area for uploaded wallpapers.
///
/// Each wallpaper is a flat file at `{dir}/{filename}`, where the filename is
/// always generated server-side. No locking: names never collide, and a read
/// racing a delete simply finds nothing.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Wallpaper storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Write a new file. Never overwrites an existing one, and removes its
    /// own partial file if the write fails midway.
    pub async fn write_file(&self, filename: &str, data: &[u8]) -> Result<()> {
        let path = self.file_path(filename);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!("Partial file {} left behind: {}", filename, cleanup);
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        let path = self.file_path(filename);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted stored file {}", filename);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} already gone", filename);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Lower-cased extension of an uploaded file's name, if it is allowed.
pub fn allowed_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// `{owner_id}_{uuid}.{ext}`. Nothing user-supplied reaches the path except
/// the already whitelisted extension.
pub fn generate_filename(owner_id: i64, ext: &str) -> String {
    format!("{}_{}.{}", owner_id, Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("sunset.png").as_deref(), Some("png"));
        assert_eq!(allowed_extension("SUNSET.JPEG").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("a.b.WebP").as_deref(), Some("webp"));
        assert_eq!(allowed_extension("script.php"), None);
        assert_eq!(allowed_extension("noext"), None);
        assert_eq!(allowed_extension(".png"), None);
    }

    #[test]
    fn test_generated_filename_shape() {
        let name = generate_filename(7, "png");
        let rest = name.strip_prefix("7_").unwrap();
        let uuid = rest.strip_suffix(".png").unwrap();
        assert!(uuid.parse::<Uuid>().is_ok());
        assert_ne!(name, generate_filename(7, "png"));
    }

    #[tokio::test]
    async fn test_write_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("uploads")).await.unwrap();

        storage.write_file("1_a.png", b"img").await.unwrap();
        assert_eq!(fs::read(storage.file_path("1_a.png")).await.unwrap(), b"img");
        // a name clash fails without touching the existing file
        assert!(storage.write_file("1_a.png", b"other").await.is_err());
        assert_eq!(fs::read(storage.file_path("1_a.png")).await.unwrap(), b"img");

        storage.delete_file("1_a.png").await.unwrap();
        assert!(!storage.file_path("1_a.png").exists());
        // deleting again is tolerated
        storage.delete_file("1_a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("uploads")).await.unwrap();

        assert!(storage.write_file("missing/1_a.png", b"img").await.is_err());
        assert_eq!(std::fs::read_dir(storage.dir()).unwrap().count(), 0);
    }
}
