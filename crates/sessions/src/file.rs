use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use {anyhow::Result, async_trait::async_trait};

use crate::{snapshot::SessionSnapshot, store::SessionStore};

/// One JSON file per session under `base_dir`.
///
/// Writes go to a temporary file that is then renamed over the old snapshot,
/// so a crash mid-save leaves the previous snapshot intact.
pub struct FileSessionStore {
    pub base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Sanitize a session id for use as a filename.
    pub fn id_to_filename(session_id: &str) -> String {
        session_id
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
                _ => '_',
            })
            .collect()
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", Self::id_to_filename(session_id)))
    }
}

fn write_atomically(dir: &Path, path: &Path, data: &[u8]) -> Result<()> {
    fs::create_dir_all(dir)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let dir = self.base_dir.clone();
        let path = self.path_for(&snapshot.session_id);
        let data = serde_json::to_vec_pretty(snapshot)?;

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &data)).await?
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(session_id);

        tokio::task::spawn_blocking(move || -> Result<Option<SessionSnapshot>> {
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            Ok(Some(serde_json::from_slice(&data)?))
        })
        .await?
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.path_for(session_id);

        tokio::task::spawn_blocking(move || -> Result<()> {
            match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
        .await?
    }
}
