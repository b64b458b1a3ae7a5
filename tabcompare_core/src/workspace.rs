use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tabcompare_common::{SessionId, SessionState, TabCompareError};
use tracing::{debug, info, warn};

/// One isolated comparison workspace
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    path: PathBuf,
    files: Vec<String>,
    state: SessionState,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Backing directory of the session
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of the input files copied so far, in copy order
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the session was allocated
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.created_at)
            .num_milliseconds()
    }

    /// Absolute paths of the copied input files
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|name| self.path.join(name)).collect()
    }

    /// Record that the comparison artifact has been written
    pub fn mark_rendered(&mut self) {
        self.state = SessionState::Rendered;
    }
}

/// Allocates, populates and destroys per-request session directories
///
/// Every session lives in `root/<uuid>`. The store holds no mutable state, so
/// it can be shared freely between concurrent requests.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TabCompareError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            TabCompareError::storage(format!("create workspace root {}", root.display()), e)
        })?;
        debug!("Workspace root ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_path(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.to_string())
    }

    pub fn exists(&self, id: &SessionId) -> bool {
        self.session_path(id).is_dir()
    }

    /// Allocate a fresh, empty session directory
    pub fn create_session(&self) -> Result<Session, TabCompareError> {
        let id = SessionId::new();
        let path = self.session_path(&id);

        // Non-recursive: an existing directory is never reused.
        fs::create_dir(&path).map_err(|e| {
            TabCompareError::storage(format!("create session {}", id), e)
        })?;

        info!("Created session {} at {}", id, path.display());

        Ok(Session {
            id,
            path,
            files: Vec::new(),
            state: SessionState::Created,
            created_at: Utc::now(),
        })
    }

    /// Copy both sources into the session under their base names
    ///
    /// Copies are attempted in order. When one fails, earlier copies stay in
    /// place and the session keeps its `Created` state; nothing is rolled back.
    pub fn copy_into(
        &self,
        session: &mut Session,
        sources: [&Path; 2],
    ) -> Result<Vec<PathBuf>, TabCompareError> {
        let mut copied = Vec::with_capacity(sources.len());

        for source in sources {
            let name = self.target_name(session, source)?;
            let dest = session.path.join(&name);

            debug!("Copying {} to {}", source.display(), dest.display());
            let bytes = fs::copy(source, &dest).map_err(|e| {
                warn!(
                    "Copy of {} into session {} failed: {}",
                    source.display(),
                    session.id,
                    e
                );
                TabCompareError::storage(format!("copy {}", source.display()), e)
            })?;
            debug!("Copied {} bytes into session {}", bytes, session.id);

            session.files.push(name);
            copied.push(dest);
        }

        session.state = SessionState::Populated;
        Ok(copied)
    }

    /// Recursively delete a session directory
    pub fn remove(&self, id: &SessionId) -> Result<(), TabCompareError> {
        let path = self.session_path(id);
        if !path.is_dir() {
            return Err(session_not_found(id));
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!("Removed session {}", id);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(session_not_found(id)),
            Err(e) => Err(TabCompareError::storage(format!("remove session {}", id), e)),
        }
    }

    /// Remove a session named by a caller-supplied string
    ///
    /// Anything that does not parse as a session id cannot name a session.
    pub fn remove_str(&self, id: &str) -> Result<SessionId, TabCompareError> {
        let parsed: SessionId = id
            .trim()
            .parse()
            .map_err(|_| TabCompareError::NotFound(format!("Session id {}", id)))?;
        self.remove(&parsed)?;
        Ok(parsed)
    }

    /// Remove sessions whose directory is older than `max_age`
    pub fn sweep_expired(&self, max_age: Duration) -> Result<Vec<SessionId>, TabCompareError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            TabCompareError::storage(format!("list workspace root {}", self.root.display()), e)
        })?;

        let now = SystemTime::now();
        let mut removed = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| TabCompareError::storage("list workspace root", e))?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|s| s.parse::<SessionId>().ok()) else {
                debug!("Skipping non-session entry {:?}", name);
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_dir() => metadata,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(TabCompareError::storage(format!("stat session {}", id), e))
                }
            };

            let modified = metadata
                .modified()
                .map_err(|e| TabCompareError::storage(format!("stat session {}", id), e))?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match self.remove(&id) {
                Ok(()) => removed.push(id),
                // Removed concurrently by its owner
                Err(TabCompareError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if !removed.is_empty() {
            info!("Swept {} expired session(s)", removed.len());
        }
        Ok(removed)
    }

    fn target_name(&self, session: &Session, source: &Path) -> Result<String, TabCompareError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                TabCompareError::Storage(format!("{} has no file name", source.display()))
            })?;

        if !session.files.contains(&name) {
            return Ok(name);
        }

        // Two inputs sharing a base name must not overwrite each other.
        let path = Path::new(&name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let renamed = match path.extension() {
            Some(ext) => format!("{}-{}.{}", stem, session.files.len() + 1, ext.to_string_lossy()),
            None => format!("{}-{}", stem, session.files.len() + 1),
        };
        Ok(renamed)
    }
}

fn session_not_found(id: &SessionId) -> TabCompareError {
    TabCompareError::NotFound(format!("Session id {}", id))
}
