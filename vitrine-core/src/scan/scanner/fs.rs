use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Minimal, async-capable filesystem abstraction used by the scanner.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Check whether a path exists.
    async fn path_exists(&self, path: &Path) -> bool;

    /// Open a directory for iteration.
    async fn read_dir(
        &self,
        path: &Path,
    ) -> io::Result<Box<dyn ReadDirStream + Send>>;

    /// Fetch lightweight metadata without following symlinks.
    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata>;
}

/// Lightweight metadata needed by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    pub len: u64,
    /// Last modified time if available
    pub modified: Option<SystemTime>,
}

/// Async directory iterator (similar to tokio::fs::ReadDir).
#[async_trait]
pub trait ReadDirStream {
    /// Return next entry's path, or None when exhausted.
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>>;
}

/// Real filesystem implementation backed by tokio::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn path_exists(&self, path: &Path) -> bool {
        // try_exists avoids errors for permission issues by returning false
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_dir(
        &self,
        path: &Path,
    ) -> io::Result<Box<dyn ReadDirStream + Send>> {
        let rd = tokio::fs::read_dir(path).await?;
        Ok(Box::new(RealReadDir { inner: rd }))
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        let md = tokio::fs::symlink_metadata(path).await?;
        let file_type = md.file_type();
        Ok(FsMetadata {
            is_dir: file_type.is_dir(),
            is_file: file_type.is_file(),
            is_symlink: file_type.is_symlink(),
            len: md.len(),
            modified: md.modified().ok(),
        })
    }
}

struct RealReadDir {
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>> {
        Ok(self.inner.next_entry().await?.map(|entry| entry.path()))
    }
}

/// In-memory filesystem for tests.
/// Note: Paths are treated literally; callers should use consistent absolute paths.
#[derive(Default, Clone, Debug)]
pub struct InMemoryFs {
    nodes: HashMap<PathBuf, Node>,
    denied: HashSet<PathBuf>,
}

#[derive(Clone, Debug)]
enum Node {
    Dir { children: Vec<PathBuf> },
    File { len: u64, modified: Option<SystemTime> },
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        if self.nodes.contains_key(&path) {
            return;
        }
        self.ensure_parent_link(&path);
        self.nodes.insert(
            path,
            Node::Dir {
                children: Vec::new(),
            },
        );
    }

    pub fn add_file<P: Into<PathBuf>>(&mut self, path: P, len: u64) {
        let path = path.into();
        self.ensure_parent_link(&path);
        self.nodes.insert(
            path,
            Node::File {
                len,
                modified: Some(SystemTime::UNIX_EPOCH),
            },
        );
    }

    /// Make `read_dir` on `path` fail with `PermissionDenied`.
    pub fn deny<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        self.add_dir(path.clone());
        self.denied.insert(path);
    }

    fn ensure_parent_link(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !self.nodes.contains_key(parent) {
                self.nodes.insert(
                    parent.to_path_buf(),
                    Node::Dir {
                        children: Vec::new(),
                    },
                );
                self.ensure_parent_link(parent);
            }
            // Link child into parent
            if let Some(Node::Dir { children }) = self.nodes.get_mut(parent)
                && !children.iter().any(|p| p.as_path() == path)
            {
                children.push(path.to_path_buf());
            }
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn path_exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    async fn read_dir(
        &self,
        path: &Path,
    ) -> io::Result<Box<dyn ReadDirStream + Send>> {
        if self.denied.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("read_dir denied: {}", path.display()),
            ));
        }
        match self.nodes.get(path) {
            Some(Node::Dir { children }) => Ok(Box::new(InMemReadDir {
                queue: children.clone().into(),
            })),
            Some(Node::File { .. }) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("read_dir on file: {}", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("read_dir on missing path: {}", path.display()),
            )),
        }
    }

    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        match self.nodes.get(path) {
            Some(Node::Dir { .. }) => Ok(FsMetadata {
                is_dir: true,
                is_file: false,
                is_symlink: false,
                len: 0,
                modified: None,
            }),
            Some(Node::File { len, modified }) => Ok(FsMetadata {
                is_dir: false,
                is_file: true,
                is_symlink: false,
                len: *len,
                modified: *modified,
            }),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("metadata on missing path: {}", path.display()),
            )),
        }
    }
}

struct InMemReadDir {
    queue: VecDeque<PathBuf>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> io::Result<Option<PathBuf>> {
        Ok(self.queue.pop_front())
    }
}
