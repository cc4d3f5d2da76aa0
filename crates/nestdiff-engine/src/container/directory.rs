//! Filesystem directories.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::Container;
use crate::artifact::{Artifact, ArtifactRef};
use crate::error::{EngineError, EngineResult};

/// A directory's immediate entries, in lexical order.
///
/// Symbolic links are listed but never followed; they specialize as
/// [`Symlink`](crate::specialize::ArtifactKind::Symlink) leaves.
#[derive(Debug)]
pub struct DirectoryContainer {
    source: ArtifactRef,
    root: PathBuf,
}

impl DirectoryContainer {
    pub fn new(source: ArtifactRef, root: PathBuf) -> Self {
        Self { source, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entries(&self) -> EngineResult<Vec<DirEntry>> {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.map_err(|e| EngineError::io(self.source.name(), io::Error::from(e))))
            .collect()
    }

    fn not_found(&self, name: &str) -> EngineError {
        EngineError::MemberNotFound {
            container: self.source.name().to_string(),
            name: name.to_string(),
        }
    }
}

impl Container for DirectoryContainer {
    fn source(&self) -> &ArtifactRef {
        &self.source
    }

    // Names of entries that are not valid UTF-8 are lossy; such members are
    // reachable through `all_members` only.
    fn member_names(&self) -> EngineResult<Vec<String>> {
        Ok(self
            .entries()?
            .iter()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect())
    }

    fn member(&self, name: &str) -> EngineResult<ArtifactRef> {
        // Only single, normal path components address a member.
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(self.not_found(name)),
        }
        let path = self.root.join(name);
        match fs::symlink_metadata(&path) {
            Ok(_) => Ok(Artifact::from_path_named(name, path)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(self.not_found(name)),
            Err(e) => Err(EngineError::io(name, e)),
        }
    }

    fn all_members(&self) -> EngineResult<Vec<(String, ArtifactRef)>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let member = Artifact::from_path_named(name.as_str(), entry.into_path());
                (name, member)
            })
            .collect())
    }
}
