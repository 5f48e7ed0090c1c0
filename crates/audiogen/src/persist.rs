//! Output persister: deterministic file names and atomic writes.

use crate::error::Result;
use crate::request::GenerationRequest;
use genconf::OutputConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_DIR: &str = "generated_audio";
pub const DEFAULT_TEMPLATE: &str = "generated_audio_{duration}s.wav";

/// Where generated audio lands. The file name is a pure function of the
/// request, so repeating a request overwrites the previous file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
    template: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DIR, DEFAULT_TEMPLATE)
    }
}

impl OutputLayout {
    /// `template` may use `{duration}` and `{slug}`.
    pub fn new(dir: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            template: template.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.dir.clone(), config.filename_template.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self, request: &GenerationRequest) -> String {
        self.template
            .replace("{duration}", &request.duration().to_string())
            .replace("{slug}", &request.slug())
    }

    pub fn path_for(&self, request: &GenerationRequest) -> PathBuf {
        self.dir.join(self.file_name(request))
    }

    /// Write `bytes` for `request`, creating the directory if needed.
    pub fn write(&self, request: &GenerationRequest, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(request);
        write_atomic(&path, bytes)?;
        Ok(path)
    }
}

/// Write through a temp file in the target directory and rename it into
/// place. An existing file is replaced only once the new content is complete.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = staging_file(path)?;
    tmp.write_all(bytes)?;
    commit(tmp, path)
}

pub(crate) fn staging_file(path: &Path) -> Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    Ok(NamedTempFile::new_in(parent)?)
}

pub(crate) fn commit(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.as_file().sync_all()?;

    // Temp files are created owner-only; published audio should not be.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o644))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    tracing::debug!(path = %path.display(), "Wrote output file");
    Ok(())
}
