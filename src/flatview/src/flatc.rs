//! Locating, validating, and provisioning the external `flatc` compiler.
//!
//! Resolution is three-tiered: an ambient install on the search path, a
//! previously downloaded copy in the private install directory, or a fresh
//! download of the pinned release for the current platform. The result is
//! memoized for the process lifetime; a decode failure later on does not
//! invalidate it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Pinned FlatBuffers release the download path installs.
pub const FLATC_VERSION: &str = "24.3.25";

/// Invocation name probed on the process search path.
pub const FLATC_PROGRAM: &str = "flatc";

const RELEASE_BASE: &str = "https://github.com/google/flatbuffers/releases/download";

#[derive(Error, Debug)]
pub enum FlatcError {
    #[error("unsupported platform: {os}/{arch} (supported: windows, macos, linux)")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("a flatc download is already in progress, retry once it settles")]
    DownloadInProgress,

    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        source: Box<ureq::Error>,
    },

    #[error("failed to extract flatc archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("downloaded archive does not contain a {0} executable")]
    MissingExecutable(String),

    #[error("flatc at {path:?} is not runnable ({status})\nstderr: {stderr}\nstdout: {stdout}")]
    Probe {
        path: PathBuf,
        status: String,
        stderr: String,
        stdout: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug)]
enum LocatorState {
    Unresolved,
    Downloading,
    Resolved(PathBuf),
}

/// Resolves a runnable `flatc` path, downloading the tool on first use if
/// none is installed.
///
/// Construct one instance per process and pass it by reference; the
/// memoized path and the install directory are the only shared mutable
/// state in the system. A second `resolve` issued while a download is in
/// flight fails immediately with [`FlatcError::DownloadInProgress`] rather
/// than queueing, so two first-time downloads can never interleave in the
/// install directory.
#[derive(Debug)]
pub struct FlatcLocator {
    state: Mutex<LocatorState>,
    install_dir: PathBuf,
}

impl FlatcLocator {
    pub fn new(install_dir: PathBuf) -> Self {
        Self {
            state: Mutex::new(LocatorState::Unresolved),
            install_dir,
        }
    }

    /// A locator pre-seeded with a known tool path.
    ///
    /// Skips probing and downloading entirely; used when the caller pins
    /// the executable (CLI `--flatc`) and by tests.
    pub fn with_resolved(path: PathBuf) -> Self {
        Self {
            state: Mutex::new(LocatorState::Resolved(path)),
            install_dir: PathBuf::new(),
        }
    }

    /// Default private install directory for downloaded binaries.
    pub fn default_install_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("flatview").join("bin"))
    }

    /// Produce a runnable flatc path, provisioning the tool if needed.
    pub fn resolve(&self) -> Result<PathBuf, FlatcError> {
        {
            let mut state = self.state.lock().expect("locator state poisoned");
            match &*state {
                LocatorState::Resolved(path) => return Ok(path.clone()),
                LocatorState::Downloading => return Err(FlatcError::DownloadInProgress),
                LocatorState::Unresolved => {}
            }
            if let Some(path) = self.find_existing() {
                *state = LocatorState::Resolved(path.clone());
                return Ok(path);
            }
            *state = LocatorState::Downloading;
        }

        // Lock released: the download can take a while, and concurrent
        // callers must observe the Downloading state meanwhile.
        let result = self.download_and_install();

        let mut state = self.state.lock().expect("locator state poisoned");
        match result {
            Ok(path) => {
                *state = LocatorState::Resolved(path.clone());
                Ok(path)
            }
            Err(error) => {
                *state = LocatorState::Unresolved;
                Err(error)
            }
        }
    }

    /// Whether a runnable flatc can be resolved; discards the error.
    pub fn is_available(&self) -> bool {
        self.resolve().is_ok()
    }

    /// Probe the search path and the install directory, without touching
    /// the network or the memoized state.
    pub fn find_existing(&self) -> Option<PathBuf> {
        if probe(Path::new(FLATC_PROGRAM)).is_ok() {
            tracing::debug!("using flatc from the search path");
            return Some(PathBuf::from(FLATC_PROGRAM));
        }
        self.installed_copy()
    }

    /// A runnable copy in the private install directory, if any.
    fn installed_copy(&self) -> Option<PathBuf> {
        let local = self.install_dir.join(executable_name());
        if !local.is_file() {
            return None;
        }
        if let Err(error) = ensure_executable(&local) {
            tracing::warn!(path = %local.display(), %error, "failed to set exec bits");
            return None;
        }
        if probe(&local).is_err() {
            return None;
        }
        tracing::debug!(path = %local.display(), "using previously installed flatc");
        Some(local)
    }

    fn download_and_install(&self) -> Result<PathBuf, FlatcError> {
        let url = release_asset_url(std::env::consts::OS, std::env::consts::ARCH)?;

        fs::create_dir_all(&self.install_dir)?;
        let target = self.install_dir.join(executable_name());
        if target.exists() {
            fs::remove_file(&target)?;
        }

        let archive_path = self.install_dir.join(format!("flatc-{}.zip", Uuid::new_v4()));
        tracing::info!(%url, "downloading flatc {FLATC_VERSION}");
        let response = ureq::get(&url).call().map_err(|source| FlatcError::Download {
            url: url.clone(),
            source: Box::new(source),
        })?;
        let mut reader = response.into_reader();
        let mut archive_file = fs::File::create(&archive_path)?;
        io::copy(&mut reader, &mut archive_file)?;
        drop(archive_file);

        let extracted = extract_executable(&archive_path, &target);
        if let Err(error) = fs::remove_file(&archive_path) {
            tracing::warn!(path = %archive_path.display(), %error, "failed to remove archive");
        }
        extracted?;

        ensure_executable(&target)?;
        probe(&target)?;
        tracing::info!(path = %target.display(), "installed flatc {FLATC_VERSION}");
        Ok(target)
    }

    #[cfg(test)]
    fn mark_downloading(&self) {
        *self.state.lock().unwrap() = LocatorState::Downloading;
    }
}

/// Release asset for a platform/architecture pair.
///
/// Windows ships one asset for every architecture, macOS has distinct
/// Intel and ARM builds, Linux has one. Anything else is unsupported and
/// must be rejected before any network activity.
pub fn release_asset_url(os: &str, arch: &str) -> Result<String, FlatcError> {
    let asset = match (os, arch) {
        ("windows", _) => "Windows.flatc.binary.zip",
        ("macos", "aarch64") => "Mac.flatc.binary.zip",
        ("macos", _) => "MacIntel.flatc.binary.zip",
        ("linux", _) => "Linux.flatc.binary.clang++-15.zip",
        _ => {
            return Err(FlatcError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    Ok(format!("{RELEASE_BASE}/v{FLATC_VERSION}/{asset}"))
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "flatc.exe"
    } else {
        "flatc"
    }
}

/// Run a version query to confirm the binary is functional.
fn probe(path: &Path) -> Result<(), FlatcError> {
    let output = Command::new(path).arg("--version").output()?;
    if output.status.success() {
        return Ok(());
    }
    Err(FlatcError::Probe {
        path: path.to_path_buf(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
    })
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Copy the single executable entry out of a release archive.
fn extract_executable(archive_path: &Path, target: &Path) -> Result<(), FlatcError> {
    let mut archive = zip::ZipArchive::new(fs::File::open(archive_path)?)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let is_flatc = Path::new(entry.name())
            .file_name()
            .is_some_and(|name| name == executable_name());
        if !is_flatc {
            continue;
        }
        let mut out = fs::File::create(target)?;
        io::copy(&mut entry, &mut out)?;
        return Ok(());
    }
    Err(FlatcError::MissingExecutable(executable_name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_asset_urls_per_platform() {
        let windows = release_asset_url("windows", "x86_64").unwrap();
        let mac_arm = release_asset_url("macos", "aarch64").unwrap();
        let mac_intel = release_asset_url("macos", "x86_64").unwrap();
        let linux = release_asset_url("linux", "x86_64").unwrap();

        assert!(windows.ends_with("Windows.flatc.binary.zip"));
        assert!(mac_arm.ends_with("Mac.flatc.binary.zip"));
        assert!(mac_intel.ends_with("MacIntel.flatc.binary.zip"));
        assert!(linux.ends_with("Linux.flatc.binary.clang++-15.zip"));

        // macOS Intel and ARM are distinct assets.
        assert_ne!(mac_arm, mac_intel);

        for url in [windows, mac_arm, mac_intel, linux] {
            assert!(url.contains(FLATC_VERSION));
        }
    }

    #[test]
    fn test_unsupported_platform_is_rejected() {
        let result = release_asset_url("freebsd", "x86_64");
        match result {
            Err(FlatcError::UnsupportedPlatform { os, arch }) => {
                assert_eq!(os, "freebsd");
                assert_eq!(arch, "x86_64");
            }
            other => panic!("expected UnsupportedPlatform, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_returns_memoized_path() {
        let locator = FlatcLocator::with_resolved(PathBuf::from("/opt/flatc"));

        assert_eq!(locator.resolve().unwrap(), PathBuf::from("/opt/flatc"));
        assert_eq!(locator.resolve().unwrap(), PathBuf::from("/opt/flatc"));
        assert!(locator.is_available());
    }

    #[test]
    fn test_concurrent_download_is_rejected_immediately() {
        let temp_dir = tempfile::tempdir().unwrap();
        let locator = FlatcLocator::new(temp_dir.path().to_path_buf());
        locator.mark_downloading();

        let result = locator.resolve();
        assert!(matches!(result, Err(FlatcError::DownloadInProgress)));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_reports_exit_status_and_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let tool = temp_dir.path().join("flatc");
        fs::write(&tool, "#!/bin/sh\necho 'bad invocation' >&2\nexit 3\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        match probe(&tool) {
            Err(FlatcError::Probe { status, stderr, .. }) => {
                assert!(status.contains('3'), "status was {status}");
                assert_eq!(stderr, "bad invocation");
            }
            other => panic!("expected Probe error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_installed_copy_is_picked_up() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let tool = temp_dir.path().join("flatc");
        fs::write(&tool, "#!/bin/sh\necho 'flatc version 24.3.25'\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let locator = FlatcLocator::new(temp_dir.path().to_path_buf());
        assert_eq!(locator.installed_copy(), Some(tool));
    }

    #[test]
    fn test_installed_copy_absent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let locator = FlatcLocator::new(temp_dir.path().to_path_buf());
        assert_eq!(locator.installed_copy(), None);
    }
}
