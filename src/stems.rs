//! Stem sets and the separator/stem-cache boundary.
//!
//! Source separation is out of scope to reimplement (spec.md §1); `Separator`
//! and `StemStore` specify it as a trait. The default `FsStemStore` performs
//! the sibling-directory cache scan from spec.md §6/§9 and, on a miss, shells
//! out to an external `demucs`-compatible command — the same
//! subprocess/temp-dir/rename shape as
//! `mesh-cue::separation::service::SeparationService`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::MixError;
use crate::io::wav;
use crate::types::AudioBuffer;

/// The four separated signals for one track, per spec.md §3.
#[derive(Debug, Clone)]
pub struct StemSet {
    pub bass: AudioBuffer,
    pub drums: AudioBuffer,
    pub vocals: AudioBuffer,
    pub other: AudioBuffer,
}

impl StemSet {
    pub fn sample_rate(&self) -> u32 {
        self.bass.sample_rate
    }

    /// `low = bass; mid = vocals + other; high = drums` (glossary "Band").
    pub fn low(&self) -> &AudioBuffer {
        &self.bass
    }

    pub fn high(&self) -> &AudioBuffer {
        &self.drums
    }

    pub fn mid(&self) -> AudioBuffer {
        let mut mid = self.vocals.clone();
        mid.add_assign_slice(self.other.as_slice());
        mid
    }

    /// `low + mid + high`, i.e. the sum of all four stems (spec.md §3
    /// invariant 4) — the original full mix, reconstructed without any
    /// individual stem normalization.
    pub fn full_mix(&self) -> AudioBuffer {
        let mut out = self.bass.clone();
        out.add_assign_slice(self.drums.as_slice());
        out.add_assign_slice(self.vocals.as_slice());
        out.add_assign_slice(self.other.as_slice());
        out
    }
}

const STEM_FILES: [&str; 4] = ["bass.wav", "drums.wav", "vocals.wav", "other.wav"];

/// External source-separator contract (spec.md §6): WAV path + output
/// directory in, four named stem WAVs on disk.
pub trait Separator {
    fn separate(&self, path: &Path, out_dir: &Path) -> Result<(), MixError>;
}

/// Stem cache abstraction (spec.md §9): `lookup` never touches the network
/// or spawns a process; `populate` does, on a cache miss.
pub trait StemStore {
    fn lookup(&self, track_stem: &str) -> Result<Option<StemSet>, MixError>;
    fn populate(&self, track_path: &Path) -> Result<StemSet, MixError>;

    fn get(&self, track_path: &Path) -> Result<StemSet, MixError> {
        let track_stem = track_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MixError::FileNotFound(track_path.to_path_buf()))?;
        if let Some(stems) = self.lookup(track_stem)? {
            return Ok(stems);
        }
        self.populate(track_path)
    }
}

/// Default `StemStore`: scans sibling directories of `base_dir` for an
/// `htdemucs/{track_stem}/{bass,drums,vocals,other}.wav` layout (spec.md §6),
/// and invokes `separator` on a miss, writing to a temp directory and
/// renaming into place on success.
pub struct FsStemStore<S: Separator> {
    pub base_dir: PathBuf,
    pub separator: S,
}

impl<S: Separator> FsStemStore<S> {
    pub fn new(base_dir: impl Into<PathBuf>, separator: S) -> Self {
        Self {
            base_dir: base_dir.into(),
            separator,
        }
    }

    fn stem_dir_candidates(&self) -> Result<Vec<PathBuf>, MixError> {
        let parent = self.base_dir.parent().unwrap_or(&self.base_dir);
        let mut dirs = Vec::new();
        if parent.is_dir() {
            for entry in fs::read_dir(parent).map_err(MixError::IoError)? {
                let entry = entry.map_err(MixError::IoError)?;
                if entry.path().is_dir() {
                    dirs.push(entry.path());
                }
            }
        }
        dirs.push(self.base_dir.clone());
        Ok(dirs)
    }

    fn read_stems_from(&self, htdemucs_dir: &Path, track_stem: &str) -> Option<StemSet> {
        let dir = htdemucs_dir.join(track_stem);
        let mut paths = Vec::with_capacity(4);
        for name in STEM_FILES {
            let p = dir.join(name);
            if !p.is_file() {
                return None;
            }
            paths.push(p);
        }
        let mut buffers = paths.iter().map(|p| wav::read(p).ok()).collect::<Vec<_>>();
        if buffers.iter().any(|b| b.is_none()) {
            return None;
        }
        let other = buffers.pop().unwrap().unwrap();
        let vocals = buffers.pop().unwrap().unwrap();
        let drums = buffers.pop().unwrap().unwrap();
        let bass = buffers.pop().unwrap().unwrap();
        Some(StemSet {
            bass,
            drums,
            vocals,
            other,
        })
    }
}

impl<S: Separator> StemStore for FsStemStore<S> {
    fn lookup(&self, track_stem: &str) -> Result<Option<StemSet>, MixError> {
        for dir in self.stem_dir_candidates()? {
            let htdemucs_dir = dir.join("htdemucs");
            if let Some(stems) = self.read_stems_from(&htdemucs_dir, track_stem) {
                return Ok(Some(stems));
            }
        }
        Ok(None)
    }

    fn populate(&self, track_path: &Path) -> Result<StemSet, MixError> {
        if !track_path.is_file() {
            return Err(MixError::FileNotFound(track_path.to_path_buf()));
        }
        let track_stem = track_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MixError::FileNotFound(track_path.to_path_buf()))?
            .to_string();

        let temp = tempfile::tempdir().map_err(MixError::IoError)?;
        self.separator.separate(track_path, temp.path())?;

        let final_dir = self.base_dir.join("htdemucs");
        fs::create_dir_all(&final_dir).map_err(MixError::IoError)?;
        let temp_htdemucs = temp.path().join("htdemucs").join(&track_stem);
        let final_track_dir = final_dir.join(&track_stem);
        if final_track_dir.exists() {
            fs::remove_dir_all(&final_track_dir).map_err(MixError::IoError)?;
        }
        fs::rename(&temp_htdemucs, &final_track_dir).map_err(MixError::IoError)?;

        self.read_stems_from(&final_dir, &track_stem)
            .ok_or_else(|| {
                MixError::PrerequisiteError(format!(
                    "separator produced no usable stems for {track_stem}"
                ))
            })
    }
}

/// Shells out to an external `demucs`-compatible command.
pub struct SubprocessSeparator {
    pub cmd: String,
}

impl SubprocessSeparator {
    pub fn new(cmd: &str) -> Self {
        Self { cmd: cmd.to_string() }
    }
}

impl Separator for SubprocessSeparator {
    fn separate(&self, path: &Path, out_dir: &Path) -> Result<(), MixError> {
        let status = Command::new(&self.cmd)
            .arg("-o")
            .arg(out_dir)
            .arg(path)
            .status()
            .map_err(MixError::IoError)?;
        if !status.success() {
            return Err(MixError::PrerequisiteError(format!(
                "{} exited with {status}",
                self.cmd
            )));
        }
        Ok(())
    }
}
