use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, trace};

use crate::parser::{job_stats_from_raw, parse_raw_stats, StatsFileMatcher};
use crate::record::JobStats;
use crate::Error;

/// Stats of one subdirectory found in both an old and a new stats tree
#[derive(Debug, Clone)]
pub struct PairedStats {
    /// Name of the subdirectory
    pub name: String,
    pub old: Vec<JobStats>,
    pub new: Vec<JobStats>,
}

/// Loads every stats file below `path`.
///
/// The tree is walked in path order. Files whose names do not look like stats
/// files are ignored.
///
/// # Errors
///
/// Returns an error if a directory cannot be listed, or if a stats file cannot
/// be read or does not hold a flat numeric mapping.
pub fn load_stats_dir<P: AsRef<Path>>(path: P) -> Result<Vec<JobStats>, Error> {
    let path = path.as_ref();
    let matcher = StatsFileMatcher::new()?;

    let mut files = Vec::new();
    collect_files(path, &mut files)?;

    let mut jobs = Vec::new();
    for file_path in files {
        let Some(file_name) = file_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let file = match matcher.parse(file_name) {
            Ok(file) => file,
            Err(_) => {
                trace!("Ignoring {}", file_path.display());
                continue;
            }
        };

        let payload = fs::read_to_string(&file_path).map_err(|source| Error::Io {
            path: file_path.clone(),
            source,
        })?;
        let raw = parse_raw_stats(&payload).map_err(|e| match e {
            Error::InvalidPayload(source) => Error::MalformedFile {
                path: file_path.clone(),
                source,
            },
            other => other,
        })?;

        jobs.push(job_stats_from_raw(&file, raw)?);
    }

    debug!("Loaded {} jobs from {}", jobs.len(), path.display());
    Ok(jobs)
}

/// Loads the subdirectories that `old` and `new` have in common.
///
/// Subdirectories are visited in name order. Entries missing from either side,
/// and pairs where either side holds no stats, are skipped. A pair that fails to
/// load is logged and skipped so the remaining pairs are still reported.
///
/// # Errors
///
/// Returns an error only if `old` itself cannot be listed.
pub fn load_paired_stats_dirs<P: AsRef<Path>, Q: AsRef<Path>>(
    old: P,
    new: Q,
) -> Result<Vec<PairedStats>, Error> {
    let (old, new) = (old.as_ref(), new.as_ref());

    let mut paired = Vec::new();
    for old_dir in sorted_entries(old)? {
        let Some(name) = old_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let new_dir = new.join(&name);
        if !old_dir.is_dir() || !new_dir.is_dir() {
            trace!("Skipping {}: not a directory on both sides", name);
            continue;
        }

        let (old_stats, new_stats) = match load_pair(&old_dir, &new_dir) {
            Ok(stats) => stats,
            Err(e) => {
                error!("Skipping {}: {}", name, e);
                continue;
            }
        };
        if old_stats.is_empty() || new_stats.is_empty() {
            debug!("Skipping {}: no stats on one side", name);
            continue;
        }

        paired.push(PairedStats {
            name,
            old: old_stats,
            new: new_stats,
        });
    }

    Ok(paired)
}

fn load_pair(old: &Path, new: &Path) -> Result<(Vec<JobStats>, Vec<JobStats>), Error> {
    Ok((load_stats_dir(old)?, load_stats_dir(new)?))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let io_error = |source: std::io::Error| Error::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort();
    Ok(entries)
}

/// Collects the files below `dir`, without descending into directory symlinks
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), Error> {
    for path in sorted_entries(dir)? {
        let file_type = fs::symlink_metadata(&path)
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?
            .file_type();

        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if file_type.is_symlink() && path.is_dir() {
            trace!("Not following directory link {}", path.display());
        } else {
            files.push(path);
        }
    }
    Ok(())
}
