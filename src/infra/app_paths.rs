//! Usage: Application data directory resolution (env override + home fallback).

use crate::shared::error::AppResult;
use std::path::PathBuf;

const DATA_DIR_ENV: &str = "VEHICLE_CONSOLE_DATA_DIR";
const DEFAULT_DOTDIR_NAME: &str = ".vehicle-console";

/// Resolve the data directory and make sure it exists.
///
/// `VEHICLE_CONSOLE_DATA_DIR` wins when set (tests point it at a tempdir);
/// otherwise `$HOME/.vehicle-console`, with `USERPROFILE` as the Windows
/// fallback for home resolution.
pub fn data_dir() -> AppResult<PathBuf> {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => home_dir()
            .ok_or_else(|| "SYSTEM_ERROR: cannot resolve home directory".to_string())?
            .join(DEFAULT_DOTDIR_NAME),
    };

    std::fs::create_dir_all(&dir).map_err(|e| {
        format!(
            "SYSTEM_ERROR: cannot create data dir {}: {e}",
            dir.display()
        )
    })?;
    Ok(dir)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var_os("USERPROFILE").filter(|v| !v.is_empty()))
        .map(PathBuf::from)
}
