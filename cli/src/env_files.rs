// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `.env` loading
//!
//! Precedence, highest first: the real process environment, then
//! `.env.<APP_ENV>`, then `.env`. Missing files are skipped silently.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Load `.env` and `.env.<APP_ENV>` from `dir`. Returns the files applied.
pub fn load_env_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let inherited: HashSet<String> = std::env::vars().map(|(k, _)| k).collect();
    let mut loaded = Vec::new();

    let base = dir.join(".env");
    if apply_file(&base, &inherited)? {
        loaded.push(base);
    }

    if let Ok(app_env) = std::env::var("APP_ENV") {
        let app_env = app_env.trim().to_lowercase();
        if !app_env.is_empty() {
            let specific = dir.join(format!(".env.{}", app_env));
            if apply_file(&specific, &inherited)? {
                loaded.push(specific);
            }
        }
    }

    Ok(loaded)
}

/// Set every variable from `path` that the process did not inherit.
fn apply_file(path: &Path, inherited: &HashSet<String>) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    let entries =
        dotenvy::from_path_iter(path).with_context(|| format!("Failed to read {:?}", path))?;
    for entry in entries {
        let (key, value) = entry.with_context(|| format!("Failed to parse {:?}", path))?;
        if !inherited.contains(&key) {
            std::env::set_var(key, value);
        }
    }
    Ok(true)
}
