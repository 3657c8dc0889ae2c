//! Skill artifacts: naming, seeding, and output.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::SkillError;

pub mod seed;

pub use seed::{GithubClient, SeedGenerator};

/// Derive a valid skill name from a repository short name.
///
/// Lowercase, only `[a-z0-9-]`, hyphens collapsed and trimmed, max 64 chars.
pub fn skill_name(repo: &str) -> Result<String, SkillError> {
    let collapse = Regex::new(r"[^a-z0-9]+").expect("static regex");
    let name = collapse
        .replace_all(&repo.to_lowercase(), "-")
        .trim_matches('-')
        .to_string();
    if name.is_empty() {
        return Err(SkillError::InvalidName(repo.to_string()));
    }
    Ok(name.chars().take(64).collect())
}

/// Write the skill to `{output_dir}/{repo_short_name}/SKILL.md`.
///
/// Creates the directory structure on demand and overwrites any existing
/// file. Returns the path written.
pub fn save_skill(
    skill: &str,
    repo_name: &str,
    output_dir: &Path,
) -> Result<PathBuf, SkillError> {
    let short_name = repo_name.rsplit('/').next().unwrap_or(repo_name);
    if short_name.is_empty() {
        return Err(SkillError::InvalidName(repo_name.to_string()));
    }
    let dir = output_dir.join(short_name);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("SKILL.md");
    std::fs::write(&path, skill)?;
    Ok(path)
}
