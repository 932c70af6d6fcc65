//! Workspace skill catalog.
//!
//! Skills are markdown playbooks at `<workspace>/skills/<name>/SKILL.md`
//! with an optional frontmatter block carrying `name:` and `description:`
//! lines. The catalog only lists and loads them; installing and manifest
//! validation live outside the core.

use std::path::{Path, PathBuf};
use tracing::debug;

/// A discovered skill.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub path: String,
    pub source: String,
}

pub struct SkillCatalog {
    skills_dir: PathBuf,
}

impl SkillCatalog {
    pub fn new(workspace: &Path) -> Self {
        Self {
            skills_dir: workspace.join("skills"),
        }
    }

    /// List all skills found under the workspace, sorted by name.
    pub fn list(&self) -> Vec<SkillInfo> {
        let Ok(entries) = std::fs::read_dir(&self.skills_dir) else {
            return Vec::new();
        };

        let mut skills: Vec<SkillInfo> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let dir_name = e.file_name().to_string_lossy().into_owned();
                let skill_file = e.path().join("SKILL.md");
                let content = std::fs::read_to_string(&skill_file).ok()?;
                let (name, description) = parse_frontmatter(&content, &dir_name);
                Some(SkillInfo {
                    name,
                    description,
                    path: skill_file.display().to_string(),
                    source: "workspace".into(),
                })
            })
            .collect();

        skills.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = skills.len(), "Listed workspace skills");
        skills
    }

    /// Load a skill's full content by name. `None` when unknown.
    pub fn load(&self, name: &str) -> Option<String> {
        let candidate = self.skills_dir.join(name).join("SKILL.md");
        std::fs::read_to_string(candidate).ok()
    }
}

/// Pull `name:` and `description:` out of a leading `---` frontmatter
/// block, falling back to the directory name and the first non-heading
/// content line.
fn parse_frontmatter(content: &str, fallback_name: &str) -> (String, String) {
    let mut name = fallback_name.to_string();
    let mut description = String::new();

    let mut lines = content.lines().peekable();
    if lines.peek().map(|l| l.trim()) == Some("---") {
        lines.next();
        for line in lines.by_ref() {
            let trimmed = line.trim();
            if trimmed == "---" {
                break;
            }
            if let Some(value) = trimmed.strip_prefix("name:") {
                name = value.trim().to_string();
            } else if let Some(value) = trimmed.strip_prefix("description:") {
                description = value.trim().to_string();
            }
        }
    }

    if description.is_empty() {
        description = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("---"))
            .unwrap_or("")
            .to_string();
    }

    (name, description)
}
