//! Markdown export of found profiles
//!
//! This module generates a human-readable markdown file listing every
//! profile recorded for each user, grouped by city.

use crate::output::OutputResult;
use crate::storage::{FoundRecord, SqliteStorage};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Found profiles of one user, in discovery order
#[derive(Debug, Clone)]
pub struct UserExport {
    pub user: String,
    pub records: Vec<FoundRecord>,
}

/// Writes the markdown export for `users` to `output_path`
///
/// Returns the number of profiles written.
pub fn generate_markdown_summary(
    storage: &SqliteStorage,
    users: &[String],
    output_path: &Path,
) -> OutputResult<usize> {
    let mut exports = Vec::with_capacity(users.len());
    for user in users {
        exports.push(UserExport {
            user: user.clone(),
            records: storage.list_found(user)?,
        });
    }

    let markdown = format_markdown_summary(&exports);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(exports.iter().map(|e| e.records.len()).sum())
}

/// Formats found profiles as markdown
pub fn format_markdown_summary(exports: &[UserExport]) -> String {
    let mut md = String::new();

    md.push_str("# Profile-Sieve Found Profiles\n\n");

    md.push_str("| User | Profiles |\n");
    md.push_str("|------|----------|\n");
    for export in exports {
        md.push_str(&format!("| {} | {} |\n", export.user, export.records.len()));
    }
    md.push('\n');

    for export in exports {
        md.push_str(&format!("## {}\n\n", export.user));

        if export.records.is_empty() {
            md.push_str("No profiles found yet.\n\n");
            continue;
        }

        let mut cities: Vec<&str> = Vec::new();
        for record in &export.records {
            if !cities.contains(&record.profile.city.as_str()) {
                cities.push(&record.profile.city);
            }
        }

        for city in cities {
            md.push_str(&format!("### {}\n\n", city));

            for record in export.records.iter().filter(|r| r.profile.city == city) {
                let profile = &record.profile;
                let name = if profile.name.is_empty() {
                    format!("id{}", profile.profile_id)
                } else {
                    profile.name.clone()
                };

                md.push_str(&format!("- [{}]({})\n", name, profile.profile_url));
                md.push_str(&format!(
                    "  - Age {}, {} search, birth date {}\n",
                    profile.age,
                    profile.strategy,
                    profile.bdate.as_deref().unwrap_or("not given")
                ));
                if let Some(photo) = &profile.photo_url {
                    md.push_str(&format!("  - Photo: {}\n", photo));
                }
                md.push_str(&format!("  - Keywords: {}\n", profile.keywords().join(", ")));
                for hit in &profile.hits {
                    md.push_str(&format!(
                        "  - `{}` in {}: {}\n",
                        hit.keyword,
                        hit.field,
                        hit.excerpt.replace('\n', " ")
                    ));
                }
                md.push_str(&format!("  - Found at {}\n", record.found_at));
            }
            md.push('\n');
        }
    }

    md
}
