use std::path::PathBuf;

use crate::config::AppSettings;
use crate::knowledge::{KnowledgeBase, RecentUploads, UploadClient, UploadStatus};

/// Validates and uploads each file in turn, then lists the recent uploads.
pub async fn upload(
    settings: &AppSettings,
    paths: &[PathBuf],
    name: Option<String>,
    description: Option<String>,
) -> Result<(), String> {
    if name.is_some() && paths.len() > 1 {
        return Err("--name can only be used with a single file".into());
    }

    let mut kb = KnowledgeBase::new(
        settings.file_rules(),
        UploadClient::new(&settings.endpoints()),
    );
    let mut failures = 0;

    for path in paths {
        // Validation errors are reported and the next file is tried.
        let mut staged = match kb.select_file(path) {
            Ok(staged) => staged,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };
        if let Some(name) = &name {
            staged = staged.with_display_name(name.clone());
        }
        if let Some(description) = &description {
            staged = staged.with_description(description.clone());
        }

        let label = staged.file_name.clone();
        let result = kb
            .confirm_upload(staged, move |percent| {
                eprint!("\rUploading {}... {:>3}%", label, percent);
            })
            .await;
        eprintln!();

        if let Err(e) = result {
            eprintln!("{}: {}", path.display(), e);
            failures += 1;
        }
    }

    print_recent(kb.recent());
    if failures > 0 {
        return Err(format!("{} of {} file(s) failed", failures, paths.len()));
    }
    Ok(())
}

fn print_recent(recent: &RecentUploads) {
    if recent.is_empty() {
        return;
    }
    println!("Recent uploads:");
    for record in recent.iter() {
        let status = match record.status {
            UploadStatus::Success => "ok",
            UploadStatus::Error => "failed",
        };
        if record.document_id.is_empty() {
            println!("  [{}] {} {}", status, record.name, record.timestamp.format("%H:%M:%S"));
        } else {
            println!(
                "  [{}] {} {} document id: {}",
                status,
                record.name,
                record.timestamp.format("%H:%M:%S"),
                record.document_id
            );
        }
    }
}
