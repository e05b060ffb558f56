// UI layer: provides a simple interactive menu using `dialoguer`.
// The functions are small and synchronous to make the flow easy to follow.
// Validation and remote failures print a banner and drop back to the menu;
// only authentication failure (handled upstream) ends the session.

use crate::config::AppConfig;
use crate::drive::DriveClient;
use crate::folders::{self, FlatFolderEntry};
use crate::upload::{self, UploadOutcome};
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Main interactive menu. Receives the loaded configuration and an
/// authenticated drive client and runs a select loop until the user
/// chooses "Exit".
///
/// Note: `Select::interact()` is keyboard-driven: you can use arrow keys
/// and Enter to choose an option.
pub fn main_menu(config: &AppConfig, drive: &DriveClient) -> Result<()> {
    loop {
        let items = vec![
            "Upload versioned archive",
            "Upload folder-named archive",
            "Exit",
        ];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => handle_versioned_upload(config, drive)?,
            1 => handle_folder_named_upload(config, drive)?,
            2 => break,
            _ => {}
        }
    }
    Ok(())
}

/// Versioned-name flow: the archive keeps its base name and `_V<n>`
/// suffix; the actual number is re-derived from what is already remote.
fn handle_versioned_upload(config: &AppConfig, drive: &DriveClient) -> Result<()> {
    let (label, dest) = pick_destination(config, drive)?;
    let Some(source) = pick_zip(&dest.display_path)? else {
        info_banner("Upload cancelled.");
        return Ok(());
    };

    let bar = upload_bar();
    let outcome = upload::upload_versioned(drive, &label, &dest.id, &source, |sent, total| {
        bar.set_length(total);
        bar.set_position(sent);
    });
    bar.finish_and_clear();
    report(outcome, &dest.display_path);
    Ok(())
}

/// Folder-named flow: the archive must be named after the destination
/// folder; the remote name gets a version, uploader tag and timestamp.
fn handle_folder_named_upload(config: &AppConfig, drive: &DriveClient) -> Result<()> {
    let (_, dest) = pick_destination(config, drive)?;
    let folder_name = dest
        .display_path
        .rsplit('/')
        .next()
        .unwrap_or(dest.display_path.as_str())
        .to_string();
    let Some(source) = pick_zip(&dest.display_path)? else {
        info_banner("Upload cancelled.");
        return Ok(());
    };

    let tag: String = match &config.uploader_tag {
        Some(preset) => Input::new()
            .with_prompt("Uploader tag")
            .default(preset.clone())
            .interact_text()?,
        None => Input::new().with_prompt("Uploader tag").interact_text()?,
    };

    let bar = upload_bar();
    let outcome =
        upload::upload_folder_named(drive, &folder_name, &dest.id, &tag, &source, |sent, total| {
            bar.set_length(total);
            bar.set_position(sent);
        });
    bar.finish_and_clear();
    report(outcome, &dest.display_path);
    Ok(())
}

/// Let the user choose a top-level directory, then any folder beneath it.
fn pick_destination(config: &AppConfig, drive: &DriveClient) -> Result<(String, FlatFolderEntry)> {
    let labels: Vec<&String> = config.directories.keys().collect();
    let choice = Select::new()
        .with_prompt("Top-level directory")
        .items(&labels)
        .default(0)
        .interact()?;
    let label = labels[choice].clone();
    let root_id = &config.directories[&label];

    info_banner("Fetching folder structure...");
    let tree = folders::fetch_tree(drive, root_id, &label);
    let flat = folders::flatten(&tree);

    let names: Vec<&str> = flat.iter().map(|e| e.display_path.as_str()).collect();
    let idx = Select::new()
        .with_prompt("Destination folder")
        .items(&names)
        .default(0)
        .interact()?;
    Ok((label, flat[idx].clone()))
}

/// File picker constrained to .zip. Falls back to a typed path when the
/// native dialog is unavailable or dismissed (e.g. headless terminals).
fn pick_zip(destination: &str) -> Result<Option<PathBuf>> {
    info_banner(&format!("Select the .zip archive for {}", destination));
    if let Some(path) = rfd::FileDialog::new()
        .add_filter("ZIP archive", &["zip"])
        .pick_file()
    {
        return Ok(Some(path));
    }
    let typed: String = Input::new()
        .with_prompt("Path to .zip archive (empty to cancel)")
        .allow_empty(true)
        .interact_text()?;
    if typed.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(typed.trim())))
}

fn upload_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}").unwrap(),
    );
    bar.set_message("Uploading...");
    bar
}

fn report(outcome: Result<UploadOutcome>, destination: &str) {
    match outcome {
        Ok(outcome) => {
            let verb = if outcome.updated_existing {
                "Replaced"
            } else {
                "Uploaded"
            };
            success_banner(&format!(
                "{} {} in {} (file ID: {})",
                verb, outcome.final_name, destination, outcome.file_id
            ));
        }
        Err(err) => error_banner(&format!("Upload failed: {:#}", err)),
    }
}

fn success_banner(msg: &str) {
    println!("{}", msg.green());
}

fn error_banner(msg: &str) {
    eprintln!("{}", msg.red());
}

fn info_banner(msg: &str) {
    println!("{}", msg.cyan());
}
