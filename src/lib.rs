// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the interactive uploader.
//
// Module responsibilities:
// - `config`: Runtime configuration (OAuth client credentials, the
//   top-level directory map, endpoint overrides) loaded from a JSON file.
// - `auth`: Credential provider that loads, validates, refreshes and
//   persists the cached OAuth token.
// - `drive`: Encapsulates HTTP interactions with the remote storage API
//   (folder/file listing, resumable create, in-place update).
// - `folders`: Builds the destination folder tree and flattens it into
//   display paths for the selection menu.
// - `versioning`: Filename pattern checks and version-number derivation.
// - `upload`: Sequential upload flows wiring validation, temp staging,
//   naming and the remote calls together.
// - `ui`: Implements the terminal-based user interface flows and
//   delegates work to the modules above.
//
// Keeping this separation makes it easier to test the naming and client
// logic or replace the UI in the future (for example, adding a TUI).
pub mod auth;
pub mod config;
pub mod drive;
pub mod folders;
pub mod upload;
pub mod ui;
pub mod versioning;
