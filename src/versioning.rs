// Filename pattern checks and version arithmetic. Everything here is a
// pure function of (existing remote names, base name, user input) so the
// naming rules can be exercised without a network in sight.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use regex::Regex;

/// Civil time zone used when stamping folder-scoped filenames (UTC+05:30).
/// The offset has no daylight saving, so a fixed offset is exact year-round.
pub fn timestamp_zone() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("offset within +/-24h")
}

fn base_pattern(base_name: &str, tail: &str) -> Result<Regex> {
    // Base names come from user configuration and may contain regex
    // metacharacters ("A.C" must not match "AXC_V1.zip").
    Regex::new(&format!(r"(?i)^{}{}", regex::escape(base_name), tail))
        .with_context(|| format!("building name pattern for {}", base_name))
}

/// Parse a declared filename against the required `<base>_V<number>[.zip]`
/// pattern, returning the declared version on a match. Comparison is
/// case-insensitive; anything else is a rejection.
pub fn parse_versioned_name(base_name: &str, candidate: &str) -> Option<u32> {
    let pattern = base_pattern(base_name, r"_V(\d+)(\.zip)?$").ok()?;
    let caps = pattern.captures(candidate)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Highest `<base>_V<n>.zip` version among `existing`, if any. Duplicate
/// maxima collapse to the single max value.
pub fn max_existing_version<S: AsRef<str>>(base_name: &str, existing: &[S]) -> Option<u32> {
    let pattern = base_pattern(base_name, r"_V(\d+)\.zip$").ok()?;
    existing
        .iter()
        .filter_map(|name| pattern.captures(name.as_ref()))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .max()
}

/// Next free version for `base_name`: one past the highest already present,
/// or 1 when no prior version exists.
pub fn next_version<S: AsRef<str>>(base_name: &str, existing: &[S]) -> u32 {
    max_existing_version(base_name, existing).map_or(1, |v| v + 1)
}

/// Final remote name for a versioned upload. Existing versions force the
/// next number regardless of what the user declared; with no prior versions
/// the declared name is kept unchanged.
pub fn versioned_filename<S: AsRef<str>>(base_name: &str, existing: &[S], declared: &str) -> String {
    match max_existing_version(base_name, existing) {
        Some(max) => format!("{}_V{}.zip", base_name, max + 1),
        None => declared.to_string(),
    }
}

/// Case-insensitive comparison of an archive's stem (name without the
/// extension) against the destination folder's name.
pub fn stem_matches_folder(folder_name: &str, file_name: &str) -> bool {
    let stem = match file_name.rfind('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    };
    stem.to_lowercase() == folder_name.to_lowercase()
}

/// Highest `<folder>_v<n>` counter among names already present in the
/// destination folder.
pub fn max_folder_version<S: AsRef<str>>(folder_name: &str, existing: &[S]) -> Option<u32> {
    let pattern = base_pattern(folder_name, r"_v(\d+)(?:[_.]|$)").ok()?;
    existing
        .iter()
        .filter_map(|name| pattern.captures(name.as_ref()))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .max()
}

/// Next folder-scoped version: one past the highest counter found, or 1.
pub fn next_folder_version<S: AsRef<str>>(folder_name: &str, existing: &[S]) -> u32 {
    max_folder_version(folder_name, existing).map_or(1, |v| v + 1)
}

/// Assemble `<Folder>_v<n>_<uploader>_<YYYYMMDD_HHMMSS>.zip`.
pub fn folder_scoped_filename(
    folder_name: &str,
    version: u32,
    uploader_tag: &str,
    now: DateTime<FixedOffset>,
) -> String {
    format!(
        "{}_v{}_{}_{}.zip",
        folder_name,
        version,
        uploader_tag,
        now.format("%Y%m%d_%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_well_formed_versioned_names() {
        assert_eq!(parse_versioned_name("ACS", "ACS_V1.zip"), Some(1));
        assert_eq!(parse_versioned_name("ACS", "ACS_V12"), Some(12));
        assert_eq!(parse_versioned_name("ACS", "acs_v3.ZIP"), Some(3));
    }

    #[test]
    fn rejects_malformed_versioned_names() {
        assert_eq!(parse_versioned_name("ACS", "ACS.zip"), None);
        assert_eq!(parse_versioned_name("ACS", "ACS_V.zip"), None);
        assert_eq!(parse_versioned_name("ACS", "ACS_V1.tar"), None);
        assert_eq!(parse_versioned_name("ACS", "ACS_V1.zip.bak"), None);
        assert_eq!(parse_versioned_name("ACS", "XACS_V1.zip"), None);
    }

    #[test]
    fn base_name_metacharacters_are_literal() {
        assert_eq!(parse_versioned_name("A.C", "AXC_V1.zip"), None);
        assert_eq!(parse_versioned_name("A.C", "A.C_V1.zip"), Some(1));
        assert_eq!(max_existing_version("A.C", &["AXC_V9.zip", "A.C_V2.zip"]), Some(2));
    }

    #[test]
    fn next_version_is_one_past_the_max() {
        let existing = ["ACS_V1.zip", "ACS_V3.zip", "notes.txt"];
        assert_eq!(next_version("ACS", &existing), 4);
    }

    #[test]
    fn next_version_defaults_to_one() {
        let empty: [&str; 0] = [];
        assert_eq!(next_version("ACS", &empty), 1);
        assert_eq!(next_version("ACS", &["README.md", "ACS_final.zip"]), 1);
    }

    #[test]
    fn next_version_ignores_listing_order() {
        let forward = ["ACS_V1.zip", "ACS_V2.zip", "ACS_V7.zip"];
        let reversed = ["ACS_V7.zip", "ACS_V2.zip", "ACS_V1.zip"];
        assert_eq!(next_version("ACS", &forward), next_version("ACS", &reversed));
    }

    #[test]
    fn duplicate_maxima_count_once() {
        let existing = ["ACS_V5.zip", "acs_V5.ZIP"];
        assert_eq!(next_version("ACS", &existing), 6);
    }

    #[test]
    fn versioned_filename_overrides_declared_name() {
        let existing = ["ACS_V1.zip", "ACS_V3.zip"];
        assert_eq!(versioned_filename("ACS", &existing, "ACS_V5.zip"), "ACS_V4.zip");
    }

    #[test]
    fn versioned_filename_keeps_declared_name_without_history() {
        let empty: [&str; 0] = [];
        assert_eq!(versioned_filename("ACS", &empty, "ACS_V5.zip"), "ACS_V5.zip");
    }

    #[test]
    fn stem_match_is_case_insensitive() {
        assert!(stem_matches_folder("Report", "report.zip"));
        assert!(stem_matches_folder("report", "Report.ZIP"));
        assert!(stem_matches_folder("Budget", "budget.zip"));
        assert!(!stem_matches_folder("Report", "reports.zip"));
        assert!(!stem_matches_folder("Report", "report_v1.zip"));
    }

    #[test]
    fn folder_version_scan_reads_lowercase_suffixes() {
        let existing = [
            "Budget_v1_maya_20250101_093000.zip",
            "Budget_v4_ravi_20250301_110000.zip",
            "Budget_notes.txt",
        ];
        assert_eq!(next_folder_version("Budget", &existing), 5);

        let empty: [&str; 0] = [];
        assert_eq!(next_folder_version("Budget", &empty), 1);
    }

    #[test]
    fn folder_version_scan_requires_a_counter_boundary() {
        // "_v12x" carries no usable counter, "_v12_" and "_v12." do.
        assert_eq!(max_folder_version("Budget", &["Budget_v12x.zip"]), None);
        assert_eq!(max_folder_version("Budget", &["Budget_v12.zip"]), Some(12));
        assert_eq!(max_folder_version("Budget", &["Budget_v12_x.zip"]), Some(12));
    }

    #[test]
    fn folder_scoped_filename_layout() {
        let now = timestamp_zone()
            .with_ymd_and_hms(2025, 3, 14, 9, 26, 53)
            .unwrap();
        assert_eq!(
            folder_scoped_filename("Budget", 1, "maya", now),
            "Budget_v1_maya_20250314_092653.zip"
        );
    }
}
