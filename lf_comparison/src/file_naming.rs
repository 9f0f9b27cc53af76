use log::debug;
use std::path::PathBuf;

/// Grid-model snapshot file name: `{date}_{time}_{type}_{country}{version}.{format}`
pub fn snapshot_file_name(
    date: &str,
    time: &str,
    file_type: &str,
    country_code: &str,
    version: u32,
    format: &str,
) -> String {
    format!("{}_{}_{}_{}{}.{}", date, time, file_type, country_code, version, format)
}

/// Reference (UNICORN) load-flow report workbook for one timestamp and version.
pub fn reference_report_name(
    date: &str,
    time: &str,
    file_type: &str,
    country_code: &str,
    version: u32,
) -> String {
    format!("{}_{}_{}_{}_{}_igmLfReport", date, time, file_type, country_code, version)
}

/// Candidate (OPENLF) load-flow report workbook. Always written as version 0.
pub fn candidate_report_name(date: &str, time: &str, file_type: &str, country_code: &str) -> String {
    format!("{}_{}_{}_{}_0_OPENLF_REPORT", date, time, file_type, country_code)
}

/// Capacity-calculation snapshot: `{date}_{time}_2D{d}_UX{u}.uct`
pub fn capacity_snapshot_name(date: &str, time: &str, d: u32, u: u32) -> String {
    format!("{}_{}_2D{}_UX{}.uct", date, time, d, u)
}

/// The 24 half-hour timestamps `0030` through `2330`.
pub fn half_hour_timestamps() -> Vec<String> {
    (0..24).map(|hour| format!("{:02}30", hour)).collect()
}

/// Check every candidate version and return the highest one whose path exists.
///
/// The candidate order does not matter; versions that do not resolve to an
/// existing file are ignored.
pub fn find_highest_version<I, F>(versions: I, path_for: F) -> Option<(u32, PathBuf)>
where
    I: IntoIterator<Item = u32>,
    F: Fn(u32) -> PathBuf,
{
    let mut best: Option<(u32, PathBuf)> = None;

    for version in versions {
        let path = path_for(version);
        if !path.exists() {
            debug!("Version {} not found at {}", version, path.display());
            continue;
        }

        let is_higher = best.as_ref().map_or(true, |(current, _)| version > *current);
        if is_higher {
            best = Some((version, path));
        }
    }

    best
}
