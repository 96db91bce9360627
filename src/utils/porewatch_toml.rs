//! Load `porewatch.toml` (CLI only). The lib never reads it; library callers build a [`Config`] directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Config;

#[derive(Debug, Deserialize)]
pub(crate) struct PorewatchToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    input: Option<String>,
    output: Option<String>,
    parallel: Option<usize>,
    batch_chunk: Option<usize>,
    live: Option<bool>,
    live_analysis_delay: Option<u64>,
    classify: Option<bool>,
    quiet: Option<bool>,
    verbose: Option<bool>,
    suffix: Option<String>,
    link_raw: Option<bool>,
    symlink_raw: Option<bool>,
    records: Option<bool>,
    dump_parts: Option<bool>,
    worker_program: Option<String>,
}

/// Load the settings file at `path` if present. Returns None if missing or unreadable.
pub(crate) fn load_porewatch_toml(path: &Path) -> Option<PorewatchToml> {
    let s = std::fs::read_to_string(path).ok()?;
    parse_porewatch_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub(crate) fn parse_porewatch_toml(s: &str) -> Result<PorewatchToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite config field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $config:expr, $sec_field:ident => $config_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $config.$config_field = v;
        }
    };
}

/// Apply file settings to config (only fields present in the file). Call before applying CLI flags.
pub(crate) fn apply_file_to_config(file: &PorewatchToml, config: &mut Config) {
    let sec = &file.settings;
    if let Some(ref p) = sec.input {
        config.input_dir = PathBuf::from(p);
    }
    if let Some(ref p) = sec.output {
        config.output_dir = PathBuf::from(p);
    }
    apply_file_opt!(sec, config, parallel => parallel);
    apply_file_opt!(sec, config, batch_chunk => chunk_size);
    apply_file_opt!(sec, config, live => live);
    if let Some(secs) = sec.live_analysis_delay {
        config.analysis_start_delay = Duration::from_secs(secs);
    }
    apply_file_opt!(sec, config, classify => classify);
    apply_file_opt!(sec, config, quiet => quiet);
    apply_file_opt!(sec, config, verbose => verbose);
    apply_file_opt!(sec, config, suffix => suffix);
    apply_file_opt!(sec, config, link_raw => link_raw);
    apply_file_opt!(sec, config, symlink_raw => symlink_raw);
    apply_file_opt!(sec, config, records => records_output);
    apply_file_opt!(sec, config, dump_parts => dump_parts);
    if let Some(ref p) = sec.worker_program {
        config.worker_program = Some(PathBuf::from(p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_settings_override_defaults() {
        let file = parse_porewatch_toml(
            r#"
[settings]
parallel = 4
batch_chunk = 16
live = true
live_analysis_delay = 5
suffix = ".pod5"
records = false
"#,
        )
        .unwrap();
        let mut config = Config::default();
        apply_file_to_config(&file, &mut config);
        assert_eq!(config.parallel, 4);
        assert_eq!(config.chunk_size, 16);
        assert!(config.live);
        assert_eq!(config.analysis_start_delay, Duration::from_secs(5));
        assert_eq!(config.suffix, ".pod5");
        assert!(!config.records_output);
        assert!(!config.classify);
    }

    #[test]
    fn empty_file_keeps_defaults() {
        let file = parse_porewatch_toml("").unwrap();
        let mut config = Config::default();
        apply_file_to_config(&file, &mut config);
        assert_eq!(config.chunk_size, Config::default().chunk_size);
    }
}
