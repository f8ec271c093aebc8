use std::path::Path;

use anyhow::anyhow;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Executable used for resolved dub tasks
    pub dub_path: String,
    pub enable_sdl_linting: bool,
    /// Delay between the last edit and publishing diagnostics
    pub lint_delay_ms: u64,
    pub registry_url: String,
    pub registry_timeout_secs: u64,
    /// How long the registry's package list is reused before refetching
    pub package_list_ttl_secs: u64,
    pub max_package_completions: usize,
    pub hover: bool,
}

impl Settings {
    pub fn new(root_dir: &Path) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/dub-lsp/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.dub-lsp",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .add_source(Environment::with_prefix("DUB_LSP"))
            .set_default("dub_path", "dub")?
            .set_default("enable_sdl_linting", true)?
            .set_default("lint_delay_ms", 50)?
            .set_default("registry_url", "https://code.dlang.org")?
            .set_default("registry_timeout_secs", 10)?
            .set_default("package_list_ttl_secs", 3600)?
            .set_default("max_package_completions", 100)?
            .set_default("hover", true)?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            dub_path: "dub".to_string(),
            enable_sdl_linting: true,
            lint_delay_ms: 50,
            registry_url: "https://code.dlang.org".to_string(),
            registry_timeout_secs: 10,
            package_list_ttl_secs: 3600,
            max_package_completions: 100,
            hover: true,
        }
    }
}
