use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Print `value` as JSON/YAML, or fall back to `human` for the plain format.
    pub fn print<T: Serialize>(self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        match self {
            OutputFormat::Human => println!("{}", human()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        }
        Ok(())
    }
}
