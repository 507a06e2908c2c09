//! Pipeline configuration

use std::env;

/// Options for a research run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Run the extra research-data search alongside the answers
    pub gather_research_data: bool,
    /// Collect images from search results and include them in events
    pub include_images: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gather_research_data: false,
            include_images: true,
        }
    }
}

impl PipelineConfig {
    /// Load pipeline options from environment variables
    ///
    /// - RESEARCH_GATHER_DATA: enable the research-data stage (default false)
    /// - RESEARCH_INCLUDE_IMAGES: collect search images (default true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            gather_research_data: env_flag("RESEARCH_GATHER_DATA")
                .unwrap_or(defaults.gather_research_data),
            include_images: env_flag("RESEARCH_INCLUDE_IMAGES").unwrap_or(defaults.include_images),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|raw| parse_flag(&raw))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" YES "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(!config.gather_research_data);
        assert!(config.include_images);
    }
}
