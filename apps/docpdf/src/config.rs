//! Print settings loaded from an optional `docpdf.json`
//!
//! All keys are optional; defaults print Letter portrait with no
//! header/footer chrome, matching the browser's own print dialog.

use std::fs;
use std::path::Path;

use anyhow::Context;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use serde::Deserialize;

/// Settings file name looked up inside the scanned directory.
pub const SETTINGS_FILE: &str = "docpdf.json";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// External link base; when absent, external links are omitted from
    /// the merged outlines.
    pub base_url: Option<String>,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    /// Page margins in inches.
    pub margin: Margin,
    pub landscape: bool,
    pub format: PaperFormat,
    pub print_background: bool,
}

impl RenderConfig {
    /// Load `docpdf.json` from `dir`, falling back to defaults when the
    /// file does not exist.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(RenderConfig::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Chrome print parameters for every rendered page.
    pub fn print_params(&self) -> PrintToPdfParams {
        let (width, height) = self.format.dimensions();
        PrintToPdfParams {
            landscape: Some(self.landscape),
            display_header_footer: Some(self.display_header_footer),
            print_background: Some(self.print_background),
            paper_width: Some(width),
            paper_height: Some(height),
            margin_top: Some(self.margin.top),
            margin_bottom: Some(self.margin.bottom),
            margin_left: Some(self.margin.left),
            margin_right: Some(self.margin.right),
            header_template: self.header_template.clone(),
            footer_template: self.footer_template.clone(),
            ..PrintToPdfParams::default()
        }
    }
}

/// Margins in inches.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Margin {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Margin {
    fn default() -> Self {
        Margin {
            top: 0.4,
            bottom: 0.4,
            left: 0.4,
            right: 0.4,
        }
    }
}

/// Paper sizes in inches.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
pub enum PaperFormat {
    #[default]
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A3,
    A4,
    A5,
}

impl PaperFormat {
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
            PaperFormat::Ledger => (17.0, 11.0),
            PaperFormat::A3 => (11.69, 16.54),
            PaperFormat::A4 => (8.27, 11.69),
            PaperFormat::A5 => (5.83, 8.27),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_letter_portrait() {
        let config = RenderConfig::default();
        assert_eq!(config.format, PaperFormat::Letter);
        assert!(!config.landscape);
        assert!(config.base_url.is_none());

        let params = config.print_params();
        assert_eq!(params.paper_width, Some(8.5));
        assert_eq!(params.paper_height, Some(11.0));
        assert_eq!(params.landscape, Some(false));
    }

    #[test]
    fn test_settings_parse_camel_case() {
        let config: RenderConfig = serde_json::from_str(
            r#"{
                "baseUrl": "https://docs.example.com",
                "displayHeaderFooter": true,
                "footerTemplate": "<span class=\"pageNumber\"></span>",
                "margin": {"top": 1.0, "bottom": 1.0},
                "format": "A4",
                "landscape": true,
                "printBackground": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://docs.example.com"));
        assert_eq!(config.format, PaperFormat::A4);
        assert_eq!(config.margin.top, 1.0);
        // Unspecified margin edges keep their defaults.
        assert_eq!(config.margin.left, 0.4);
        assert!(config.landscape);

        let params = config.print_params();
        assert_eq!(params.paper_width, Some(8.27));
        assert!(params.footer_template.is_some());
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::load(dir.path()).unwrap();
        assert_eq!(config.format, PaperFormat::Letter);
    }

    #[test]
    fn test_settings_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"format": "Legal"}"#).unwrap();
        let config = RenderConfig::load(dir.path()).unwrap();
        assert_eq!(config.format, PaperFormat::Legal);
    }
}
