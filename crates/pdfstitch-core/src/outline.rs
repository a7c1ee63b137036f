//! TOC outline model and URL resolution
//!
//! A `toc.json` file is a tree of `{enablePdf?, name?, href?, items?}`
//! nodes. Hrefs are resolved against the TOC's directory: relative hrefs
//! point at a page served by the local static server, absolute hrefs are
//! external links.

use serde::Deserialize;

use crate::error::PdfStitchError;

/// One node of the bookmark tree. `pdf_id` and `count` are assigned while
/// the merged document's outline is synthesized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineNode {
    /// Only honored on TOC roots; trees without it are not printed.
    pub enable_pdf: bool,
    pub name: String,
    pub href: Option<String>,
    pub items: Vec<OutlineNode>,
    #[serde(skip)]
    pub pdf_id: u32,
    /// Number of descendant outline nodes, excluding the node itself.
    #[serde(skip)]
    pub count: u32,
}

impl OutlineNode {
    pub fn from_json(json: &str) -> Result<Self, PdfStitchError> {
        serde_json::from_str(json).map_err(|e| PdfStitchError::InvalidOutline(e.to_string()))
    }
}

/// An outline href resolved against its TOC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    /// Absolute URL of a locally rendered page; present iff the href is
    /// relative.
    pub page_url: Option<String>,
    /// Absolute link target; present iff an external base URL is
    /// configured.
    pub external_url: Option<String>,
}

/// Resolves outline hrefs for one TOC.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    server_url: String,
    base_url: Option<String>,
    toc_dir: String,
}

impl UrlResolver {
    /// `toc_dir` is the TOC's directory relative to the served root
    /// (empty for the root itself).
    pub fn new(server_url: &str, base_url: Option<String>, toc_dir: &str) -> Self {
        UrlResolver {
            server_url: server_url.trim_end_matches('/').to_string(),
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
            toc_dir: toc_dir.trim_matches('/').to_string(),
        }
    }

    pub fn resolve(&self, href: Option<&str>) -> ParsedUrl {
        let Some(href) = href else {
            return ParsedUrl::default();
        };
        let absolute = is_absolute_url(href);
        let external_url = self.base_url.as_deref().map(|base| {
            if absolute {
                href.to_string()
            } else {
                join_url(base, &self.toc_dir, href)
            }
        });
        let page_url = if absolute {
            None
        } else {
            Some(join_url(&self.server_url, &self.toc_dir, href))
        };
        ParsedUrl {
            page_url,
            external_url,
        }
    }
}

fn is_absolute_url(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

/// Join `href` onto `base` below `dir`, collapsing `.` and `..` path
/// segments. `base` carries no trailing slash.
fn join_url(base: &str, dir: &str, href: &str) -> String {
    let path = if let Some(rooted) = href.strip_prefix('/') {
        rooted.to_string()
    } else if dir.is_empty() {
        href.to_string()
    } else {
        format!("{dir}/{href}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("{base}/{}", segments.join("/"))
}
