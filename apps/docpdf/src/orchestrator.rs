//! Render-and-merge pipeline
//!
//! Two fan-out phases: every unique page URL referenced by any TOC is
//! printed to PDF bytes exactly once, then each TOC is merged into its
//! sibling `.pdf`. A failed render leaves a `None` in the render map and
//! its outline entries keep their subtree with no live destination; a
//! failed merge abandons only that TOC.

use std::collections::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use pdfstitch_core::{OutlineNode, UrlResolver};
use tracing::{debug, error, info, instrument, warn};

use crate::browser::PagePool;
use crate::config::RenderConfig;
use crate::server::StaticServer;

const TOC_FILE: &str = "toc.json";
const CREATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// One printable TOC found under the scanned directory.
#[derive(Debug)]
pub struct TocEntry {
    /// Path of the `toc.json` file.
    pub path: PathBuf,
    /// Directory of the TOC relative to the served root, `/`-separated.
    pub rel_dir: String,
    pub outline: OutlineNode,
}

/// Render every eligible TOC under `dir` and write the merged PDFs.
#[instrument(skip(config), fields(dir = %dir.display()))]
pub async fn run(dir: &Path, config: RenderConfig, concurrency: usize) -> Result<()> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("No such directory: {}", dir.display()))?;
    let tocs = discover_tocs(&dir)?;
    if tocs.is_empty() {
        warn!(
            "No {TOC_FILE} with \"enablePdf\": true found under {}",
            dir.display()
        );
        return Ok(());
    }
    info!("Found {} printable TOC(s)", tocs.len());

    let server = StaticServer::start(&dir).await?;
    let pool = Arc::new(PagePool::launch().await?);

    let mut urls: IndexSet<String> = IndexSet::new();
    for toc in &tocs {
        let resolver = UrlResolver::new(server.url(), config.base_url.clone(), &toc.rel_dir);
        collect_page_urls(&toc.outline, &resolver, &mut urls);
    }
    info!("Rendering {} unique page(s)", urls.len());

    let concurrency = concurrency.max(1);
    let params = config.print_params();
    let renders: HashMap<String, Option<Vec<u8>>> = stream::iter(urls.into_iter().map(|url| {
        let pool = pool.clone();
        let params = params.clone();
        async move {
            let bytes = render_page(&pool, params, &url).await;
            (url, bytes)
        }
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let failed = renders.values().filter(|bytes| bytes.is_none()).count();
    if failed > 0 {
        warn!("{failed} page(s) failed to render");
    }

    let renders = Arc::new(renders);
    let server_url = server.url().to_string();
    let merges: Vec<_> = tocs
        .into_iter()
        .map(|toc| {
            let renders = renders.clone();
            let server_url = server_url.clone();
            let base_url = config.base_url.clone();
            tokio::task::spawn_blocking(move || merge_toc(toc, &renders, &server_url, base_url))
        })
        .collect();

    let mut failures = 0;
    for task in merges {
        if let Err(e) = task.await? {
            error!("{e:#}");
            failures += 1;
        }
    }

    if let Ok(pool) = Arc::try_unwrap(pool) {
        if let Err(e) = pool.close().await {
            debug!("Browser shutdown: {e:#}");
        }
    }
    server.shutdown();

    if failures > 0 {
        anyhow::bail!("{failures} TOC(s) failed to merge");
    }
    Ok(())
}

/// Find every `toc.json` below `root` whose tree opts into printing.
pub fn discover_tocs(root: &Path) -> Result<Vec<TocEntry>> {
    let mut paths = Vec::new();
    collect_toc_paths(root, &mut paths)?;
    paths.sort();

    let mut tocs = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let outline = match OutlineNode::from_json(&content) {
            Ok(outline) => outline,
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };
        if !outline.enable_pdf {
            debug!("Skipping {}: PDF not enabled", path.display());
            continue;
        }
        let rel_dir = path
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        tocs.push(TocEntry {
            path,
            rel_dir,
            outline,
        });
    }
    Ok(tocs)
}

fn collect_toc_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_toc_paths(&path, paths)?;
        } else if path.file_name().is_some_and(|name| name == TOC_FILE) {
            paths.push(path);
        }
    }
    Ok(())
}

/// Pre-order walk collecting internal page URLs; insertion order into the
/// set fixes the render order.
fn collect_page_urls(node: &OutlineNode, resolver: &UrlResolver, urls: &mut IndexSet<String>) {
    if let Some(page_url) = resolver.resolve(node.href.as_deref()).page_url {
        urls.insert(page_url);
    }
    for child in &node.items {
        collect_page_urls(child, resolver, urls);
    }
}

/// Print one page to PDF bytes. `None` records a render failure: a
/// non-OK or unreachable URL, or a navigation/print error.
async fn render_page(pool: &PagePool, params: PrintToPdfParams, url: &str) -> Option<Vec<u8>> {
    match reqwest::get(url).await {
        Ok(response) if response.status().is_success() => {}
        Ok(response) => {
            warn!("Skipping {url}: HTTP {}", response.status());
            return None;
        }
        Err(e) => {
            warn!("Skipping {url}: {e}");
            return None;
        }
    }

    let page = match pool.acquire().await {
        Ok(page) => page,
        Err(e) => {
            warn!("Skipping {url}: {e:#}");
            return None;
        }
    };
    let printed: Result<Vec<u8>> = async {
        page.goto(url).await.context("Navigation failed")?;
        page.wait_for_navigation()
            .await
            .context("Load never settled")?;
        page.pdf(params).await.context("Print failed")
    }
    .await;

    match printed {
        Ok(bytes) => {
            debug!("Rendered {url} ({} bytes)", bytes.len());
            pool.release(page);
            Some(bytes)
        }
        Err(e) => {
            warn!("Failed to render {url}: {e:#}");
            // A page that failed mid-navigation is not worth reusing.
            let _ = page.close().await;
            None
        }
    }
}

/// Merge one TOC's rendered pages into its sibling `toc.pdf`.
#[instrument(skip_all, fields(toc = %toc.path.display()))]
fn merge_toc(
    toc: TocEntry,
    renders: &HashMap<String, Option<Vec<u8>>>,
    server_url: &str,
    base_url: Option<String>,
) -> Result<()> {
    let out_path = toc.path.with_extension("pdf");
    let file = fs::File::create(&out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    let resolver = UrlResolver::new(server_url, base_url, &toc.rel_dir);
    let mut outline = toc.outline;

    let merged = pdfstitch_core::merge(
        BufWriter::new(file),
        &mut outline,
        &resolver,
        |url| renders.get(url).and_then(|bytes| bytes.as_deref()),
        CREATOR,
    );
    match merged {
        Ok(summary) => {
            info!(
                "Wrote {} ({} pages, {} bytes)",
                out_path.display(),
                summary.pages,
                summary.bytes
            );
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&out_path);
            Err(e).with_context(|| format!("Failed to merge {}", toc.path.display()))
        }
    }
}
