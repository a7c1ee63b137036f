//! Streaming merge of Chrome-produced PDFs into one document
//!
//! Input objects are copied into a unified object space by offsetting
//! their ids with `base_id`; the catalog, page tree, outline tree,
//! structure tree and named destinations are synthesized afterwards at
//! fixed high-numbered ids. The merger never builds an object graph: it
//! exploits the producer's one-object-per-`obj`/`endobj` layout to
//! process the byte stream linearly.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use indexmap::{IndexMap, IndexSet};

use crate::error::PdfStitchError;
use crate::outline::{OutlineNode, UrlResolver};
use crate::rewriter::{rewrite_body, ObjectKind, ANNOTATION_PARENT_THRESHOLD};
use crate::scanner::{find_pattern, ObjectScanner};
use crate::trailer::write_trailer;
use crate::writer::CountingWriter;

/// Ids at and above this value are reserved for synthesized objects.
pub const RESERVED_ID_BASE: u32 = 1_000_000;

pub(crate) const INFO_ID: u32 = 1_000_000;
pub(crate) const CATALOG_ID: u32 = 1_000_001;
pub(crate) const PAGES_ID: u32 = 1_000_002;
pub(crate) const STRUCT_TREE_ROOT_ID: u32 = 1_000_003;
pub(crate) const PARENT_TREE_ID: u32 = 1_000_004;
pub(crate) const DESTS_ID: u32 = 1_000_005;

const READ_CHUNK: usize = 64 * 1024;

/// Bookkeeping accumulated across all input PDFs of one merge.
#[derive(Debug, Default)]
pub struct MergerState {
    /// Object id to starting byte offset, for every encountered object.
    pub xrefs: BTreeMap<u32, u64>,
    /// Count of input objects already absorbed; added to input ids.
    pub base_id: u32,
    /// Unified page object ids in insertion order.
    pub pages: Vec<u32>,
    /// Unified ids of `/StructElem /S /Document` objects, one per input.
    pub struct_elems: Vec<u32>,
    /// Per-page `/StructParents` targets indexed by page position; zero for
    /// pages with no ParentTree entry.
    pub struct_parents: Vec<u32>,
    /// Per-annotation `/StructParent` targets in insertion order.
    pub struct_parent: Vec<u32>,
    /// Offset added to `/StructParents` values of the current input.
    pub base_struct_parents_num: u32,
    /// Offset added to `/StructParent` values of the current input.
    pub base_struct_parent_num: u32,
    /// Internal page URLs in outline pre-order; the set index names the
    /// `/URLD-<n>` destination.
    pub url_ids: IndexSet<String>,
    /// Internal URL to the unified id of the first page of its PDF.
    pub url_dests: IndexMap<String, u32>,
}

/// What a finished merge produced.
#[derive(Debug, Clone, Copy)]
pub struct MergeSummary {
    pub pages: usize,
    pub bytes: u64,
}

/// One in-progress merged document.
pub struct Merger<W: Write> {
    writer: CountingWriter<W>,
    state: MergerState,
}

impl<W: Write> Merger<W> {
    /// Start a merged document; writes the PDF header immediately.
    pub fn new(out: W) -> Result<Self, PdfStitchError> {
        let mut writer = CountingWriter::new(out);
        writer.write_bytes(b"%PDF-1.4\n%\xd3\xeb\xe9\xe1\n")?;
        Ok(Merger {
            writer,
            state: MergerState::default(),
        })
    }

    pub fn state(&self) -> &MergerState {
        &self.state
    }

    /// Assign `/URLD` ids to every internal page URL of the outline, in
    /// pre-order. Must run before any input is absorbed so destination
    /// naming is independent of render outcomes.
    pub fn register_outline_urls(&mut self, outline: &OutlineNode, resolver: &UrlResolver) {
        let parsed = resolver.resolve(outline.href.as_deref());
        if let Some(page_url) = parsed.page_url {
            self.state.url_ids.insert(page_url);
        }
        for child in &outline.items {
            self.register_outline_urls(child, resolver);
        }
    }

    /// Absorb one input PDF, copying its objects into the unified space.
    pub fn absorb<R: Read>(
        &mut self,
        source_url: &str,
        mut reader: R,
    ) -> Result<(), PdfStitchError> {
        let mut scanner = ObjectScanner::new();
        let first_page_index = self.state.pages.len();
        let mut objects_seen = 0u32;
        let mut annotations_seen = 0u32;

        loop {
            let mut chunk = vec![0u8; READ_CHUNK];
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            chunk.truncate(n);
            scanner.push(chunk);
            while let Some((input_id, body)) = scanner.next_object() {
                let body = body.as_bytes();
                self.process_object(input_id, body, &mut objects_seen, &mut annotations_seen)?;
            }
        }
        if scanner.has_partial_object() {
            return Err(PdfStitchError::MalformedInput(format!(
                "endobj not found before end of input: {source_url}"
            )));
        }

        self.state.base_id += objects_seen;
        self.state.base_struct_parent_num += annotations_seen;
        while self.state.struct_parents.len() < self.state.pages.len() {
            self.state.struct_parents.push(0);
        }
        self.state.base_struct_parents_num = self.state.struct_parents.len() as u32;
        if self.state.pages.len() > first_page_index {
            self.state
                .url_dests
                .insert(source_url.to_string(), self.state.pages[first_page_index]);
        }
        Ok(())
    }

    fn process_object(
        &mut self,
        input_id: u32,
        body: &[u8],
        objects_seen: &mut u32,
        annotations_seen: &mut u32,
    ) -> Result<(), PdfStitchError> {
        let uid = self.state.base_id + input_id;
        if uid >= RESERVED_ID_BASE {
            return Err(PdfStitchError::TooManyObjects(uid));
        }
        // Skipped objects record the position the next write will occupy;
        // nothing in the merged document references their ids.
        self.state.xrefs.insert(uid, self.writer.position());
        *objects_seen += 1;

        // The first object of each Chrome PDF is its /Info; one unified
        // /Info is synthesized instead.
        if input_id == 1 {
            return Ok(());
        }
        if body.starts_with(b"<</Limits ")
            || body.starts_with(b"<</Type /Catalog")
            || body.starts_with(b"<</Type /StructTreeRoot")
        {
            return Ok(());
        }
        if body.starts_with(b"<</Type /ParentTree\n") {
            self.collect_parent_tree(body, annotations_seen);
            return Ok(());
        }

        let kind = if body.starts_with(b"<</Type /Page\n") {
            self.state.pages.push(uid);
            ObjectKind::Page
        } else if body.starts_with(b"<</Type /StructElem\n/S /Document\n") {
            self.state.struct_elems.push(uid);
            ObjectKind::DocumentElem
        } else {
            ObjectKind::Other
        };

        self.writer.write_int(uid as u64)?;
        self.writer.write_bytes(b" 0 obj\n")?;
        rewrite_body(&mut self.writer, &self.state, body, kind)?;
        self.writer.write_bytes(b"endobj\n")?;
        Ok(())
    }

    /// Consume an input `/Type /ParentTree` object: its inline
    /// `/Nums [ n id 0 R ... ]` pairs feed the unified parent tree.
    /// Keys below the annotation threshold index pages of this input;
    /// gaps (blank pages) keep a zero slot.
    fn collect_parent_tree(&mut self, body: &[u8], annotations_seen: &mut u32) {
        let Some(start) = find_pattern(body, b"/Nums [") else {
            return;
        };
        let nums = &body[start + 7..];
        let end = find_pattern(nums, b"]").unwrap_or(nums.len());
        let entries = parse_nums_entries(&nums[..end]);
        for (n, id) in entries {
            let uid = self.state.base_id + id;
            if n < ANNOTATION_PARENT_THRESHOLD {
                let slot = (self.state.base_struct_parents_num + n) as usize;
                if self.state.struct_parents.len() <= slot {
                    self.state.struct_parents.resize(slot + 1, 0);
                }
                self.state.struct_parents[slot] = uid;
            } else {
                self.state.struct_parent.push(uid);
                *annotations_seen += 1;
            }
        }
    }

    /// Synthesize the outline, fixed-id objects, xref table and trailer,
    /// then flush.
    pub fn finish(
        mut self,
        outline: &mut OutlineNode,
        resolver: &UrlResolver,
        creator: &str,
    ) -> Result<MergeSummary, PdfStitchError> {
        write_trailer(&mut self.writer, &mut self.state, outline, resolver, creator)?;
        self.writer.flush()?;
        Ok(MergeSummary {
            pages: self.state.pages.len(),
            bytes: self.writer.position(),
        })
    }
}

/// Merge every rendered page referenced by `outline` into `out`.
///
/// `source` maps an internal page URL to a byte reader for its rendered
/// PDF, or `None` when that URL failed to render (its outline entries
/// keep their subtree, with no live destination). Inputs are consumed in
/// outline pre-order, which fixes the final page order.
pub fn merge<W, F, R>(
    out: W,
    outline: &mut OutlineNode,
    resolver: &UrlResolver,
    mut source: F,
    creator: &str,
) -> Result<MergeSummary, PdfStitchError>
where
    W: Write,
    F: FnMut(&str) -> Option<R>,
    R: Read,
{
    let mut merger = Merger::new(out)?;
    merger.register_outline_urls(outline, resolver);
    let urls: Vec<String> = merger.state.url_ids.iter().cloned().collect();
    for url in urls {
        if let Some(reader) = source(&url) {
            merger.absorb(&url, reader)?;
        }
    }
    merger.finish(outline, resolver, creator)
}

/// Parse the `(key, object id)` pairs of an inline `/Nums` array. Each
/// entry is `key id 0 R`; the generation is always zero for this producer.
fn parse_nums_entries(bytes: &[u8]) -> Vec<(u32, u32)> {
    let mut ints = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let mut n = 0u64;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                n = n * 10 + (bytes[i] - b'0') as u64;
                i += 1;
            }
            ints.push(n as u32);
        } else {
            i += 1;
        }
    }
    // key, id, generation triplets
    ints.chunks_exact(3).map(|c| (c[0], c[1])).collect()
}
