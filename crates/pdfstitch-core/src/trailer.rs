//! Trailer synthesis: outline tree, fixed-id objects, xref and trailer
//!
//! All input-derived objects are already on disk by the time this runs,
//! so the catalog, page tree, structure tree, parent tree and named
//! destinations are written at constant high-numbered ids that every
//! rewritten object has referenced in advance.

use std::io::Write;

use crate::error::PdfStitchError;
use crate::merger::{
    MergerState, CATALOG_ID, DESTS_ID, INFO_ID, PAGES_ID, PARENT_TREE_ID, STRUCT_TREE_ROOT_ID,
};
use crate::outline::{OutlineNode, UrlResolver};
use crate::rewriter::ANNOTATION_PARENT_THRESHOLD;
use crate::writer::CountingWriter;

pub(crate) fn write_trailer<W: Write>(
    writer: &mut CountingWriter<W>,
    state: &mut MergerState,
    outline: &mut OutlineNode,
    resolver: &UrlResolver,
    creator: &str,
) -> Result<(), PdfStitchError> {
    let mut next_id = state.xrefs.len() as u32 + 1;
    assign_outline_ids(outline, &mut next_id);
    compute_outline_counts(outline);
    let outline_root_id = outline.pdf_id;
    write_outline_node(writer, state, resolver, outline, None)?;

    let mut fixed_offsets = [0u64; 6];

    // /Info
    fixed_offsets[0] = writer.position();
    writer.write_int(INFO_ID as u64)?;
    writer.write_bytes(b" 0 obj\n<</Creator (")?;
    writer.write_ascii_string(creator)?;
    writer.write_bytes(b")>>\nendobj\n")?;

    // /Catalog
    fixed_offsets[1] = writer.position();
    writer.write_int(CATALOG_ID as u64)?;
    writer.write_bytes(b" 0 obj\n<</Type /Catalog\n/Pages 1000002 0 R\n/Dests 1000005 0 R\n/PageMode /UseOutlines\n/Outlines ")?;
    writer.write_int(outline_root_id as u64)?;
    writer.write_bytes(
        b" 0 R\n/MarkInfo <</Type /MarkInfo /Marked true>>\n/StructTreeRoot 1000003 0 R\n>>\nendobj\n",
    )?;

    // /Pages
    fixed_offsets[2] = writer.position();
    writer.write_int(PAGES_ID as u64)?;
    writer.write_bytes(b" 0 obj\n<</Type /Pages\n/Count ")?;
    writer.write_int(state.pages.len() as u64)?;
    writer.write_bytes(b"\n/Kids [")?;
    for (i, page_id) in state.pages.iter().enumerate() {
        if i > 0 {
            writer.write_bytes(b" ")?;
        }
        writer.write_int(*page_id as u64)?;
        writer.write_bytes(b" 0 R")?;
    }
    writer.write_bytes(b"]\n>>\nendobj\n")?;

    // /StructTreeRoot
    fixed_offsets[3] = writer.position();
    writer.write_int(STRUCT_TREE_ROOT_ID as u64)?;
    writer.write_bytes(b" 0 obj\n<</Type /StructTreeRoot\n/K [")?;
    for (i, elem_id) in state.struct_elems.iter().enumerate() {
        if i > 0 {
            writer.write_bytes(b" ")?;
        }
        writer.write_int(*elem_id as u64)?;
        writer.write_bytes(b" 0 R")?;
    }
    writer.write_bytes(b"]\n/ParentTree 1000004 0 R\n>>\nendobj\n")?;

    // /ParentTree: page entries keyed by page index, then annotation
    // entries keyed from the annotation threshold up. Zero page slots
    // (blank pages) have no entry.
    fixed_offsets[4] = writer.position();
    writer.write_int(PARENT_TREE_ID as u64)?;
    writer.write_bytes(b" 0 obj\n<</Type /ParentTree\n/Nums [")?;
    let mut first = true;
    for (i, elem_id) in state.struct_parents.iter().enumerate() {
        if *elem_id == 0 {
            continue;
        }
        if !first {
            writer.write_bytes(b" ")?;
        }
        first = false;
        writer.write_int(i as u64)?;
        writer.write_bytes(b" ")?;
        writer.write_int(*elem_id as u64)?;
        writer.write_bytes(b" 0 R")?;
    }
    for (i, elem_id) in state.struct_parent.iter().enumerate() {
        if !first {
            writer.write_bytes(b" ")?;
        }
        first = false;
        writer.write_int((ANNOTATION_PARENT_THRESHOLD as usize + i) as u64)?;
        writer.write_bytes(b" ")?;
        writer.write_int(*elem_id as u64)?;
        writer.write_bytes(b" 0 R")?;
    }
    writer.write_bytes(b"]\n>>\nendobj\n")?;

    // /Dests: one named destination per successfully absorbed page URL.
    fixed_offsets[5] = writer.position();
    writer.write_int(DESTS_ID as u64)?;
    writer.write_bytes(b" 0 obj\n<<")?;
    for (url, page_id) in &state.url_dests {
        if let Some(n) = state.url_ids.get_index_of(url) {
            writer.write_bytes(b"\n/URLD-")?;
            writer.write_int(n as u64)?;
            writer.write_bytes(b" [")?;
            writer.write_int(*page_id as u64)?;
            writer.write_bytes(b" 0 R /Fit]")?;
        }
    }
    writer.write_bytes(b"\n>>\nendobj\n")?;

    // xref table, then the trailer dictionary.
    let startxref = writer.position();
    writer.write_bytes(b"xref\n0 ")?;
    writer.write_int(state.xrefs.len() as u64 + 1)?;
    writer.write_bytes(b"\n0000000000 65535 f \n")?;
    for offset in state.xrefs.values() {
        writer.write_long_padded(*offset, 10)?;
        writer.write_bytes(b" 00000 n \n")?;
    }
    writer.write_bytes(b"1000000 5\n")?;
    for offset in fixed_offsets {
        writer.write_long_padded(offset, 10)?;
        writer.write_bytes(b" 00000 n \n")?;
    }
    writer.write_bytes(b"trailer\n<</Size ")?;
    writer.write_int(state.xrefs.len() as u64 + 7)?;
    writer.write_bytes(b" /Root 1000001 0 R /Info 1000000 0 R>>\nstartxref\n")?;
    writer.write_int(startxref)?;
    writer.write_bytes(b"\n%%EOF")?;
    Ok(())
}

/// Pre-order id assignment, continuing right after the input-derived ids.
fn assign_outline_ids(node: &mut OutlineNode, next_id: &mut u32) {
    node.pdf_id = *next_id;
    *next_id += 1;
    for child in &mut node.items {
        assign_outline_ids(child, next_id);
    }
}

/// `count` is the number of nodes in the subtree excluding the node itself.
fn compute_outline_counts(node: &mut OutlineNode) -> u32 {
    let mut count = 0;
    for child in &mut node.items {
        count += compute_outline_counts(child) + 1;
    }
    node.count = count;
    count
}

fn write_outline_node<W: Write>(
    writer: &mut CountingWriter<W>,
    state: &mut MergerState,
    resolver: &UrlResolver,
    node: &OutlineNode,
    next_sibling: Option<u32>,
) -> Result<(), PdfStitchError> {
    state.xrefs.insert(node.pdf_id, writer.position());
    writer.write_int(node.pdf_id as u64)?;
    writer.write_bytes(b" 0 obj\n<</Type /Outlines\n/Count ")?;
    writer.write_int(node.count as u64)?;
    writer.write_bytes(b"\n")?;
    if let (Some(head), Some(tail)) = (node.items.first(), node.items.last()) {
        writer.write_bytes(b"/First ")?;
        writer.write_int(head.pdf_id as u64)?;
        writer.write_bytes(b" 0 R\n/Last ")?;
        writer.write_int(tail.pdf_id as u64)?;
        writer.write_bytes(b" 0 R\n")?;
    }
    if let Some(sibling) = next_sibling {
        writer.write_bytes(b"/Next ")?;
        writer.write_int(sibling as u64)?;
        writer.write_bytes(b" 0 R\n")?;
    }
    writer.write_bytes(b"/Title ")?;
    writer.write_hex_string(&node.name)?;
    writer.write_bytes(b"\n")?;

    let parsed = resolver.resolve(node.href.as_deref());
    if let Some(n) = parsed
        .page_url
        .as_deref()
        .and_then(|url| state.url_ids.get_index_of(url))
    {
        writer.write_bytes(b"/Dest /URLD-")?;
        writer.write_int(n as u64)?;
        writer.write_bytes(b"\n")?;
    } else if let Some(external) = parsed.external_url.as_deref() {
        writer.write_bytes(b"/A <</Type /Action /S /URI /URI (")?;
        writer.write_ascii_string(external)?;
        writer.write_bytes(b")>>\n")?;
    }
    writer.write_bytes(b">>\nendobj\n")?;

    // Each non-last child links forward to its successor; /Prev is not
    // emitted and readers tolerate its absence.
    for (i, child) in node.items.iter().enumerate() {
        let sibling = node.items.get(i + 1).map(|next| next.pdf_id);
        write_outline_node(writer, state, resolver, child, sibling)?;
    }
    Ok(())
}
