//! Object-kind dispatch and in-body reference rewriting
//!
//! Object kinds are recognized by exact byte prefixes of the body, which
//! is only safe for the Chrome producer this merger targets. Rewriting
//! copies every byte verbatim except indirect references (`n 0 R`) and
//! `/StructParent` / `/StructParents` indices.

use std::io::Write;

use crate::error::PdfStitchError;
use crate::merger::{MergerState, PAGES_ID, STRUCT_TREE_ROOT_ID};
use crate::writer::CountingWriter;

/// Chrome numbers page `/StructParents` below this value and annotation
/// `/StructParent` at or above it.
pub(crate) const ANNOTATION_PARENT_THRESHOLD: u32 = 100_000;

/// How an emitted object participates in rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    /// `/Type /Page`: its `/Parent` is redirected to the synthesized page tree.
    Page,
    /// `/StructElem /S /Document`: its `/P` is redirected to the synthesized
    /// structure tree root.
    DocumentElem,
    Other,
}

/// Copy `body` to the writer, rewriting indirect references into the
/// unified object space.
pub(crate) fn rewrite_body<W: Write>(
    writer: &mut CountingWriter<W>,
    state: &MergerState,
    body: &[u8],
    kind: ObjectKind,
) -> Result<(), PdfStitchError> {
    let mut copied = 0;
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b == b'/' {
            if let Some((n, value_end)) = match_struct_parent(&body[i..]) {
                writer.write_bytes(&body[copied..i])?;
                if n >= ANNOTATION_PARENT_THRESHOLD {
                    writer.write_bytes(b"/StructParent ")?;
                    writer.write_int((state.base_struct_parent_num + n) as u64)?;
                } else {
                    writer.write_bytes(b"/StructParents ")?;
                    writer.write_int((state.base_struct_parents_num + n) as u64)?;
                }
                i += value_end;
                copied = i;
                continue;
            }
        } else if b.is_ascii_digit() && (i == 0 || !body[i - 1].is_ascii_digit()) {
            let mut num_end = i;
            while num_end < body.len() && body[num_end].is_ascii_digit() {
                num_end += 1;
            }
            if body[num_end..].starts_with(b" 0 R") {
                let n = parse_u32(&body[i..num_end]);
                writer.write_bytes(&body[copied..i])?;
                if kind == ObjectKind::Page && body[..i].ends_with(b"/Parent ") {
                    writer.write_int(PAGES_ID as u64)?;
                } else if kind == ObjectKind::DocumentElem && body[..i].ends_with(b"/P ") {
                    writer.write_int(STRUCT_TREE_ROOT_ID as u64)?;
                } else {
                    writer.write_int((state.base_id + n) as u64)?;
                }
                writer.write_bytes(b" 0 R")?;
                i = num_end + 4;
                copied = i;
                continue;
            }
            i = num_end;
            continue;
        }
        i += 1;
    }
    writer.write_bytes(&body[copied..])?;
    Ok(())
}

/// Match `/StructParent <n>` or `/StructParents <n>` at the start of
/// `bytes`, returning the index value and the byte length consumed.
fn match_struct_parent(bytes: &[u8]) -> Option<(u32, usize)> {
    let keyword_len = if bytes.starts_with(b"/StructParents ") {
        15
    } else if bytes.starts_with(b"/StructParent ") {
        14
    } else {
        return None;
    };
    let mut num_end = keyword_len;
    while num_end < bytes.len() && bytes[num_end].is_ascii_digit() {
        num_end += 1;
    }
    if num_end == keyword_len {
        return None;
    }
    Some((parse_u32(&bytes[keyword_len..num_end]), num_end))
}

fn parse_u32(digits: &[u8]) -> u32 {
    digits.iter().fold(0u32, |n, &d| {
        n.saturating_mul(10).saturating_add((d - b'0') as u32)
    })
}
