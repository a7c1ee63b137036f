//! End-to-end merge tests over synthetic Chrome-shaped inputs.

use pdfstitch_core::{merge, OutlineNode, UrlResolver};
use std::collections::HashMap;

const SERVER: &str = "http://127.0.0.1:8246";
const CREATOR: &str = "pdfstitch-core test";

/// Chrome-shaped single-page PDF: /Info first, sequential ids, inline
/// ParentTree /Nums, one /Document struct element.
fn single_page_pdf() -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n%\xd3\xeb\xe9\xe1\n");
    pdf.extend_from_slice(b"1 0 obj\n<</Creator (Chromium)>>\nendobj\n");
    pdf.extend_from_slice(b"2 0 obj\n<</Length 10>>\nstream\n0123456789\nendstream\n\nendobj\n");
    pdf.extend_from_slice(
        b"3 0 obj\n<</Type /Page\n/Parent 4 0 R /Contents 2 0 R /StructParents 0\n/MediaBox [0 0 612 792]>>\nendobj\n",
    );
    pdf.extend_from_slice(b"4 0 obj\n<</Type /Pages\n/Count 1 /Kids [3 0 R]>>\nendobj\n");
    pdf.extend_from_slice(b"5 0 obj\n<</Type /StructElem\n/S /P\n/P 6 0 R>>\nendobj\n");
    pdf.extend_from_slice(
        b"6 0 obj\n<</Type /StructElem\n/S /Document\n/P 7 0 R /K [5 0 R]>>\nendobj\n",
    );
    pdf.extend_from_slice(
        b"7 0 obj\n<</Type /StructTreeRoot\n/K 6 0 R /ParentTree 8 0 R>>\nendobj\n",
    );
    pdf.extend_from_slice(b"8 0 obj\n<</Type /ParentTree\n/Nums [0 5 0 R]>>\nendobj\n");
    pdf.extend_from_slice(b"9 0 obj\n<</Type /Catalog /Pages 4 0 R>>\nendobj\n");
    pdf.extend_from_slice(b"trailer\n<</Size 10 /Root 9 0 R>>\nstartxref\n9\n%%EOF");
    pdf
}

/// Single page carrying a link annotation with an annotation-range
/// `/StructParent`.
fn page_with_annotation_pdf() -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n%\xd3\xeb\xe9\xe1\n");
    pdf.extend_from_slice(b"1 0 obj\n<</Creator (Chromium)>>\nendobj\n");
    pdf.extend_from_slice(
        b"2 0 obj\n<</Type /Page\n/Parent 3 0 R /Annots [4 0 R] /StructParents 0>>\nendobj\n",
    );
    pdf.extend_from_slice(b"3 0 obj\n<</Type /Pages\n/Count 1 /Kids [2 0 R]>>\nendobj\n");
    pdf.extend_from_slice(b"4 0 obj\n<</Subtype /Link\n/StructParent 100000>>\nendobj\n");
    pdf.extend_from_slice(b"5 0 obj\n<</Type /StructElem\n/S /P\n/P 6 0 R>>\nendobj\n");
    pdf.extend_from_slice(b"6 0 obj\n<</Type /StructElem\n/S /Document\n/P 7 0 R>>\nendobj\n");
    pdf.extend_from_slice(b"7 0 obj\n<</Type /StructTreeRoot\n/K 6 0 R /ParentTree 8 0 R>>\nendobj\n");
    pdf.extend_from_slice(
        b"8 0 obj\n<</Type /ParentTree\n/Nums [0 5 0 R 100000 5 0 R]>>\nendobj\n",
    );
    pdf.extend_from_slice(b"9 0 obj\n<</Type /Catalog /Pages 3 0 R>>\nendobj\n");
    pdf.extend_from_slice(b"trailer\n<</Size 10 /Root 9 0 R>>\nstartxref\n9\n%%EOF");
    pdf
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn run_merge(
    outline_json: &str,
    base_url: Option<String>,
    sources: &HashMap<String, Vec<u8>>,
) -> Vec<u8> {
    let mut outline = OutlineNode::from_json(outline_json).unwrap();
    let resolver = UrlResolver::new(SERVER, base_url, "");
    let mut out = Vec::new();
    merge(
        &mut out,
        &mut outline,
        &resolver,
        |url| sources.get(url).map(|bytes| bytes.as_slice()),
        CREATOR,
    )
    .unwrap();
    out
}

/// Parse the tail of the merged file: startxref offset, then every
/// `(id, offset)` pair of the xref table. Entry lines are counted rather
/// than trusted to the subsection headers, mirroring how recovering
/// readers treat this producer.
fn parse_xref(output: &[u8]) -> (usize, Vec<(u32, usize)>) {
    assert_eq!(&output[output.len() - 5..], b"%%EOF");
    let sx = find(output, b"startxref\n").expect("startxref");
    let tail = &output[sx + 10..output.len() - 5];
    let startxref: usize = std::str::from_utf8(tail).unwrap().trim().parse().unwrap();
    assert!(output[startxref..].starts_with(b"xref\n"));

    let table = std::str::from_utf8(&output[startxref..]).unwrap();
    let mut entries = Vec::new();
    let mut next_id = 0u32;
    for line in table.lines().skip(1) {
        if line == "trailer" {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [offset, _, flag] if *flag == "n" || *flag == "f" => {
                if *flag == "n" {
                    entries.push((next_id, offset.parse().unwrap()));
                }
                next_id += 1;
            }
            [first, _] => next_id = first.parse().unwrap(),
            other => panic!("unexpected xref line: {other:?}"),
        }
    }
    (startxref, entries)
}

#[test]
fn test_single_page_single_outline_node() {
    let url = format!("{SERVER}/p.html");
    let mut sources = HashMap::new();
    sources.insert(url, single_page_pdf());
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [{"name": "Page", "href": "p.html"}]}"#,
        None,
        &sources,
    );

    assert!(output.starts_with(b"%PDF-1.4\n%\xd3\xeb\xe9\xe1\n"));
    // The page keeps its id (first input, base 0) and reparents onto the
    // synthesized page tree.
    assert!(contains(&output, b"3 0 obj\n<</Type /Page\n/Parent 1000002 0 R"));
    assert!(contains(&output, b"/Count 1\n/Kids [3 0 R]"));
    // Outline root (id 10) with one child (id 11) carrying the named
    // destination.
    assert!(contains(&output, b"10 0 obj\n<</Type /Outlines\n/Count 1\n/First 11 0 R\n/Last 11 0 R\n"));
    assert!(contains(&output, b"/Dest /URLD-0\n"));
    assert!(contains(&output, b"/URLD-0 [3 0 R /Fit]"));
    // Unified info and catalog.
    assert!(contains(&output, b"1000000 0 obj\n<</Creator (pdfstitch-core test)>>"));
    assert!(contains(&output, b"/PageMode /UseOutlines"));
    assert!(contains(&output, b"/Outlines 10 0 R"));
    // Document struct element hangs off the synthesized root.
    assert!(contains(&output, b"/P 1000003 0 R"));
    assert!(contains(&output, b"/Size 18 /Root 1000001 0 R /Info 1000000 0 R"));
}

#[test]
fn test_xref_offsets_point_at_object_headers() {
    let url = format!("{SERVER}/p.html");
    let mut sources = HashMap::new();
    sources.insert(url, single_page_pdf());
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [{"name": "Page", "href": "p.html"}]}"#,
        None,
        &sources,
    );

    let (_, entries) = parse_xref(&output);
    // 11 input/outline ids + free head + 6 fixed ids.
    assert_eq!(entries.len() + 1, 11 + 7);

    // Skipped input objects (info, catalog, struct tree root, parent
    // tree) record the next write position; every other id's offset must
    // land exactly on its header.
    let skipped = [1u32, 7, 8, 9];
    for (id, offset) in &entries {
        if skipped.contains(id) {
            continue;
        }
        assert!(
            output[*offset..].starts_with(format!("{id} 0 obj\n").as_bytes()),
            "xref offset for {id} does not point at its header"
        );
    }
}

#[test]
fn test_pages_kids_resolve_to_page_bodies() {
    let url_a = format!("{SERVER}/a.html");
    let url_b = format!("{SERVER}/b.html");
    let mut sources = HashMap::new();
    sources.insert(url_a, single_page_pdf());
    sources.insert(url_b, single_page_pdf());
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [
            {"name": "A", "href": "a.html"},
            {"name": "B", "href": "b.html"}
        ]}"#,
        None,
        &sources,
    );

    let (_, entries) = parse_xref(&output);
    let pages_offset = entries
        .iter()
        .find(|(id, _)| *id == 1_000_002)
        .map(|(_, offset)| *offset)
        .unwrap();
    let pages_body = &output[pages_offset..];
    assert!(pages_body.starts_with(b"1000002 0 obj\n<</Type /Pages\n/Count 2\n/Kids [3 0 R 12 0 R]"));

    for kid in [3u32, 12] {
        let offset = entries.iter().find(|(id, _)| *id == kid).unwrap().1;
        let header = format!("{kid} 0 obj\n<</Type /Page\n");
        assert!(output[offset..].starts_with(header.as_bytes()));
    }
    // Both source URLs got a named destination onto their first page.
    assert!(contains(&output, b"/URLD-0 [3 0 R /Fit]"));
    assert!(contains(&output, b"/URLD-1 [12 0 R /Fit]"));
}

#[test]
fn test_external_only_outline_is_a_valid_empty_document() {
    let sources = HashMap::new();
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [
            {"name": "Else", "href": "https://example.com/elsewhere"}
        ]}"#,
        Some("https://docs.example.com".to_string()),
        &sources,
    );

    assert!(contains(&output, b"/Count 0\n/Kids []"));
    assert!(contains(
        &output,
        b"/A <</Type /Action /S /URI /URI (https://example.com/elsewhere)>>"
    ));
    // No named destination and no /URLD id for the external link.
    assert!(!contains(&output, b"/URLD-"));
    let (_, entries) = parse_xref(&output);
    // Two outline nodes + free head + six fixed.
    assert_eq!(entries.len() + 1, 2 + 7);
    assert_eq!(&output[output.len() - 5..], b"%%EOF");
}

#[test]
fn test_external_link_without_base_url_has_no_destination() {
    let sources = HashMap::new();
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [
            {"name": "Else", "href": "https://example.com/elsewhere"}
        ]}"#,
        None,
        &sources,
    );
    assert!(!contains(&output, b"/A <<"));
    assert!(!contains(&output, b"/Dest"));
}

#[test]
fn test_branch_node_with_href_gets_children_and_destination() {
    let url = format!("{SERVER}/p.html");
    let mut sources = HashMap::new();
    sources.insert(url, single_page_pdf());
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [
            {"name": "Branch", "href": "p.html", "items": [
                {"name": "Leaf A", "href": "p.html"},
                {"name": "Leaf B"}
            ]}
        ]}"#,
        None,
        &sources,
    );

    // Branch is id 11 (root 10), children 12 and 13.
    let branch = find(&output, b"11 0 obj\n").unwrap();
    let branch_body = &output[branch..find(&output, b"12 0 obj\n").unwrap()];
    assert!(contains(branch_body, b"/Count 2\n"));
    assert!(contains(branch_body, b"/First 12 0 R\n/Last 13 0 R\n"));
    assert!(contains(branch_body, b"/Dest /URLD-0\n"));
    // Leaf B has no href: outline entry, no destination.
    let leaf_b = find(&output, b"13 0 obj\n").unwrap();
    let leaf_b_body = &output[leaf_b..find(&output[leaf_b..], b"endobj\n").unwrap() + leaf_b];
    assert!(!contains(leaf_b_body, b"/Dest"));
    assert!(!contains(leaf_b_body, b"/A <<"));
}

#[test]
fn test_failed_render_keeps_subtree_but_drops_destination_target() {
    // No bytes for p.html: the outline still carries /Dest /URLD-0, but
    // /Dests maps nothing, so the name dangles harmlessly.
    let sources = HashMap::new();
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [{"name": "Page", "href": "p.html"}]}"#,
        None,
        &sources,
    );
    assert!(contains(&output, b"/Dest /URLD-0\n"));
    assert!(!contains(&output, b"/URLD-0 ["));
    assert!(contains(&output, b"/Count 0\n/Kids []"));
}

#[test]
fn test_annotation_struct_parent_lands_in_second_nums_half() {
    let url = format!("{SERVER}/p.html");
    let mut sources = HashMap::new();
    sources.insert(url, page_with_annotation_pdf());
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [{"name": "Page", "href": "p.html"}]}"#,
        None,
        &sources,
    );

    // base_struct_parent_num is zero for the first input, so the
    // annotation keeps its index and its element id is offset by base 0.
    assert!(contains(&output, b"<</Subtype /Link\n/StructParent 100000>>"));
    assert!(contains(
        &output,
        b"1000004 0 obj\n<</Type /ParentTree\n/Nums [0 5 0 R 100000 5 0 R]"
    ));
}

#[test]
fn test_second_input_annotation_offsets() {
    let url_a = format!("{SERVER}/a.html");
    let url_b = format!("{SERVER}/b.html");
    let mut sources = HashMap::new();
    sources.insert(url_a, page_with_annotation_pdf());
    sources.insert(url_b, page_with_annotation_pdf());
    let output = run_merge(
        r#"{"enablePdf": true, "name": "Doc", "items": [
            {"name": "A", "href": "a.html"},
            {"name": "B", "href": "b.html"}
        ]}"#,
        None,
        &sources,
    );

    // Second input: one annotation absorbed before it, ids offset by 9.
    assert!(contains(&output, b"<</Subtype /Link\n/StructParent 100001>>"));
    assert!(contains(
        &output,
        b"/Nums [0 5 0 R 1 14 0 R 100000 5 0 R 100001 14 0 R]"
    ));
}
