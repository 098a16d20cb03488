//! Shared PDF fixtures for the integration tests.
//!
//! Every page gets its own content stream containing `(Page N)` so the page
//! order of an output file can be read back with [`page_markers`].

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lazy_static::lazy_static;
use pdf_reorder::document::Document;
use pdf_reorder::page_tree::PageTree;
use pdf_reorder::xref::find_xref_offset;
use regex::Regex;
use std::io::Write;

lazy_static! {
    static ref PAGE_MARKER: Regex = Regex::new(r"\(Page (\d+)\)").expect("valid regex");
}

/// Writes indirect objects followed by a classic cross-reference table.
#[derive(Debug, Default)]
pub struct PdfBuilder {
    version: String,
    objects: Vec<(u32, Vec<u8>)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.4".to_string(),
            objects: Vec::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn object(mut self, num: u32, body: &str) -> Self {
        self.objects.push((num, body.as_bytes().to_vec()));
        self
    }

    pub fn stream(mut self, num: u32, dict: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((num, body));
        self
    }

    /// Serialize with a single xref section and the given extra trailer entries.
    pub fn build(&self, trailer: &str) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n%\u{e2}\u{e3}\n", self.version).into_bytes();
        let mut offsets = std::collections::BTreeMap::new();
        for (num, body) in &self.objects {
            offsets.insert(*num, out.len());
            out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let size = offsets.keys().max().map_or(1, |m| m + 1);
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
        for num in 1..size {
            match offsets.get(&num) {
                Some(offset) => out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
                None => out.extend_from_slice(b"0000000000 00000 f \n"),
            }
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n", size, trailer, xref_offset)
                .as_bytes(),
        );
        out
    }
}

/// Content stream for page `n`.
pub fn content(n: usize) -> Vec<u8> {
    format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", n).into_bytes()
}

/// A document whose `n` pages are all kids of the root.
///
/// Object 1 is the catalog, 2 the root `Pages`, page `i` (1-based) is
/// object `1 + 2i` and its content stream `2 + 2i`.
pub fn flat_pdf(n: usize) -> Vec<u8> {
    let kids: Vec<String> = (1..=n).map(|i| format!("{} 0 R", 1 + 2 * i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] /Resources << /Font << /F1 {} 0 R >> >> >>",
                kids.join(" "),
                n,
                2 * n + 3
            ),
        );
    for i in 1..=n {
        let page = (1 + 2 * i) as u32;
        builder = builder
            .object(page, &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1))
            .stream(page + 1, "", &content(i));
    }
    builder
        .object(
            (2 * n + 3) as u32,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
        )
        .object((2 * n + 4) as u32, "<< /Producer (fixture) /Title (Flat) >>")
        .build(&format!("/Root 1 0 R /Info {} 0 R", 2 * n + 4))
}

/// Six pages under two intermediate nodes, with attributes inherited from
/// every level.
///
/// ```text
/// 2 Pages  MediaBox [0 0 612 792] Resources <</Font <</F1 30 0 R>>>>
/// ├─ 3 Pages  Rotate 90
/// │  ├─ 10 Page (Page 1)
/// │  ├─ 11 Page (Page 2)  MediaBox [0 0 200 200]
/// │  └─ 12 Page (Page 3)
/// └─ 4 Pages  MediaBox [0 0 300 300]
///    ├─ 13 Page (Page 4)
///    ├─ 14 Page (Page 5)
///    └─ 15 Page (Page 6)
/// ```
pub fn nested_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 6 /MediaBox [0 0 612 792] /Resources << /Font << /F1 30 0 R >> >> >>",
        )
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [10 0 R 11 0 R 12 0 R] /Count 3 /Rotate 90 >>")
        .object(4, "<< /Type /Pages /Parent 2 0 R /Kids [13 0 R 14 0 R 15 0 R] /Count 3 /MediaBox [0 0 300 300] >>")
        .object(30, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");

    for i in 1..=6u32 {
        let page = 9 + i;
        let parent = if i <= 3 { 3 } else { 4 };
        let extra = if i == 2 { " /MediaBox [0 0 200 200]" } else { "" };
        builder = builder
            .object(
                page,
                &format!("<< /Type /Page /Parent {} 0 R /Contents {} 0 R{} >>", parent, 15 + i, extra),
            )
            .stream(15 + i, "", &content(i as usize));
    }
    builder.build("/Root 1 0 R")
}

/// Two pages whose second kid is a `Pages` node pointing back at the root.
pub fn cyclic_pdf() -> Vec<u8> {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /Contents 5 0 R >>")
        .object(4, "<< /Type /Pages /Parent 2 0 R /Kids [2 0 R] /Count 1 >>")
        .stream(5, "", &content(1))
        .build("/Root 1 0 R")
}

/// `n` pages stored in a Flate-compressed object stream and indexed by a
/// cross-reference stream.
///
/// The xref stream uses `/W [1 4 2]`. With `predictor` set its rows are
/// PNG Up filtered (`/Predictor 12 /Columns 7`).
pub fn compressed_pdf(n: usize, predictor: bool) -> Vec<u8> {
    let page_num = |i: usize| (2 + i) as u32;
    let content_num = |i: usize| (2 + n + i) as u32;
    let objstm_num = (3 + 2 * n) as u32;
    let xref_num = objstm_num + 1;

    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = std::collections::BTreeMap::new();

    for i in 1..=n {
        offsets.insert(content_num(i), out.len());
        let data = content(i);
        out.extend_from_slice(format!("{} 0 obj\n<< /Length {} >>\nstream\n", content_num(i), data.len()).as_bytes());
        out.extend_from_slice(&data);
        out.extend_from_slice(b"\nendstream\nendobj\n");
    }

    // Catalog, root and pages live in the object stream
    let kids: Vec<String> = (1..=n).map(|i| format!("{} 0 R", page_num(i))).collect();
    let mut members = vec![
        (1u32, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (
            2,
            format!("<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>", kids.join(" "), n),
        ),
    ];
    for i in 1..=n {
        members.push((
            page_num(i),
            format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", content_num(i)),
        ));
    }

    let mut header = String::new();
    let mut body = String::new();
    for (num, text) in &members {
        header.push_str(&format!("{} {} ", num, body.len()));
        body.push_str(text);
        body.push(' ');
    }
    let decoded = format!("{}{}", header, body);
    let compressed = zlib(decoded.as_bytes());

    offsets.insert(objstm_num, out.len());
    out.extend_from_slice(
        format!(
            "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            objstm_num,
            members.len(),
            header.len(),
            compressed.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&compressed);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_offset = out.len();
    offsets.insert(xref_num, xref_offset);

    let size = xref_num + 1;
    let mut rows = vec![row(0, 0, 65535)];
    for num in 1..size {
        if let Some(index) = members.iter().position(|(m, _)| *m == num) {
            rows.push(row(2, objstm_num, index as u16));
        } else if let Some(&offset) = offsets.get(&num) {
            rows.push(row(1, offset as u32, 0));
        } else {
            rows.push(row(0, 0, 0));
        }
    }

    let (payload, parms) = if predictor {
        (zlib(&png_up(&rows)), " /DecodeParms << /Predictor 12 /Columns 7 >>")
    } else {
        (zlib(&rows.concat()), "")
    };
    out.extend_from_slice(
        format!(
            "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R /Filter /FlateDecode{} /Length {} >>\nstream\n",
            xref_num,
            size,
            parms,
            payload.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&payload);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

/// Append an incremental update to `base` that replaces object `num`.
pub fn with_update(base: &[u8], num: u32, body: &str) -> Vec<u8> {
    let prev = find_xref_offset(base).expect("fixture has startxref");
    let size = Document::load(base)
        .map(|doc| doc.max_object_number() + 1)
        .expect("fixture loads");

    let mut out = base.to_vec();
    let offset = out.len();
    out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", num, body).as_bytes());

    let xref_offset = out.len();
    out.extend_from_slice(
        format!(
            "xref\n0 1\n0000000000 65535 f \n{} 1\n{:010} 00000 n \ntrailer\n<< /Size {} /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
            num, offset, size, prev, xref_offset
        )
        .as_bytes(),
    );
    out
}

/// The `(Page N)` markers of `pdf`, in page order.
pub fn page_markers(pdf: &[u8]) -> Vec<usize> {
    let doc = Document::load(pdf).expect("output loads");
    let tree = PageTree::walk(&doc).expect("output page tree walks");
    tree.pages()
        .iter()
        .map(|page| {
            let dict = doc.get(page.id).and_then(|o| o.as_dict()).expect("page dictionary");
            let contents = dict.get("Contents").expect("page has contents");
            let data = doc.resolve(contents).decode_stream_data(None).expect("decodable contents");
            let text = String::from_utf8_lossy(&data);
            PAGE_MARKER
                .captures(&text)
                .and_then(|c| c[1].parse().ok())
                .expect("page marker")
        })
        .collect()
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory write");
    encoder.finish().expect("in-memory write")
}

fn row(kind: u8, field2: u32, field3: u16) -> Vec<u8> {
    let mut row = vec![kind];
    row.extend_from_slice(&field2.to_be_bytes());
    row.extend_from_slice(&field3.to_be_bytes());
    row
}

fn png_up(rows: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev = vec![0u8; rows[0].len()];
    for row in rows {
        out.push(2);
        out.extend(row.iter().zip(&prev).map(|(b, p)| b.wrapping_sub(*p)));
        prev = row.clone();
    }
    out
}
