//! Fixture writers shared by the unit tests of this crate

use rust_xlsxwriter::Workbook;
use std::fs;
use std::io::Write;
use std::path::Path;
use tabcompare_common::CellValue;
use zip::write::FileOptions;

/// A fixture cell
pub enum Fx {
    S(&'static str),
    N(f64),
    B(bool),
    Blank,
}

pub fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<Fx>>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let (r, c) = (row_idx as u32, col_idx as u16);
                match cell {
                    Fx::S(s) => {
                        sheet.write_string(r, c, *s).unwrap();
                    }
                    Fx::N(n) => {
                        sheet.write_number(r, c, *n).unwrap();
                    }
                    Fx::B(b) => {
                        sheet.write_boolean(r, c, *b).unwrap();
                    }
                    Fx::Blank => {}
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

pub fn write_csv(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

/// Minimal `.docx` container with one paragraph per entry
pub fn write_docx(path: &Path, paragraphs: &[&str]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);

    zip.start_file("[Content_Types].xml", FileOptions::default())
        .unwrap();
    zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();

    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    zip.start_file("word/document.xml", FileOptions::default())
        .unwrap();
    write!(
        zip,
        "<?xml version=\"1.0\"?><w:document><w:body>{}</w:body></w:document>",
        body
    )
    .unwrap();

    zip.finish().unwrap();
}

pub fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

pub fn num(n: f64) -> CellValue {
    CellValue::Number(n)
}

pub fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
