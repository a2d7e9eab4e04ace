//! Minimal SpreadsheetML writer for deal reports.
//!
//! Produces a single-sheet workbook: a styled header row followed by one row
//! per [`DealRow`], with column widths fitted to the content. Text lives in the
//! shared strings table. Every data row carries all five cells, empty fields
//! included, so a row of blanks still reads back as a row.

use crate::core::{DealRow, Report};
use crate::utils::error::Result;
use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Fill behind the header row.
pub const HEADER_FILL_RGB: &str = "FF366092";
pub const HEADER_FONT_RGB: &str = "FFFFFFFF";
/// Extra characters of breathing room added to the widest cell.
pub const WIDTH_PADDING: usize = 2;
pub const MAX_COLUMN_WIDTH: usize = 50;
/// Excel refuses sheet names longer than this.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const COLUMNS: usize = DealRow::HEADERS.len();
const HEADER_STYLE: usize = 1;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

fn escape_xml(s: &str) -> String {
    escape(s, false)
}

/// Like [`escape_xml`], but control characters survive as SpreadsheetML
/// `_xHHHH_` escapes, and a literal `_xHHHH_` has its underscore escaped.
fn escape_cell_text(s: &str) -> String {
    escape(s, true)
}

fn escape(s: &str, ooxml_escapes: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '_' if ooxml_escapes && looks_like_ooxml_escape(&s[i..]) => out.push_str("_x005F_"),
            '\t' | '\n' => out.push(c),
            // XML 1.0 cannot carry these at all; `\r` would be normalized away.
            c if (c as u32) < 0x20 => {
                if ooxml_escapes {
                    out.push_str(&format!("_x{:04X}_", c as u32));
                }
            }
            '\u{FFFE}' | '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

fn looks_like_ooxml_escape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 7
        && b[0] == b'_'
        && b[1] == b'x'
        && b[2..6].iter().all(u8::is_ascii_hexdigit)
        && b[6] == b'_'
}

/// `{label}_{YYYYMMDD_HHMMSS}.xlsx` for the report's pipeline and generation time.
pub fn report_file_name(report: &Report) -> String {
    format!(
        "{}_{}.xlsx",
        sanitize_label(&report.pipeline.label),
        report.generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Whitespace becomes `_`; anything outside `[A-Za-z0-9_.-]` is dropped.
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    let sanitized = sanitized.trim_matches('.').to_string();
    if sanitized.is_empty() {
        "pipeline".to_string()
    } else {
        sanitized
    }
}

pub fn sheet_name(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME_LEN).collect();

    if truncated.trim().is_empty() {
        "Deals".to_string()
    } else {
        truncated
    }
}

/// Widest cell (header included) per column, padded and capped.
pub fn column_widths(rows: &[DealRow]) -> [usize; COLUMNS] {
    let mut widths = DealRow::HEADERS.map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths.map(|w| (w + WIDTH_PADDING).min(MAX_COLUMN_WIDTH))
}

fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

#[derive(Debug, Default)]
struct SharedStrings {
    strings: Vec<String>,
    index: HashMap<String, usize>,
    references: usize,
}

impl SharedStrings {
    fn add(&mut self, s: &str) -> usize {
        self.references += 1;
        if let Some(&i) = self.index.get(s) {
            return i;
        }
        let i = self.strings.len();
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), i);
        i
    }

    fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(64 + self.strings.len() * 32);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(
            xml,
            r#"<sst xmlns="{}" count="{}" uniqueCount="{}">"#,
            NS_MAIN,
            self.references,
            self.strings.len()
        )
        .map_err(xml_error)?;
        for s in &self.strings {
            if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                write!(xml, r#"<si><t xml:space="preserve">{}</t></si>"#, escape_cell_text(s))
            } else {
                write!(xml, "<si><t>{}</t></si>", escape_cell_text(s))
            }
            .map_err(xml_error)?;
        }
        xml.push_str("</sst>");
        Ok(xml)
    }
}

fn xml_error(e: std::fmt::Error) -> crate::utils::error::ReportError {
    crate::utils::error::ReportError::IoError(std::io::Error::other(format!(
        "XML write error: {}",
        e
    )))
}

pub struct XlsxReportWriter;

impl XlsxReportWriter {
    /// Renders the whole workbook in memory as `.xlsx` bytes.
    pub fn render(report: &Report) -> Result<Vec<u8>> {
        let mut strings = SharedStrings::default();
        let sheet_xml = Self::sheet_xml(&report.rows, &mut strings)?;
        let workbook_xml = Self::workbook_xml(&sheet_name(&report.pipeline.label));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, String); 7] = [
            ("[Content_Types].xml", Self::content_types_xml()),
            ("_rels/.rels", Self::root_rels_xml()),
            ("xl/workbook.xml", workbook_xml),
            ("xl/_rels/workbook.xml.rels", Self::workbook_rels_xml()),
            ("xl/styles.xml", Self::styles_xml()),
            ("xl/sharedStrings.xml", strings.to_xml()?),
            ("xl/worksheets/sheet1.xml", sheet_xml),
        ];
        for (name, content) in parts {
            zip.start_file(name, options)?;
            zip.write_all(content.as_bytes())?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    fn sheet_xml(rows: &[DealRow], strings: &mut SharedStrings) -> Result<String> {
        let mut xml = String::with_capacity(1024 + rows.len() * 256);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(xml, r#"<worksheet xmlns="{}" xmlns:r="{}">"#, NS_MAIN, NS_REL)
            .map_err(xml_error)?;
        write!(
            xml,
            r#"<dimension ref="A1:{}{}"/>"#,
            column_letter(COLUMNS - 1),
            rows.len() + 1
        )
        .map_err(xml_error)?;

        // Keep the header visible while scrolling.
        xml.push_str(r#"<sheetViews><sheetView workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/></sheetView></sheetViews>"#);

        xml.push_str("<cols>");
        for (i, width) in column_widths(rows).iter().enumerate() {
            write!(
                xml,
                r#"<col min="{}" max="{}" width="{}" customWidth="1"/>"#,
                i + 1,
                i + 1,
                width
            )
            .map_err(xml_error)?;
        }
        xml.push_str("</cols>");

        xml.push_str("<sheetData>");
        Self::write_row(&mut xml, 1, &DealRow::HEADERS, Some(HEADER_STYLE), strings)?;
        for (i, row) in rows.iter().enumerate() {
            Self::write_row(&mut xml, i + 2, &row.cells(), None, strings)?;
        }
        xml.push_str("</sheetData>");

        xml.push_str("</worksheet>");
        Ok(xml)
    }

    fn write_row(
        xml: &mut String,
        row_number: usize,
        cells: &[&str; COLUMNS],
        style: Option<usize>,
        strings: &mut SharedStrings,
    ) -> Result<()> {
        write!(xml, r#"<row r="{}">"#, row_number).map_err(xml_error)?;
        for (col, value) in cells.iter().enumerate() {
            let style_attr = style.map(|s| format!(r#" s="{}""#, s)).unwrap_or_default();
            write!(
                xml,
                r#"<c r="{}{}"{} t="s"><v>{}</v></c>"#,
                column_letter(col),
                row_number,
                style_attr,
                strings.add(value)
            )
            .map_err(xml_error)?;
        }
        xml.push_str("</row>");
        Ok(())
    }

    fn workbook_xml(sheet: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            NS_MAIN,
            NS_REL,
            escape_xml(sheet)
        )
    }

    fn styles_xml() -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<styleSheet xmlns="{ns}">"#,
                r#"<fonts count="2">"#,
                r#"<font><sz val="11"/><name val="Calibri"/></font>"#,
                r#"<font><b/><sz val="11"/><color rgb="{font}"/><name val="Calibri"/></font>"#,
                r#"</fonts>"#,
                r#"<fills count="3">"#,
                r#"<fill><patternFill patternType="none"/></fill>"#,
                r#"<fill><patternFill patternType="gray125"/></fill>"#,
                r#"<fill><patternFill patternType="solid"><fgColor rgb="{fill}"/><bgColor indexed="64"/></patternFill></fill>"#,
                r#"</fills>"#,
                r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
                r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
                r#"<cellXfs count="2">"#,
                r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
                r#"<xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"/>"#,
                r#"</cellXfs>"#,
                r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
                r#"</styleSheet>"#
            ),
            ns = NS_MAIN,
            font = HEADER_FONT_RGB,
            fill = HEADER_FILL_RGB
        )
    }

    fn content_types_xml() -> String {
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
            r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
            r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
            r#"</Types>"#
        )
        .to_string()
    }

    fn root_rels_xml() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            NS_PKG_REL, NS_REL
        )
    }

    fn workbook_rels_xml() -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="{pkg}">"#,
                r#"<Relationship Id="rId1" Type="{rel}/worksheet" Target="worksheets/sheet1.xml"/>"#,
                r#"<Relationship Id="rId2" Type="{rel}/styles" Target="styles.xml"/>"#,
                r#"<Relationship Id="rId3" Type="{rel}/sharedStrings" Target="sharedStrings.xml"/>"#,
                r#"</Relationships>"#
            ),
            pkg = NS_PKG_REL,
            rel = NS_REL
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Pipeline;
    use chrono::{Local, TimeZone};
    use std::io::Read;

    fn row(name: &str, amount: &str) -> DealRow {
        DealRow {
            name: name.to_string(),
            amount: amount.to_string(),
            stage: "appointmentscheduled".to_string(),
            close_date: "2024-05-01".to_string(),
            created_date: "2024-01-15".to_string(),
        }
    }

    fn report(label: &str, rows: Vec<DealRow>) -> Report {
        Report {
            pipeline: Pipeline {
                id: "default".to_string(),
                label: label.to_string(),
            },
            rows,
            generated_at: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
        }
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_file_name_uses_sanitized_label_and_timestamp() {
        let r = report("Sales Pipeline / EMEA", vec![]);
        assert_eq!(report_file_name(&r), "Sales_Pipeline__EMEA_20240309_140507.xlsx");
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Sales Pipeline"), "Sales_Pipeline");
        assert_eq!(sanitize_label("../../etc"), "etc");
        assert_eq!(sanitize_label("Négociation"), "Ngociation");
        assert_eq!(sanitize_label("///"), "pipeline");
        assert_eq!(sanitize_label("  "), "pipeline");
    }

    #[test]
    fn test_sheet_name_rules() {
        assert_eq!(sheet_name("Sales: Q1/Q2"), "Sales_ Q1_Q2");
        assert_eq!(sheet_name(&"x".repeat(40)).chars().count(), MAX_SHEET_NAME_LEN);
        assert_eq!(sheet_name("''"), "Deals");
    }

    #[test]
    fn test_column_widths_fit_content_with_cap() {
        let rows = vec![row("A", "10"), row(&"N".repeat(30), ""), row(&"W".repeat(80), "")];
        let widths = column_widths(&rows);

        assert_eq!(widths[0], MAX_COLUMN_WIDTH);
        // "Amount" header is wider than any amount value.
        assert_eq!(widths[1], "Amount".len() + WIDTH_PADDING);
        assert_eq!(widths[2], "appointmentscheduled".len() + WIDTH_PADDING);
        assert_eq!(widths[3], "Close Date".len() + WIDTH_PADDING);
        assert_eq!(widths[4], "Created Date".len() + WIDTH_PADDING);
    }

    #[test]
    fn test_column_widths_for_header_only() {
        let widths = column_widths(&[]);
        assert_eq!(widths[0], "Deal Name".len() + WIDTH_PADDING);
    }

    #[test]
    fn test_escape_xml_drops_control_characters() {
        assert_eq!(escape_xml("a<b & \"c\"\u{1}\td"), "a&lt;b &amp; &quot;c&quot;\td");
        assert_eq!(escape_xml("x\u{FFFE}y\u{FFFF}"), "xy");
    }

    #[test]
    fn test_cell_text_keeps_control_characters_as_escapes() {
        assert_eq!(escape_cell_text("Tab\u{0B}VT"), "Tab_x000B_VT");
        assert_eq!(escape_cell_text("a\r\nb\tc"), "a_x000D_\nb\tc");
        assert_eq!(escape_cell_text("x\u{FFFF}"), "x");
        assert_eq!(escape_cell_text("R&D"), "R&amp;D");
    }

    #[test]
    fn test_cell_text_escapes_literal_escape_sequences() {
        assert_eq!(escape_cell_text("id_x0041_"), "id_x005F_x0041_");
        assert_eq!(escape_cell_text("snake_case_x"), "snake_case_x");
    }

    #[test]
    fn test_workbook_contains_all_parts() {
        let bytes = XlsxReportWriter::render(&report("Sales", vec![row("Acme", "100")])).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "xl/_rels/workbook.xml.rels",
                "xl/sharedStrings.xml",
                "xl/styles.xml",
                "xl/workbook.xml",
                "xl/worksheets/sheet1.xml",
            ]
        );
    }

    #[test]
    fn test_header_row_is_styled_and_data_rows_are_not() {
        let bytes = XlsxReportWriter::render(&report("Sales", vec![row("Acme", "100")])).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");

        assert!(sheet.contains(r#"<c r="A1" s="1" t="s">"#));
        assert!(sheet.contains(r#"<c r="E1" s="1" t="s">"#));
        assert!(sheet.contains(r#"<c r="A2" t="s">"#));
        assert!(sheet.contains(r#"<dimension ref="A1:E2"/>"#));

        let styles = read_part(&bytes, "xl/styles.xml");
        assert!(styles.contains("<b/>"));
        assert!(styles.contains(HEADER_FILL_RGB));
    }

    #[test]
    fn test_empty_fields_still_get_cells() {
        let rows = vec![row("Acme", ""), DealRow::default()];
        let bytes = XlsxReportWriter::render(&report("Sales", rows)).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");

        assert!(sheet.contains(r#"<c r="B2" t="s">"#));
        for col in ["A3", "B3", "C3", "D3", "E3"] {
            assert!(sheet.contains(&format!(r#"<c r="{}" t="s">"#, col)));
        }
        assert!(!sheet.contains("<row r=\"3\"></row>"));

        let sst = read_part(&bytes, "xl/sharedStrings.xml");
        assert_eq!(sst.matches("<si><t></t></si>").count(), 1);
    }

    #[test]
    fn test_column_widths_are_written() {
        let bytes = XlsxReportWriter::render(&report("Sales", vec![])).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");

        assert!(sheet.contains(r#"<col min="1" max="1" width="11" customWidth="1"/>"#));
        assert!(sheet.contains(r#"<col min="5" max="5" width="14" customWidth="1"/>"#));
    }

    #[test]
    fn test_repeated_values_share_one_string() {
        let rows = vec![row("Acme", "100"), row("Acme", "100")];
        let bytes = XlsxReportWriter::render(&report("Sales", rows)).unwrap();
        let sst = read_part(&bytes, "xl/sharedStrings.xml");

        assert_eq!(sst.matches("<si><t>Acme</t></si>").count(), 1);
        // 5 headers + 2 rows x 5 cells
        assert!(sst.contains(r#"count="15""#));
    }

    #[test]
    fn test_sheet_is_named_after_pipeline() {
        let bytes = XlsxReportWriter::render(&report("R&D Deals", vec![])).unwrap();
        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"<sheet name="R&amp;D Deals""#));
    }
}
