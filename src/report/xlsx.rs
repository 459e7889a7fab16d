//! Minimal SpreadsheetML writer: shared strings, a fixed style table, merged
//! ranges and column widths, zipped into an `.xlsx` package.

use crate::utils::error::{PortalError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub const MAX_SHEET_NAME_LEN: usize = 31;

/// 固定的儲存格樣式；數值對應 styles.xml 的 cellXfs 索引
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Default = 0,
    Title = 1,
    Subtitle = 2,
    Section = 3,
    Header = 4,
    Label = 5,
    Integer = 6,
    Decimal = 7,
    Text = 8,
    TotalDecimal = 9,
    TotalInteger = 10,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    value: Option<CellValue>,
    style: CellStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRange {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    rows: BTreeMap<u32, BTreeMap<u32, Cell>>,
    merges: Vec<MergeRange>,
    widths: BTreeMap<u32, f64>,
}

impl Sheet {
    fn new(name: &str) -> Self {
        Self {
            name: sanitize_sheet_name(name),
            rows: BTreeMap::new(),
            merges: Vec::new(),
            widths: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn put(&mut self, row: u32, col: u32, value: Option<CellValue>, style: CellStyle) {
        self.rows
            .entry(row)
            .or_default()
            .insert(col, Cell { value, style });
    }

    pub fn write_text(&mut self, row: u32, col: u32, text: impl Into<String>, style: CellStyle) {
        self.put(row, col, Some(CellValue::Text(text.into())), style);
    }

    pub fn write_number(&mut self, row: u32, col: u32, value: f64, style: CellStyle) {
        // NaN/inf 不是合法的 <v>
        let value = if value.is_finite() { value } else { 0.0 };
        self.put(row, col, Some(CellValue::Number(value)), style);
    }

    /// 只套樣式不寫值 (合併範圍內的邊框等)
    pub fn write_blank(&mut self, row: u32, col: u32, style: CellStyle) {
        self.put(row, col, None, style);
    }

    pub fn merge_range(
        &mut self,
        first_row: u32,
        first_col: u32,
        last_row: u32,
        last_col: u32,
        text: impl Into<String>,
        style: CellStyle,
    ) -> Result<()> {
        if last_row < first_row || last_col < first_col {
            return Err(PortalError::processing(format!(
                "Invalid merge range ({}, {}) to ({}, {})",
                first_row, first_col, last_row, last_col
            )));
        }
        let overlaps = self.merges.iter().any(|m| {
            first_row <= m.last_row
                && m.first_row <= last_row
                && first_col <= m.last_col
                && m.first_col <= last_col
        });
        if overlaps {
            return Err(PortalError::processing(format!(
                "Merge range {} overlaps an existing merge",
                range_ref(first_row, first_col, last_row, last_col)
            )));
        }

        self.write_text(first_row, first_col, text, style);
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                if row != first_row || col != first_col {
                    self.write_blank(row, col, style);
                }
            }
        }
        self.merges.push(MergeRange {
            first_row,
            first_col,
            last_row,
            last_col,
        });
        Ok(())
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) {
        self.widths.insert(col, width);
    }

    pub fn merges(&self) -> &[MergeRange] {
        &self.merges
    }

    pub fn cell_value(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.rows
            .get(&row)
            .and_then(|r| r.get(&col))
            .and_then(|c| c.value.as_ref())
    }

    /// 最後一個有資料的列 (0-based)，空工作表為 None
    pub fn last_row(&self) -> Option<u32> {
        self.rows.keys().next_back().copied()
    }

    fn to_xml(&self, strings: &mut SharedStrings) -> String {
        let mut xml = String::with_capacity(4096);
        xml.push_str(XML_HEADER);
        let _ = write!(xml, r#"<worksheet xmlns="{}" xmlns:r="{}">"#, MAIN_NS, REL_NS);

        if !self.widths.is_empty() {
            xml.push_str("<cols>");
            for (col, width) in &self.widths {
                let _ = write!(
                    xml,
                    r#"<col min="{0}" max="{0}" width="{1}" customWidth="1"/>"#,
                    col + 1,
                    width
                );
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        for (row, cells) in &self.rows {
            let _ = write!(xml, r#"<row r="{}">"#, row + 1);
            for (col, cell) in cells {
                let reference = cell_ref(*row, *col);
                let style = cell.style as u32;
                match &cell.value {
                    None => {
                        let _ = write!(xml, r#"<c r="{}" s="{}"/>"#, reference, style);
                    }
                    Some(CellValue::Number(n)) => {
                        let _ = write!(xml, r#"<c r="{}" s="{}"><v>{}</v></c>"#, reference, style, n);
                    }
                    Some(CellValue::Text(text)) => {
                        let index = strings.index_of(text);
                        let _ = write!(
                            xml,
                            r#"<c r="{}" s="{}" t="s"><v>{}</v></c>"#,
                            reference, style, index
                        );
                    }
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");

        if !self.merges.is_empty() {
            let _ = write!(xml, r#"<mergeCells count="{}">"#, self.merges.len());
            for m in &self.merges {
                let _ = write!(
                    xml,
                    r#"<mergeCell ref="{}"/>"#,
                    range_ref(m.first_row, m.first_col, m.last_row, m.last_col)
                );
            }
            xml.push_str("</mergeCells>");
        }

        xml.push_str("</worksheet>");
        xml
    }
}

#[derive(Default)]
struct SharedStrings {
    strings: Vec<String>,
    lookup: HashMap<String, usize>,
    references: usize,
}

impl SharedStrings {
    fn index_of(&mut self, text: &str) -> usize {
        self.references += 1;
        if let Some(index) = self.lookup.get(text) {
            return *index;
        }
        let index = self.strings.len();
        self.strings.push(text.to_string());
        self.lookup.insert(text.to_string(), index);
        index
    }

    fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(64 * self.strings.len() + 128);
        xml.push_str(XML_HEADER);
        let _ = write!(
            xml,
            r#"<sst xmlns="{}" count="{}" uniqueCount="{}">"#,
            MAIN_NS,
            self.references,
            self.strings.len()
        );
        for s in &self.strings {
            let _ = write!(xml, r#"<si><t xml:space="preserve">{}</t></si>"#, escape_xml(s));
        }
        xml.push_str("</sst>");
        xml
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 名稱重複時自動加序號
    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        let mut sheet = Sheet::new(name);
        let base = sheet.name.clone();
        let mut n = 2;
        while self.sheets.iter().any(|s| s.name.eq_ignore_ascii_case(&sheet.name)) {
            let suffix = format!(" ({})", n);
            let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.len());
            sheet.name = format!("{}{}", truncate_chars(&base, keep), suffix);
            n += 1;
        }
        self.sheets.push(sheet);
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.sheets.is_empty() {
            return Err(PortalError::processing("Workbook has no worksheets"));
        }

        let mut strings = SharedStrings::default();
        let sheet_parts: Vec<String> = self.sheets.iter().map(|s| s.to_xml(&mut strings)).collect();

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(self.content_types_xml().as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(root_rels_xml().as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(self.workbook_xml().as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(self.workbook_rels_xml().as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(STYLES_XML.as_bytes())?;

        for (i, part) in sheet_parts.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
            zip.write_all(part.as_bytes())?;
        }

        zip.start_file("xl/sharedStrings.xml", options)?;
        zip.write_all(strings.to_xml().as_bytes())?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    fn content_types_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_HEADER);
        xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
        xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
        for i in 1..=self.sheets.len() {
            let _ = write!(
                xml,
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i
            );
        }
        xml.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
        xml.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
        xml.push_str("</Types>");
        xml
    }

    fn workbook_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_HEADER);
        let _ = write!(xml, r#"<workbook xmlns="{}" xmlns:r="{}"><sheets>"#, MAIN_NS, REL_NS);
        for (i, sheet) in self.sheets.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(&sheet.name),
                i + 1,
                i + 1
            );
        }
        xml.push_str("</sheets></workbook>");
        xml
    }

    fn workbook_rels_xml(&self) -> String {
        let n = self.sheets.len();
        let mut xml = String::new();
        xml.push_str(XML_HEADER);
        let _ = write!(xml, r#"<Relationships xmlns="{}">"#, PKG_REL_NS);
        for i in 1..=n {
            let _ = write!(
                xml,
                r#"<Relationship Id="rId{0}" Type="{1}/worksheet" Target="worksheets/sheet{0}.xml"/>"#,
                i, REL_NS
            );
        }
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{}/styles" Target="styles.xml"/>"#,
            n + 1,
            REL_NS
        );
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{}/sharedStrings" Target="sharedStrings.xml"/>"#,
            n + 2,
            REL_NS
        );
        xml.push_str("</Relationships>");
        xml
    }
}

fn root_rels_xml() -> String {
    format!(
        r#"{}<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        XML_HEADER, PKG_REL_NS, REL_NS
    )
}

// fonts: 0 一般, 1 粗體, 2 標題, 3 白色粗體 (區段標題), 4 斜體
// fills: 0/1 為規格保留, 2 表頭灰, 3 區段深藍
// numFmt 164 = 兩位小數千分位, 3 = 內建整數千分位
const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r##"<numFmts count="1"><numFmt numFmtId="164" formatCode="#,##0.00"/></numFmts>"##,
    r#"<fonts count="5">"#,
    r#"<font><sz val="11"/><name val="Calibri"/></font>"#,
    r#"<font><b/><sz val="11"/><name val="Calibri"/></font>"#,
    r#"<font><b/><sz val="14"/><name val="Calibri"/></font>"#,
    r#"<font><b/><sz val="11"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font>"#,
    r#"<font><i/><sz val="10"/><name val="Calibri"/></font>"#,
    r#"</fonts>"#,
    r#"<fills count="4">"#,
    r#"<fill><patternFill patternType="none"/></fill>"#,
    r#"<fill><patternFill patternType="gray125"/></fill>"#,
    r#"<fill><patternFill patternType="solid"><fgColor rgb="FFD9D9D9"/><bgColor indexed="64"/></patternFill></fill>"#,
    r#"<fill><patternFill patternType="solid"><fgColor rgb="FF1F4E78"/><bgColor indexed="64"/></patternFill></fill>"#,
    r#"</fills>"#,
    r#"<borders count="2">"#,
    r#"<border><left/><right/><top/><bottom/><diagonal/></border>"#,
    r#"<border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border>"#,
    r#"</borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="11">"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="0" fontId="2" fillId="0" borderId="0" xfId="0" applyFont="1"/>"#,
    r#"<xf numFmtId="0" fontId="4" fillId="0" borderId="0" xfId="0" applyFont="1"/>"#,
    r#"<xf numFmtId="0" fontId="3" fillId="3" borderId="0" xfId="0" applyFont="1" applyFill="1"/>"#,
    r#"<xf numFmtId="0" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1" applyFill="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center" wrapText="1"/></xf>"#,
    r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>"#,
    r#"<xf numFmtId="3" fontId="0" fillId="0" borderId="1" xfId="0" applyNumberFormat="1" applyBorder="1"/>"#,
    r#"<xf numFmtId="164" fontId="0" fillId="0" borderId="1" xfId="0" applyNumberFormat="1" applyBorder="1"/>"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"/>"#,
    r#"<xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0" applyNumberFormat="1" applyFont="1" applyFill="1" applyBorder="1"/>"#,
    r#"<xf numFmtId="3" fontId="1" fillId="2" borderId="1" xfId="0" applyNumberFormat="1" applyFont="1" applyFill="1" applyBorder="1"/>"#,
    r#"</cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

/// 0-based 欄號轉欄名：0 → A, 26 → AA
pub fn column_name(col: u32) -> String {
    let mut n = col + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        name.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

pub fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", column_name(col), row + 1)
}

fn range_ref(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> String {
    format!(
        "{}:{}",
        cell_ref(first_row, first_col),
        cell_ref(last_row, last_col)
    )
}

pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0 不允許的控制字元直接丟掉
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Excel 工作表名稱：最多 31 字元，不可含 []:*?/\
pub fn sanitize_sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        truncate_chars(cleaned, MAX_SHEET_NAME_LEN)
    }
}
