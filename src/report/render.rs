use crate::domain::model::{Vessel, WeeklyPerformance};
use crate::report::filter::{DateRange, PortSelection};
use crate::report::vessel_report::{PortSection, VesselReport, VesselSummary};
use crate::report::weekly_report::{WeeklyReport, WeeklySummary};
use crate::report::xlsx::{CellStyle, Sheet, Workbook};
use crate::utils::error::{PortalError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(PortalError::InvalidConfigValueError {
                field: "report.formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: xlsx, csv".to_string(),
            }),
        }
    }
}

const VESSEL_COLUMNS: &[(&str, f64)] = &[
    ("No.", 6.0),
    ("Vessel", 24.0),
    ("IMO", 12.0),
    ("Port", 16.0),
    ("Agent", 20.0),
    ("Berth", 10.0),
    ("Arrival", 12.0),
    ("Departure", 12.0),
    ("Cargo Types", 24.0),
    ("Cargo Qty", 14.0),
    ("Clearance Issued", 16.0),
    ("Demurrage", 14.0),
    ("Demurrage Source", 16.0),
];

const WEEKLY_COLUMNS: &[(&str, f64)] = &[
    ("No.", 6.0),
    ("Week Start", 12.0),
    ("Week Ending", 12.0),
    ("Submitted", 12.0),
    ("Vessels", 10.0),
    ("Cargo", 14.0),
    ("Revenue", 14.0),
    ("Cargo Breakdown", 32.0),
    ("Remarks", 30.0),
];

/// 依序往下寫的游標
struct SheetCursor<'a> {
    sheet: &'a mut Sheet,
    row: u32,
    last_col: u32,
}

impl<'a> SheetCursor<'a> {
    fn new(sheet: &'a mut Sheet, columns: &[(&str, f64)]) -> Self {
        for (i, (_, width)) in columns.iter().enumerate() {
            sheet.set_column_width(i as u32, *width);
        }
        let last_col = columns.len().saturating_sub(1) as u32;
        Self {
            sheet,
            row: 0,
            last_col,
        }
    }

    fn skip(&mut self, rows: u32) {
        self.row += rows;
    }

    fn banner(&mut self, text: &str, style: CellStyle) -> Result<()> {
        self.sheet
            .merge_range(self.row, 0, self.row, self.last_col, text, style)?;
        self.row += 1;
        Ok(())
    }

    fn header(&mut self, columns: &[&str]) {
        for (i, title) in columns.iter().enumerate() {
            self.sheet
                .write_text(self.row, i as u32, *title, CellStyle::Header);
        }
        self.row += 1;
    }

    fn label_value(&mut self, label: &str, value: f64, style: CellStyle) {
        self.sheet.write_text(self.row, 0, label, CellStyle::Label);
        // 標籤佔兩欄，數值放第三欄
        self.sheet.write_number(self.row, 2, value, style);
        self.row += 1;
    }

    fn text(&mut self, col: u32, value: &str) {
        self.sheet.write_text(self.row, col, value, CellStyle::Text);
    }

    fn optional(&mut self, col: u32, value: Option<&str>) {
        match value {
            Some(v) => self.text(col, v),
            None => self.sheet.write_blank(self.row, col, CellStyle::Text),
        }
    }

    fn number(&mut self, col: u32, value: f64, style: CellStyle) {
        self.sheet.write_number(self.row, col, value, style);
    }

    fn next_row(&mut self) {
        self.row += 1;
    }
}

fn fmt_date(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|d| d.format("%Y-%m-%d").to_string())
}

fn subtitle(selection: &PortSelection, range: &DateRange, generated_at: DateTime<Utc>) -> String {
    format!(
        "Port: {} | Period: {} | Generated: {}",
        selection,
        range.label(),
        generated_at.format("%Y-%m-%d %H:%M UTC")
    )
}

fn cargo_by_type_table(cursor: &mut SheetCursor<'_>, cargo: &BTreeMap<String, f64>) {
    cursor.header(&["Cargo Type", "", "Quantity"]);
    for (cargo_type, quantity) in cargo {
        cursor.text(0, cargo_type);
        cursor.sheet.write_blank(cursor.row, 1, CellStyle::Text);
        cursor.number(2, *quantity, CellStyle::Decimal);
        cursor.next_row();
    }
    cursor
        .sheet
        .write_text(cursor.row, 0, "Total", CellStyle::TotalDecimal);
    cursor
        .sheet
        .write_blank(cursor.row, 1, CellStyle::TotalDecimal);
    cursor.number(2, cargo.values().sum(), CellStyle::TotalDecimal);
    cursor.next_row();
}

fn vessel_summary_block(cursor: &mut SheetCursor<'_>, summary: &VesselSummary) {
    cursor.label_value("Total vessels", summary.total_vessels as f64, CellStyle::Integer);
    cursor.label_value("Cleared vessels", summary.cleared_vessels as f64, CellStyle::Integer);
    cursor.label_value("Pending clearance", summary.pending_vessels as f64, CellStyle::Integer);
    cursor.label_value("Total cargo handled", summary.total_cargo, CellStyle::Decimal);
    cursor.label_value("Cargo (cleared)", summary.cleared_cargo, CellStyle::Decimal);
    cursor.label_value("Cargo (pending)", summary.pending_cargo, CellStyle::Decimal);
    cursor.label_value("Demurrage collected", summary.total_demurrage, CellStyle::Decimal);
}

fn vessel_table(cursor: &mut SheetCursor<'_>, vessels: &[Vessel], with_demurrage: bool) {
    let headers: Vec<&str> = VESSEL_COLUMNS.iter().map(|(h, _)| *h).collect();
    cursor.header(&headers);

    for (i, vessel) in vessels.iter().enumerate() {
        cursor.number(0, (i + 1) as f64, CellStyle::Integer);
        cursor.text(1, &vessel.vessel_name);
        cursor.optional(2, vessel.imo_number.as_deref());
        cursor.text(3, vessel.port_label());
        cursor.optional(4, vessel.agent.as_deref());
        cursor.optional(5, vessel.berth.as_deref());
        cursor.optional(6, fmt_date(vessel.arrival).as_deref());
        cursor.optional(7, fmt_date(vessel.departure).as_deref());
        cursor.text(8, &vessel.cargo_summary());
        cursor.number(9, vessel.total_cargo(), CellStyle::Decimal);
        if vessel.cleared {
            // 有值但無法解析時顯示 "Issued"
            let issued = fmt_date(vessel.clearance_issued_on).unwrap_or_else(|| "Issued".to_string());
            cursor.text(10, &issued);
        } else {
            cursor.text(10, "Pending");
        }
        if with_demurrage {
            cursor.number(11, vessel.demurrage.amount(), CellStyle::Decimal);
            cursor.text(12, vessel.demurrage.source_label());
        } else {
            cursor.optional(11, None);
            cursor.optional(12, None);
        }
        cursor.next_row();
    }

    for col in 0..=cursor.last_col {
        cursor
            .sheet
            .write_blank(cursor.row, col, CellStyle::TotalDecimal);
    }
    cursor
        .sheet
        .write_text(cursor.row, 1, "Total", CellStyle::TotalDecimal);
    cursor.number(
        9,
        vessels.iter().map(Vessel::total_cargo).sum(),
        CellStyle::TotalDecimal,
    );
    if with_demurrage {
        cursor.number(
            11,
            vessels.iter().map(|v| v.demurrage.amount()).sum(),
            CellStyle::TotalDecimal,
        );
    }
    cursor.next_row();
}

fn port_section(cursor: &mut SheetCursor<'_>, section: &PortSection) -> Result<()> {
    cursor.banner(&format!("Port: {}", section.port_name), CellStyle::Section)?;
    cursor.header(&["Vessels", "Cleared", "Pending", "Cargo", "Demurrage"]);
    cursor.number(0, section.summary.total_vessels as f64, CellStyle::Integer);
    cursor.number(1, section.summary.cleared_vessels as f64, CellStyle::Integer);
    cursor.number(2, section.summary.pending_vessels as f64, CellStyle::Integer);
    cursor.number(3, section.summary.total_cargo, CellStyle::Decimal);
    cursor.number(4, section.summary.total_demurrage, CellStyle::Decimal);
    cursor.next_row();
    cursor.skip(1);

    cursor.banner(
        &format!("Cleared Vessels ({})", section.cleared.len()),
        CellStyle::Label,
    )?;
    vessel_table(cursor, &section.cleared, true);
    cursor.skip(1);

    cursor.banner(
        &format!("Pending Clearance ({})", section.pending.len()),
        CellStyle::Label,
    )?;
    vessel_table(cursor, &section.pending, false);
    cursor.skip(1);
    Ok(())
}

pub fn vessel_workbook(report: &VesselReport) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_sheet("Vessel Report");
        let mut cursor = SheetCursor::new(sheet, VESSEL_COLUMNS);
        cursor.banner("Port Authority Vessel Report", CellStyle::Title)?;
        cursor.banner(
            &subtitle(&report.selection, &report.range, report.generated_at),
            CellStyle::Subtitle,
        )?;
        cursor.skip(1);

        let heading = if report.selection.is_all() {
            "Combined Summary (All Ports)"
        } else {
            "Summary"
        };
        cursor.banner(heading, CellStyle::Section)?;
        vessel_summary_block(&mut cursor, &report.summary);
        cursor.skip(1);

        cursor.banner("Cargo by Type", CellStyle::Section)?;
        cargo_by_type_table(&mut cursor, &report.summary.cargo_by_type);
        cursor.skip(1);

        if report.sections.is_empty() {
            cursor.banner("No vessel calls match the selected filters", CellStyle::Subtitle)?;
        }
        for section in &report.sections {
            port_section(&mut cursor, section)?;
        }
    }

    if report.selection.is_all() && !report.sections.is_empty() {
        let sheet = workbook.add_sheet("Summary by Port");
        let columns: &[(&str, f64)] = &[
            ("Port", 20.0),
            ("Vessels", 10.0),
            ("Cleared", 10.0),
            ("Pending", 10.0),
            ("Cargo", 14.0),
            ("Demurrage", 14.0),
        ];
        let mut cursor = SheetCursor::new(sheet, columns);
        let headers: Vec<&str> = columns.iter().map(|(h, _)| *h).collect();
        cursor.header(&headers);
        for section in &report.sections {
            cursor.text(0, &section.port_name);
            cursor.number(1, section.summary.total_vessels as f64, CellStyle::Integer);
            cursor.number(2, section.summary.cleared_vessels as f64, CellStyle::Integer);
            cursor.number(3, section.summary.pending_vessels as f64, CellStyle::Integer);
            cursor.number(4, section.summary.total_cargo, CellStyle::Decimal);
            cursor.number(5, section.summary.total_demurrage, CellStyle::Decimal);
            cursor.next_row();
        }
        let total = &report.summary;
        cursor
            .sheet
            .write_text(cursor.row, 0, "All Ports", CellStyle::TotalInteger);
        cursor.number(1, total.total_vessels as f64, CellStyle::TotalInteger);
        cursor.number(2, total.cleared_vessels as f64, CellStyle::TotalInteger);
        cursor.number(3, total.pending_vessels as f64, CellStyle::TotalInteger);
        cursor.number(4, total.total_cargo, CellStyle::TotalDecimal);
        cursor.number(5, total.total_demurrage, CellStyle::TotalDecimal);
    }

    Ok(workbook)
}

fn weekly_summary_block(cursor: &mut SheetCursor<'_>, summary: &WeeklySummary) {
    cursor.label_value("Reports submitted", summary.report_count as f64, CellStyle::Integer);
    cursor.label_value("Vessels handled", summary.total_vessels, CellStyle::Integer);
    cursor.label_value("Total cargo", summary.total_cargo, CellStyle::Decimal);
    cursor.label_value("Total revenue", summary.total_revenue, CellStyle::Decimal);
}

fn breakdown_text(report: &WeeklyPerformance) -> String {
    report
        .cargo
        .iter()
        .map(|c| format!("{}: {}", c.cargo_type, c.quantity))
        .collect::<Vec<_>>()
        .join("; ")
}

fn weekly_table(cursor: &mut SheetCursor<'_>, reports: &[WeeklyPerformance]) {
    let headers: Vec<&str> = WEEKLY_COLUMNS.iter().map(|(h, _)| *h).collect();
    cursor.header(&headers);
    for (i, report) in reports.iter().enumerate() {
        cursor.number(0, (i + 1) as f64, CellStyle::Integer);
        cursor.optional(1, fmt_date(report.week_start).as_deref());
        cursor.optional(2, fmt_date(report.week_ending).as_deref());
        cursor.optional(3, fmt_date(report.submitted_at).as_deref());
        cursor.number(4, report.vessels_handled, CellStyle::Integer);
        cursor.number(5, report.total_cargo(), CellStyle::Decimal);
        cursor.number(6, report.revenue, CellStyle::Decimal);
        cursor.text(7, &breakdown_text(report));
        cursor.optional(8, report.remarks.as_deref());
        cursor.next_row();
    }
    for col in 0..=cursor.last_col {
        cursor
            .sheet
            .write_blank(cursor.row, col, CellStyle::TotalDecimal);
    }
    cursor
        .sheet
        .write_text(cursor.row, 1, "Total", CellStyle::TotalDecimal);
    cursor.number(
        4,
        reports.iter().map(|r| r.vessels_handled).sum(),
        CellStyle::TotalInteger,
    );
    cursor.number(
        5,
        reports.iter().map(WeeklyPerformance::total_cargo).sum(),
        CellStyle::TotalDecimal,
    );
    cursor.number(
        6,
        reports.iter().map(|r| r.revenue).sum(),
        CellStyle::TotalDecimal,
    );
    cursor.next_row();
}

pub fn weekly_workbook(report: &WeeklyReport) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Weekly Performance");
    let mut cursor = SheetCursor::new(sheet, WEEKLY_COLUMNS);

    cursor.banner("Weekly Performance Report", CellStyle::Title)?;
    cursor.banner(
        &subtitle(&report.selection, &report.range, report.generated_at),
        CellStyle::Subtitle,
    )?;
    cursor.skip(1);

    cursor.banner("Summary", CellStyle::Section)?;
    weekly_summary_block(&mut cursor, &report.summary);
    cursor.skip(1);

    cursor.banner("Cargo by Type", CellStyle::Section)?;
    cargo_by_type_table(&mut cursor, &report.summary.cargo_by_type);
    cursor.skip(1);

    if report.sections.is_empty() {
        cursor.banner("No weekly reports match the selected filters", CellStyle::Subtitle)?;
    }
    for section in &report.sections {
        cursor.banner(&format!("Port: {}", section.port_name), CellStyle::Section)?;
        weekly_table(&mut cursor, &section.reports);
        cursor.skip(1);
    }

    Ok(workbook)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| PortalError::processing(format!("CSV flush failed: {}", e)))
}

pub fn vessel_csv(report: &VesselReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "vessel_name",
        "imo_number",
        "port",
        "agent",
        "berth",
        "arrival",
        "departure",
        "cargo_types",
        "cargo_quantity",
        "status",
        "clearance_issued_on",
        "demurrage",
        "demurrage_source",
    ])?;

    for section in &report.sections {
        for vessel in section.cleared.iter().chain(section.pending.iter()) {
            let (status, demurrage, source) = if vessel.cleared {
                (
                    "cleared",
                    format!("{:.2}", vessel.demurrage.amount()),
                    vessel.demurrage.source_label().to_string(),
                )
            } else {
                ("pending", String::new(), String::new())
            };
            writer.write_record([
                vessel.vessel_name.clone(),
                vessel.imo_number.clone().unwrap_or_default(),
                vessel.port_label().to_string(),
                vessel.agent.clone().unwrap_or_default(),
                vessel.berth.clone().unwrap_or_default(),
                fmt_date(vessel.arrival).unwrap_or_default(),
                fmt_date(vessel.departure).unwrap_or_default(),
                vessel.cargo_summary(),
                format!("{:.2}", vessel.total_cargo()),
                status.to_string(),
                fmt_date(vessel.clearance_issued_on).unwrap_or_default(),
                demurrage,
                source,
            ])?;
        }
    }
    finish_csv(writer)
}

pub fn weekly_csv(report: &WeeklyReport) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "port",
        "week_start",
        "week_ending",
        "submitted_at",
        "vessels_handled",
        "cargo",
        "revenue",
        "cargo_breakdown",
    ])?;
    for section in &report.sections {
        for r in &section.reports {
            writer.write_record([
                section.port_name.clone(),
                fmt_date(r.week_start).unwrap_or_default(),
                fmt_date(r.week_ending).unwrap_or_default(),
                fmt_date(r.submitted_at).unwrap_or_default(),
                r.vessels_handled.to_string(),
                format!("{:.2}", r.total_cargo()),
                format!("{:.2}", r.revenue),
                breakdown_text(r),
            ])?;
        }
    }
    finish_csv(writer)
}

/// 報表檔名：`<kind>_<port>_<from>_<to>.<ext>`
pub fn report_file_name(kind: &str, selection: &PortSelection, range: &DateRange, format: ReportFormat) -> String {
    let slug: String = selection
        .to_string()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let bound = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y%m%d").to_string())
            .unwrap_or_else(|| "open".to_string())
    };
    format!(
        "{}_{}_{}_{}.{}",
        kind,
        slug.trim_matches('-'),
        bound(range.from),
        bound(range.to),
        format.extension()
    )
}
