use crate::domain::model::{Vessel, WeeklyPerformance};
use crate::utils::error::{PortalError, Result};
use chrono::NaiveDate;
use std::fmt;

pub const ALL_PORTS: &str = "All Ports";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    All,
    Named(String),
}

impl PortSelection {
    /// "all" / "All Ports" / 空字串 → 全部港口
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("all")
            || trimmed.eq_ignore_ascii_case(ALL_PORTS)
        {
            PortSelection::All
        } else {
            PortSelection::Named(trimmed.to_string())
        }
    }

    /// 名稱不分大小寫比對，或 port id 完全相符
    pub fn matches(&self, port_name: Option<&str>, port_id: Option<&str>) -> bool {
        match self {
            PortSelection::All => true,
            PortSelection::Named(wanted) => {
                port_name.is_some_and(|name| name.trim().eq_ignore_ascii_case(wanted))
                    || port_id.is_some_and(|id| id == wanted)
            }
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PortSelection::All)
    }
}

impl fmt::Display for PortSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSelection::All => write!(f, "{}", ALL_PORTS),
            PortSelection::Named(name) => write!(f, "{}", name),
        }
    }
}

/// 含頭含尾的日期區間，任一端可省略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(PortalError::validation(format!(
                    "Start date {} is after end date {}",
                    f, t
                )));
            }
        }
        Ok(Self { from, to })
    }

    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let parse = |label: &str, raw: Option<&str>| -> Result<Option<NaiveDate>> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|_| {
                        PortalError::validation(format!(
                            "{} date '{}' must be formatted YYYY-MM-DD",
                            label, s
                        ))
                    }),
            }
        };
        Self::new(parse("Start", from)?, parse("End", to)?)
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// 無法解析日期的紀錄：有設邊界就排除，完全不設邊界才納入
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }

    pub fn label(&self) -> String {
        let fmt = |d: Option<NaiveDate>, fallback: &str| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| fallback.to_string())
        };
        match (self.from, self.to) {
            (None, None) => "All dates".to_string(),
            (from, to) => format!("{} to {}", fmt(from, "beginning"), fmt(to, "today")),
        }
    }
}

/// 可依港口與日期篩選的紀錄
pub trait ReportRecord {
    fn port_name(&self) -> Option<&str>;
    fn port_id(&self) -> Option<&str>;
    fn report_date(&self) -> Option<NaiveDate>;
}

impl ReportRecord for Vessel {
    fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    fn port_id(&self) -> Option<&str> {
        self.port_id.as_deref()
    }

    fn report_date(&self) -> Option<NaiveDate> {
        self.arrival_date()
    }
}

impl ReportRecord for WeeklyPerformance {
    fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    fn port_id(&self) -> Option<&str> {
        self.port_id.as_deref()
    }

    fn report_date(&self) -> Option<NaiveDate> {
        self.week_date()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    pub port: PortSelection,
    pub range: DateRange,
}

impl ReportFilter {
    pub fn new(port: PortSelection, range: DateRange) -> Self {
        Self { port, range }
    }

    pub fn accepts<R: ReportRecord>(&self, record: &R) -> bool {
        self.port.matches(record.port_name(), record.port_id())
            && self.range.contains(record.report_date())
    }

    pub fn apply<R: ReportRecord>(&self, records: Vec<R>) -> Vec<R> {
        let before = records.len();
        let kept: Vec<R> = records.into_iter().filter(|r| self.accepts(r)).collect();
        tracing::debug!(
            "Filter [{} | {}] kept {} of {} records",
            self.port,
            self.range.label(),
            kept.len(),
            before
        );
        kept
    }
}
