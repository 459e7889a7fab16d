use crate::domain::model::WeeklyPerformance;
use crate::report::filter::{DateRange, PortSelection, ReportFilter};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklySummary {
    pub report_count: usize,
    pub total_vessels: f64,
    pub total_cargo: f64,
    pub total_revenue: f64,
    pub cargo_by_type: BTreeMap<String, f64>,
}

impl WeeklySummary {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a WeeklyPerformance>) -> Self {
        let mut summary = WeeklySummary::default();
        for report in reports {
            summary.report_count += 1;
            summary.total_vessels += report.vessels_handled;
            summary.total_revenue += report.revenue;
            for line in &report.cargo {
                summary.total_cargo += line.quantity;
                *summary
                    .cargo_by_type
                    .entry(line.cargo_type.clone())
                    .or_insert(0.0) += line.quantity;
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPortSection {
    pub port_name: String,
    pub summary: WeeklySummary,
    pub reports: Vec<WeeklyPerformance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub selection: PortSelection,
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub summary: WeeklySummary,
    pub sections: Vec<WeeklyPortSection>,
}

impl WeeklyReport {
    pub fn build(
        reports: Vec<WeeklyPerformance>,
        filter: &ReportFilter,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let reports = filter.apply(reports);
        let summary = WeeklySummary::from_reports(&reports);

        let by_port: BTreeMap<String, Vec<WeeklyPerformance>> = match &filter.port {
            PortSelection::All => {
                let mut grouped: BTreeMap<String, Vec<WeeklyPerformance>> = BTreeMap::new();
                for report in reports {
                    grouped
                        .entry(report.port_label().to_string())
                        .or_default()
                        .push(report);
                }
                grouped
            }
            // 指定港口時合併成單一區段，標題用資料上的港口名稱
            PortSelection::Named(_) if reports.is_empty() => BTreeMap::new(),
            PortSelection::Named(name) => {
                let label = reports
                    .iter()
                    .find_map(|r| r.port_name.clone())
                    .unwrap_or_else(|| name.clone());
                BTreeMap::from([(label, reports)])
            }
        };

        let sections: Vec<WeeklyPortSection> = by_port
            .into_iter()
            .map(|(port_name, mut reports)| {
                reports.sort_by_key(|r| r.week_date());
                WeeklyPortSection {
                    summary: WeeklySummary::from_reports(&reports),
                    port_name,
                    reports,
                }
            })
            .collect();

        tracing::info!(
            "📈 Weekly performance report: {} submissions across {} section(s)",
            summary.report_count,
            sections.len()
        );

        Self {
            selection: filter.port.clone(),
            range: filter.range,
            generated_at,
            summary,
            sections,
        }
    }

    pub fn row_count(&self) -> usize {
        self.summary.report_count
    }
}
