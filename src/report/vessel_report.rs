use crate::domain::model::Vessel;
use crate::report::filter::{DateRange, PortSelection, ReportFilter};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VesselSummary {
    pub total_vessels: usize,
    pub cleared_vessels: usize,
    pub pending_vessels: usize,
    pub total_cargo: f64,
    pub cleared_cargo: f64,
    pub pending_cargo: f64,
    /// 只計已放行船舶
    pub total_demurrage: f64,
    pub cargo_by_type: BTreeMap<String, f64>,
}

impl VesselSummary {
    pub fn from_vessels<'a>(vessels: impl IntoIterator<Item = &'a Vessel>) -> Self {
        let mut summary = VesselSummary::default();
        for vessel in vessels {
            let cargo = vessel.total_cargo();
            summary.total_vessels += 1;
            summary.total_cargo += cargo;

            for line in &vessel.cargo {
                *summary
                    .cargo_by_type
                    .entry(line.cargo_type.clone())
                    .or_insert(0.0) += line.quantity;
            }

            if vessel.cleared {
                summary.cleared_vessels += 1;
                summary.cleared_cargo += cargo;
                summary.total_demurrage += vessel.demurrage.amount();
            } else {
                summary.pending_vessels += 1;
                summary.pending_cargo += cargo;
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortSection {
    pub port_name: String,
    pub summary: VesselSummary,
    pub cleared: Vec<Vessel>,
    pub pending: Vec<Vessel>,
}

impl PortSection {
    fn new(port_name: String, mut vessels: Vec<Vessel>) -> Self {
        vessels.sort_by(|a, b| {
            a.arrival
                .cmp(&b.arrival)
                .then_with(|| a.vessel_name.cmp(&b.vessel_name))
        });
        let summary = VesselSummary::from_vessels(&vessels);
        let (cleared, pending): (Vec<Vessel>, Vec<Vessel>) =
            vessels.into_iter().partition(|v| v.cleared);
        Self {
            port_name,
            summary,
            cleared,
            pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VesselReport {
    pub selection: PortSelection,
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    /// 全部區段合計
    pub summary: VesselSummary,
    pub sections: Vec<PortSection>,
}

impl VesselReport {
    pub fn build(vessels: Vec<Vessel>, filter: &ReportFilter, generated_at: DateTime<Utc>) -> Self {
        let vessels = filter.apply(vessels);
        let summary = VesselSummary::from_vessels(&vessels);

        let sections = match &filter.port {
            PortSelection::All => {
                let mut by_port: BTreeMap<String, Vec<Vessel>> = BTreeMap::new();
                for vessel in vessels {
                    by_port
                        .entry(vessel.port_label().to_string())
                        .or_default()
                        .push(vessel);
                }
                by_port
                    .into_iter()
                    .map(|(port, vessels)| PortSection::new(port, vessels))
                    .collect()
            }
            PortSelection::Named(name) => {
                // 顯示資料上的港口名稱 (大小寫可能與輸入不同)
                let label = vessels
                    .iter()
                    .find_map(|v| v.port_name.clone())
                    .unwrap_or_else(|| name.clone());
                vec![PortSection::new(label, vessels)]
            }
        };

        tracing::info!(
            "🚢 Vessel report: {} vessels ({} cleared, {} pending) across {} section(s)",
            summary.total_vessels,
            summary.cleared_vessels,
            summary.pending_vessels,
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
        self.summary.total_vessels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Document;
    use serde_json::{json, Value};

    fn vessel(id: &str, value: Value) -> Vessel {
        Vessel::from_document(&Document::from_value(id, value))
    }

    fn march() -> ReportFilter {
        ReportFilter::new(
            PortSelection::All,
            DateRange::parse(Some("2024-03-01"), Some("2024-03-31")).unwrap(),
        )
    }

    fn fleet() -> Vec<Vessel> {
        vec![
            vessel("a", json!({
                "vesselName": "MV Alpha", "portName": "Lae", "arrivalDate": "2024-03-01",
                "cargoType": "Containers", "cargoQuantity": 100,
                "clearanceIssuedOn": "2024-03-02", "demurragesCollected": 500, "totalRevenue": 9999
            })),
            vessel("b", json!({
                "vesselName": "MV Bravo", "portName": "Lae", "arrivalDate": "2024-03-31T18:00:00Z",
                "cargo": [{ "type": "Containers", "quantity": 50 }, { "type": "Bulk Fuel", "quantity": 25 }],
                "demurrageCharges": [{ "amount": 40 }]
            })),
            vessel("c", json!({
                "vesselName": "MV Charlie", "portName": "Madang", "arrivalDate": { "seconds": 1_709_596_800, "nanoseconds": 0 },
                "cargoType": "Logs", "cargoQuantity": "1,000",
                "clearanceIssuedOn": { "seconds": 1_709_683_200, "nanoseconds": 0 },
                "dailyCharges": [{ "amount": 10 }, { "amount": 15 }]
            })),
            vessel("d", json!({
                "vesselName": "MV Delta", "portName": "Lae", "arrivalDate": "2024-04-01",
                "cargoType": "Containers", "cargoQuantity": 700, "clearanceIssuedOn": "2024-04-02"
            })),
            vessel("e", json!({
                "vesselName": "MV Echo", "arrivalDate": "2024-03-15",
                "cargoType": "Copra", "cargoQuantity": 10, "clearanceIssuedOn": "2024-03-16", "totalRevenue": "75"
            })),
        ]
    }

    #[test]
    fn test_total_cargo_sums_only_vessels_in_range() {
        let report = VesselReport::build(fleet(), &march(), Utc::now());
        // a 100 + b 75 + c 1000 + e 10；d 在 4/1 不計
        assert_eq!(report.summary.total_vessels, 4);
        assert_eq!(report.summary.total_cargo, 1185.0);
        assert_eq!(report.summary.cargo_by_type.get("Containers"), Some(&150.0));
        assert_eq!(report.summary.cargo_by_type.get("Bulk Fuel"), Some(&25.0));
    }

    #[test]
    fn test_pending_vessels_never_counted_as_cleared() {
        let report = VesselReport::build(fleet(), &march(), Utc::now());
        assert_eq!(report.summary.cleared_vessels, 3);
        assert_eq!(report.summary.pending_vessels, 1);
        assert_eq!(report.summary.pending_cargo, 75.0);
        assert_eq!(report.summary.cleared_cargo, 1110.0);

        let lae = report.sections.iter().find(|s| s.port_name == "Lae").unwrap();
        assert_eq!(lae.pending.len(), 1);
        assert_eq!(lae.pending[0].vessel_name, "MV Bravo");
        assert!(lae.cleared.iter().all(|v| v.cleared));
    }

    #[test]
    fn test_demurrage_uses_single_source_per_cleared_vessel() {
        let report = VesselReport::build(fleet(), &march(), Utc::now());
        // a: collected 500 (不加 totalRevenue)，c: 每日費用 25，e: totalRevenue 75；b 未放行不計
        assert_eq!(report.summary.total_demurrage, 600.0);
    }

    #[test]
    fn test_all_ports_groups_by_port_name() {
        let report = VesselReport::build(fleet(), &march(), Utc::now());
        let names: Vec<&str> = report.sections.iter().map(|s| s.port_name.as_str()).collect();
        assert_eq!(names, vec!["Lae", "Madang", "Unassigned"]);

        let section_total: f64 = report.sections.iter().map(|s| s.summary.total_cargo).sum();
        assert_eq!(section_total, report.summary.total_cargo);
    }

    #[test]
    fn test_named_port_produces_single_section() {
        let filter = ReportFilter::new(
            PortSelection::Named("lae".to_string()),
            DateRange::default(),
        );
        let report = VesselReport::build(fleet(), &filter, Utc::now());
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].port_name, "Lae");
        assert_eq!(report.summary.total_vessels, 3);
        // 依到港日排序
        assert_eq!(report.sections[0].cleared[0].vessel_name, "MV Alpha");
        assert_eq!(report.sections[0].cleared[1].vessel_name, "MV Delta");
    }

    #[test]
    fn test_falsy_clearance_flags_stay_pending() {
        let vessels = vec![
            vessel("f", json!({
                "vesselName": "MV Foxtrot", "portName": "Lae", "arrivalDate": "2024-03-10",
                "cargoQuantity": 40, "clearanceIssuedOn": false, "demurragesCollected": 300
            })),
            vessel("g", json!({
                "vesselName": "MV Golf", "portName": "Lae", "arrivalDate": "2024-03-11",
                "cargoQuantity": 60, "clearanceIssuedOn": {}
            })),
            vessel("h", json!({
                "vesselName": "MV Hotel", "portName": "Lae", "arrivalDate": "2024-03-12",
                "cargoQuantity": 5, "clearanceIssuedOn": 0
            })),
        ];
        let report = VesselReport::build(vessels, &march(), Utc::now());
        assert_eq!(report.summary.cleared_vessels, 0);
        assert_eq!(report.summary.pending_vessels, 3);
        assert_eq!(report.summary.cleared_cargo, 0.0);
        assert_eq!(report.summary.pending_cargo, 105.0);
        assert_eq!(report.summary.total_demurrage, 0.0);
        assert_eq!(report.sections[0].pending[0].vessel_name, "MV Foxtrot");
    }

    #[test]
    fn test_empty_cargo_array_falls_back_to_legacy_fields() {
        let vessels = vec![vessel("i", json!({
            "vesselName": "MV India", "portName": "Madang", "arrivalDate": "2024-03-20",
            "cargo": [], "cargoType": "Logs", "cargoQuantity": 500
        }))];
        let report = VesselReport::build(vessels, &march(), Utc::now());
        assert_eq!(report.summary.total_cargo, 500.0);
        assert_eq!(report.summary.cargo_by_type.get("Logs"), Some(&500.0));
    }

    #[test]
    fn test_empty_input_yields_empty_report() {
        let report = VesselReport::build(Vec::new(), &march(), Utc::now());
        assert_eq!(report.summary, VesselSummary::default());
        assert!(report.sections.is_empty());
    }
}
