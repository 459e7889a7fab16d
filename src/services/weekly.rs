use crate::domain::model::{collections, Fields, WeeklyPerformance};
use crate::domain::ports::DocumentStore;
use crate::domain::timestamp::parse_date;
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::require_text;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// 港口每週績效提交內容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    pub port_name: String,
    pub week_start: NaiveDate,
    pub week_ending: NaiveDate,
    #[serde(default)]
    pub vessels_handled: u32,
    #[serde(default)]
    pub cargo_breakdown: BTreeMap<String, f64>,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

impl WeeklySubmission {
    pub fn validate(&self) -> Result<()> {
        require_text("Port", &self.port_name)?;
        if self.week_ending < self.week_start {
            return Err(PortalError::validation(
                "Week ending cannot be before the week start",
            ));
        }
        if (self.week_ending - self.week_start).num_days() > 6 {
            return Err(PortalError::validation(
                "A weekly report covers at most seven days",
            ));
        }
        if !self.revenue.is_finite() || self.revenue < 0.0 {
            return Err(PortalError::validation("Revenue must be zero or more"));
        }
        for (cargo_type, quantity) in &self.cargo_breakdown {
            require_text("Cargo type", cargo_type)?;
            if !quantity.is_finite() || *quantity < 0.0 {
                return Err(PortalError::validation(format!(
                    "Cargo quantity for {} must be zero or more",
                    cargo_type
                )));
            }
        }
        Ok(())
    }

    fn same_week(&self, doc_port: &WeeklyPerformance, week_ending: Option<NaiveDate>) -> bool {
        let same_port = match (&self.port_id, &doc_port.port_id) {
            (Some(a), Some(b)) => a == b,
            _ => doc_port
                .port_name
                .as_deref()
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(self.port_name.trim())),
        };
        same_port && week_ending == Some(self.week_ending)
    }
}

pub struct WeeklyService<D: DocumentStore> {
    store: D,
}

impl<D: DocumentStore> WeeklyService<D> {
    pub fn new(store: D) -> Self {
        Self { store }
    }

    pub async fn submit(&self, submission: WeeklySubmission) -> Result<String> {
        submission.validate()?;

        // 同港口同一週只能提交一次
        let existing = self.store.list(collections::WEEKLY_PERFORMANCES).await?;
        let duplicate = existing.iter().any(|doc| {
            let week_ending = doc.first_present(&["weekEnding"]).and_then(parse_date);
            submission.same_week(&WeeklyPerformance::from_document(doc), week_ending)
        });
        if duplicate {
            return Err(PortalError::validation(format!(
                "{} already submitted a report for the week ending {}",
                submission.port_name, submission.week_ending
            )));
        }

        let mut data = match serde_json::to_value(&submission)? {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        data.insert("submittedAt".to_string(), json!(Utc::now().to_rfc3339()));

        let id = self
            .store
            .add(collections::WEEKLY_PERFORMANCES, data)
            .await?;
        tracing::info!(
            "📅 Weekly report {} submitted for {} (week ending {})",
            id,
            submission.port_name,
            submission.week_ending
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    fn submission() -> WeeklySubmission {
        WeeklySubmission {
            port_id: Some("lae".to_string()),
            port_name: "Lae".to_string(),
            week_start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            week_ending: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            vessels_handled: 9,
            cargo_breakdown: BTreeMap::from([("Containers".to_string(), 410.0)]),
            revenue: 2200.0,
            remarks: None,
            submitted_by: None,
        }
    }

    #[test]
    fn test_validation() {
        assert!(submission().validate().is_ok());

        let mut s = submission();
        s.week_ending = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(s.validate().is_err());

        let mut s = submission();
        s.week_ending = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        assert!(s.validate().is_err());

        let mut s = submission();
        s.cargo_breakdown.insert("Logs".to_string(), -5.0);
        assert!(s.validate().is_err());
    }

    #[tokio::test]
    async fn test_submit_is_readable_by_the_report_model() {
        let store = MemoryStore::new();
        let service = WeeklyService::new(store.clone());
        let id = service.submit(submission()).await.unwrap();

        let doc = store
            .get(collections::WEEKLY_PERFORMANCES, &id)
            .await
            .unwrap()
            .unwrap();
        assert!(doc.has_value("submittedAt"));
        let weekly = WeeklyPerformance::from_document(&doc);
        assert_eq!(weekly.week_date(), NaiveDate::from_ymd_opt(2024, 3, 10));
        assert_eq!(weekly.total_cargo(), 410.0);
        assert_eq!(weekly.vessels_handled, 9.0);
    }

    #[tokio::test]
    async fn test_duplicate_week_rejected() {
        let store = MemoryStore::new();
        let service = WeeklyService::new(store.clone());
        service.submit(submission()).await.unwrap();

        let err = service.submit(submission()).await.unwrap_err();
        assert!(matches!(err, PortalError::ValidationError { .. }));

        // 其他港口同一週可以提交
        let mut other = submission();
        other.port_id = Some("madang".to_string());
        other.port_name = "Madang".to_string();
        service.submit(other).await.unwrap();
        assert_eq!(store.count(collections::WEEKLY_PERFORMANCES).await, 2);
    }
}
