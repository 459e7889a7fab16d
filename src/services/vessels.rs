use crate::domain::model::{collections, CargoType, Fields, Vessel};
use crate::domain::ports::DocumentStore;
use crate::domain::timestamp::parse_timestamp_str;
use crate::report::PortSelection;
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::require_text;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CargoEntry {
    #[serde(rename = "type")]
    pub cargo_type: String,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// 船舶到港登記表單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselCallDraft {
    pub vessel_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imo_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    pub port_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub berth: Option<String>,
    pub arrival_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub cargo: Vec<CargoEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<String>,
}

impl VesselCallDraft {
    pub fn validate(&self, known_cargo_types: &[CargoType]) -> Result<()> {
        require_text("Vessel name", &self.vessel_name)?;
        require_text("Port", &self.port_name)?;

        let arrival = parse_timestamp_str(&self.arrival_date).ok_or_else(|| {
            PortalError::validation(format!("Arrival date '{}' is not a valid date", self.arrival_date))
        })?;
        if let Some(raw) = self.departure_date.as_deref().filter(|d| !d.trim().is_empty()) {
            let departure = parse_timestamp_str(raw).ok_or_else(|| {
                PortalError::validation(format!("Departure date '{}' is not a valid date", raw))
            })?;
            if departure < arrival {
                return Err(PortalError::validation(
                    "Departure date cannot be before the arrival date",
                ));
            }
        }

        for entry in &self.cargo {
            require_text("Cargo type", &entry.cargo_type)?;
            if !entry.quantity.is_finite() || entry.quantity < 0.0 {
                return Err(PortalError::validation(format!(
                    "Cargo quantity for {} must be zero or more",
                    entry.cargo_type
                )));
            }
            // 有設定貨物類別清單時才檢查
            if !known_cargo_types.is_empty()
                && !known_cargo_types
                    .iter()
                    .any(|t| t.name.eq_ignore_ascii_case(entry.cargo_type.trim()))
            {
                return Err(PortalError::validation(format!(
                    "Unknown cargo type '{}'",
                    entry.cargo_type
                )));
            }
        }
        Ok(())
    }
}

pub struct VesselService<D: DocumentStore> {
    store: D,
}

impl<D: DocumentStore> VesselService<D> {
    pub fn new(store: D) -> Self {
        Self { store }
    }

    pub async fn cargo_types(&self) -> Result<Vec<CargoType>> {
        Ok(self
            .store
            .list(collections::CARGO_TYPES)
            .await?
            .iter()
            .map(CargoType::from_document)
            .filter(|t| !t.name.is_empty())
            .collect())
    }

    pub async fn register(&self, draft: VesselCallDraft) -> Result<String> {
        let known = self.cargo_types().await?;
        draft.validate(&known)?;

        let mut data = match serde_json::to_value(&draft)? {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        data.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
        data.insert("clearanceIssuedOn".to_string(), Value::Null);

        let id = self.store.add(collections::VESSELS, data).await?;
        tracing::info!(
            "🚢 Registered vessel call {} ({} at {})",
            id,
            draft.vessel_name,
            draft.port_name
        );
        Ok(id)
    }

    pub async fn issue_clearance(&self, id: &str, issued_on: NaiveDate) -> Result<()> {
        let doc = self
            .store
            .get(collections::VESSELS, id)
            .await?
            .ok_or_else(|| PortalError::not_found(collections::VESSELS, id))?;
        if doc.is_set("clearanceIssuedOn") {
            return Err(PortalError::validation(format!(
                "Clearance for {} was already issued",
                Vessel::from_document(&doc).vessel_name
            )));
        }
        if let Some(arrival) = Vessel::from_document(&doc).arrival_date() {
            if issued_on < arrival {
                return Err(PortalError::validation(
                    "Clearance cannot be issued before the vessel arrived",
                ));
            }
        }

        let mut patch = Fields::new();
        patch.insert(
            "clearanceIssuedOn".to_string(),
            json!(issued_on.format("%Y-%m-%d").to_string()),
        );
        self.store.update(collections::VESSELS, id, patch).await?;
        tracing::info!("✅ Clearance issued for vessel call {}", id);
        Ok(())
    }

    pub async fn list(&self, port: &PortSelection) -> Result<Vec<Vessel>> {
        let mut vessels: Vec<Vessel> = self
            .store
            .list(collections::VESSELS)
            .await?
            .iter()
            .map(Vessel::from_document)
            .filter(|v| port.matches(v.port_name.as_deref(), v.port_id.as_deref()))
            .collect();
        // 最新到港的排前面
        vessels.sort_by(|a, b| b.arrival.cmp(&a.arrival));
        Ok(vessels)
    }
}
