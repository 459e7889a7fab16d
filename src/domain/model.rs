use crate::domain::timestamp::{is_present, is_truthy, parse_number, parse_timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Fields = Map<String, Value>;

pub mod collections {
    pub const PORTS: &str = "ports";
    pub const VESSELS: &str = "vessels";
    pub const HODS: &str = "hods";
    pub const USERS: &str = "users";
    pub const CARGO_TYPES: &str = "cargoTypes";
    pub const WEEKLY_PERFORMANCES: &str = "weeklyPerformances";
    pub const FILE_UPLOADS: &str = "fileUploads";
}

pub const UNASSIGNED_PORT: &str = "Unassigned";
pub const OTHER_CARGO: &str = "Other";

/// 文件資料庫中的一筆文件：id 加上任意欄位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn from_value(id: impl Into<String>, value: Value) -> Self {
        let data = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self::new(id, data)
    }

    /// 第一個有值的欄位 (依 keys 順序)
    pub fn first_present(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.data.get(*k))
            .find(|v| is_present(Some(v)))
    }

    pub fn text(&self, keys: &[&str]) -> Option<String> {
        self.first_present(keys).map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
    }

    pub fn number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .filter_map(|k| self.data.get(*k))
            .find_map(parse_number)
    }

    pub fn timestamp(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        keys.iter()
            .filter_map(|k| self.data.get(*k))
            .find_map(parse_timestamp)
    }

    pub fn has_value(&self, key: &str) -> bool {
        is_present(self.data.get(key))
    }

    pub fn is_set(&self, key: &str) -> bool {
        is_truthy(self.data.get(key))
    }

    /// API 回應用：欄位攤平並帶上 id
    pub fn to_json_with_id(&self) -> Value {
        let mut map = self.data.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Port,
    Hod,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Port => "port",
            Role::Hod => "hod",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "port" => Some(Role::Port),
            "hod" => Some(Role::Hod),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CargoLine {
    pub cargo_type: String,
    pub quantity: f64,
    pub unit: Option<String>,
}

/// 滯期費的來源；同一艘船只取一個來源，不重複累加
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Demurrage {
    Collected(f64),
    TotalRevenue(f64),
    DailyCharges(f64),
    None,
}

impl Demurrage {
    pub fn amount(&self) -> f64 {
        match self {
            Demurrage::Collected(v) | Demurrage::TotalRevenue(v) | Demurrage::DailyCharges(v) => {
                *v
            }
            Demurrage::None => 0.0,
        }
    }

    pub fn source_label(&self) -> &'static str {
        match self {
            Demurrage::Collected(_) => "Collected",
            Demurrage::TotalRevenue(_) => "Total revenue",
            Demurrage::DailyCharges(_) => "Daily charges",
            Demurrage::None => "-",
        }
    }

    pub fn from_document(doc: &Document) -> Self {
        if let Some(v) = doc.number(&["demurragesCollected"]) {
            return Demurrage::Collected(v);
        }
        if let Some(v) = doc.number(&["totalRevenue"]) {
            return Demurrage::TotalRevenue(v);
        }
        let charges = ["demurrageCharges", "dailyCharges"]
            .iter()
            .filter_map(|k| doc.data.get(*k))
            .find_map(Value::as_array);
        match charges {
            Some(items) if !items.is_empty() => Demurrage::DailyCharges(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => map.get("amount").and_then(parse_number),
                        other => parse_number(other),
                    })
                    .map(|v| v.unwrap_or(0.0))
                    .sum(),
            ),
            _ => Demurrage::None,
        }
    }
}

/// 讀取貨物明細：新格式 `cargo: [{type, quantity, unit}]`，舊格式 `cargoType` + `cargoQuantity`
pub fn cargo_lines(doc: &Document) -> Vec<CargoLine> {
    // 空陣列不算，繼續往 cargoBreakdown 與舊欄位找
    if let Some(Value::Array(items)) = doc.data.get("cargo") {
        let lines: Vec<CargoLine> = items
            .iter()
            .filter_map(Value::as_object)
            .map(|item| CargoLine {
                cargo_type: cargo_type_name(
                    item.get("type")
                        .or_else(|| item.get("cargoType"))
                        .and_then(Value::as_str),
                ),
                quantity: item
                    .get("quantity")
                    .and_then(parse_number)
                    .unwrap_or(0.0),
                unit: item
                    .get("unit")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect();
        if !lines.is_empty() {
            return lines;
        }
    }

    if let Some(Value::Object(breakdown)) = doc.data.get("cargoBreakdown") {
        if !breakdown.is_empty() {
            return breakdown
                .iter()
                .map(|(cargo_type, qty)| CargoLine {
                    cargo_type: cargo_type_name(Some(cargo_type)),
                    quantity: parse_number(qty).unwrap_or(0.0),
                    unit: None,
                })
                .collect();
        }
    }

    let quantity = doc.number(&["cargoQuantity", "cargoTonnage", "totalCargo"]);
    let cargo_type = doc.text(&["cargoType"]);
    match (quantity, cargo_type) {
        (None, None) => Vec::new(),
        (quantity, cargo_type) => vec![CargoLine {
            cargo_type: cargo_type_name(cargo_type.as_deref()),
            quantity: quantity.unwrap_or(0.0),
            unit: doc.text(&["cargoUnit", "unit"]),
        }],
    }
}

fn cargo_type_name(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => OTHER_CARGO.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vessel {
    pub id: String,
    pub vessel_name: String,
    pub imo_number: Option<String>,
    pub port_id: Option<String>,
    pub port_name: Option<String>,
    pub agent: Option<String>,
    pub berth: Option<String>,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
    /// `clearanceIssuedOn` 有值即為已放行，即使日期無法解析；false / 0 / {} 不算
    pub cleared: bool,
    pub clearance_issued_on: Option<DateTime<Utc>>,
    pub cargo: Vec<CargoLine>,
    pub demurrage: Demurrage,
}

impl Vessel {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            vessel_name: doc
                .text(&["vesselName", "name"])
                .unwrap_or_else(|| "(unnamed)".to_string()),
            imo_number: doc.text(&["imoNumber", "imo"]),
            port_id: doc.text(&["portId"]),
            port_name: doc.text(&["portName", "port"]),
            agent: doc.text(&["agent", "shippingAgent"]),
            berth: doc.text(&["berth", "berthNumber"]),
            arrival: doc.timestamp(&["arrivalDate", "arrivedAt", "eta"]),
            departure: doc.timestamp(&["departureDate", "departedAt", "etd"]),
            cleared: doc.is_set("clearanceIssuedOn"),
            clearance_issued_on: doc.timestamp(&["clearanceIssuedOn"]),
            cargo: cargo_lines(doc),
            demurrage: Demurrage::from_document(doc),
        }
    }

    pub fn arrival_date(&self) -> Option<NaiveDate> {
        self.arrival.map(|dt| dt.date_naive())
    }

    pub fn total_cargo(&self) -> f64 {
        self.cargo.iter().map(|c| c.quantity).sum()
    }

    pub fn port_label(&self) -> &str {
        self.port_name.as_deref().unwrap_or(UNASSIGNED_PORT)
    }

    pub fn cargo_summary(&self) -> String {
        self.cargo
            .iter()
            .map(|c| c.cargo_type.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPerformance {
    pub id: String,
    pub port_id: Option<String>,
    pub port_name: Option<String>,
    pub week_start: Option<DateTime<Utc>>,
    pub week_ending: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub vessels_handled: f64,
    pub cargo: Vec<CargoLine>,
    pub revenue: f64,
    pub remarks: Option<String>,
}

impl WeeklyPerformance {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            port_id: doc.text(&["portId"]),
            port_name: doc.text(&["portName", "port"]),
            week_start: doc.timestamp(&["weekStart", "weekStartDate"]),
            week_ending: doc.timestamp(&["weekEnding", "weekEndDate", "weekEnd"]),
            submitted_at: doc.timestamp(&["submittedAt", "createdAt"]),
            vessels_handled: doc
                .number(&["vesselsHandled", "totalVessels", "vesselCount"])
                .unwrap_or(0.0),
            cargo: cargo_lines(doc),
            revenue: doc.number(&["revenue", "totalRevenue"]).unwrap_or(0.0),
            remarks: doc.text(&["remarks", "notes"]),
        }
    }

    /// 報表歸屬日：週結束日 > 週開始日 > 提交時間
    pub fn week_date(&self) -> Option<NaiveDate> {
        self.week_ending
            .or(self.week_start)
            .or(self.submitted_at)
            .map(|dt| dt.date_naive())
    }

    pub fn total_cargo(&self) -> f64 {
        self.cargo.iter().map(|c| c.quantity).sum()
    }

    pub fn port_label(&self) -> &str {
        self.port_name.as_deref().unwrap_or(UNASSIGNED_PORT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
}

impl Port {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.text(&["portName", "name"]).unwrap_or_default(),
            email: doc.text(&["email"]),
            location: doc.text(&["location"]),
            status: doc.text(&["status"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hod {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
}

impl Hod {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.text(&["name", "fullName"]).unwrap_or_default(),
            email: doc.text(&["email"]),
            department: doc.text(&["department"]),
            status: doc.text(&["status"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CargoType {
    pub id: String,
    pub name: String,
    pub unit: Option<String>,
}

impl CargoType {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.text(&["name"]).unwrap_or_default(),
            unit: doc.text(&["unit"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(default)]
    pub id: String,
    pub file_name: String,
    pub storage_path: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

impl UploadedFile {
    pub fn from_document(doc: &Document) -> crate::utils::error::Result<Self> {
        let mut file: UploadedFile = serde_json::from_value(Value::Object(doc.data.clone()))?;
        file.id = doc.id.clone();
        Ok(file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserProfile {
    pub fn from_document(doc: &Document) -> Option<Self> {
        let role = doc.text(&["role"]).as_deref().and_then(Role::parse)?;
        Some(Self {
            uid: doc.text(&["uid"]).unwrap_or_else(|| doc.id.clone()),
            email: doc.text(&["email"]).unwrap_or_default(),
            role,
            port_id: doc.text(&["portId"]),
            display_name: doc.text(&["displayName", "name"]),
        })
    }
}
