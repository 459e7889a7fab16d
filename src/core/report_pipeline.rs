use crate::domain::model::{collections, Document, Vessel, WeeklyPerformance};
use crate::domain::ports::{DocumentStore, ReportPipeline, Storage};
use crate::report::render::{self, report_file_name, ReportFormat};
use crate::report::{ReportFilter, VesselReport, WeeklyReport};
use crate::utils::error::{PortalError, Result};
use chrono::{DateTime, Utc};

/// 報表輸出設定：格式與儲存路徑前綴
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub formats: Vec<ReportFormat>,
    pub prefix: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            formats: vec![ReportFormat::Xlsx],
            prefix: "reports".to_string(),
        }
    }
}

impl OutputSettings {
    fn path_for(&self, file_name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", prefix, file_name)
        }
    }
}

async fn write_outputs<S: Storage>(
    storage: &S,
    settings: &OutputSettings,
    mut render_one: impl FnMut(ReportFormat) -> Result<(String, Vec<u8>)>,
) -> Result<Vec<String>> {
    if settings.formats.is_empty() {
        return Err(PortalError::ConfigError {
            message: "At least one report format must be selected".to_string(),
        });
    }

    let mut paths = Vec::with_capacity(settings.formats.len());
    for format in &settings.formats {
        let (file_name, bytes) = render_one(*format)?;
        let path = settings.path_for(&file_name);
        tracing::debug!("Writing {} ({} bytes)", path, bytes.len());
        storage.write_file(&path, &bytes).await?;
        paths.push(path);
    }
    Ok(paths)
}

pub struct VesselReportPipeline<D: DocumentStore, S: Storage> {
    store: D,
    storage: S,
    filter: ReportFilter,
    output: OutputSettings,
    generated_at: Option<DateTime<Utc>>,
}

impl<D: DocumentStore, S: Storage> VesselReportPipeline<D, S> {
    pub fn new(store: D, storage: S, filter: ReportFilter, output: OutputSettings) -> Self {
        Self {
            store,
            storage,
            filter,
            output,
            generated_at: None,
        }
    }

    /// 固定產生時間 (預設為執行當下)
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = Some(generated_at);
        self
    }
}

#[async_trait::async_trait]
impl<D: DocumentStore, S: Storage> ReportPipeline for VesselReportPipeline<D, S> {
    type Output = VesselReport;

    async fn extract(&self) -> Result<Vec<Document>> {
        tracing::debug!("Listing collection '{}'", collections::VESSELS);
        self.store.list(collections::VESSELS).await
    }

    async fn transform(&self, documents: Vec<Document>) -> Result<VesselReport> {
        let vessels: Vec<Vessel> = documents.iter().map(Vessel::from_document).collect();
        let undated = vessels.iter().filter(|v| v.arrival.is_none()).count();
        if undated > 0 {
            tracing::warn!("{} vessel record(s) have no readable arrival date", undated);
        }
        Ok(VesselReport::build(
            vessels,
            &self.filter,
            self.generated_at.unwrap_or_else(Utc::now),
        ))
    }

    async fn load(&self, report: VesselReport) -> Result<Vec<String>> {
        write_outputs(&self.storage, &self.output, |format| {
            let name = report_file_name("vessel-report", &report.selection, &report.range, format);
            let bytes = match format {
                ReportFormat::Xlsx => render::vessel_workbook(&report)?.to_bytes()?,
                ReportFormat::Csv => render::vessel_csv(&report)?,
            };
            Ok((name, bytes))
        })
        .await
    }
}

pub struct WeeklyReportPipeline<D: DocumentStore, S: Storage> {
    store: D,
    storage: S,
    filter: ReportFilter,
    output: OutputSettings,
    generated_at: Option<DateTime<Utc>>,
}

impl<D: DocumentStore, S: Storage> WeeklyReportPipeline<D, S> {
    pub fn new(store: D, storage: S, filter: ReportFilter, output: OutputSettings) -> Self {
        Self {
            store,
            storage,
            filter,
            output,
            generated_at: None,
        }
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = Some(generated_at);
        self
    }
}

#[async_trait::async_trait]
impl<D: DocumentStore, S: Storage> ReportPipeline for WeeklyReportPipeline<D, S> {
    type Output = WeeklyReport;

    async fn extract(&self) -> Result<Vec<Document>> {
        self.store.list(collections::WEEKLY_PERFORMANCES).await
    }

    async fn transform(&self, documents: Vec<Document>) -> Result<WeeklyReport> {
        let reports: Vec<WeeklyPerformance> = documents
            .iter()
            .map(WeeklyPerformance::from_document)
            .collect();
        Ok(WeeklyReport::build(
            reports,
            &self.filter,
            self.generated_at.unwrap_or_else(Utc::now),
        ))
    }

    async fn load(&self, report: WeeklyReport) -> Result<Vec<String>> {
        write_outputs(&self.storage, &self.output, |format| {
            let name = report_file_name(
                "weekly-performance",
                &report.selection,
                &report.range,
                format,
            );
            let bytes = match format {
                ReportFormat::Xlsx => render::weekly_workbook(&report)?.to_bytes()?,
                ReportFormat::Csv => render::weekly_csv(&report)?,
            };
            Ok((name, bytes))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::report::{DateRange, PortSelection};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files.lock().await.get(path).cloned().ok_or_else(|| {
                PortalError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn delete_file(&self, path: &str) -> Result<()> {
            self.files.lock().await.remove(path);
            Ok(())
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(collections::VESSELS, "v1", json!({
                "vesselName": "MV Kumul", "portName": "Lae", "arrivalDate": "2024-03-04",
                "cargoType": "Containers", "cargoQuantity": 320, "clearanceIssuedOn": "2024-03-05",
                "demurragesCollected": 1500
            }))
            .await;
        store
            .insert(collections::VESSELS, "v2", json!({
                "vesselName": "MV Sepik", "portName": "Madang", "arrivalDate": "2024-03-09",
                "cargo": [{ "type": "Logs", "quantity": 80 }]
            }))
            .await;
        store
            .insert(collections::WEEKLY_PERFORMANCES, "w1", json!({
                "portName": "Lae", "weekEnding": "2024-03-10", "vesselsHandled": 9,
                "cargoBreakdown": { "Containers": 410 }, "revenue": 2200
            }))
            .await;
        store
    }

    fn march(port: PortSelection) -> ReportFilter {
        ReportFilter::new(
            port,
            DateRange::parse(Some("2024-03-01"), Some("2024-03-31")).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_vessel_pipeline_extract_and_transform() {
        let pipeline = VesselReportPipeline::new(
            seeded_store().await,
            MockStorage::default(),
            march(PortSelection::All),
            OutputSettings::default(),
        );

        let documents = pipeline.extract().await.unwrap();
        assert_eq!(documents.len(), 2);

        let report = pipeline.transform(documents).await.unwrap();
        assert_eq!(report.summary.total_cargo, 400.0);
        assert_eq!(report.summary.total_demurrage, 1500.0);
        assert_eq!(report.sections.len(), 2);
    }

    #[tokio::test]
    async fn test_vessel_pipeline_writes_each_format() {
        let storage = MockStorage::default();
        let pipeline = VesselReportPipeline::new(
            seeded_store().await,
            storage.clone(),
            march(PortSelection::Named("Lae".to_string())),
            OutputSettings {
                formats: vec![ReportFormat::Xlsx, ReportFormat::Csv],
                prefix: "/reports/".to_string(),
            },
        );

        let documents = pipeline.extract().await.unwrap();
        let report = pipeline.transform(documents).await.unwrap();
        let paths = pipeline.load(report).await.unwrap();

        assert_eq!(
            paths,
            vec![
                "reports/vessel-report_lae_20240301_20240331.xlsx",
                "reports/vessel-report_lae_20240301_20240331.csv"
            ]
        );
        let xlsx = storage.get_file(&paths[0]).await.unwrap();
        // xlsx 是 zip 檔
        assert_eq!(&xlsx[..2], b"PK");
        let csv = String::from_utf8(storage.get_file(&paths[1]).await.unwrap()).unwrap();
        assert!(csv.contains("MV Kumul"));
        assert!(!csv.contains("MV Sepik"));
    }

    #[tokio::test]
    async fn test_load_requires_a_format() {
        let pipeline = WeeklyReportPipeline::new(
            seeded_store().await,
            MockStorage::default(),
            march(PortSelection::All),
            OutputSettings {
                formats: vec![],
                prefix: String::new(),
            },
        );
        let report = pipeline.transform(Vec::new()).await.unwrap();
        assert!(pipeline.load(report).await.is_err());
    }

    #[tokio::test]
    async fn test_weekly_pipeline_end_to_end() {
        let storage = MockStorage::default();
        let pipeline = WeeklyReportPipeline::new(
            seeded_store().await,
            storage.clone(),
            march(PortSelection::All),
            OutputSettings {
                formats: vec![ReportFormat::Xlsx],
                prefix: String::new(),
            },
        );
        let engine = crate::core::engine::ReportEngine::new(pipeline);
        let paths = engine.run().await.unwrap();

        assert_eq!(paths, vec!["weekly-performance_all-ports_20240301_20240331.xlsx"]);
        assert!(storage.get_file(&paths[0]).await.is_some());
    }
}
