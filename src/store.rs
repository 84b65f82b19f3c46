use std::collections::BTreeMap;
use std::path::Path;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::DashboardConfig;
use crate::error::{EditError, LoadError};
use crate::models::{AcademicYear, AssessmentKind, EvaluationRecord, SlotKey};
use crate::normalize::normalize;
use crate::sheet::RawSheet;

/// In-memory dataset. Each (kind, year) slot sits behind its own lock, so
/// writers to one slot are serialized while other slots stay readable.
#[derive(Debug, Default)]
pub struct DatasetStore {
    slots: BTreeMap<SlotKey, RwLock<Vec<EvaluationRecord>>>,
}

impl DatasetStore {
    pub fn from_slots<I>(slots: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (SlotKey, Vec<EvaluationRecord>)>,
    {
        let mut store = Self::default();
        for (key, records) in slots {
            validate(key, &records).map_err(|message| LoadError::InvalidRecord { key, message })?;
            store.slots.insert(key, RwLock::new(records));
        }
        Ok(store)
    }

    /// Reads and normalizes every configured source. The first unreadable
    /// file or schema violation aborts the whole load.
    pub fn load(config: &DashboardConfig, data_dir: &Path) -> Result<Self, LoadError> {
        let mut slots = Vec::new();
        for source in config.resolved_sources(data_dir) {
            let sheet = RawSheet::read(&source.path)?;
            let records = normalize(&sheet, source.kind, source.year, &config.ingest)?;
            info!(
                path = %source.path.display(),
                slot = %source.key(),
                records = records.len(),
                "loaded dataset"
            );
            slots.push((source.key(), records));
        }
        Self::from_slots(slots)
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.slots.keys().copied()
    }

    pub fn years(&self, kind: AssessmentKind) -> Vec<AcademicYear> {
        self.slots
            .keys()
            .filter(|key| key.kind == kind)
            .map(|key| key.year)
            .collect()
    }

    pub async fn snapshot(&self, key: SlotKey) -> Option<Vec<EvaluationRecord>> {
        let slot = self.slots.get(&key)?;
        Some(slot.read().await.clone())
    }

    pub async fn all_records(&self) -> Vec<EvaluationRecord> {
        let mut records = Vec::new();
        for slot in self.slots.values() {
            records.extend(slot.read().await.iter().cloned());
        }
        records
    }

    /// Overwrites a slot wholesale. Records breaking the slot's invariants
    /// reject the whole write.
    pub async fn replace(&self, key: SlotKey, records: Vec<EvaluationRecord>) -> Result<usize, EditError> {
        let slot = self.slots.get(&key).ok_or(EditError::UnknownSlot(key))?;
        validate(key, &records).map_err(|message| EditError::InvalidRecord { key, message })?;

        let count = records.len();
        *slot.write().await = records;
        info!(slot = %key, records = count, "dataset slot replaced");
        Ok(count)
    }
}

fn validate(key: SlotKey, records: &[EvaluationRecord]) -> Result<(), String> {
    for record in records {
        if record.year != key.year {
            return Err(format!("{} is filed under year {}", record.teacher, record.year));
        }
        if !key.kind.allows(record.indicator) {
            return Err(format!(
                "indicator {} is not part of {}",
                record.indicator, key.kind
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Period;
    use std::io::Write;

    fn record(teacher: &str, indicator: &str, year: AcademicYear) -> EvaluationRecord {
        EvaluationRecord {
            teacher: teacher.to_string(),
            period: Period::First,
            year,
            indicator: indicator.parse().unwrap(),
            value: Some(3.0),
        }
    }

    fn plan(year: AcademicYear) -> SlotKey {
        SlotKey::new(AssessmentKind::LessonPlanReview, year)
    }

    #[tokio::test]
    async fn replace_overwrites_whole_slot() {
        let key = plan(AcademicYear::Y2022);
        let store = DatasetStore::from_slots([(
            key,
            vec![record("Budi Santoso", "A", AcademicYear::Y2022)],
        )])
        .unwrap();

        let replaced = store
            .replace(
                key,
                vec![
                    record("Siti Aminah", "B", AcademicYear::Y2022),
                    record("Siti Aminah", "C", AcademicYear::Y2022),
                ],
            )
            .await
            .unwrap();

        assert_eq!(replaced, 2);
        let snapshot = store.snapshot(key).await.unwrap();
        assert!(snapshot.iter().all(|r| r.teacher == "Siti Aminah"));
    }

    #[tokio::test]
    async fn replace_rejects_foreign_indicators() {
        let key = plan(AcademicYear::Y2022);
        let store = DatasetStore::from_slots([(key, Vec::new())]).unwrap();
        let err = store
            .replace(key, vec![record("Budi Santoso", "K", AcademicYear::Y2022)])
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidRecord { .. }));
        assert!(store.snapshot(key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_slot_is_reported() {
        let store = DatasetStore::default();
        let err = store.replace(plan(AcademicYear::Y2020), Vec::new()).await.unwrap_err();
        assert_eq!(err, EditError::UnknownSlot(plan(AcademicYear::Y2020)));
    }

    #[test]
    fn mismatched_year_fails_construction() {
        let result = DatasetStore::from_slots([(
            plan(AcademicYear::Y2020),
            vec![record("Budi Santoso", "A", AcademicYear::Y2023)],
        )]);
        assert!(matches!(result, Err(LoadError::InvalidRecord { .. })));
    }

    #[tokio::test]
    async fn loads_configured_csv_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("rpp.csv")).unwrap();
        writeln!(
            file,
            "REKAP,,,,\n,,,,\nNo,Nama Guru,A,A,\n1,\"Budi Santoso, S.Pd\",3,4\n,Jumlah,3,4"
        )
        .unwrap();

        let config: DashboardConfig = toml::from_str(
            r#"
[[sources]]
kind = "lesson-plan-review"
year = "2023-2024"
path = "rpp.csv"
"#,
        )
        .unwrap();

        let store = DatasetStore::load(&config, dir.path()).unwrap();
        let key = plan(AcademicYear::Y2023);
        assert_eq!(store.years(AssessmentKind::LessonPlanReview), vec![AcademicYear::Y2023]);
        let records = store.snapshot(key).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].period, Period::Second);
        assert_eq!(records[1].value, Some(4.0));
    }

    #[test]
    fn missing_source_aborts_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetStore::load(&DashboardConfig::default(), dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }
}
