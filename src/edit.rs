use std::collections::BTreeSet;

use tracing::info;

use crate::error::EditError;
use crate::models::{
    AcademicYear, AssessmentKind, EvaluationRecord, Indicator, Period, Session, SlotKey,
};
use crate::sheet::coerce_numeric;
use crate::store::DatasetStore;

/// One grid row. Cells hold raw text until a save coerces them.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingRow {
    pub teacher: String,
    pub period: String,
    pub indicator: String,
    pub value: String,
    pub slot: SlotKey,
}

impl WorkingRow {
    pub fn from_record(record: &EvaluationRecord, slot: SlotKey) -> Self {
        Self {
            teacher: record.teacher.clone(),
            period: record.period.to_string(),
            indicator: record.indicator.to_string(),
            value: record.value.map(|v| v.to_string()).unwrap_or_default(),
            slot,
        }
    }

    fn to_record(&self) -> Option<EvaluationRecord> {
        let teacher = self.teacher.trim();
        if teacher.is_empty() {
            return None;
        }
        let period: Period = self.period.parse().ok()?;
        let indicator: Indicator = self.indicator.parse().ok()?;
        if !self.slot.kind.allows(indicator) {
            return None;
        }

        Some(EvaluationRecord {
            teacher: teacher.to_string(),
            period,
            year: self.slot.year,
            indicator,
            value: coerce_numeric(&self.value),
        })
    }
}

/// Form input for a new row; every field is required.
#[derive(Debug, Clone, Default)]
pub struct NewRow {
    pub teacher: Option<String>,
    pub indicator: Option<String>,
    pub value: Option<String>,
    pub period: Option<String>,
    pub kind: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub kept: usize,
    pub dropped: usize,
}

/// Editable copy of one dataset slot. Changes reach the store only through
/// `save` and `delete_rows`, and only for admin sessions.
#[derive(Debug, Clone)]
pub struct WorkingTable {
    slot: SlotKey,
    rows: Vec<WorkingRow>,
}

fn authorize(session: Option<&Session>) -> Result<&Session, EditError> {
    session.filter(|s| s.is_admin()).ok_or(EditError::AccessDenied)
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, EditError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(EditError::MissingField(field))
}

fn invalid(field: &'static str, value: &str) -> EditError {
    EditError::InvalidField {
        field,
        value: value.to_string(),
    }
}

impl WorkingTable {
    pub async fn open(store: &DatasetStore, slot: SlotKey) -> Result<Self, EditError> {
        let records = store.snapshot(slot).await.ok_or(EditError::UnknownSlot(slot))?;
        Ok(Self::from_records(slot, &records))
    }

    pub fn from_records(slot: SlotKey, records: &[EvaluationRecord]) -> Self {
        Self {
            slot,
            rows: records.iter().map(|r| WorkingRow::from_record(r, slot)).collect(),
        }
    }

    pub fn slot(&self) -> SlotKey {
        self.slot
    }

    pub fn rows(&self) -> &[WorkingRow] {
        &self.rows
    }

    pub fn add_row(&mut self, session: Option<&Session>, row: NewRow) -> Result<usize, EditError> {
        authorize(session)?;

        let teacher = required("teacher", &row.teacher)?;
        let indicator = required("indicator", &row.indicator)?;
        let value = required("value", &row.value)?;
        let period = required("period", &row.period)?;
        let kind = required("assessment", &row.kind)?;
        let year = required("year", &row.year)?;

        let kind: AssessmentKind = kind.parse().map_err(|_| invalid("assessment", kind))?;
        let year: AcademicYear = year.parse().map_err(|_| invalid("year", year))?;
        let period: Period = period.parse().map_err(|_| invalid("period", period))?;
        let indicator: Indicator = indicator
            .parse()
            .ok()
            .filter(|i| kind.allows(*i))
            .ok_or_else(|| invalid("indicator", indicator))?;
        if coerce_numeric(value).is_none() {
            return Err(invalid("value", value));
        }

        let target = SlotKey::new(kind, year);
        if target != self.slot {
            return Err(EditError::SlotMismatch {
                row: target,
                table: self.slot,
            });
        }

        self.rows.push(WorkingRow {
            teacher: teacher.to_string(),
            period: period.to_string(),
            indicator: indicator.to_string(),
            value: value.to_string(),
            slot: self.slot,
        });
        Ok(self.rows.len() - 1)
    }

    /// Inline grid edit. Only the teacher, period, indicator and value columns are editable.
    pub fn set_cell(
        &mut self,
        session: Option<&Session>,
        row: usize,
        column: &str,
        text: &str,
    ) -> Result<(), EditError> {
        authorize(session)?;
        let len = self.rows.len();
        let target = self
            .rows
            .get_mut(row)
            .ok_or(EditError::RowOutOfRange { index: row, len })?;

        let cell = match column {
            "teacher" => &mut target.teacher,
            "period" => &mut target.period,
            "indicator" => &mut target.indicator,
            "value" => &mut target.value,
            other => return Err(invalid("column", other)),
        };
        *cell = text.to_string();
        Ok(())
    }

    /// Removes the given rows, highest index first, then persists what is left.
    pub async fn delete_rows(
        &mut self,
        session: Option<&Session>,
        indices: &[usize],
        store: &DatasetStore,
    ) -> Result<SaveOutcome, EditError> {
        let session = authorize(session)?;
        let indices: BTreeSet<usize> = indices.iter().copied().collect();
        if let Some(&index) = indices.iter().next_back().filter(|&&i| i >= self.rows.len()) {
            return Err(EditError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }

        let mut rows = self.rows.clone();
        for index in indices.iter().rev() {
            rows.remove(*index);
        }
        info!(session = %session.id, slot = %self.slot, removed = indices.len(), "deleting rows");
        self.persist(rows, store).await
    }

    /// Re-coerces values, drops rows without a usable teacher, period or
    /// indicator, and overwrites the slot with the rest.
    pub async fn save(
        &mut self,
        session: Option<&Session>,
        store: &DatasetStore,
    ) -> Result<SaveOutcome, EditError> {
        let session = authorize(session)?;
        info!(session = %session.id, slot = %self.slot, rows = self.rows.len(), "saving table");
        self.persist(self.rows.clone(), store).await
    }

    async fn persist(&mut self, rows: Vec<WorkingRow>, store: &DatasetStore) -> Result<SaveOutcome, EditError> {
        let records: Vec<EvaluationRecord> = rows.iter().filter_map(WorkingRow::to_record).collect();
        let outcome = SaveOutcome {
            kept: records.len(),
            dropped: rows.len() - records.len(),
        };

        store.replace(self.slot, records.clone()).await?;
        *self = Self::from_records(self.slot, &records);
        Ok(outcome)
    }
}
