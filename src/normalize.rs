use std::collections::HashSet;

use tracing::debug;

use crate::config::IngestConfig;
use crate::error::SchemaError;
use crate::models::{AcademicYear, AssessmentKind, EvaluationRecord, Indicator, Period};
use crate::sheet::{Cell, RawSheet, Table};

/// Source column paired with the indicator it is recorded under.
#[derive(Debug, Clone, PartialEq)]
struct IndicatorColumn {
    column: usize,
    indicator: Indicator,
}

#[derive(Debug)]
struct PeriodColumns {
    first: Vec<IndicatorColumn>,
    second: Vec<IndicatorColumn>,
}

/// Reshapes one wide evaluation sheet into long-format records: one record
/// per teacher, period and indicator.
pub fn normalize(
    sheet: &RawSheet,
    kind: AssessmentKind,
    year: AcademicYear,
    config: &IngestConfig,
) -> Result<Vec<EvaluationRecord>, SchemaError> {
    let table = sheet.table(config.header_row)?;
    if table.columns.len() <= config.name_column {
        return Err(SchemaError::MissingNameColumn {
            source_name: table.source_name.clone(),
            position: config.name_column,
        });
    }

    let excluded: HashSet<&str> = config.excluded_names.iter().map(String::as_str).collect();
    let teachers: Vec<(String, &Vec<Cell>)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let name = clean_teacher_name(&row[config.name_column])?;
            is_teacher_name(&name, &excluded).then_some((name, row))
        })
        .collect();

    let columns = indicator_columns(&table, kind)?;
    debug!(
        source = %table.source_name,
        teachers = teachers.len(),
        first = columns.first.len(),
        second = columns.second.len(),
        "normalizing sheet"
    );

    let mut records = Vec::with_capacity(teachers.len() * (columns.first.len() + columns.second.len()));
    for (period, block) in [(Period::First, &columns.first), (Period::Second, &columns.second)] {
        for indicator_column in block {
            for (teacher, row) in &teachers {
                records.push(EvaluationRecord {
                    teacher: teacher.clone(),
                    period,
                    year,
                    indicator: indicator_column.indicator,
                    value: row[indicator_column.column].to_number(),
                });
            }
        }
    }

    Ok(records)
}

/// Drops everything from the first comma (academic titles) and trims.
pub fn clean_teacher_name(cell: &Cell) -> Option<String> {
    let text = cell.to_text()?;
    let name = match text.split_once(',') {
        Some((head, _)) => head,
        None => text.as_str(),
    };
    Some(name.trim().to_string())
}

fn is_teacher_name(name: &str, excluded: &HashSet<&str>) -> bool {
    name.chars().count() > 2 && !excluded.contains(name)
}

fn indicator_columns(table: &Table, kind: AssessmentKind) -> Result<PeriodColumns, SchemaError> {
    let require = |label: String, indicator: Indicator| -> Result<IndicatorColumn, SchemaError> {
        table
            .column(&label)
            .map(|column| IndicatorColumn { column, indicator })
            .ok_or_else(|| SchemaError::MissingIndicatorColumn {
                column: label,
                source_name: table.source_name.clone(),
            })
    };

    match kind {
        AssessmentKind::LessonPlanReview => {
            let present: Vec<Indicator> = kind
                .indicators()
                .iter()
                .copied()
                .filter(|indicator| table.has_column(&indicator.column(false)))
                .collect();
            if present.is_empty() {
                return Err(SchemaError::NoIndicatorColumns {
                    source_name: table.source_name.clone(),
                });
            }

            let first = present
                .iter()
                .map(|&indicator| require(indicator.column(false), indicator))
                .collect::<Result<Vec<_>, _>>()?;
            let second = present
                .iter()
                .map(|&indicator| require(indicator.column(true), indicator))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PeriodColumns { first, second })
        }
        AssessmentKind::LessonDeliveryReview => {
            let (scored, closing) = kind.indicators().split_at(kind.indicators().len() - 1);
            let closing = closing[0];

            let first = scored
                .iter()
                .map(|&indicator| require(indicator.column(false), indicator))
                .collect::<Result<Vec<_>, _>>()?;
            let mut second = scored
                .iter()
                .map(|&indicator| require(indicator.column(true), indicator))
                .collect::<Result<Vec<_>, _>>()?;

            // The closing indicator only appears once on most sheets, unlabelled as a repeat.
            let closing_label = if table.has_column(&closing.column(false)) {
                closing.column(false)
            } else {
                closing.column(true)
            };
            second.push(require(closing_label, closing)?);
            Ok(PeriodColumns { first, second })
        }
    }
}
