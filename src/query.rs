use std::collections::{BTreeMap, BTreeSet};

use crate::edit::WorkingRow;
use crate::identity::canonical_identifier;
use crate::models::{
    AcademicYear, AssessmentKind, EvaluationRecord, Improvement, Indicator, IndicatorMean, Period,
    Role, Session, SummaryCards, TeacherMean,
};
use crate::store::DatasetStore;

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// First key holding the extreme mean; keys iterate in sorted order, so
/// ties go to the earliest key.
fn extreme<K: Clone>(means: &BTreeMap<K, Mean>, better: impl Fn(f64, f64) -> bool) -> Option<K> {
    let mut best: Option<(K, f64)> = None;
    for (key, mean) in means {
        let Some(value) = mean.value() else { continue };
        match &best {
            Some((_, current)) if !better(value, *current) => {}
            _ => best = Some((key.clone(), value)),
        }
    }
    best.map(|(key, _)| key)
}

pub fn indicator_means(records: &[EvaluationRecord]) -> Vec<IndicatorMean> {
    let mut means: BTreeMap<Indicator, Mean> = BTreeMap::new();
    for record in records {
        means.entry(record.indicator).or_default().push(record.value);
    }
    means
        .into_iter()
        .filter_map(|(indicator, mean)| mean.value().map(|mean| IndicatorMean { indicator, mean }))
        .collect()
}

/// Per-teacher means, highest first.
pub fn teacher_means(records: &[EvaluationRecord]) -> Vec<TeacherMean> {
    let mut means: BTreeMap<&str, Mean> = BTreeMap::new();
    for record in records {
        means.entry(record.teacher.as_str()).or_default().push(record.value);
    }

    let mut values: Vec<TeacherMean> = means
        .into_iter()
        .filter_map(|(teacher, mean)| {
            mean.value().map(|value| TeacherMean {
                teacher: teacher.to_string(),
                mean: value,
                scored: mean.count,
            })
        })
        .collect();
    values.sort_by(|a, b| b.mean.partial_cmp(&a.mean).unwrap_or(std::cmp::Ordering::Equal));
    values
}

/// Second-period mean minus first-period mean, for teachers scored in both.
pub fn improvements(records: &[EvaluationRecord]) -> Vec<Improvement> {
    let mut means: BTreeMap<&str, (Mean, Mean)> = BTreeMap::new();
    for record in records {
        let entry = means.entry(record.teacher.as_str()).or_default();
        match record.period {
            Period::First => entry.0.push(record.value),
            Period::Second => entry.1.push(record.value),
        }
    }

    means
        .into_iter()
        .filter_map(|(teacher, (first, second))| {
            Some(Improvement {
                teacher: teacher.to_string(),
                delta: second.value()? - first.value()?,
            })
        })
        .collect()
}

pub fn summary_cards(records: &[EvaluationRecord]) -> SummaryCards {
    let mut overall = Mean::default();
    let mut by_indicator: BTreeMap<Indicator, Mean> = BTreeMap::new();
    let mut by_teacher: BTreeMap<String, Mean> = BTreeMap::new();
    for record in records {
        overall.push(record.value);
        by_indicator.entry(record.indicator).or_default().push(record.value);
        by_teacher.entry(record.teacher.clone()).or_default().push(record.value);
    }

    let mut best_improvement: Option<Improvement> = None;
    for improvement in improvements(records) {
        if best_improvement
            .as_ref()
            .map_or(true, |best| improvement.delta > best.delta)
        {
            best_improvement = Some(improvement);
        }
    }

    SummaryCards {
        active_teachers: by_teacher.len(),
        mean_value: overall.value(),
        top_indicator: extreme(&by_indicator, |a, b| a > b),
        bottom_indicator: extreme(&by_indicator, |a, b| a < b),
        top_teacher: extreme(&by_teacher, |a, b| a > b),
        best_improvement,
    }
}

/// Years available for `kind`, sorted; the first is the default selection.
pub fn year_options(store: &DatasetStore, kind: AssessmentKind) -> Vec<AcademicYear> {
    let mut years = store.years(kind);
    years.sort();
    years
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeacherPicker {
    pub options: Vec<String>,
    pub selected: Option<String>,
    pub locked: bool,
}

pub fn owns_row<S: AsRef<str>>(session: &Session, teacher: &str, titles: &[S]) -> bool {
    canonical_identifier(teacher, titles) == session.identifier
}

pub fn teacher_picker<S: AsRef<str>>(
    records: &[EvaluationRecord],
    session: Option<&Session>,
    titles: &[S],
) -> TeacherPicker {
    let locked_empty = TeacherPicker {
        options: Vec::new(),
        selected: None,
        locked: true,
    };

    match session.filter(|s| s.logged_in) {
        None => locked_empty,
        Some(session) if session.role == Role::Admin => {
            let names: BTreeSet<&str> = records.iter().map(|r| r.teacher.as_str()).collect();
            TeacherPicker {
                options: names.into_iter().map(str::to_string).collect(),
                selected: None,
                locked: false,
            }
        }
        Some(session) => records
            .iter()
            .find(|r| owns_row(session, &r.teacher, titles))
            .map(|r| TeacherPicker {
                options: vec![r.teacher.clone()],
                selected: Some(r.teacher.clone()),
                locked: true,
            })
            .unwrap_or(locked_empty),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub period: Period,
    pub points: Vec<(Indicator, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartView {
    LoginRequired,
    SelectTeacher,
    NoData,
    Bars {
        title: String,
        teacher: String,
        year: AcademicYear,
        series: Vec<ChartSeries>,
    },
}

/// Grouped bars for one teacher: one series per period, indicators sorted.
/// Admins chart `selected`; teachers always chart their own rows.
pub fn chart<S: AsRef<str>>(
    records: &[EvaluationRecord],
    session: Option<&Session>,
    selected: Option<&str>,
    year: AcademicYear,
    titles: &[S],
) -> ChartView {
    let Some(session) = session.filter(|s| s.logged_in) else {
        return ChartView::LoginRequired;
    };

    let rows: Vec<&EvaluationRecord> = if session.role == Role::Admin {
        let Some(teacher) = selected else {
            return ChartView::SelectTeacher;
        };
        records.iter().filter(|r| r.teacher == teacher).collect()
    } else {
        records
            .iter()
            .filter(|r| owns_row(session, &r.teacher, titles))
            .collect()
    };

    let Some(first) = rows.first() else {
        return ChartView::NoData;
    };

    let mut series: Vec<ChartSeries> = Vec::new();
    for row in &rows {
        let position = match series.iter().position(|s| s.period == row.period) {
            Some(position) => position,
            None => {
                series.push(ChartSeries {
                    period: row.period,
                    points: Vec::new(),
                });
                series.len() - 1
            }
        };
        series[position].points.push((row.indicator, row.value));
    }
    for s in &mut series {
        s.points.sort_by_key(|(indicator, _)| *indicator);
    }

    ChartView::Bars {
        title: format!("Indicator scores: {} ({year})", first.teacher),
        teacher: first.teacher.clone(),
        year,
        series,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub columns: Vec<ColumnSpec>,
    /// Visible rows with their index in the working table.
    pub rows: Vec<(usize, WorkingRow)>,
    pub highlight_value: bool,
}

pub const TABLE_COLUMNS: [&str; 6] = ["teacher", "period", "indicator", "value", "assessment", "year"];

/// Editable grid contents. Teachers only see their own rows; admins may
/// narrow by a case-insensitive name search.
pub fn table_view<S: AsRef<str>>(
    rows: &[WorkingRow],
    session: Option<&Session>,
    search: Option<&str>,
    titles: &[S],
) -> TableView {
    let Some(session) = session.filter(|s| s.logged_in) else {
        return TableView {
            columns: Vec::new(),
            rows: Vec::new(),
            highlight_value: false,
        };
    };

    let admin = session.is_admin();
    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty() && admin);

    let visible = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            if admin {
                needle
                    .as_deref()
                    .map_or(true, |needle| row.teacher.to_lowercase().contains(needle))
            } else {
                owns_row(session, &row.teacher, titles)
            }
        })
        .map(|(idx, row)| (idx, row.clone()))
        .collect();

    TableView {
        columns: TABLE_COLUMNS
            .iter()
            .map(|&name| ColumnSpec {
                name,
                editable: admin && !matches!(name, "assessment" | "year"),
            })
            .collect(),
        rows: visible,
        highlight_value: admin,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub login_form: bool,
    pub dashboard: bool,
    pub admin_controls: bool,
}

pub fn visibility(session: Option<&Session>) -> Visibility {
    let logged_in = session.map_or(false, |s| s.logged_in);
    Visibility {
        login_form: !logged_in,
        dashboard: logged_in,
        admin_controls: session.map_or(false, Session::is_admin),
    }
}
