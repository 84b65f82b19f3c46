use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{EvaluationRecord, SlotKey, SummaryCards};
use crate::query::{self, ChartView, TableView};

const BAR_WIDTH: f64 = 40.0;

fn mean_label(mean: Option<f64>) -> String {
    mean.map(|m| format!("{m:.2}")).unwrap_or_else(|| "-".to_string())
}

pub fn render_cards(cards: &SummaryCards) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Active teachers:      {} teachers", cards.active_teachers);
    let _ = writeln!(output, "Average score:        {}", mean_label(cards.mean_value));
    let _ = writeln!(
        output,
        "Top indicator:        {}",
        cards.top_indicator.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        output,
        "Top teacher:          {}",
        cards.top_teacher.as_deref().unwrap_or("-")
    );
    let _ = writeln!(
        output,
        "Best improvement:     {}",
        cards
            .best_improvement
            .as_ref()
            .map(|i| format!("{} ({:+.2})", i.teacher, i.delta))
            .unwrap_or_else(|| "none".to_string())
    );
    let _ = writeln!(
        output,
        "Lowest indicator:     {}",
        cards.bottom_indicator.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
    );
    output
}

pub fn render_chart(view: &ChartView) -> String {
    let (title, series) = match view {
        ChartView::LoginRequired => return "Please log in.\n".to_string(),
        ChartView::SelectTeacher => return "Please select a teacher.\n".to_string(),
        ChartView::NoData => return "No data found for the selected teacher.\n".to_string(),
        ChartView::Bars { title, series, .. } => (title, series),
    };

    let max = series
        .iter()
        .flat_map(|s| s.points.iter().filter_map(|(_, v)| *v))
        .fold(0.0_f64, f64::max);

    let mut output = String::new();
    let _ = writeln!(output, "{title}");
    for s in series {
        let _ = writeln!(output, "[{}]", s.period);
        for (indicator, value) in &s.points {
            match value {
                Some(value) => {
                    let width = if max > 0.0 {
                        ((value / max) * BAR_WIDTH).round().max(0.0) as usize
                    } else {
                        0
                    };
                    let _ = writeln!(output, "  {indicator} {:<40} {value:.2}", "#".repeat(width));
                }
                None => {
                    let _ = writeln!(output, "  {indicator} {:<40} -", "");
                }
            }
        }
    }
    output
}

pub fn render_table(view: &TableView) -> String {
    let mut output = String::new();
    if view.columns.is_empty() {
        let _ = writeln!(output, "Please log in.");
        return output;
    }

    let header: Vec<String> = view
        .columns
        .iter()
        .map(|c| if c.editable { format!("{}*", c.name) } else { c.name.to_string() })
        .collect();
    let _ = writeln!(output, "{:>5}  {}", "#", header.join(" | "));

    if view.rows.is_empty() {
        let _ = writeln!(output, "No rows.");
    }
    for (idx, row) in &view.rows {
        let value = if view.highlight_value {
            format!("[{}]", row.value)
        } else {
            row.value.clone()
        };
        let _ = writeln!(
            output,
            "{:>5}  {} | {} | {} | {} | {} | {}",
            idx, row.teacher, row.period, row.indicator, value, row.slot.kind, row.slot.year
        );
    }
    output
}

pub fn build_report(generated_at: DateTime<Utc>, slots: &[(SlotKey, Vec<EvaluationRecord>)]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Teacher Supervision Report");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));

    for (key, records) in slots {
        let cards = query::summary_cards(records);

        let _ = writeln!(output);
        let _ = writeln!(output, "## {} {}", key.kind.title(), key.year);
        let _ = writeln!(output);
        let _ = writeln!(output, "- Active teachers: {}", cards.active_teachers);
        let _ = writeln!(output, "- Average score: {}", mean_label(cards.mean_value));
        if let Some(indicator) = cards.top_indicator {
            let _ = writeln!(output, "- Top indicator: {indicator}");
        }
        if let Some(indicator) = cards.bottom_indicator {
            let _ = writeln!(output, "- Lowest indicator: {indicator}");
        }
        match &cards.best_improvement {
            Some(best) => {
                let _ = writeln!(output, "- Best improvement: {} ({:+.2})", best.teacher, best.delta);
            }
            None => {
                let _ = writeln!(output, "- Best improvement: none");
            }
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### Indicator Means");
        let means = query::indicator_means(records);
        if means.is_empty() {
            let _ = writeln!(output, "No scored indicators.");
        }
        for mean in &means {
            let _ = writeln!(output, "- {}: {:.2}", mean.indicator, mean.mean);
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### Highest Scoring Teachers");
        let teachers = query::teacher_means(records);
        if teachers.is_empty() {
            let _ = writeln!(output, "No scored teachers.");
        }
        for teacher in teachers.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {:.2} across {} scores",
                teacher.teacher, teacher.mean, teacher.scored
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AcademicYear, AssessmentKind, Period};
    use crate::query::ChartSeries;
    use chrono::TimeZone;

    fn record(teacher: &str, period: Period, indicator: &str, value: Option<f64>) -> EvaluationRecord {
        EvaluationRecord {
            teacher: teacher.to_string(),
            period,
            year: AcademicYear::Y2023,
            indicator: indicator.parse().unwrap(),
            value,
        }
    }

    #[test]
    fn report_lists_each_slot() {
        let key = SlotKey::new(AssessmentKind::LessonDeliveryReview, AcademicYear::Y2023);
        let records = vec![
            record("Budi Santoso", Period::First, "A", Some(70.0)),
            record("Budi Santoso", Period::Second, "A", Some(85.0)),
        ];
        let generated = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let report = build_report(generated, &[(key, records)]);

        assert!(report.contains("Generated 2024-06-01 08:30 UTC"));
        assert!(report.contains("## Penilaian Pelaksanaan Pembelajaran 2023-2024"));
        assert!(report.contains("- Best improvement: Budi Santoso (+15.00)"));
        assert!(report.contains("- Budi Santoso: 77.50 across 2 scores"));
    }

    #[test]
    fn empty_slot_reports_sentinels() {
        let key = SlotKey::new(AssessmentKind::LessonPlanReview, AcademicYear::Y2020);
        let report = build_report(Utc::now(), &[(key, Vec::new())]);
        assert!(report.contains("- Best improvement: none"));
        assert!(report.contains("No scored indicators."));
    }

    #[test]
    fn cards_render_none_for_missing_improvement() {
        let cards = query::summary_cards(&[record("Budi Santoso", Period::First, "A", Some(3.0))]);
        let text = render_cards(&cards);
        assert!(text.contains("Best improvement:     none"));
        assert!(text.contains("Average score:        3.00"));
    }

    #[test]
    fn chart_scales_bars_to_highest_value() {
        let view = ChartView::Bars {
            title: "Indicator scores: Budi Santoso (2023-2024)".to_string(),
            teacher: "Budi Santoso".to_string(),
            year: AcademicYear::Y2023,
            series: vec![ChartSeries {
                period: Period::First,
                points: vec![("A".parse().unwrap(), Some(4.0)), ("B".parse().unwrap(), None)],
            }],
        };
        let text = render_chart(&view);
        assert!(text.contains(&"#".repeat(40)));
        assert!(text.starts_with("Indicator scores: Budi Santoso (2023-2024)\n"));
        assert!(text.contains("[1st]"));
        assert!(text.lines().any(|l| l.trim_start().starts_with('B') && l.trim_end().ends_with('-')));
    }
}
