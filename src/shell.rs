use std::fmt::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::auth;
use crate::config::DashboardConfig;
use crate::edit::{NewRow, WorkingTable};
use crate::identity::IdentityIndex;
use crate::models::{AcademicYear, AssessmentKind, EvaluationRecord, Session, SlotKey};
use crate::query;
use crate::report;
use crate::store::DatasetStore;

const HELP: &str = "\
Commands:
  login <account> <password>   log in (e.g. admin@ses.com)
  logout                       end the session
  session                      show the current session
  kind <plan|delivery>         choose the assessment kind
  year <label>                 choose the academic year
  teachers                     list selectable teachers
  teacher <name>               chart a teacher (admin only)
  summary                      show the summary cards
  chart                        show indicator scores for the selected teacher
  table [search]               show the editable table
  quit                         leave the shell
";

const ADMIN_HELP: &str = "\
Admin commands:
  add teacher|indicator|value|period|kind|year
  set <row> <column> <value>   edit one cell
  delete <row> [row ...]       delete rows and persist
  save                         persist the edited table
";

pub enum Outcome {
    Continue(String),
    Quit,
}

/// One dashboard client. Every line is handled to completion before the
/// next is read.
pub struct Shell<'a> {
    store: &'a DatasetStore,
    config: &'a DashboardConfig,
    session: Option<Session>,
    kind: AssessmentKind,
    year: Option<AcademicYear>,
    teacher: Option<String>,
    table: Option<WorkingTable>,
    search: Option<String>,
}

impl<'a> Shell<'a> {
    pub fn new(store: &'a DatasetStore, config: &'a DashboardConfig) -> Self {
        let kind = AssessmentKind::LessonPlanReview;
        Self {
            store,
            config,
            session: None,
            kind,
            year: query::year_options(store, kind).first().copied(),
            teacher: None,
            table: None,
            search: None,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("Teacher supervision dashboard. Type 'help' for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match self.execute(&line).await {
                Outcome::Continue(text) => print!("{text}"),
                Outcome::Quit => break,
            }
        }
        Ok(())
    }

    fn slot(&self) -> Option<SlotKey> {
        self.year.map(|year| SlotKey::new(self.kind, year))
    }

    async fn records(&self) -> Vec<EvaluationRecord> {
        match self.slot() {
            Some(slot) => self.store.snapshot(slot).await.unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Re-reads the active slot and resets the teacher selection, the way the
    /// dashboard refreshes after a kind, year or session change.
    async fn refresh(&mut self) {
        let records = self.records().await;
        let picker = query::teacher_picker(&records, self.session.as_ref(), &self.config.identity.titles);
        self.teacher = picker.selected;
        self.table = match self.slot() {
            Some(slot) if self.session.is_some() => WorkingTable::open(self.store, slot).await.ok(),
            _ => None,
        };
    }

    pub async fn execute(&mut self, line: &str) -> Outcome {
        let line = line.trim();
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map(|(c, r)| (c, r.trim()))
            .unwrap_or((line, ""));
        debug!(command, "shell command");

        let text = match command {
            "" => String::new(),
            "help" => {
                if query::visibility(self.session.as_ref()).admin_controls {
                    format!("{HELP}{ADMIN_HELP}")
                } else {
                    HELP.to_string()
                }
            }
            "quit" | "exit" => return Outcome::Quit,
            "login" => self.login(rest).await,
            "logout" => {
                if let Some(session) = self.session.take() {
                    info!(session = %session.id, "logged out");
                }
                self.refresh().await;
                "Logged out.\n".to_string()
            }
            "session" => match &self.session {
                Some(session) => serde_json::to_string_pretty(session)
                    .map(|json| format!("{json}\n"))
                    .unwrap_or_else(|e| format!("{e}\n")),
                None => "Not logged in.\n".to_string(),
            },
            _ if !query::visibility(self.session.as_ref()).dashboard => {
                "Please log in first.\n".to_string()
            }
            "kind" => self.select_kind(rest).await,
            "year" => self.select_year(rest).await,
            "teachers" => {
                let records = self.records().await;
                let picker = query::teacher_picker(&records, self.session.as_ref(), &self.config.identity.titles);
                let mut out = String::new();
                for name in &picker.options {
                    let marker = if Some(name) == self.teacher.as_ref() { "*" } else { " " };
                    let _ = writeln!(out, "{marker} {name}");
                }
                if picker.locked {
                    let _ = writeln!(out, "(selection locked)");
                }
                out
            }
            "teacher" => self.select_teacher(rest).await,
            "summary" => report::render_cards(&query::summary_cards(&self.records().await)),
            "chart" => {
                let records = self.records().await;
                match self.year {
                    Some(year) => {
                        let view = query::chart(
                            &records,
                            self.session.as_ref(),
                            self.teacher.as_deref(),
                            year,
                            &self.config.identity.titles,
                        );
                        if let query::ChartView::Bars { teacher, year, .. } = &view {
                            debug!(%teacher, %year, "charting teacher");
                        }
                        report::render_chart(&view)
                    }
                    None => "No year loaded for this kind.\n".to_string(),
                }
            }
            "table" => {
                self.search = Some(rest.to_string()).filter(|s| !s.is_empty());
                match &self.table {
                    Some(table) => format!(
                        "{}\n{}",
                        table.slot(),
                        report::render_table(&query::table_view(
                            table.rows(),
                            self.session.as_ref(),
                            self.search.as_deref(),
                            &self.config.identity.titles,
                        ))
                    ),
                    None => "No table loaded.\n".to_string(),
                }
            }
            "add" => self.add(rest),
            "set" => self.set(rest),
            "delete" => self.delete(rest).await,
            "save" => self.save().await,
            other => format!("Unknown command '{other}'. Type 'help' for commands.\n"),
        };

        Outcome::Continue(text)
    }

    async fn login(&mut self, rest: &str) -> String {
        if !query::visibility(self.session.as_ref()).login_form {
            return "Already logged in. Use 'logout' first.\n".to_string();
        }

        let mut parts = rest.split_whitespace();
        let account = parts.next().unwrap_or_default();
        let password = parts.next().unwrap_or_default();

        // The index is rebuilt per attempt so renamed teachers are picked up.
        let config = self.config;
        let titles = &config.identity.titles;
        let index = IdentityIndex::build(&self.store.all_records().await, titles);
        match auth::authenticate(&config.auth, &index, titles, account, password) {
            Ok(session) => {
                let greeting = format!("Logged in as {} ({:?}).\n", session.account, session.role);
                self.session = Some(session);
                self.refresh().await;
                greeting
            }
            Err(e) => format!("{e}\n"),
        }
    }

    async fn select_kind(&mut self, rest: &str) -> String {
        match rest.parse::<AssessmentKind>() {
            Ok(kind) => {
                self.kind = kind;
                self.year = query::year_options(self.store, kind).first().copied();
                self.refresh().await;
                match self.year {
                    Some(year) => format!("Showing {} {}.\n", kind.title(), year),
                    None => format!("No data loaded for {}.\n", kind.title()),
                }
            }
            Err(e) => format!("{e}\n"),
        }
    }

    async fn select_year(&mut self, rest: &str) -> String {
        let options = query::year_options(self.store, self.kind);
        match rest.parse::<AcademicYear>() {
            Ok(year) if options.contains(&year) => {
                self.year = Some(year);
                self.refresh().await;
                format!("Showing {} {}.\n", self.kind.title(), year)
            }
            Ok(year) => format!("No data loaded for {year}.\n"),
            Err(e) => format!("{e}\n"),
        }
    }

    async fn select_teacher(&mut self, rest: &str) -> String {
        let records = self.records().await;
        let picker = query::teacher_picker(&records, self.session.as_ref(), &self.config.identity.titles);
        if picker.locked {
            return "Teacher selection is locked for this account.\n".to_string();
        }
        match picker.options.into_iter().find(|name| name.eq_ignore_ascii_case(rest)) {
            Some(name) => {
                let reply = format!("Selected {name}.\n");
                self.teacher = Some(name);
                reply
            }
            None => format!("No teacher named '{rest}' in this dataset.\n"),
        }
    }

    fn add(&mut self, rest: &str) -> String {
        let Some(table) = self.table.as_mut() else {
            return "No table loaded.\n".to_string();
        };

        let mut fields = rest
            .split('|')
            .map(|f| Some(f.trim().to_string()).filter(|f| !f.is_empty()));
        let row = NewRow {
            teacher: fields.next().flatten(),
            indicator: fields.next().flatten(),
            value: fields.next().flatten(),
            period: fields.next().flatten(),
            kind: fields.next().flatten(),
            year: fields.next().flatten(),
        };

        match table.add_row(self.session.as_ref(), row) {
            Ok(index) => format!("Added row {index}. Use 'save' to keep it.\n"),
            Err(e) => format!("{e}\n"),
        }
    }

    fn set(&mut self, rest: &str) -> String {
        let Some(table) = self.table.as_mut() else {
            return "No table loaded.\n".to_string();
        };

        let mut parts = rest.splitn(3, char::is_whitespace);
        let (Some(row), Some(column)) = (parts.next(), parts.next()) else {
            return "Usage: set <row> <column> <value>\n".to_string();
        };
        let Ok(row) = row.parse::<usize>() else {
            return format!("'{row}' is not a row number.\n");
        };
        let value = parts.next().unwrap_or_default().trim();

        match table.set_cell(self.session.as_ref(), row, column, value) {
            Ok(()) => format!("Row {row} {column} set. Use 'save' to keep it.\n"),
            Err(e) => format!("{e}\n"),
        }
    }

    async fn delete(&mut self, rest: &str) -> String {
        let Some(table) = self.table.as_mut() else {
            return "No table loaded.\n".to_string();
        };

        let mut indices = Vec::new();
        for token in rest.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            match token.parse::<usize>() {
                Ok(index) => indices.push(index),
                Err(_) => return format!("'{token}' is not a row number.\n"),
            }
        }
        if indices.is_empty() {
            return "Select at least one row to delete.\n".to_string();
        }

        let before = table.rows().len();
        match table.delete_rows(self.session.as_ref(), &indices, self.store).await {
            Ok(outcome) => format!(
                "Deleted {} rows; {} rows remain.\n",
                before - outcome.kept - outcome.dropped,
                outcome.kept
            ),
            Err(e) => format!("{e}\n"),
        }
    }

    async fn save(&mut self) -> String {
        let Some(table) = self.table.as_mut() else {
            return "No table loaded.\n".to_string();
        };

        match table.save(self.session.as_ref(), self.store).await {
            Ok(outcome) => format!(
                "Changes saved: {} rows kept, {} incomplete rows dropped.\n",
                outcome.kept, outcome.dropped
            ),
            Err(e) => format!("{e}\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Indicator, Period};

    fn record(teacher: &str, period: Period, indicator: &str, value: f64) -> EvaluationRecord {
        EvaluationRecord {
            teacher: teacher.to_string(),
            period,
            year: AcademicYear::Y2020,
            indicator: indicator.parse::<Indicator>().unwrap(),
            value: Some(value),
        }
    }

    fn store() -> DatasetStore {
        DatasetStore::from_slots([(
            SlotKey::new(AssessmentKind::LessonPlanReview, AcademicYear::Y2020),
            vec![
                record("Budi Santoso", Period::First, "A", 70.0),
                record("Budi Santoso", Period::Second, "A", 85.0),
                record("Siti Aminah", Period::First, "A", 90.0),
            ],
        )])
        .unwrap()
    }

    async fn run(shell: &mut Shell<'_>, line: &str) -> String {
        match shell.execute(line).await {
            Outcome::Continue(text) => text,
            Outcome::Quit => "<quit>".to_string(),
        }
    }

    #[tokio::test]
    async fn dashboard_requires_login() {
        let store = store();
        let config = DashboardConfig::default();
        let mut shell = Shell::new(&store, &config);

        assert_eq!(run(&mut shell, "summary").await, "Please log in first.\n");
        let reply = run(&mut shell, "login ghost@ses.com testing123").await;
        assert!(reply.contains("'ghost'"));
        assert_eq!(run(&mut shell, "quit").await, "<quit>");
    }

    #[tokio::test]
    async fn teacher_sees_only_own_data_and_cannot_edit() {
        let store = store();
        let config = DashboardConfig::default();
        let mut shell = Shell::new(&store, &config);

        assert!(run(&mut shell, "login budisantoso@ses.com testing123").await.contains("Teacher"));
        let chart = run(&mut shell, "chart").await;
        assert!(chart.contains("Budi Santoso (2020-2021)"));

        let table = run(&mut shell, "table").await;
        assert!(table.contains("Budi Santoso"));
        assert!(!table.contains("Siti Aminah"));

        assert!(run(&mut shell, "teacher Siti Aminah").await.contains("locked"));
        assert!(run(&mut shell, "delete 0").await.contains("Access denied"));
        assert_eq!(store.all_records().await.len(), 3);
    }

    #[tokio::test]
    async fn admin_edits_reach_the_store() {
        let store = store();
        let config = DashboardConfig::default();
        let mut shell = Shell::new(&store, &config);

        run(&mut shell, "login admin@ses.com testing123").await;
        assert!(run(&mut shell, "summary").await.contains("Budi Santoso (+15.00)"));
        assert!(run(&mut shell, "chart").await.contains("select a teacher"));
        assert!(run(&mut shell, "teacher siti aminah").await.contains("Selected Siti Aminah"));

        let added = run(&mut shell, "add Dewi Lestari|B|80|1st|plan|2020-2021").await;
        assert!(added.starts_with("Added row 3"), "{added}");
        assert!(run(&mut shell, "add Dewi Lestari|B||1st|plan|2020-2021").await.contains("'value'"));

        let saved = run(&mut shell, "save").await;
        assert!(saved.contains("4 rows kept"), "{saved}");

        let deleted = run(&mut shell, "delete 0, 2").await;
        assert!(deleted.contains("2 rows remain"), "{deleted}");
        let remaining = store.all_records().await;
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[1].teacher, "Dewi Lestari");

        assert_eq!(run(&mut shell, "logout").await, "Logged out.\n");
        assert_eq!(run(&mut shell, "save").await, "Please log in first.\n");
    }

    #[tokio::test]
    async fn repeated_delete_indices_count_once() {
        let store = store();
        let config = DashboardConfig::default();
        let mut shell = Shell::new(&store, &config);

        run(&mut shell, "login admin@ses.com testing123").await;
        let deleted = run(&mut shell, "delete 1 1").await;
        assert_eq!(deleted, "Deleted 1 rows; 2 rows remain.\n");
        assert_eq!(store.all_records().await.len(), 2);
    }

    #[tokio::test]
    async fn renamed_teacher_logs_in_under_new_identifier() {
        let store = store();
        let config = DashboardConfig::default();
        let mut shell = Shell::new(&store, &config);

        run(&mut shell, "login admin@ses.com testing123").await;
        run(&mut shell, "set 0 teacher Joko Widodo, S.Pd").await;
        run(&mut shell, "set 1 teacher Joko Widodo").await;
        assert!(run(&mut shell, "save").await.contains("3 rows kept"));
        run(&mut shell, "logout").await;

        let reply = run(&mut shell, "login jokowidodo@ses.com testing123").await;
        assert!(reply.contains("Teacher"), "{reply}");
        assert!(run(&mut shell, "chart").await.contains("Joko Widodo"));
        run(&mut shell, "logout").await;

        let reply = run(&mut shell, "login budisantoso@ses.com testing123").await;
        assert!(reply.contains("'budisantoso'"), "{reply}");
    }

    #[tokio::test]
    async fn help_lists_edit_commands_for_admin_only() {
        let store = store();
        let config = DashboardConfig::default();
        let mut shell = Shell::new(&store, &config);

        assert!(!run(&mut shell, "help").await.contains("delete <row>"));
        run(&mut shell, "login budisantoso@ses.com testing123").await;
        assert!(!run(&mut shell, "help").await.contains("delete <row>"));
        run(&mut shell, "logout").await;

        run(&mut shell, "login admin@ses.com testing123").await;
        let help = run(&mut shell, "help").await;
        assert!(help.contains("Admin commands:") && help.contains("delete <row>"));
    }
}
