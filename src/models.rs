use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssessmentKind {
    LessonPlanReview,
    LessonDeliveryReview,
}

impl AssessmentKind {
    pub const ALL: [AssessmentKind; 2] = [
        AssessmentKind::LessonPlanReview,
        AssessmentKind::LessonDeliveryReview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentKind::LessonPlanReview => "lesson-plan-review",
            AssessmentKind::LessonDeliveryReview => "lesson-delivery-review",
        }
    }

    /// Title used on the source workbooks.
    pub fn title(self) -> &'static str {
        match self {
            AssessmentKind::LessonPlanReview => "Penilaian Rencana Pelaksanaan Pembelajaran",
            AssessmentKind::LessonDeliveryReview => "Penilaian Pelaksanaan Pembelajaran",
        }
    }

    /// Every indicator a record of this kind may carry.
    pub fn indicators(self) -> &'static [Indicator] {
        static LETTERS: [Indicator; 11] = Indicator::ALL;
        match self {
            AssessmentKind::LessonPlanReview => &LETTERS[..7],
            AssessmentKind::LessonDeliveryReview => &LETTERS[..],
        }
    }

    pub fn allows(self, indicator: Indicator) -> bool {
        self.indicators().contains(&indicator)
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        AssessmentKind::ALL
            .into_iter()
            .find(|kind| {
                needle.eq_ignore_ascii_case(kind.as_str()) || needle.eq_ignore_ascii_case(kind.title())
            })
            .or(match needle.to_ascii_lowercase().as_str() {
                "plan" => Some(AssessmentKind::LessonPlanReview),
                "delivery" => Some(AssessmentKind::LessonDeliveryReview),
                _ => None,
            })
            .ok_or_else(|| format!("unknown assessment kind '{needle}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AcademicYear {
    #[serde(rename = "2020-2021")]
    Y2020,
    #[serde(rename = "2022-2023")]
    Y2022,
    #[serde(rename = "2023-2024")]
    Y2023,
}

impl AcademicYear {
    pub const ALL: [AcademicYear; 3] = [AcademicYear::Y2020, AcademicYear::Y2022, AcademicYear::Y2023];

    pub fn label(self) -> &'static str {
        match self {
            AcademicYear::Y2020 => "2020-2021",
            AcademicYear::Y2022 => "2022-2023",
            AcademicYear::Y2023 => "2023-2024",
        }
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AcademicYear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        AcademicYear::ALL
            .into_iter()
            .find(|year| year.label() == needle)
            .ok_or_else(|| format!("unsupported academic year '{needle}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
}

impl Period {
    pub fn label(self) -> &'static str {
        match self {
            Period::First => "1st",
            Period::Second => "2nd",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1st" | "1" | "first" => Ok(Period::First),
            "2nd" | "2" | "second" => Ok(Period::Second),
            other => Err(format!("unknown period '{other}'")),
        }
    }
}

/// Lettered scoring criterion, `A` through `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Indicator(char);

impl Indicator {
    pub const ALL: [Indicator; 11] = [
        Indicator('A'),
        Indicator('B'),
        Indicator('C'),
        Indicator('D'),
        Indicator('E'),
        Indicator('F'),
        Indicator('G'),
        Indicator('H'),
        Indicator('I'),
        Indicator('J'),
        Indicator('K'),
    ];

    pub fn letter(self) -> char {
        self.0
    }

    /// Column label for this indicator; the second period repeats it with a `.1` marker.
    pub fn column(self, repeat: bool) -> String {
        if repeat {
            format!("{}.1", self.0)
        } else {
            self.0.to_string()
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                let upper = c.to_ascii_uppercase();
                Indicator::ALL
                    .into_iter()
                    .find(|i| i.0 == upper)
                    .ok_or_else(|| format!("unknown indicator '{trimmed}'"))
            }
            _ => Err(format!("unknown indicator '{trimmed}'")),
        }
    }
}

impl TryFrom<String> for Indicator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Indicator> for String {
    fn from(value: Indicator) -> Self {
        value.0.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub teacher: String,
    pub period: Period,
    pub year: AcademicYear,
    pub indicator: Indicator,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub kind: AssessmentKind,
    pub year: AcademicYear,
}

impl SlotKey {
    pub fn new(kind: AssessmentKind, year: AcademicYear) -> Self {
        Self { kind, year }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub logged_in: bool,
    pub account: String,
    pub identifier: String,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.logged_in && self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCards {
    pub active_teachers: usize,
    pub mean_value: Option<f64>,
    pub top_indicator: Option<Indicator>,
    pub bottom_indicator: Option<Indicator>,
    pub top_teacher: Option<String>,
    pub best_improvement: Option<Improvement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Improvement {
    pub teacher: String,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorMean {
    pub indicator: Indicator,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeacherMean {
    pub teacher: String,
    pub mean: f64,
    pub scored: usize,
}
