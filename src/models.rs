use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EmploymentKind {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl EmploymentKind {
    pub const ALL: [EmploymentKind; 4] = [
        EmploymentKind::FullTime,
        EmploymentKind::PartTime,
        EmploymentKind::Contract,
        EmploymentKind::Internship,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentKind::FullTime => "Full-time",
            EmploymentKind::PartTime => "Part-time",
            EmploymentKind::Contract => "Contract",
            EmploymentKind::Internship => "Internship",
        }
    }
}

impl fmt::Display for EmploymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmploymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "fulltime" => Ok(EmploymentKind::FullTime),
            "parttime" => Ok(EmploymentKind::PartTime),
            "contract" => Ok(EmploymentKind::Contract),
            "internship" | "intern" => Ok(EmploymentKind::Internship),
            _ => Err(format!(
                "unknown employment type '{}' (expected Full-time, Part-time, Contract or Internship)",
                s
            )),
        }
    }
}

impl TryFrom<String> for EmploymentKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EmploymentKind> for String {
    fn from(kind: EmploymentKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A job listing. Jobs are never edited once built; collections gain and
/// lose whole jobs instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: EmploymentKind,
    pub description: String,
    pub skills: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
}

impl Job {
    pub fn summary_line(&self) -> String {
        format!("{} at {} ({}, {})", self.title, self.company, self.location, self.kind)
    }

    /// Plain-text rendering used when a job is handed back to the AI service.
    pub fn as_prompt_text(&self) -> String {
        let mut text = format!(
            "Title: {}\nCompany: {}\nLocation: {}\nType: {}\n",
            self.title, self.company, self.location, self.kind
        );
        if let Some(salary) = &self.salary {
            text.push_str(&format!("Salary: {}\n", salary));
        }
        if !self.skills.is_empty() {
            let skills: Vec<&str> = self.skills.iter().map(String::as_str).collect();
            text.push_str(&format!("Skills: {}\n", skills.join(", ")));
        }
        text.push_str(&format!("\nDescription:\n{}", self.description));
        text
    }
}

/// Everything the user typed into the search form. A new submission replaces
/// the previous filters wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub query: String,
    pub location: String,
    pub employment_kind: String,
    pub salary: String,
    pub work_mode: String,
    pub industry: String,
}

impl SearchFilters {
    /// Filters used for the search that runs when the browser first opens.
    pub fn initial() -> Self {
        Self {
            query: "Software Engineer".to_string(),
            ..Self::default()
        }
    }

    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("query", &self.query),
            ("location", &self.location),
            ("type", &self.employment_kind),
            ("salary", &self.salary),
            ("work mode", &self.work_mode),
            ("industry", &self.industry),
        ]
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{}: {}", label, value.trim()))
        .collect();

        if parts.is_empty() {
            "any job".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Job boards the progressive reveal pretends to scan, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobBoard {
    LinkedIn,
    Indeed,
    Glassdoor,
    Monster,
    ZipRecruiter,
}

impl JobBoard {
    pub const ALL: [JobBoard; 5] = [
        JobBoard::LinkedIn,
        JobBoard::Indeed,
        JobBoard::Glassdoor,
        JobBoard::Monster,
        JobBoard::ZipRecruiter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobBoard::LinkedIn => "LinkedIn",
            JobBoard::Indeed => "Indeed",
            JobBoard::Glassdoor => "Glassdoor",
            JobBoard::Monster => "Monster",
            JobBoard::ZipRecruiter => "ZipRecruiter",
        }
    }
}

impl fmt::Display for JobBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum InsightKind {
    Summary,
    KeySkills,
    CoverLetter,
}

impl InsightKind {
    pub const ALL: [InsightKind; 3] = [
        InsightKind::Summary,
        InsightKind::KeySkills,
        InsightKind::CoverLetter,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InsightKind::Summary => "Summary",
            InsightKind::KeySkills => "Key skills",
            InsightKind::CoverLetter => "Cover letter opener",
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_job(id: &str) -> Job {
    Job {
        id: id.to_string(),
        title: format!("Engineer {}", id),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        kind: EmploymentKind::FullTime,
        description: "Build things.".to_string(),
        skills: ["Rust".to_string(), "SQL".to_string()].into_iter().collect(),
        salary: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employment_kind_parses_loose_spellings() {
        assert_eq!("Full-time".parse::<EmploymentKind>().unwrap(), EmploymentKind::FullTime);
        assert_eq!("full time".parse::<EmploymentKind>().unwrap(), EmploymentKind::FullTime);
        assert_eq!("PART-TIME".parse::<EmploymentKind>().unwrap(), EmploymentKind::PartTime);
        assert_eq!("Intern".parse::<EmploymentKind>().unwrap(), EmploymentKind::Internship);
        assert!("Temporary".parse::<EmploymentKind>().is_err());
    }

    #[test]
    fn test_job_json_uses_type_key() {
        let job = sample_job("a1");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "Full-time");
        assert!(json.get("salary").is_none());

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_job_rejects_unknown_kind() {
        let json = r#"{"id":"1","title":"t","company":"c","location":"l",
            "type":"Gig","description":"d","skills":[]}"#;
        assert!(serde_json::from_str::<Job>(json).is_err());
    }

    #[test]
    fn test_filters_describe_skips_blank_fields() {
        let filters = SearchFilters {
            query: "AI Engineer".to_string(),
            location: "Remote".to_string(),
            work_mode: "  ".to_string(),
            ..SearchFilters::default()
        };
        assert_eq!(filters.describe(), "query: AI Engineer, location: Remote");
        assert_eq!(SearchFilters::default().describe(), "any job");
    }

    #[test]
    fn test_job_boards_in_scan_order() {
        let names: Vec<&str> = JobBoard::ALL.iter().map(|b| b.name()).collect();
        assert_eq!(names, ["LinkedIn", "Indeed", "Glassdoor", "Monster", "ZipRecruiter"]);
    }
}
