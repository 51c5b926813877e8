//! The four AI-backed operations: job generation, insights, resume analysis
//! and job-posting extraction.
//!
//! Structured replies are never trusted as-is. Every job object coming back
//! from the model is checked field by field before it becomes a [`Job`].

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::ai::{AIProvider, FileAttachment};
use crate::error::ScoutError;
use crate::models::{EmploymentKind, InsightKind, Job, SearchFilters};
use crate::resume::{pdf_text, ResumeInput, ResumeMediaType};

const JOBS_PER_SEARCH: usize = 12;
const LIST_MAX_TOKENS: u32 = 8192;
const TEXT_MAX_TOKENS: u32 = 2048;

const JOB_SHAPE: &str = r#"{
  "title": "string",
  "company": "string",
  "location": "string",
  "type": "Full-time | Part-time | Contract | Internship",
  "description": "2-4 sentence string",
  "skills": ["string", "..."],
  "salary": "string or null"
}"#;

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

#[derive(Clone)]
pub struct Assistant {
    provider: Arc<dyn AIProvider>,
}

impl Assistant {
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Asks the model for fictional listings matching `filters`, most
    /// relevant first. Every job gets a fresh id; ids the model proposes are
    /// ignored, since it reuses them across searches.
    pub async fn generate_jobs(&self, filters: &SearchFilters) -> Result<Vec<Job>, ScoutError> {
        let prompt = jobs_prompt(filters);
        info!("Generating jobs for {}", filters.describe());
        let reply = self.provider.complete(&prompt, LIST_MAX_TOKENS).await?;
        let jobs = parse_job_list(&reply).map_err(ScoutError::Service)?;
        debug!("Model returned {} valid job(s)", jobs.len());
        Ok(jobs)
    }

    pub async fn generate_insight(&self, job: &Job, kind: InsightKind) -> Result<String, ScoutError> {
        let prompt = insight_prompt(job, kind);
        let reply = self.provider.complete(&prompt, TEXT_MAX_TOKENS).await?;
        Ok(reply.trim().to_string())
    }

    /// Compares a resume against `job` and returns a markdown report.
    pub async fn analyze_resume(&self, resume: &ResumeInput, job: &Job) -> Result<String, ScoutError> {
        resume.validate()?;

        let reply = match resume {
            ResumeInput::Text(text) => {
                let prompt = resume_prompt(job, Some(text));
                self.provider.complete(&prompt, TEXT_MAX_TOKENS).await?
            }
            ResumeInput::File(file) if file.media_type == ResumeMediaType::Pdf => {
                let bytes = file.bytes.clone();
                let text = tokio::task::spawn_blocking(move || pdf_text(&bytes))
                    .await
                    .map_err(|e| {
                        ScoutError::Validation(format!("Could not read PDF resume: {}", e))
                    })??;
                let prompt = resume_prompt(job, Some(&text));
                self.provider.complete(&prompt, TEXT_MAX_TOKENS).await?
            }
            ResumeInput::File(file) => {
                let prompt = resume_prompt(job, None);
                let attachment = FileAttachment {
                    media_type: file.media_type.mime(),
                    extension: file.media_type.extension(),
                    bytes: &file.bytes,
                };
                self.provider
                    .complete_with_file(&prompt, attachment, TEXT_MAX_TOKENS)
                    .await?
            }
        };
        Ok(reply.trim().to_string())
    }

    /// Extracts a structured job from pasted text. The returned job carries
    /// a freshly generated id.
    pub async fn parse_job_posting(&self, raw_text: &str) -> Result<Job, ScoutError> {
        if raw_text.trim().is_empty() {
            return Err(ScoutError::Validation(
                "Paste the text of a job posting first.".to_string(),
            ));
        }

        let reply = self
            .provider
            .complete(&posting_prompt(raw_text), TEXT_MAX_TOKENS)
            .await?;

        let value = extract_json(&reply, &JSON_OBJECT).map_err(|e| parse_failure(&e))?;
        let job = validate_job(&value).map_err(|e| parse_failure(&e))?;
        info!("Parsed posting into '{}'", job.summary_line());
        Ok(job)
    }
}

fn parse_failure(detail: &str) -> ScoutError {
    warn!("Job posting extraction failed: {}", detail);
    ScoutError::Parse(format!(
        "{}. The text may be too long or ambiguous; try pasting only the job description.",
        detail
    ))
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// --- Prompts ---

fn jobs_prompt(filters: &SearchFilters) -> String {
    let kinds: Vec<&str> = EmploymentKind::ALL.iter().map(|k| k.as_str()).collect();
    format!(
        "Generate {count} realistic but fictional job listings for this search, ranked by relevance.\n\n\
        Search: {query}\n\
        Location: {location}\n\
        Employment type: {kind}\n\
        Salary expectation: {salary}\n\
        Work location preference: {work_mode}\n\
        Industry: {industry}\n\n\
        Return ONLY a JSON array. Each element must have exactly this shape:\n{shape}\n\
        The \"type\" field must be one of: {kinds}.",
        count = JOBS_PER_SEARCH,
        query = or_any(&filters.query),
        location = or_any(&filters.location),
        kind = or_any(&filters.employment_kind),
        salary = or_any(&filters.salary),
        work_mode = or_any(&filters.work_mode),
        industry = or_any(&filters.industry),
        shape = JOB_SHAPE,
        kinds = kinds.join(", "),
    )
}

fn or_any(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() { "any" } else { trimmed }
}

fn insight_prompt(job: &Job, kind: InsightKind) -> String {
    let task = match kind {
        InsightKind::Summary => {
            "Summarize this job in 2-3 sentences for a busy job seeker: what the role is, \
             who it suits, and anything notable."
        }
        InsightKind::KeySkills => {
            "List the 5-8 most important skills a candidate needs for this job, one per line, \
             each followed by a short reason."
        }
        InsightKind::CoverLetter => {
            "Write a confident, specific opening paragraph (3-4 sentences) for a cover letter \
             applying to this job. Do not include a greeting line."
        }
    };
    format!("{}\n\nJob:\n{}", task, job.as_prompt_text())
}

fn resume_prompt(job: &Job, resume_text: Option<&str>) -> String {
    let resume = match resume_text {
        Some(text) => format!("Resume:\n{}", text),
        None => "The resume is provided as an attached document.".to_string(),
    };
    format!(
        "Compare the candidate's resume with the job below and write a markdown report with \
        these sections:\n\
        ## Match Score (0-100 with one sentence of reasoning)\n\
        ## Strengths\n\
        ## Gaps\n\
        ## Suggestions\n\n\
        Job:\n{}\n\n{}",
        job.as_prompt_text(),
        resume
    )
}

fn posting_prompt(raw_text: &str) -> String {
    format!(
        "Extract the job posting below into a single JSON object with exactly this shape:\n{}\n\
        Use null for salary when none is stated. Return ONLY the JSON object.\n\n\
        Posting:\n{}",
        JOB_SHAPE, raw_text
    )
}

// --- Response validation ---

/// Strips markdown code fences the model may wrap JSON in.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(rest) => rest.trim().strip_suffix("```").unwrap_or(rest).trim(),
        None => text,
    }
}

/// Finds the JSON payload in a reply, tolerating fences and surrounding prose.
fn extract_json(reply: &str, shape: &Regex) -> Result<Value, String> {
    let text = strip_json_fences(reply);
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }
    let candidate = shape
        .find(text)
        .ok_or_else(|| "response contained no JSON".to_string())?;
    serde_json::from_str(candidate.as_str()).map_err(|e| format!("response was not valid JSON: {}", e))
}

fn parse_job_list(reply: &str) -> Result<Vec<Job>, String> {
    let value = extract_json(reply, &JSON_ARRAY)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("jobs") {
            Some(Value::Array(items)) => items,
            _ => return Err("expected a JSON array of jobs".to_string()),
        },
        _ => return Err("expected a JSON array of jobs".to_string()),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_job(item).map_err(|e| format!("job {}: {}", i + 1, e)))
        .collect()
}

/// Builds a [`Job`] from one model-produced object. Any `id` field is
/// ignored; the job gets a fresh one.
fn validate_job(value: &Value) -> Result<Job, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let kind_text = required_str(obj, "type")?;
    let kind: EmploymentKind = kind_text.parse()?;

    let skills = match obj.get("skills") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|s| {
                s.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| "field 'skills' must contain only strings".to_string())
            })
            .filter(|s| !matches!(s, Ok(s) if s.is_empty()))
            .collect::<Result<BTreeSet<String>, String>>()?,
        Some(_) => return Err("field 'skills' must be an array".to_string()),
        None => return Err("missing field 'skills'".to_string()),
    };

    let salary = match obj.get("salary") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => return Err("field 'salary' must be a string or null".to_string()),
    };

    Ok(Job {
        id: fresh_id(),
        title: non_empty_str(obj, "title")?,
        company: non_empty_str(obj, "company")?,
        location: required_str(obj, "location")?,
        kind,
        description: non_empty_str(obj, "description")?,
        skills,
        salary,
    })
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(format!("field '{}' must be a string", key)),
        None => Err(format!("missing field '{}'", key)),
    }
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    let value = required_str(obj, key)?;
    if value.is_empty() {
        return Err(format!("field '{}' is empty", key));
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::ai::{AIProvider, FileAttachment, LlmError};
    use crate::models::Job;

    /// Provider that replays canned replies in order and records prompts.
    #[derive(Default)]
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub prompts: Mutex<Vec<String>>,
        pub attachments: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: &str) -> Self {
            self.replies.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn reply_jobs(self, jobs: &[Job]) -> Self {
            let json = serde_json::to_string(jobs).unwrap();
            self.reply(&json)
        }

        pub fn fail(self, err: LlmError) -> Self {
            self.replies.lock().unwrap().push_back(Err(err));
            self
        }

        fn next(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyContent))
        }
    }

    #[async_trait]
    impl AIProvider for ScriptedProvider {
        async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            self.next(prompt)
        }

        async fn complete_with_file(
            &self,
            prompt: &str,
            file: FileAttachment<'_>,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            self.attachments.lock().unwrap().push(file.media_type.to_string());
            self.next(prompt)
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted-model"
        }
    }
}
