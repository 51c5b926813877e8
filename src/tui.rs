use anyhow::Result;
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::collections::HashMap;
use std::io::stdout;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::assistant::Assistant;
use crate::error::ScoutError;
use crate::models::{InsightKind, Job, SearchFilters};
use crate::pagination::PageCursor;
use crate::resume::ResumeInput;
use crate::session::{SearchPhase, SearchSession};
use crate::store::JobListStore;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

const FORM_FIELDS: [&str; 6] = ["Query", "Location", "Type", "Salary", "Work mode", "Industry"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Results,
    Saved,
}

#[derive(Debug, Clone)]
enum InsightSlot {
    Loading,
    Ready(String),
    Failed(String),
}

/// Results of background AI calls, delivered back to the UI loop.
enum Reply {
    Insight {
        job_id: String,
        kind: InsightKind,
        result: Result<String, ScoutError>,
    },
    ResumeMatch {
        job_id: String,
        result: Result<String, ScoutError>,
    },
    Posting(Result<Job, ScoutError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputOutcome {
    Editing,
    Submit,
    Cancel,
}

/// The search form: one text field per filter.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchForm {
    values: [String; 6],
    focus: usize,
}

impl SearchForm {
    fn from_filters(filters: &SearchFilters) -> Self {
        Self {
            values: [
                filters.query.clone(),
                filters.location.clone(),
                filters.employment_kind.clone(),
                filters.salary.clone(),
                filters.work_mode.clone(),
                filters.industry.clone(),
            ],
            focus: 0,
        }
    }

    fn to_filters(&self) -> SearchFilters {
        let [query, location, employment_kind, salary, work_mode, industry] =
            self.values.clone().map(|v| v.trim().to_string());
        SearchFilters {
            query,
            location,
            employment_kind,
            salary,
            work_mode,
            industry,
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> InputOutcome {
        let fields = FORM_FIELDS.len();
        match code {
            KeyCode::Esc => return InputOutcome::Cancel,
            KeyCode::Enter => return InputOutcome::Submit,
            KeyCode::Tab | KeyCode::Down => self.focus = (self.focus + 1) % fields,
            KeyCode::BackTab | KeyCode::Up => self.focus = (self.focus + fields - 1) % fields,
            KeyCode::Backspace => {
                self.values[self.focus].pop();
            }
            KeyCode::Char(c) => self.values[self.focus].push(c),
            _ => {}
        }
        InputOutcome::Editing
    }

    fn paste(&mut self, text: &str) {
        let flat = text.replace(['\r', '\n'], " ");
        self.values[self.focus].push_str(&flat);
    }
}

fn edit_line(input: &mut String, code: KeyCode) -> InputOutcome {
    match code {
        KeyCode::Esc => return InputOutcome::Cancel,
        KeyCode::Enter => return InputOutcome::Submit,
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(c) => input.push(c),
        _ => {}
    }
    InputOutcome::Editing
}

enum Prompt {
    Search(SearchForm),
    Posting(String),
    Resume { job: Job, input: String },
}

/// A resume typed into the prompt: a path to an existing file, or the
/// resume text itself.
fn resume_input(raw: &str) -> Result<ResumeInput, ScoutError> {
    let trimmed = raw.trim();
    let path = Path::new(trimmed);
    let resume = if !trimmed.is_empty() && !trimmed.contains('\n') && path.is_file() {
        ResumeInput::from_path(path)?
    } else {
        ResumeInput::Text(raw.to_string())
    };
    resume.validate()?;
    Ok(resume)
}

struct AppState {
    view: View,
    results_page: PageCursor,
    saved_page: PageCursor,
    selected: usize,
    scroll_offset: u16,
    prompt: Option<Prompt>,
    insights: HashMap<(String, InsightKind), InsightSlot>,
    resume_matches: HashMap<String, InsightSlot>,
    notice: Option<String>,
}

impl AppState {
    fn new() -> Self {
        Self {
            view: View::Results,
            results_page: PageCursor::default(),
            saved_page: PageCursor::default(),
            selected: 0,
            scroll_offset: 0,
            prompt: None,
            insights: HashMap::new(),
            resume_matches: HashMap::new(),
            notice: None,
        }
    }

    fn collection<'a>(&self, store: &'a JobListStore) -> &'a [Job] {
        match self.view {
            View::Results => store.search_results(),
            View::Saved => store.saved_jobs(),
        }
    }

    fn cursor(&self) -> &PageCursor {
        match self.view {
            View::Results => &self.results_page,
            View::Saved => &self.saved_page,
        }
    }

    fn cursor_mut(&mut self) -> &mut PageCursor {
        match self.view {
            View::Results => &mut self.results_page,
            View::Saved => &mut self.saved_page,
        }
    }

    fn visible<'a>(&self, store: &'a JobListStore) -> &'a [Job] {
        self.cursor().slice(self.collection(store))
    }

    fn current_job<'a>(&self, store: &'a JobListStore) -> Option<&'a Job> {
        self.visible(store).get(self.selected)
    }

    /// Re-clamps page and selection after either collection changed.
    fn sync(&mut self, store: &JobListStore) {
        self.results_page.sync(store.search_results().len());
        self.saved_page.sync(store.saved_jobs().len());
        let visible = self.visible(store).len();
        if self.selected >= visible {
            self.selected = visible.saturating_sub(1);
        }
    }

    fn switch_view(&mut self) {
        self.view = match self.view {
            View::Results => View::Saved,
            View::Saved => View::Results,
        };
        self.cursor_mut().reset();
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn next(&mut self, store: &JobListStore) {
        let visible = self.visible(store).len();
        if visible > 0 && self.selected < visible - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn next_page(&mut self, store: &JobListStore) {
        let len = self.collection(store).len();
        self.cursor_mut().next(len);
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn prev_page(&mut self, store: &JobListStore) {
        let len = self.collection(store).len();
        self.cursor_mut().prev(len);
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

struct Browser<'a> {
    session: &'a mut SearchSession,
    store: &'a mut JobListStore,
    assistant: Assistant,
    reply_tx: UnboundedSender<Reply>,
    reply_rx: UnboundedReceiver<Reply>,
    state: AppState,
}

impl<'a> Browser<'a> {
    fn new(session: &'a mut SearchSession, store: &'a mut JobListStore, assistant: Assistant) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        Self {
            session,
            store,
            assistant,
            reply_tx,
            reply_rx,
            state: AppState::new(),
        }
    }

    fn submit(&mut self, filters: SearchFilters) {
        self.session.submit(filters, self.store);
        self.state.results_page.reset();
        if self.state.view == View::Results {
            self.state.selected = 0;
            self.state.scroll_offset = 0;
        }
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.session.try_next_event() {
            self.session.apply(event, self.store);
        }
        while let Ok(reply) = self.reply_rx.try_recv() {
            self.apply_reply(reply);
        }
        self.state.sync(self.store);
    }

    fn apply_reply(&mut self, reply: Reply) {
        let slot = |result: Result<String, ScoutError>| match result {
            Ok(text) => InsightSlot::Ready(text),
            Err(e) => InsightSlot::Failed(e.to_string()),
        };
        match reply {
            Reply::Insight { job_id, kind, result } => {
                self.state.insights.insert((job_id, kind), slot(result));
            }
            Reply::ResumeMatch { job_id, result } => {
                self.state.resume_matches.insert(job_id, slot(result));
            }
            Reply::Posting(Ok(job)) => {
                let title = job.title.clone();
                self.store.save(job);
                self.state.notice = Some(format!("Added '{}' to saved jobs", title));
            }
            Reply::Posting(Err(e)) => self.state.notice = Some(e.to_string()),
        }
    }

    fn request_insight(&mut self, kind: InsightKind) {
        let Some(job) = self.state.current_job(self.store).cloned() else {
            return;
        };
        let key = (job.id.clone(), kind);
        if matches!(self.state.insights.get(&key), Some(InsightSlot::Loading)) {
            return;
        }
        self.state.insights.insert(key, InsightSlot::Loading);

        debug!("Requesting {:?} for {}", kind, job.id);
        let assistant = self.assistant.clone();
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let result = assistant.generate_insight(&job, kind).await;
            let _ = tx.send(Reply::Insight {
                job_id: job.id,
                kind,
                result,
            });
        });
    }

    fn add_posting(&mut self, text: String) {
        if text.trim().is_empty() {
            self.state.notice = Some("Nothing to add: the posting was empty".to_string());
            return;
        }
        self.state.notice = Some("Parsing job posting...".to_string());

        let assistant = self.assistant.clone();
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let result = assistant.parse_job_posting(&text).await;
            let _ = tx.send(Reply::Posting(result));
        });
    }

    fn match_resume(&mut self, job: Job, raw: &str) {
        let resume = match resume_input(raw) {
            Ok(resume) => resume,
            Err(e) => {
                self.state.notice = Some(e.to_string());
                return;
            }
        };
        self.state.resume_matches.insert(job.id.clone(), InsightSlot::Loading);

        debug!("Matching resume against {}", job.id);
        let assistant = self.assistant.clone();
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let result = assistant.analyze_resume(&resume, &job).await;
            let _ = tx.send(Reply::ResumeMatch {
                job_id: job.id,
                result,
            });
        });
    }

    fn toggle_saved(&mut self) {
        let Some(job) = self.state.current_job(self.store).cloned() else {
            return;
        };
        let saved = self.store.toggle_saved(&job);
        self.state.notice = Some(if saved {
            format!("Saved '{}'", job.title)
        } else {
            format!("Removed '{}' from saved jobs", job.title)
        });
        self.state.sync(self.store);
    }

    /// Opens the search form filled in with the filters of the last search.
    fn open_search_form(&mut self) {
        let filters = self
            .session
            .filters()
            .cloned()
            .unwrap_or_else(SearchFilters::initial);
        self.state.prompt = Some(Prompt::Search(SearchForm::from_filters(&filters)));
    }

    fn handle_prompt_key(&mut self, mut prompt: Prompt, code: KeyCode) {
        let outcome = match &mut prompt {
            Prompt::Search(form) => form.handle_key(code),
            Prompt::Posting(input) | Prompt::Resume { input, .. } => edit_line(input, code),
        };
        match outcome {
            InputOutcome::Editing => self.state.prompt = Some(prompt),
            InputOutcome::Cancel => {}
            InputOutcome::Submit => match prompt {
                Prompt::Search(form) => self.submit(form.to_filters()),
                Prompt::Posting(text) => self.add_posting(text),
                Prompt::Resume { job, input } => self.match_resume(job, &input),
            },
        }
    }

    fn handle_paste(&mut self, text: &str) {
        match self.state.prompt.as_mut() {
            Some(Prompt::Search(form)) => form.paste(text),
            Some(Prompt::Posting(input)) | Some(Prompt::Resume { input, .. }) => {
                input.push_str(text)
            }
            None => {}
        }
    }

    /// Handles one key press; returns false to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if let Some(prompt) = self.state.prompt.take() {
            self.handle_prompt_key(prompt, code);
            return true;
        }

        self.state.notice = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Tab => self.state.switch_view(),
            KeyCode::Down | KeyCode::Char('j') => self.state.next(self.store),
            KeyCode::Up | KeyCode::Char('k') => self.state.prev(),
            KeyCode::Right | KeyCode::Char('l') => self.state.next_page(self.store),
            KeyCode::Left | KeyCode::Char('h') => self.state.prev_page(self.store),
            KeyCode::Char('J') | KeyCode::PageDown => self.state.scroll_down(),
            KeyCode::Char('K') | KeyCode::PageUp => self.state.scroll_up(),
            KeyCode::Char('s') => self.toggle_saved(),
            KeyCode::Char('/') => self.open_search_form(),
            KeyCode::Char('a') => self.state.prompt = Some(Prompt::Posting(String::new())),
            KeyCode::Char('m') => {
                if let Some(job) = self.state.current_job(self.store).cloned() {
                    self.state.prompt = Some(Prompt::Resume {
                        job,
                        input: String::new(),
                    });
                }
            }
            KeyCode::Char('1') => self.request_insight(InsightKind::Summary),
            KeyCode::Char('2') => self.request_insight(InsightKind::KeySkills),
            KeyCode::Char('3') => self.request_insight(InsightKind::CoverLetter),
            _ => {}
        }
        true
    }
}

pub async fn run_browse(
    session: &mut SearchSession,
    store: &mut JobListStore,
    assistant: Assistant,
    initial: SearchFilters,
) -> Result<()> {
    let mut browser = Browser::new(session, store, assistant);
    browser.submit(initial);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut browser).await;

    // Restore terminal
    stdout().execute(DisableBracketedPaste)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    browser: &mut Browser<'_>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        browser.drain_events();
        list_state.select(if browser.state.visible(browser.store).is_empty() {
            None
        } else {
            Some(browser.state.selected)
        });
        terminal.draw(|frame| draw(frame, &*browser, &mut list_state))?;

        let polled = tokio::task::block_in_place(|| event::poll(POLL_INTERVAL))?;
        if !polled {
            tokio::task::yield_now().await;
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if !browser.handle_key(key.code) {
                    break;
                }
            }
            Event::Paste(text) => browser.handle_paste(&text),
            _ => {}
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, browser: &Browser<'_>, list_state: &mut ListState) {
    let state = &browser.state;
    let footer_height = match &state.prompt {
        Some(Prompt::Search(_)) => FORM_FIELDS.len() as u16 + 1,
        Some(_) => 3,
        None => 1,
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(footer_height),
        ])
        .split(frame.area());

    frame.render_widget(Paragraph::new(progress_line(browser)), rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    // Left panel: current page of the active list
    let store: &JobListStore = &*browser.store;
    let items: Vec<ListItem> = state
        .visible(store)
        .iter()
        .map(|job| {
            let marker = if store.is_saved(&job.id) { "*" } else { " " };
            let title = if job.title.chars().count() > 32 {
                format!("{}...", job.title.chars().take(29).collect::<String>())
            } else {
                job.title.clone()
            };
            ListItem::new(format!("{} {} | {}", marker, title, job.company))
        })
        .collect();

    let collection_len = state.collection(store).len();
    let label = match state.view {
        View::Results => "Results",
        View::Saved => "Saved",
    };
    let title = format!(
        " {} ({}) page {}/{} ",
        label,
        collection_len,
        state.cursor().page(),
        state.cursor().total_pages(collection_len).max(1)
    );

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail
    let detail = Paragraph::new(build_detail(state, store))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, chunks[1]);

    frame.render_widget(footer(state), rows[2]);
}

/// Last `max` characters of `text` on one line, for input previews.
fn tail(text: &str, max: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    let count = flat.chars().count();
    if count <= max {
        flat
    } else {
        format!("...{}", flat.chars().skip(count - max).collect::<String>())
    }
}

fn footer(state: &AppState) -> Paragraph<'static> {
    let hint = Style::default().fg(Color::DarkGray);
    match &state.prompt {
        Some(Prompt::Search(form)) => {
            let mut lines = vec![Line::from(Span::styled(
                " Search  tab/up/down:field  enter:search  esc:cancel",
                hint,
            ))];
            for (i, (label, value)) in FORM_FIELDS.iter().zip(&form.values).enumerate() {
                let line = if i == form.focus {
                    Line::from(Span::styled(
                        format!(" > {:<10} {}_", label, value),
                        Style::default().fg(Color::Yellow),
                    ))
                } else {
                    Line::from(format!("   {:<10} {}", label, value))
                };
                lines.push(line);
            }
            Paragraph::new(lines)
        }
        Some(Prompt::Posting(input)) => Paragraph::new(vec![
            Line::from(Span::styled(
                " Paste a job posting  enter:add and save  esc:cancel",
                hint,
            )),
            Line::from(format!(" {}_", tail(input, 200))),
        ])
        .wrap(Wrap { trim: false }),
        Some(Prompt::Resume { job, input }) => Paragraph::new(vec![
            Line::from(Span::styled(
                format!(
                    " Resume for '{}': file path (.pdf/.doc/.docx) or pasted text  enter:analyze  esc:cancel",
                    job.title
                ),
                hint,
            )),
            Line::from(format!(" {}_", tail(input, 200))),
        ])
        .wrap(Wrap { trim: false }),
        None => Paragraph::new(
            " /:search  tab:results/saved  j/k:select  h/l:page  s:save  1:summary 2:skills 3:cover letter  m:match resume  a:add posting  q:quit",
        )
        .style(hint),
    }
}

fn progress_line(browser: &Browser<'_>) -> Line<'static> {
    if let Some(notice) = &browser.state.notice {
        return Line::from(Span::styled(
            format!(" {}", notice),
            Style::default().fg(Color::Cyan),
        ));
    }

    let session = &browser.session;
    match session.phase() {
        SearchPhase::Idle => Line::from(" Ready"),
        SearchPhase::Failed => {
            let message = session
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Search failed".to_string());
            Line::from(Span::styled(
                format!(" {} (press / to try again)", message),
                Style::default().fg(Color::Red),
            ))
        }
        SearchPhase::Fetching => {
            let what = session
                .filters()
                .map(|f| f.describe())
                .unwrap_or_default();
            Line::from(Span::styled(
                format!(" Searching job boards for {}...", what),
                Style::default().fg(Color::Yellow),
            ))
        }
        SearchPhase::Revealing | SearchPhase::Done => {
            let status = session.status();
            let mut spans = vec![Span::raw(" ")];
            for board in status.completed() {
                spans.push(Span::styled(
                    format!("{} done  ", board),
                    Style::default().fg(Color::Green),
                ));
            }
            if let Some(board) = status.current() {
                spans.push(Span::styled(
                    format!("scanning {}...", board),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Line::from(spans)
        }
    }
}

fn push_slot(lines: &mut Vec<Line<'_>>, heading: String, slot: &InsightSlot) {
    lines.push(Line::from(Span::styled(
        heading,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    match slot {
        InsightSlot::Loading => lines.push(Line::from(Span::styled(
            "  thinking...",
            Style::default().fg(Color::DarkGray),
        ))),
        InsightSlot::Ready(text) => {
            for line in textwrap::fill(text, 70).lines() {
                lines.push(Line::from(format!("  {}", line)));
            }
        }
        InsightSlot::Failed(message) => lines.push(Line::from(Span::styled(
            format!("  {}", message),
            Style::default().fg(Color::Red),
        ))),
    }
    lines.push(Line::from(""));
}

fn build_detail<'a>(state: &AppState, store: &'a JobListStore) -> Text<'a> {
    let Some(job) = state.current_job(store) else {
        return Text::raw(match state.view {
            View::Results => "No results yet",
            View::Saved => "No saved jobs. Press s on a search result to save it.",
        });
    };

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        job.title.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", job.company)));
    lines.push(Line::from(format!("{} | {}", job.location, job.kind)));
    if let Some(salary) = &job.salary {
        lines.push(Line::from(format!("Salary: {}", salary)));
    }
    if store.is_saved(&job.id) {
        lines.push(Line::from(Span::styled("Saved", Style::default().fg(Color::Green))));
    }
    lines.push(Line::from(""));

    if !job.skills.is_empty() {
        let skills: Vec<&str> = job.skills.iter().map(String::as_str).collect();
        lines.push(Line::from(Span::styled(
            format!("Skills: {}", skills.join(", ")),
            Style::default().fg(Color::Cyan),
        )));
        lines.push(Line::from(""));
    }

    for line in textwrap::fill(&job.description, 70).lines() {
        lines.push(Line::from(line.to_string()));
    }
    lines.push(Line::from(""));

    for kind in InsightKind::ALL {
        if let Some(slot) = state.insights.get(&(job.id.clone(), kind)) {
            push_slot(&mut lines, kind.label().to_uppercase(), slot);
        }
    }
    if let Some(slot) = state.resume_matches.get(&job.id) {
        push_slot(&mut lines, "RESUME MATCH".to_string(), slot);
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::testing::ScriptedProvider;
    use crate::db::MemoryStore;
    use crate::models::sample_job;
    use crate::reveal::RevealController;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn store_with_results(n: usize) -> JobListStore {
        let mut store = JobListStore::load(Box::new(MemoryStore::new()));
        store.replace_search_results((0..n).map(|i| sample_job(&i.to_string())).collect());
        store
    }

    fn type_text(browser: &mut Browser<'_>, text: &str) {
        for c in text.chars() {
            browser.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_views_page_independently() {
        let mut store = store_with_results(20);
        store.save(sample_job("s1"));
        let mut state = AppState::new();

        state.next_page(&store);
        state.next_page(&store);
        assert_eq!(state.results_page.page(), 3);
        assert_eq!(state.visible(&store).len(), 2);

        state.switch_view();
        assert_eq!(state.view, View::Saved);
        assert_eq!(state.saved_page.page(), 1);
        assert_eq!(state.current_job(&store).unwrap().id, "s1");

        state.switch_view();
        assert_eq!(state.results_page.page(), 1);
    }

    #[test]
    fn test_sync_clamps_after_shrink() {
        let mut store = store_with_results(20);
        let mut state = AppState::new();
        state.next_page(&store);
        state.next_page(&store);
        state.next(&store);

        store.replace_search_results((0..5).map(|i| sample_job(&i.to_string())).collect());
        state.sync(&store);
        assert_eq!(state.results_page.page(), 1);
        assert_eq!(state.current_job(&store).unwrap().id, "1");
    }

    #[test]
    fn test_search_form_edits_every_filter() {
        let mut form = SearchForm::from_filters(&SearchFilters {
            query: "Rust".to_string(),
            location: "Berlin".to_string(),
            employment_kind: "Contract".to_string(),
            ..SearchFilters::default()
        });

        for _ in 0..4 {
            form.handle_key(KeyCode::Backspace);
        }
        form.handle_key(KeyCode::Char('G'));
        form.handle_key(KeyCode::Char('o'));
        form.handle_key(KeyCode::Down);
        form.handle_key(KeyCode::Tab);
        for _ in 0.."Contract".len() {
            form.handle_key(KeyCode::Backspace);
        }
        for c in "Full-time".chars() {
            form.handle_key(KeyCode::Char(c));
        }
        form.handle_key(KeyCode::Tab);
        form.handle_key(KeyCode::Tab);
        form.paste("Remote\n");
        form.handle_key(KeyCode::BackTab);
        assert_eq!(form.focus, 3);
        assert_eq!(form.handle_key(KeyCode::Enter), InputOutcome::Submit);

        assert_eq!(
            form.to_filters(),
            SearchFilters {
                query: "Go".to_string(),
                location: "Berlin".to_string(),
                employment_kind: "Full-time".to_string(),
                salary: String::new(),
                work_mode: "Remote".to_string(),
                industry: String::new(),
            }
        );

        form.focus = 0;
        form.handle_key(KeyCode::BackTab);
        assert_eq!(form.focus, FORM_FIELDS.len() - 1);
        assert_eq!(form.handle_key(KeyCode::Esc), InputOutcome::Cancel);
    }

    #[tokio::test]
    async fn test_new_search_keeps_previous_filters() {
        let assistant = Assistant::new(Arc::new(ScriptedProvider::new()));
        let mut session = SearchSession::new(assistant.clone(), RevealController::default());
        let mut store = JobListStore::load(Box::new(MemoryStore::new()));
        let mut browser = Browser::new(&mut session, &mut store, assistant);

        let first = SearchFilters {
            query: "Data Engineer".to_string(),
            location: "Berlin".to_string(),
            employment_kind: "Contract".to_string(),
            work_mode: "Hybrid".to_string(),
            ..SearchFilters::default()
        };
        browser.submit(first.clone());

        browser.handle_key(KeyCode::Char('/'));
        for _ in 0.."Engineer".len() {
            browser.handle_key(KeyCode::Backspace);
        }
        type_text(&mut browser, "Analyst");
        browser.handle_key(KeyCode::Enter);

        assert!(browser.state.prompt.is_none());
        assert_eq!(
            browser.session.filters(),
            Some(&SearchFilters {
                query: "Data Analyst".to_string(),
                ..first
            })
        );
        assert_eq!(browser.session.phase(), SearchPhase::Fetching);
    }

    #[tokio::test]
    async fn test_pasted_posting_is_parsed_and_saved() {
        let reply = r#"{"title":"Site Reliability Engineer","company":"Orbit","location":"Remote",
            "type":"Full-time","description":"Keep things up.","skills":["Linux"],"salary":null}"#;
        let assistant = Assistant::new(Arc::new(ScriptedProvider::new().reply(reply)));
        let mut session = SearchSession::new(assistant.clone(), RevealController::default());
        let mut store = JobListStore::load(Box::new(MemoryStore::new()));
        let mut browser = Browser::new(&mut session, &mut store, assistant);

        browser.handle_key(KeyCode::Char('a'));
        browser.handle_paste("SRE at Orbit\nRemote, full time");
        browser.handle_key(KeyCode::Enter);
        assert!(browser.state.prompt.is_none());

        let reply = browser.reply_rx.recv().await.unwrap();
        browser.apply_reply(reply);
        assert_eq!(browser.store.saved_jobs().len(), 1);
        assert_eq!(browser.store.saved_jobs()[0].title, "Site Reliability Engineer");
        assert!(browser.state.notice.as_deref().unwrap().contains("Site Reliability Engineer"));
    }

    #[tokio::test]
    async fn test_failed_posting_leaves_saved_jobs_alone() {
        let assistant = Assistant::new(Arc::new(ScriptedProvider::new()));
        let mut session = SearchSession::new(assistant.clone(), RevealController::default());
        let mut store = JobListStore::load(Box::new(MemoryStore::new()));
        let mut browser = Browser::new(&mut session, &mut store, assistant);

        browser.apply_reply(Reply::Posting(Err(ScoutError::Parse("unclear".to_string()))));
        assert!(browser.store.saved_jobs().is_empty());
        assert!(browser.state.notice.as_deref().unwrap().contains("unclear"));
    }

    #[tokio::test]
    async fn test_resume_match_shows_in_detail() {
        let assistant = Assistant::new(Arc::new(ScriptedProvider::new().reply("## Match Score\n72")));
        let mut session = SearchSession::new(assistant.clone(), RevealController::default());
        let mut store = store_with_results(3);
        let mut browser = Browser::new(&mut session, &mut store, assistant);

        browser.handle_key(KeyCode::Char('m'));
        assert!(matches!(browser.state.prompt, Some(Prompt::Resume { .. })));
        type_text(&mut browser, "Five years of Rust");
        browser.handle_key(KeyCode::Enter);
        assert!(matches!(
            browser.state.resume_matches.get("0"),
            Some(InsightSlot::Loading)
        ));

        let reply = browser.reply_rx.recv().await.unwrap();
        browser.apply_reply(reply);
        match browser.state.resume_matches.get("0") {
            Some(InsightSlot::Ready(text)) => assert!(text.contains("Match Score")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resume_input_accepts_path_or_text() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("cv.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let png = dir.path().join("photo.png");
        std::fs::write(&png, b"\x89PNG").unwrap();

        assert!(matches!(
            resume_input(pdf.to_str().unwrap()),
            Ok(ResumeInput::File(_))
        ));
        assert!(matches!(
            resume_input("Rust developer, five years"),
            Ok(ResumeInput::Text(_))
        ));
        assert!(matches!(
            resume_input(png.to_str().unwrap()),
            Err(ScoutError::Validation(_))
        ));
        assert!(matches!(resume_input("   "), Err(ScoutError::Validation(_))));
    }

    #[test]
    fn test_tail_keeps_end_of_long_input() {
        assert_eq!(tail("short\ntext", 20), "short text");
        assert_eq!(tail("abcdefghij", 4), "...ghij");
    }
}
