use color_eyre::Result;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{
    event::{AppEvent, EventHandler},
    widgets::TextInput,
};
use crate::application::{StoreSnapshot, TaskListStore};
use crate::domain::{
    PageItem, StatusFilter, Task, TaskId, TaskStatus, TaskUpdate, PAGE_SIZE_OPTIONS,
};
use ratatui::{
    prelude::*,
    widgets::{
        Block, BorderType, Borders, Cell, Clear, Gauge, List, ListItem, ListState, Paragraph,
        Row, Table, TableState, Wrap,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    List,
    Kanban,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Title,
    Description,
}

struct TaskForm {
    editing: Option<TaskId>,
    title: TextInput,
    description: TextInput,
    field: FormField,
    error: Option<String>,
    saving: bool,
}

impl TaskForm {
    fn create() -> Self {
        let mut form = Self {
            editing: None,
            title: TextInput::new("Title", "What needs to be done?"),
            description: TextInput::new("Description", "Optional details"),
            field: FormField::Title,
            error: None,
            saving: false,
        };
        form.title.set_focused(true);
        form
    }

    fn edit(task: &Task) -> Self {
        let mut form = Self::create();
        form.editing = Some(task.id.clone());
        form.title = TextInput::new("Title", "What needs to be done?").with_value(&task.title);
        form.title.set_focused(true);
        form.description =
            TextInput::new("Description", "Optional details").with_value(&task.description);
        form
    }

    fn focused_input(&mut self) -> &mut TextInput {
        match self.field {
            FormField::Title => &mut self.title,
            FormField::Description => &mut self.description,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Title,
        };
        self.title.set_focused(self.field == FormField::Title);
        self.description
            .set_focused(self.field == FormField::Description);
    }
}

enum Overlay {
    None,
    Form(TaskForm),
    ConfirmDelete { id: TaskId, title: String },
    MoveTo { task: Task },
    Help,
}

/// Completion report from a store call running in the background.
enum Outcome {
    Reloaded,
    Saved {
        editing: Option<TaskId>,
        result: std::result::Result<(), String>,
    },
    StatusChanged {
        id: TaskId,
        result: std::result::Result<Task, String>,
    },
    Deleted {
        id: TaskId,
        result: std::result::Result<(), String>,
    },
}

pub struct App {
    store: Arc<TaskListStore>,
    snapshot: StoreSnapshot,

    // UI State
    view: ViewMode,
    overlay: Overlay,
    selected: usize,
    column: usize,
    table_state: TableState,

    // Tasks with a mutation still waiting on the backend; their controls are disabled
    in_flight: HashSet<TaskId>,
    // Store calls spawned and not yet reported back
    pending_jobs: usize,
    // Inline feedback for the last failed action
    notice: Option<String>,

    outcome_tx: UnboundedSender<Outcome>,
    outcome_rx: UnboundedReceiver<Outcome>,
}

impl App {
    pub fn new(store: Arc<TaskListStore>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        Self {
            store,
            snapshot: StoreSnapshot::default(),
            view: ViewMode::List,
            overlay: Overlay::None,
            selected: 0,
            column: 0,
            table_state: TableState::default(),
            in_flight: HashSet::new(),
            pending_jobs: 0,
            notice: None,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Kick off the first load. Returns before the backend answers.
    pub fn initialize(&mut self) {
        self.reload(|store| async move { store.refresh().await });
    }

    async fn sync(&mut self) {
        self.snapshot = self.store.snapshot().await;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        self.selected = if len == 0 { 0 } else { self.selected.min(len - 1) };
    }

    /// Run a store call on the runtime and report its outcome over the channel.
    fn spawn_job<F>(&mut self, job: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.pending_jobs += 1;
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(job.await);
        });
    }

    fn reload<F, Fut>(&mut self, call: F)
    where
        F: FnOnce(Arc<TaskListStore>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let pending = call(self.store.clone());
        self.selected = 0;
        self.spawn_job(async move {
            pending.await;
            Outcome::Reloaded
        });
    }

    fn current_column(&self) -> TaskStatus {
        TaskStatus::ALL[self.column]
    }

    /// Tasks the selection moves through: the whole page, or the focused kanban column.
    fn visible_tasks(&self) -> Vec<&Task> {
        match self.view {
            ViewMode::List => self.snapshot.tasks.iter().collect(),
            ViewMode::Kanban => {
                let status = self.current_column();
                self.snapshot
                    .tasks
                    .iter()
                    .filter(|t| t.status == status)
                    .collect()
            }
        }
    }

    fn selected_task(&self) -> Option<Task> {
        self.visible_tasks().get(self.selected).map(|t| (*t).clone())
    }

    /// The selected task, unless a mutation of it is still outstanding.
    fn selected_idle_task(&mut self) -> Option<Task> {
        let task = self.selected_task()?;
        if self.in_flight.contains(&task.id) {
            self.notice = Some(format!("Still updating \"{}\"", task.title));
            return None;
        }
        Some(task)
    }

    /// Returns true when the app should quit.
    pub async fn handle_event(&mut self, event: AppEvent) -> Result<bool> {
        if event == AppEvent::Quit {
            return Ok(true);
        }
        if event == AppEvent::Tick {
            // Pick up the loading flag while requests are outstanding
            if self.pending_jobs > 0 {
                self.sync().await;
            }
            return Ok(false);
        }

        match std::mem::replace(&mut self.overlay, Overlay::None) {
            Overlay::Form(form) => self.handle_form_event(form, event),
            Overlay::ConfirmDelete { id, title } => match event {
                AppEvent::Character('y') | AppEvent::Enter => self.delete_task(id),
                AppEvent::Character('n') | AppEvent::Cancel => {}
                _ => self.overlay = Overlay::ConfirmDelete { id, title },
            },
            Overlay::MoveTo { task } => match event {
                AppEvent::Character(c @ '1'..='3') => {
                    let target = TaskStatus::ALL[(c as usize) - ('1' as usize)];
                    if target == task.status {
                        self.overlay = Overlay::MoveTo { task };
                    } else {
                        self.change_status(task, target);
                    }
                }
                AppEvent::Cancel | AppEvent::Character('q') => {}
                _ => self.overlay = Overlay::MoveTo { task },
            },
            Overlay::Help => {
                if !matches!(
                    event,
                    AppEvent::Cancel | AppEvent::Character('?') | AppEvent::Character('q')
                ) {
                    self.overlay = Overlay::Help;
                }
            }
            Overlay::None => return self.handle_browse_event(event).await,
        }
        Ok(false)
    }

    fn handle_form_event(&mut self, mut form: TaskForm, event: AppEvent) {
        match event {
            AppEvent::Cancel => return,
            AppEvent::Tab | AppEvent::BackTab => form.toggle_field(),
            AppEvent::Character(c) if !form.saving => form.focused_input().insert_char(c),
            AppEvent::Backspace if !form.saving => form.focused_input().delete_char(),
            AppEvent::Enter if !form.saving => self.submit_form(&mut form),
            _ => {}
        }
        self.overlay = Overlay::Form(form);
    }

    /// Save the form in the background; it stays open until the backend answers.
    fn submit_form(&mut self, form: &mut TaskForm) {
        let title = form.title.value().trim().to_string();
        if title.is_empty() {
            form.error = Some("Title is required".to_string());
            return;
        }
        let description = form.description.value().to_string();

        form.error = None;
        form.saving = true;

        let store = self.store.clone();
        let editing = form.editing.clone();
        if let Some(id) = &editing {
            self.in_flight.insert(id.clone());
        }

        self.spawn_job(async move {
            let result = match &editing {
                Some(id) => {
                    let update = TaskUpdate {
                        title: Some(title),
                        description: Some(description),
                    };
                    store.update_task(id, update).await
                }
                None => store.add_task(&title, &description).await,
            };
            Outcome::Saved {
                editing,
                result: result.map_err(|e| e.to_string()),
            }
        });
    }

    async fn handle_browse_event(&mut self, event: AppEvent) -> Result<bool> {
        match event {
            AppEvent::Cancel => {
                self.notice = None;
                self.store.clear_error().await;
                self.sync().await;
            }
            AppEvent::Up => self.previous_task(),
            AppEvent::Down => self.next_task(),
            AppEvent::Left => self.previous_column(),
            AppEvent::Right => self.next_column(),
            AppEvent::PageUp => self.step_page(-1),
            AppEvent::PageDown => self.step_page(1),
            AppEvent::Enter => self.open_edit_form(),
            AppEvent::Character(c) => match c {
                'q' => return Ok(true),
                'j' => self.next_task(),
                'k' => self.previous_task(),
                'h' => self.previous_column(),
                'l' => self.next_column(),
                'g' => self.selected = 0,
                'G' => self.selected = self.visible_tasks().len().saturating_sub(1),
                'v' => self.toggle_view(),
                'n' => self.overlay = Overlay::Form(TaskForm::create()),
                'e' => self.open_edit_form(),
                ' ' | 's' => {
                    if let Some(task) = self.selected_idle_task() {
                        let next = task.status.next();
                        self.change_status(task, next);
                    }
                }
                'm' => {
                    if let Some(task) = self.selected_idle_task() {
                        self.overlay = Overlay::MoveTo { task };
                    }
                }
                'd' => {
                    if let Some(task) = self.selected_idle_task() {
                        self.overlay = Overlay::ConfirmDelete {
                            id: task.id,
                            title: task.title,
                        };
                    }
                }
                'f' => self.set_filter(self.snapshot.filter.next()),
                '1' => self.set_filter(StatusFilter::All),
                '2' => self.set_filter(TaskStatus::NotStarted.into()),
                '3' => self.set_filter(TaskStatus::InProgress.into()),
                '4' => self.set_filter(TaskStatus::Completed.into()),
                '[' => self.step_page(-1),
                ']' => self.step_page(1),
                '-' => self.step_page_size(-1),
                '+' | '=' => self.step_page_size(1),
                'r' => self.reload(|store| async move { store.refresh().await }),
                '?' => self.overlay = Overlay::Help,
                _ => {}
            },
            _ => {}
        }
        Ok(false)
    }

    fn next_task(&mut self) {
        let len = self.visible_tasks().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    fn previous_task(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn next_column(&mut self) {
        if self.view == ViewMode::Kanban && self.column + 1 < TaskStatus::ALL.len() {
            self.column += 1;
            self.selected = 0;
        }
    }

    fn previous_column(&mut self) {
        if self.view == ViewMode::Kanban && self.column > 0 {
            self.column -= 1;
            self.selected = 0;
        }
    }

    fn toggle_view(&mut self) {
        self.view = match self.view {
            ViewMode::List => ViewMode::Kanban,
            ViewMode::Kanban => ViewMode::List,
        };
        self.selected = 0;
    }

    fn open_edit_form(&mut self) {
        if let Some(task) = self.selected_idle_task() {
            self.overlay = Overlay::Form(TaskForm::edit(&task));
        }
    }

    fn set_filter(&mut self, filter: StatusFilter) {
        self.reload(move |store| async move { store.set_filter(filter).await });
    }

    fn step_page(&mut self, delta: i32) {
        let pagination = self.snapshot.pagination;
        let target = match delta {
            d if d < 0 && pagination.has_prev => pagination.page - 1,
            d if d > 0 && pagination.has_next => pagination.page + 1,
            _ => return,
        };

        self.reload(move |store| async move { store.change_page(target).await });
    }

    fn step_page_size(&mut self, delta: i32) {
        let current = self.snapshot.pagination.limit;
        let index = PAGE_SIZE_OPTIONS
            .iter()
            .position(|size| *size >= current)
            .unwrap_or(PAGE_SIZE_OPTIONS.len() - 1);
        let next = if delta < 0 {
            index.saturating_sub(1)
        } else {
            (index + 1).min(PAGE_SIZE_OPTIONS.len() - 1)
        };
        if PAGE_SIZE_OPTIONS[next] == current {
            return;
        }

        let limit = PAGE_SIZE_OPTIONS[next];
        self.reload(move |store| async move { store.set_limit(limit).await });
    }

    /// Move a task to `status` in the background. Its controls stay disabled
    /// until the backend answers.
    fn change_status(&mut self, task: Task, status: TaskStatus) {
        self.in_flight.insert(task.id.clone());
        let store = self.store.clone();

        self.spawn_job(async move {
            let result = store
                .update_status(&task.id, status)
                .await
                .map_err(|e| e.to_string());
            Outcome::StatusChanged {
                id: task.id,
                result,
            }
        });
    }

    fn delete_task(&mut self, id: TaskId) {
        self.in_flight.insert(id.clone());
        let store = self.store.clone();

        self.spawn_job(async move {
            let result = store.delete_task(&id).await.map_err(|e| e.to_string());
            Outcome::Deleted { id, result }
        });
    }

    /// Collect finished store calls and pick up the store's new state.
    pub async fn poll_outcomes(&mut self) {
        let mut changed = false;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.pending_jobs = self.pending_jobs.saturating_sub(1);
            changed = true;

            match outcome {
                Outcome::Reloaded => {}
                Outcome::Saved { editing, result } => {
                    if let Some(id) = &editing {
                        self.in_flight.remove(id);
                    }
                    self.finish_save(result);
                }
                Outcome::StatusChanged { id, result } => {
                    self.in_flight.remove(&id);
                    match result {
                        Ok(task) => {
                            tracing::debug!("Status of {} settled as {}", task.id, task.status);
                        }
                        Err(message) => self.notice = Some(message),
                    }
                }
                Outcome::Deleted { id, result } => {
                    self.in_flight.remove(&id);
                    if let Err(e) = result {
                        self.notice = Some(format!("Failed to delete task: {e}"));
                    }
                }
            }
        }
        if changed {
            self.sync().await;
        }
    }

    fn finish_save(&mut self, result: std::result::Result<(), String>) {
        let form_waiting = matches!(&self.overlay, Overlay::Form(form) if form.saving);
        if !form_waiting {
            // The form was dismissed while saving
            if let Err(message) = result {
                self.notice = Some(message);
            }
            return;
        }

        match result {
            Ok(()) => self.overlay = Overlay::None,
            Err(message) => {
                if let Overlay::Form(form) = &mut self.overlay {
                    form.saving = false;
                    form.error = Some(message);
                }
            }
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let has_banner = self.snapshot.error.is_some() || self.notice.is_some();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(if has_banner { 1 } else { 0 }),
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.render_stats(frame, chunks[0]);
        self.render_filter_bar(frame, chunks[1]);
        if has_banner {
            self.render_banner(frame, chunks[2]);
        }
        match self.view {
            ViewMode::List => self.render_task_list(frame, chunks[3]),
            ViewMode::Kanban => self.render_kanban(frame, chunks[3]),
        }
        self.render_pagination(frame, chunks[4]);
        self.render_status_bar(frame, chunks[5]);

        match &self.overlay {
            Overlay::None => {}
            Overlay::Form(form) => Self::render_form(frame, form),
            Overlay::ConfirmDelete { title, .. } => Self::render_confirm_delete(frame, title),
            Overlay::MoveTo { task } => Self::render_move_to(frame, task),
            Overlay::Help => Self::render_help(frame),
        }
    }

    fn render_stats(&self, frame: &mut Frame, area: Rect) {
        let stats = self.snapshot.stats;
        let label = format!(
            "{}% done · {} tasks · {} not started · {} in progress · {} completed",
            stats.progress, stats.total, stats.not_started, stats.in_progress, stats.completed
        );

        let gauge = Gauge::default()
            .block(
                Block::default()
                    .title("Overall Progress")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .gauge_style(Style::default().fg(Color::Blue).bg(Color::Black))
            .percent(u16::from(stats.progress))
            .label(label);

        frame.render_widget(gauge, area);
    }

    fn render_filter_bar(&self, frame: &mut Frame, area: Rect) {
        let filters = [
            StatusFilter::All,
            StatusFilter::Only(TaskStatus::NotStarted),
            StatusFilter::Only(TaskStatus::InProgress),
            StatusFilter::Only(TaskStatus::Completed),
        ];

        let stats = self.snapshot.stats;
        let mut spans = vec![Span::styled("Filter: ", Style::default().fg(Color::Gray))];
        for (index, filter) in filters.iter().enumerate() {
            let count = filter
                .status()
                .map_or(stats.total, |status| stats.count_for(status));
            let text = format!(" {} {} ({count}) ", index + 1, filter.label());
            let style = if *filter == self.snapshot.filter {
                let color = filter.status().map_or(Color::Cyan, status_color);
                Style::default().fg(Color::Black).bg(color)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(text, style));
            spans.push(Span::raw(" "));
        }

        let view = match self.view {
            ViewMode::List => "  [list]",
            ViewMode::Kanban => "  [kanban]",
        };
        spans.push(Span::styled(view, Style::default().fg(Color::Gray)));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_banner(&self, frame: &mut Frame, area: Rect) {
        let message = self
            .notice
            .as_deref()
            .or(self.snapshot.error.as_deref())
            .unwrap_or_default();

        let paragraph = Paragraph::new(format!("✗ {message}  (Esc to dismiss)"))
            .style(Style::default().fg(Color::White).bg(Color::Red));
        frame.render_widget(paragraph, area);
    }

    fn task_title_line<'a>(&self, task: &'a Task) -> Line<'a> {
        let title_style = if task.is_completed() {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT)
        } else {
            Style::default()
        };

        let mut spans = vec![
            Span::styled(task.status.icon(), Style::default().fg(status_color(task.status))),
            Span::raw(" "),
            Span::styled(task.title.as_str(), title_style),
        ];
        if self.in_flight.contains(&task.id) {
            spans.push(Span::styled(" …", Style::default().fg(Color::DarkGray)));
        } else if !self.snapshot.filter.matches(task) {
            // Patched in place; the next reload drops it from this filter
            spans.push(Span::styled(
                " (leaves filter on refresh)",
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    }

    fn render_task_list(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!("Tasks ({})", self.snapshot.tasks.len());
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Green));

        if self.snapshot.tasks.is_empty() {
            let message = if self.snapshot.loading || self.pending_jobs > 0 {
                "Loading tasks..."
            } else if self.snapshot.filter == StatusFilter::All {
                "No tasks yet. Press n to create one."
            } else {
                "No tasks match this filter"
            };
            let paragraph = Paragraph::new(message)
                .block(block)
                .style(Style::default().fg(Color::Gray));
            frame.render_widget(paragraph, area);
            return;
        }

        let rows: Vec<Row> = self
            .snapshot
            .tasks
            .iter()
            .map(|task| {
                let mut title = vec![self.task_title_line(task)];
                if !task.description.is_empty() {
                    title.push(Line::styled(
                        format!("  {}", task.description),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                let height = title.len() as u16;

                Row::new(vec![
                    Cell::from(Text::from(title)),
                    Cell::from(task.status.label())
                        .style(Style::default().fg(status_color(task.status))),
                    Cell::from(task.time_since_updated())
                        .style(Style::default().fg(Color::DarkGray)),
                ])
                .height(height)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Min(20),    // Title column (flexible)
                Constraint::Length(12), // Status column
                Constraint::Length(16), // Updated column
            ],
        )
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("");

        self.table_state.select(Some(self.selected));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn render_kanban(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area);

        let board = self.snapshot.board();
        for (status, tasks) in board.columns() {
            let focused = status == self.current_column();
            let color = status_color(status);

            let block = Block::default()
                .title(format!(
                    "{} {} ({})",
                    status.icon(),
                    status.label(),
                    tasks.len()
                ))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(if focused {
                    Style::default().fg(color)
                } else {
                    Style::default().fg(Color::DarkGray)
                });

            let items: Vec<ListItem> = tasks
                .iter()
                .map(|task| ListItem::new(self.task_title_line(task)))
                .collect();

            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().bg(Color::DarkGray));

            let mut state = ListState::default();
            if focused && !tasks.is_empty() {
                state.select(Some(self.selected));
            }
            frame.render_stateful_widget(list, columns[status.column_index()], &mut state);
        }
    }

    fn render_pagination(&self, frame: &mut Frame, area: Rect) {
        let pagination = self.snapshot.pagination;

        let mut spans = Vec::new();
        match pagination.item_range() {
            Some((start, end)) => spans.push(Span::raw(format!(
                "Showing {start}-{end} of {} tasks   ",
                pagination.total
            ))),
            None => spans.push(Span::raw("No tasks   ")),
        }

        for item in pagination.page_window() {
            match item {
                PageItem::Page(page) if page == pagination.page => spans.push(Span::styled(
                    format!("[{page}]"),
                    Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                )),
                PageItem::Page(page) => spans.push(Span::raw(format!(" {page} "))),
                PageItem::Gap => spans.push(Span::styled(" … ", Style::default().fg(Color::DarkGray))),
            }
        }

        spans.push(Span::styled(
            format!("   per page: {}", pagination.limit),
            Style::default().fg(Color::Gray),
        ));
        if self.snapshot.loading {
            spans.push(Span::styled("   loading…", Style::default().fg(Color::Yellow)));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let help_text = match self.view {
            ViewMode::List => "j/k: navigate | n: new | e: edit | Space: advance | m: move to | d: delete | f: filter | [/]: page | v: kanban | ?: help | q: quit",
            ViewMode::Kanban => "h/l: column | j/k: navigate | n: new | Space: advance | m: move to | d: delete | f: filter | v: list | ?: help | q: quit",
        };

        let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
    }

    fn render_form(frame: &mut Frame, form: &TaskForm) {
        let area = Self::centered_rect(60, 40, frame.area());
        frame.render_widget(Clear, area);

        let title = match (&form.editing, form.saving) {
            (_, true) => "Saving...",
            (Some(_), false) => "Edit Task",
            (None, false) => "New Task",
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Yellow));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Min(1),
            ])
            .split(inner);

        form.title.render(frame, rows[0]);
        form.description.render(frame, rows[1]);

        if let Some(error) = &form.error {
            frame.render_widget(
                Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red)),
                rows[2],
            );
        }
        frame.render_widget(
            Paragraph::new("Tab: switch field | Enter: save | Esc: cancel")
                .style(Style::default().fg(Color::DarkGray)),
            rows[3],
        );
    }

    fn render_confirm_delete(frame: &mut Frame, title: &str) {
        let area = Self::centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);

        let paragraph = Paragraph::new(format!("Delete \"{title}\"?\n\ny: delete | n: keep"))
            .block(
                Block::default()
                    .title("Confirm")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_move_to(frame: &mut Frame, task: &Task) {
        let area = Self::centered_rect(40, 30, frame.area());
        frame.render_widget(Clear, area);

        let mut lines: Vec<Line> = TaskStatus::ALL
            .iter()
            .enumerate()
            .filter(|(_, status)| **status != task.status)
            .map(|(index, status)| {
                Line::from(vec![
                    Span::raw(format!("{} ", index + 1)),
                    Span::styled(status.icon(), Style::default().fg(status_color(*status))),
                    Span::raw(format!(" {}", status.label())),
                ])
            })
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::styled("Esc: cancel", Style::default().fg(Color::DarkGray)));

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(format!("Move \"{}\" to", task.title))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(status_color(task.status))),
        );
        frame.render_widget(paragraph, area);
    }

    fn render_help(frame: &mut Frame) {
        let area = Self::centered_rect(60, 70, frame.area());
        frame.render_widget(Clear, area);

        let lines = vec![
            Line::from("j/k, ↑/↓      select task"),
            Line::from("h/l, ←/→      select kanban column"),
            Line::from("v             toggle list / kanban"),
            Line::from("n             new task"),
            Line::from("e, Enter      edit selected task"),
            Line::from("Space, s      advance status"),
            Line::from("m, 1-3        move to a status"),
            Line::from("d             delete selected task"),
            Line::from("f, 1-4        change filter"),
            Line::from("[ ], PgUp/Dn  previous / next page"),
            Line::from("- +           page size"),
            Line::from("r             refresh"),
            Line::from("Esc           dismiss error"),
            Line::from("q             quit"),
        ];

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
        frame.render_widget(paragraph, area);
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(r);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::NotStarted => Color::Yellow,
        TaskStatus::InProgress => Color::Blue,
        TaskStatus::Completed => Color::Green,
    }
}

pub async fn run_tui(mut app: App) -> Result<()> {
    // Set up terminal
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app).await;

    // Cleanup
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    app.initialize();

    let mut event_handler = EventHandler::new();

    loop {
        terminal.draw(|frame| app.render(frame))?;

        // Returns a Tick at least every 100ms, so background results show up promptly
        let event = event_handler.next_event().await?;
        if app.handle_event(event).await? {
            break;
        }

        app.poll_outcomes().await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskDraft, TaskStats};
    use crate::ports::{ApiError, ApiResult, ListQuery, StatusChange, TaskApi, TaskPage};
    use async_trait::async_trait;
    use ratatui::backend::TestBackend;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// In-memory backend; list calls can be slowed down and status changes made to fail.
    #[derive(Default)]
    struct FakeApi {
        tasks: Mutex<Vec<Task>>,
        status_calls: Mutex<Vec<(TaskId, TaskStatus)>>,
        fail_status: bool,
        list_delay: Duration,
    }

    impl FakeApi {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            Self {
                tasks: Mutex::new(tasks),
                ..Default::default()
            }
        }
    }

    fn task(id: &str, title: &str, status: TaskStatus) -> Task {
        Task {
            id: TaskId::from(id),
            title: title.to_string(),
            description: String::new(),
            status,
            created_at: None,
            updated_at: None,
        }
    }

    fn not_found() -> ApiError {
        ApiError::Request {
            status: 404,
            message: "Task not found".to_string(),
        }
    }

    #[async_trait]
    impl TaskApi for FakeApi {
        async fn list_tasks(&self, query: &ListQuery) -> ApiResult<TaskPage> {
            if !self.list_delay.is_zero() {
                tokio::time::sleep(self.list_delay).await;
            }
            let tasks: Vec<Task> = self
                .tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| query.status.map_or(true, |s| t.status == s))
                .cloned()
                .collect();
            let total = tasks.len() as u32;
            Ok(TaskPage {
                stats: Some(TaskStats::from_tasks(&tasks)),
                tasks,
                total,
                current_page: 1,
                total_pages: u32::from(total > 0),
            })
        }

        async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
            let mut tasks = self.tasks.lock().unwrap();
            let created = task(&format!("new-{}", tasks.len()), draft.title(), draft.status());
            tasks.push(created.clone());
            Ok(created)
        }

        async fn update_task(&self, id: &TaskId, update: &TaskUpdate) -> ApiResult<Task> {
            let mut tasks = self.tasks.lock().unwrap();
            let found = tasks.iter_mut().find(|t| &t.id == id).ok_or_else(not_found)?;
            if let Some(title) = &update.title {
                found.title = title.clone();
            }
            Ok(found.clone())
        }

        async fn update_status(&self, id: &TaskId, status: TaskStatus) -> ApiResult<StatusChange> {
            self.status_calls.lock().unwrap().push((id.clone(), status));
            if self.fail_status {
                return Err(ApiError::Network("connection reset".to_string()));
            }
            let mut tasks = self.tasks.lock().unwrap();
            let found = tasks.iter_mut().find(|t| &t.id == id).ok_or_else(not_found)?;
            found.status = status;
            let updated = found.clone();
            Ok(StatusChange {
                task: updated,
                stats: TaskStats::from_tasks(&tasks),
            })
        }

        async fn delete_task(&self, id: &TaskId) -> ApiResult<String> {
            self.tasks.lock().unwrap().retain(|t| &t.id != id);
            Ok("Task deleted successfully".to_string())
        }
    }

    /// Wait until every spawned store call has reported back.
    async fn settle(app: &mut App) {
        for _ in 0..200 {
            app.poll_outcomes().await;
            if app.pending_jobs == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background jobs did not finish");
    }

    async fn app_with(api: Arc<FakeApi>) -> App {
        let store = Arc::new(TaskListStore::new(api, 10));
        let mut app = App::new(store);
        app.initialize();
        settle(&mut app).await;
        app
    }

    async fn press(app: &mut App, c: char) {
        app.handle_event(AppEvent::Character(c)).await.unwrap();
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, c).await;
        }
    }

    #[tokio::test]
    async fn test_create_task_through_form() {
        let mut app = app_with(Arc::new(FakeApi::default())).await;

        press(&mut app, 'n').await;
        type_text(&mut app, "Buy milk").await;
        app.handle_event(AppEvent::Enter).await.unwrap();
        assert!(matches!(&app.overlay, Overlay::Form(form) if form.saving));

        settle(&mut app).await;
        assert!(matches!(app.overlay, Overlay::None));
        assert_eq!(app.snapshot.tasks.len(), 1);
        assert_eq!(app.snapshot.tasks[0].title, "Buy milk");
        assert_eq!(app.snapshot.tasks[0].status, TaskStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_empty_title_keeps_form_open() {
        let mut app = app_with(Arc::new(FakeApi::default())).await;

        press(&mut app, 'n').await;
        type_text(&mut app, "   ").await;
        app.handle_event(AppEvent::Enter).await.unwrap();

        match &app.overlay {
            Overlay::Form(form) => {
                assert_eq!(form.error.as_deref(), Some("Title is required"));
                assert!(!form.saving);
            }
            _ => panic!("form should stay open"),
        }
        assert_eq!(app.pending_jobs, 0);
        assert!(app.snapshot.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_reload_does_not_block_input() {
        let api = Arc::new(FakeApi {
            list_delay: Duration::from_millis(300),
            ..FakeApi::with_tasks(vec![task("1", "Plan", TaskStatus::NotStarted)])
        });
        let mut app = app_with(api).await;

        let started = Instant::now();
        press(&mut app, 'r').await;
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(app.pending_jobs, 1);

        // once the request is underway a tick shows it as loading
        tokio::time::sleep(Duration::from_millis(50)).await;
        app.handle_event(AppEvent::Tick).await.unwrap();
        assert!(app.snapshot.loading);

        // keys still work while the request is outstanding
        press(&mut app, 'v').await;
        assert_eq!(app.view, ViewMode::Kanban);
        assert!(app.handle_event(AppEvent::Quit).await.unwrap());

        settle(&mut app).await;
        assert!(!app.snapshot.loading);
        assert_eq!(app.snapshot.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_advance_status_in_background() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(
            "1",
            "Write report",
            TaskStatus::NotStarted,
        )]));
        let mut app = app_with(api.clone()).await;

        press(&mut app, ' ').await;
        assert!(app.in_flight.contains(&TaskId::from("1")));

        // a second press while the first is outstanding is refused
        press(&mut app, ' ').await;
        assert!(app.notice.is_some());

        settle(&mut app).await;
        assert!(app.in_flight.is_empty());
        assert_eq!(app.snapshot.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(api.status_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_task_cannot_be_edited_or_deleted() {
        let api = Arc::new(FakeApi::with_tasks(vec![
            task("1", "Write report", TaskStatus::NotStarted),
            task("2", "Other", TaskStatus::NotStarted),
        ]));
        let mut app = app_with(api).await;

        press(&mut app, ' ').await;

        press(&mut app, 'd').await;
        assert!(matches!(app.overlay, Overlay::None));
        press(&mut app, 'e').await;
        assert!(matches!(app.overlay, Overlay::None));
        app.handle_event(AppEvent::Enter).await.unwrap();
        assert!(matches!(app.overlay, Overlay::None));
        press(&mut app, 'm').await;
        assert!(matches!(app.overlay, Overlay::None));
        assert_eq!(app.notice.as_deref(), Some("Still updating \"Write report\""));

        settle(&mut app).await;
        press(&mut app, 'd').await;
        assert!(matches!(app.overlay, Overlay::ConfirmDelete { .. }));
        press(&mut app, 'y').await;
        settle(&mut app).await;

        assert_eq!(app.snapshot.tasks.len(), 1);
        assert_eq!(app.snapshot.stats.total, 1);
    }

    #[tokio::test]
    async fn test_move_to_sets_status_directly() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(
            "1",
            "Ship",
            TaskStatus::Completed,
        )]));
        let mut app = app_with(api.clone()).await;

        press(&mut app, 'm').await;
        assert!(matches!(app.overlay, Overlay::MoveTo { .. }));

        // the current status is not offered
        press(&mut app, '3').await;
        assert!(matches!(app.overlay, Overlay::MoveTo { .. }));
        assert_eq!(app.pending_jobs, 0);

        press(&mut app, '2').await;
        assert!(matches!(app.overlay, Overlay::None));
        assert!(app.in_flight.contains(&TaskId::from("1")));

        settle(&mut app).await;
        assert_eq!(app.snapshot.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(
            *api.status_calls.lock().unwrap(),
            vec![(TaskId::from("1"), TaskStatus::InProgress)]
        );
    }

    #[tokio::test]
    async fn test_failed_status_change_shows_notice() {
        let api = Arc::new(FakeApi {
            fail_status: true,
            ..FakeApi::with_tasks(vec![task("1", "Write report", TaskStatus::NotStarted)])
        });
        let mut app = app_with(api).await;

        press(&mut app, ' ').await;
        settle(&mut app).await;

        assert!(app.notice.is_some());
        assert!(app.snapshot.error.is_some());
        assert_eq!(app.snapshot.tasks[0].status, TaskStatus::NotStarted);
        assert!(app.in_flight.is_empty());

        app.handle_event(AppEvent::Cancel).await.unwrap();
        assert!(app.notice.is_none());
        assert!(app.snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let api = Arc::new(FakeApi::with_tasks(vec![
            task("1", "Keep", TaskStatus::NotStarted),
            task("2", "Remove", TaskStatus::NotStarted),
        ]));
        let mut app = app_with(api).await;

        app.handle_event(AppEvent::Down).await.unwrap();
        press(&mut app, 'd').await;
        press(&mut app, 'n').await;
        settle(&mut app).await;
        assert_eq!(app.snapshot.tasks.len(), 2);

        press(&mut app, 'd').await;
        press(&mut app, 'y').await;
        settle(&mut app).await;
        assert_eq!(app.snapshot.tasks.len(), 1);
        assert_eq!(app.snapshot.tasks[0].title, "Keep");
    }

    #[tokio::test]
    async fn test_kanban_selection_follows_column() {
        let api = Arc::new(FakeApi::with_tasks(vec![
            task("1", "Plan", TaskStatus::NotStarted),
            task("2", "Build", TaskStatus::InProgress),
            task("3", "Ship", TaskStatus::Completed),
        ]));
        let mut app = app_with(api).await;

        press(&mut app, 'v').await;
        assert_eq!(app.view, ViewMode::Kanban);

        press(&mut app, 'l').await;
        assert_eq!(app.selected_task().unwrap().title, "Build");

        press(&mut app, 'l').await;
        assert_eq!(app.selected_task().unwrap().title, "Ship");
    }

    #[tokio::test]
    async fn test_filter_keys() {
        let api = Arc::new(FakeApi::with_tasks(vec![
            task("1", "Plan", TaskStatus::NotStarted),
            task("2", "Ship", TaskStatus::Completed),
        ]));
        let mut app = app_with(api).await;

        press(&mut app, '4').await;
        settle(&mut app).await;
        assert_eq!(app.snapshot.filter, StatusFilter::Only(TaskStatus::Completed));
        assert_eq!(app.snapshot.tasks.len(), 1);

        press(&mut app, 'f').await;
        settle(&mut app).await;
        assert_eq!(app.snapshot.filter, StatusFilter::All);
        assert_eq!(app.snapshot.tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_renders_overlays_in_both_views() {
        let api = Arc::new(FakeApi::with_tasks(vec![task(
            "1",
            "Plan",
            TaskStatus::NotStarted,
        )]));
        let mut app = app_with(api).await;
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();

        terminal.draw(|frame| app.render(frame)).unwrap();
        press(&mut app, 'm').await;
        terminal.draw(|frame| app.render(frame)).unwrap();
        app.handle_event(AppEvent::Cancel).await.unwrap();
        press(&mut app, 'v').await;
        press(&mut app, '?').await;
        terminal.draw(|frame| app.render(frame)).unwrap();
    }
}
