use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Quit,
    Cancel,

    // Navigation
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,

    // Input handling
    Character(char),
    Backspace,
    Enter,
    Tab,
    BackTab,

    // Other
    Tick,
}

pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new() -> Self {
        Self {
            tick_rate: Duration::from_millis(100),
        }
    }

    pub async fn next_event(&mut self) -> Result<AppEvent> {
        if event::poll(self.tick_rate)? {
            match event::read()? {
                Event::Key(key_event) if key_event.kind == KeyEventKind::Press => {
                    Ok(map_key_event(key_event))
                }
                _ => Ok(AppEvent::Tick),
            }
        } else {
            Ok(AppEvent::Tick)
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys become generic events; what a character means depends on what has focus.
pub fn map_key_event(key_event: KeyEvent) -> AppEvent {
    match key_event {
        KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => AppEvent::Quit,

        KeyEvent {
            code: KeyCode::Esc, ..
        } => AppEvent::Cancel,

        KeyEvent {
            code: KeyCode::Enter,
            ..
        } => AppEvent::Enter,

        KeyEvent {
            code: KeyCode::Tab, ..
        } => AppEvent::Tab,

        KeyEvent {
            code: KeyCode::BackTab,
            ..
        } => AppEvent::BackTab,

        KeyEvent {
            code: KeyCode::Backspace,
            ..
        } => AppEvent::Backspace,

        KeyEvent {
            code: KeyCode::Up, ..
        } => AppEvent::Up,

        KeyEvent {
            code: KeyCode::Down,
            ..
        } => AppEvent::Down,

        KeyEvent {
            code: KeyCode::Left,
            ..
        } => AppEvent::Left,

        KeyEvent {
            code: KeyCode::Right,
            ..
        } => AppEvent::Right,

        KeyEvent {
            code: KeyCode::PageUp,
            ..
        } => AppEvent::PageUp,

        KeyEvent {
            code: KeyCode::PageDown,
            ..
        } => AppEvent::PageDown,

        KeyEvent {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::NONE | KeyModifiers::SHIFT,
            ..
        } => AppEvent::Character(c),

        _ => AppEvent::Tick,
    }
}
