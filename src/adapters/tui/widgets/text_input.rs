use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

/// Single-line editable field used by the task form.
pub struct TextInput {
    label: &'static str,
    placeholder: &'static str,
    value: String,
    // Cursor position in chars, not bytes
    cursor_position: usize,
    is_focused: bool,
}

impl TextInput {
    pub fn new(label: &'static str, placeholder: &'static str) -> Self {
        Self {
            label,
            placeholder,
            value: String::new(),
            cursor_position: 0,
            is_focused: false,
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.set_value(value);
        self
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor_position = self.value.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_index = self.byte_index();
        self.value.insert(byte_index, c);
        self.cursor_position += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        self.cursor_position -= 1;
        let byte_index = self.byte_index();
        self.value.remove(byte_index);
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let border_style = if self.is_focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };

        let block = Block::default()
            .title(self.label)
            .borders(Borders::ALL)
            .border_style(border_style);

        let (text, text_style) = if self.value.is_empty() {
            (self.placeholder, Style::default().fg(Color::DarkGray))
        } else {
            (self.value.as_str(), Style::default())
        };

        frame.render_widget(Paragraph::new(text).block(block).style(text_style), area);

        if self.is_focused {
            let cursor_x = area.x + 1 + self.cursor_position as u16;
            let cursor_y = area.y + 1;

            if cursor_x < area.x + area.width.saturating_sub(1) {
                frame.set_cursor_position(ratatui::layout::Position {
                    x: cursor_x,
                    y: cursor_y,
                });
            }
        }
    }
}
