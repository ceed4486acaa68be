use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

/// Single line text input for the filter and column search prompts.
/// The cursor counts chars, not bytes.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.clear();
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, _) => self.cursor = (self.cursor + 1).min(self.char_len()),
            (KeyCode::Home, _) => self.cursor = 0,
            (KeyCode::End, _) => self.cursor = self.char_len(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.current_input.clear();
                self.cursor = 0;
            }
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_pos(self.cursor);
                self.current_input.insert(at, chr);
                self.cursor += 1;
            }
            _ => {}
        }
        self.get()
    }

    /// Start from an existing value with the cursor at its end.
    pub fn set(&mut self, s: &str) {
        self.clear();
        self.current_input = s.to_string();
        self.cursor = self.char_len();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            cursor: self.cursor,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.cursor = 0;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            let at = self.byte_pos(self.cursor - 1);
            self.current_input.remove(at);
            self.cursor -= 1;
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let at = self.byte_pos(self.cursor);
            self.current_input.remove(at);
        }
    }

    fn char_len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn byte_pos(&self, char_idx: usize) -> usize {
        self.current_input
            .char_indices()
            .nth(char_idx)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
