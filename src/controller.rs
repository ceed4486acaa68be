use std::time::Duration;
use tracing::trace;

use crate::domain::{AVConfig, AVError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, AVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                // crossterm also emits release and repeat events on Windows
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(Self::handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Char(' '), _) | (KeyCode::Enter, _) => Some(Message::ToggleMark),
            (KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Char('c'), _) => Some(Message::ColumnPicker),
            (KeyCode::Char('a'), _) => Some(Message::SelectAll),
            (KeyCode::Char('n'), _) => Some(Message::DeselectAll),
            (KeyCode::Char('p'), _) => Some(Message::PrintLabels),
            (KeyCode::Char(d @ '1'..='9'), _) => d.to_digit(10).map(|n| Message::Preset(n as usize - 1)),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
