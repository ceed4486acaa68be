use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::{AVConfig, CMDMode};
use crate::model::{PickerData, PickerLine, UIData};

pub const CMDLINE_HEIGH: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const MARK_WIDTH: usize = 2;

const MARK_SYMBOL: &str = "● ";
const SELECTED_STYLE: Style = Style::new().bg(Color::DarkGray).add_modifier(Modifier::BOLD);
const HEADER_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

#[derive(Debug)]
pub struct TableUI {
    picker_state: ListState,
}

impl TableUI {
    pub fn new(_cfg: &AVConfig) -> Self {
        Self {
            picker_state: ListState::default(),
        }
    }

    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        let [table_area, status_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(CMDLINE_HEIGH as u16)])
                .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        self.draw_statusline(uidata, frame, status_area);

        if let Some(picker) = &uidata.picker {
            self.draw_picker(picker, frame, table_area);
        }
        if uidata.show_popup {
            Self::draw_popup(&uidata.popup_message, frame, table_area);
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.table.is_empty() {
            let msg = Paragraph::new("No columns selected, press c to choose columns.")
                .style(Style::new().fg(Color::DarkGray))
                .centered();
            frame.render_widget(msg, area);
            return;
        }

        let mut widths = vec![Constraint::Length(MARK_WIDTH as u16)];
        widths.extend(uidata.table.iter().map(|c| Constraint::Length(c.width as u16)));

        let header = Row::new(
            std::iter::once(Cell::from(""))
                .chain(uidata.table.iter().map(|c| Cell::from(c.name.clone()))),
        )
        .style(HEADER_STYLE);

        let nrows = uidata.table[0].data.len();
        let rows = (0..nrows).map(|r| {
            let mark = if uidata.marks.get(r).copied().unwrap_or(false) {
                MARK_SYMBOL
            } else {
                ""
            };
            let cells = std::iter::once(Cell::from(mark).fg(Color::Green)).chain(
                uidata.table.iter().enumerate().map(|(cidx, c)| {
                    let cell = Cell::from(c.data[r].clone());
                    if r == uidata.selected_row && cidx == uidata.selected_column {
                        cell.reversed()
                    } else {
                        cell
                    }
                }),
            );
            Row::new(cells)
        });

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(SELECTED_STYLE);
        let mut state = TableState::default().with_selected(Some(uidata.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let line = if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::FilterRows) => "filter: ",
                Some(CMDMode::SearchColumns) => "columns: ",
                None => "> ",
            };
            frame.set_cursor_position((
                area.x + (prompt.len() + uidata.cmdinput.cursor) as u16,
                area.y,
            ));
            Line::from(vec![prompt.bold(), Span::raw(uidata.cmdinput.input.clone())])
        } else {
            let mut position = format!(
                " {} | {}/{}",
                uidata.name,
                if uidata.nrows == 0 { 0 } else { uidata.abs_selected_row + 1 },
                uidata.nrows
            );
            if uidata.nrows != uidata.total_rows {
                position.push_str(&format!(" (of {})", uidata.total_rows));
            }
            if uidata.marked_count > 0 {
                position.push_str(&format!(" | {} marked", uidata.marked_count));
            }
            Line::from(vec![
                position.black().on_yellow(),
                Span::raw(" "),
                Span::raw(uidata.status_message.clone()),
            ])
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_picker(&mut self, picker: &PickerData, frame: &mut Frame, area: Rect) {
        let popup = centered(area, 60, 80);
        frame.render_widget(Clear, popup);

        let title = format!(" Columns {}/{} ", picker.visible_count, picker.total);
        let block = Block::bordered().title(title.bold()).title_bottom(Self::picker_hints(picker));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let [search_area, list_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(inner);
        let search = if picker.query.is_empty() {
            Line::from("/ to search".dark_gray())
        } else {
            Line::from(vec!["search: ".bold(), Span::raw(picker.query.clone())])
        };
        frame.render_widget(Paragraph::new(search), search_area);

        let items: Vec<ListItem> = picker
            .lines
            .iter()
            .map(|line| match line {
                PickerLine::Group {
                    label,
                    visible,
                    total,
                    expanded,
                    ..
                } => {
                    let arrow = if *expanded { "▾" } else { "▸" };
                    ListItem::new(Line::from(vec![
                        format!("{arrow} {label} ").bold(),
                        format!("{visible}/{total}").dark_gray(),
                    ]))
                }
                PickerLine::Column {
                    key,
                    label,
                    visible,
                } => {
                    let check = if *visible { "[x]" } else { "[ ]" };
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("   {check} {label} ")),
                        format!("({key})").dark_gray(),
                    ]))
                }
            })
            .collect();

        if items.is_empty() {
            frame.render_widget(Paragraph::new("No matching columns".dark_gray()), list_area);
            return;
        }
        self.picker_state.select(Some(picker.selected));
        let list = List::new(items).highlight_style(SELECTED_STYLE);
        frame.render_stateful_widget(list, list_area, &mut self.picker_state);
    }

    fn picker_hints(picker: &PickerData) -> Line<'static> {
        let enabled = |s: String, on: bool| {
            if on {
                Span::raw(s)
            } else {
                Span::styled(s, Style::new().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT))
            }
        };
        let mut spans = vec![
            enabled(" a: all ".to_string(), picker.can_select_all),
            enabled(" n: none ".to_string(), picker.can_deselect_all),
        ];
        spans.extend(
            picker
                .presets
                .iter()
                .take(9)
                .enumerate()
                .map(|(i, label)| Span::raw(format!(" {}: {label} ", i + 1)).blue()),
        );
        Line::from(spans)
    }

    fn draw_popup(message: &str, frame: &mut Frame, area: Rect) {
        let popup = centered(area, 70, 80);
        frame.render_widget(Clear, popup);
        let block = Block::bordered()
            .title(" Help ".bold())
            .title_bottom(Line::from(" <Esc> close ".blue()).centered());
        frame.render_widget(
            Paragraph::new(message.to_string())
                .block(block)
                .wrap(Wrap { trim: false }),
            popup,
        );
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    // u32 math, u16 overflows for terminals wider than ~800 cells
    let scale = |len: u16, percent: u16| (u32::from(len) * u32::from(percent.min(100)) / 100) as u16;
    let width = scale(area.width, percent_x);
    let height = scale(area.height, percent_y);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_stays_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered(area, 60, 80);
        assert_eq!(popup, Rect::new(20, 4, 60, 32));
        assert!(area.contains(popup.as_position()));
    }

    #[test]
    fn centered_rect_on_huge_terminal() {
        let area = Rect::new(0, 0, 1000, 300);
        assert_eq!(centered(area, 70, 80), Rect::new(150, 30, 700, 240));

        let max = Rect::new(0, 0, u16::MAX, u16::MAX);
        let popup = centered(max, 60, 150);
        assert_eq!(popup.width, 39321);
        assert_eq!(popup.height, u16::MAX);
        assert_eq!(popup.y, 0);
    }
}
