use std::collections::BTreeSet;
use std::time::Instant;

use chrono::Local;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace, warn};

use crate::columns::{ColumnVisibility, Preset};
use crate::domain::{AVConfig, AVError, CMDMode, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::labels::{LabelSheetRenderer, write_label_sheets};
use crate::register::Register;
use crate::ui::{CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, MARK_WIDTH, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    COLUMNS,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

struct TableView {
    rows: Vec<usize>,            // Register rows left after filtering
    visible_columns: Vec<usize>, // Register column idx the picker left visible
    shown: Vec<(usize, usize)>,  // (register column idx, render width) that fit on screen
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize, // Index into visible_columns
    filter: String,
    marked: BTreeSet<usize>, // Register rows marked for printing
}

impl TableView {
    fn new(nrows: usize) -> Self {
        TableView {
            rows: (0..nrows).collect(),
            visible_columns: Vec::new(),
            shown: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            filter: String::new(),
            marked: BTreeSet::new(),
        }
    }

    fn abs_row(&self) -> usize {
        self.offset_row + self.curser_row
    }
}

/// A line of the column picker: a group header or a column checkbox.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerLine {
    Group {
        group_key: Option<String>,
        label: String,
        visible: usize,
        total: usize,
        expanded: bool,
    },
    Column {
        key: String,
        label: String,
        visible: bool,
    },
}

#[derive(Default)]
struct PickerView {
    cursor: usize,
    query: String,
    // query before the search prompt opened, restored on Esc
    saved_query: String,
    lines: Vec<PickerLine>,
}

#[derive(Clone, Debug, Default)]
pub struct PickerData {
    pub lines: Vec<PickerLine>,
    pub selected: usize,
    pub query: String,
    pub visible_count: usize,
    pub total: usize,
    pub can_select_all: bool,
    pub can_deselect_all: bool,
    pub presets: Vec<String>,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(MARK_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub marks: Vec<bool>,
    pub nrows: usize,
    pub total_rows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub marked_count: usize,
    pub filter: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub picker: Option<PickerData>,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            marks: Vec::new(),
            nrows: 0,
            total_rows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            marked_count: 0,
            filter: String::new(),
            show_popup: false,
            popup_message: String::new(),
            picker: None,
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: AVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    register: Register,
    columns: ColumnVisibility,
    presets: Vec<Preset>,
    table: TableView,
    picker: PickerView,
    uilayout: UILayout,
    uidata: UIData,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &AVConfig,
        register: Register,
        columns: ColumnVisibility,
        presets: Vec<Preset>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let nrows = register.nrows();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            register,
            columns,
            presets,
            table: TableView::new(nrows),
            picker: PickerView::default(),
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: format!("Loaded {nrows} assets. Press ? for help."),
        };
        model.update_table_data();
        model.update_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        debug!("Status: {}", self.status_message);
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.update_table_data();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), AVError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => self.select_row(usize::MAX),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::ToggleMark => self.toggle_mark(),
                    Message::Filter => self.enter_cmd_mode(CMDMode::FilterRows),
                    Message::ColumnPicker => self.open_picker(),
                    Message::PrintLabels => self.print_labels(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::COLUMNS => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_picker_selection(1),
                    Message::MoveUp => self.move_picker_selection(-1),
                    Message::MovePageDown => self.move_picker_selection(10),
                    Message::MovePageUp => self.move_picker_selection(-10),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::ToggleMark => self.picker_toggle(),
                    Message::SelectAll => self.select_all_columns(),
                    Message::DeselectAll => self.deselect_all_columns(),
                    Message::Preset(idx) => self.apply_preset(idx),
                    Message::Filter => self.enter_cmd_mode(CMDMode::SearchColumns),
                    Message::Help => self.show_help(),
                    Message::Exit | Message::ColumnPicker => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Table ---------------------- //

    fn column_width(&self, cidx: usize) -> usize {
        let label_len = self.columns.columns()[cidx].label.chars().count();
        let width = std::cmp::max(label_len, self.register.columns[cidx].max_width) + COLUMN_WIDTH_MARGIN;
        std::cmp::min(width, self.config.max_column_width)
    }

    fn update_table_data(&mut self) {
        let visible_columns: Vec<usize> = self
            .columns
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| self.columns.is_visible(&c.key))
            .map(|(cidx, _)| cidx)
            .collect();

        let table_width = self.uilayout.table_width;
        let mut shown = Vec::new();
        let mut used = 0;
        let offset_column = self
            .table
            .offset_column
            .min(visible_columns.len().saturating_sub(1));
        for &cidx in visible_columns.iter().skip(offset_column) {
            let width = self.column_width(cidx);
            if used + width + 1 <= table_width {
                shown.push((cidx, width));
                used += width + 1;
            } else {
                // Last, partially visible column
                if used < table_width {
                    shown.push((cidx, table_width - used));
                }
                break;
            }
        }

        let table = &mut self.table;
        table.visible_columns = visible_columns;
        table.offset_column = offset_column;
        table.shown = shown;
        table.curser_column = table.curser_column.min(table.shown.len().saturating_sub(1));

        // Keep the selected row inside the filtered rows and on screen
        let height = self.uilayout.table_height.max(1);
        let last = table.rows.len().saturating_sub(1);
        let abs = table.abs_row().min(last);
        if abs < table.offset_row || table.offset_row > last {
            table.offset_row = abs;
        } else if abs >= table.offset_row + height {
            table.offset_row = abs + 1 - height;
        }
        table.curser_row = abs - table.offset_row;
    }

    fn table_views(&self) -> (Vec<ColumnView>, Vec<bool>) {
        let table = &self.table;
        let rbegin = table.offset_row.min(table.rows.len());
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, table.rows.len());
        let rows = &table.rows[rbegin..rend];

        let views = table
            .shown
            .iter()
            .map(|&(cidx, width)| {
                let column = &self.register.columns[cidx];
                ColumnView {
                    name: Self::get_visible_name(&self.columns.columns()[cidx].label, width),
                    width,
                    data: rows.iter().map(|&r| column.data[r].clone()).collect(),
                }
            })
            .collect();
        let marks = rows.iter().map(|r| table.marked.contains(r)).collect();
        (views, marks)
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        if name.chars().count() > width {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            reduced
        } else {
            name.to_string()
        }
    }

    fn select_row(&mut self, abs: usize) {
        let table = &mut self.table;
        let last = table.rows.len().saturating_sub(1);
        let abs = abs.min(last);
        let height = self.uilayout.table_height.max(1);
        if abs < table.offset_row {
            table.offset_row = abs;
        } else if abs >= table.offset_row + height {
            table.offset_row = abs + 1 - height;
        }
        table.curser_row = abs - table.offset_row;
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let abs = self.table.abs_row().saturating_sub(size);
        self.select_row(abs);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let abs = self.table.abs_row().saturating_add(size);
        self.select_row(abs);
    }

    fn move_table_selection_left(&mut self) {
        let table = &mut self.table;
        if table.curser_column > 0 {
            table.curser_column -= 1;
        } else if table.offset_column > 0 {
            table.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let table = &mut self.table;
        if table.curser_column + 1 < table.shown.len() {
            table.curser_column += 1;
        } else if table.offset_column + table.shown.len() < table.visible_columns.len() {
            // At the end of the screen, shift the columns
            table.offset_column += 1;
            table.curser_column += 1;
        }
        self.update_table_data();
    }

    fn toggle_mark(&mut self) {
        let table = &mut self.table;
        let Some(&row) = table.rows.get(table.abs_row()) else {
            return;
        };
        if !table.marked.remove(&row) {
            table.marked.insert(row);
        }
        let marked = table.marked.len();
        self.set_status_message(format!("{marked} assets marked for printing"));
        self.move_table_selection_down(1);
    }

    fn filter(&mut self, term: &str) {
        let all: Vec<usize> = (0..self.register.nrows()).collect();
        self.table.rows = if term.is_empty() {
            all
        } else {
            self.register.matching_rows(term, &all)
        };
        self.table.filter = term.to_string();
        self.table.offset_row = 0;
        self.table.curser_row = 0;
        let found = self.table.rows.len();
        if term.is_empty() {
            self.set_status_message("Filter cleared");
        } else {
            self.set_status_message(format!("{found} assets match \"{term}\""));
        }
        self.update_table_data();
    }

    fn print_labels(&mut self) {
        let rows: Vec<usize> = if self.table.marked.is_empty() {
            self.table.rows.clone()
        } else {
            self.table.marked.iter().copied().collect()
        };
        let assets = self.register.label_assets(&rows);
        let renderer = LabelSheetRenderer::new(Local::now().date_naive())
            .company(self.config.company.clone())
            .qr_base_url(self.config.qr_base_url.clone())
            .title(format!("asset-labels-{}", self.register.name));

        match write_label_sheets(&assets, &renderer, &self.config.label_output) {
            Ok(summary) => {
                self.set_status_message(format!(
                    "Printed {} labels for {} assets on {} sheets to {}",
                    summary.labels,
                    summary.assets,
                    summary.pages,
                    self.config.label_output.display()
                ));
                self.table.marked.clear();
            }
            Err(e) => {
                warn!("Printing labels failed: {e}");
                self.set_status_message(format!("Printing labels failed: {e}"));
            }
        }
    }

    // -------------------- Column picker ---------------------- //

    fn open_picker(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::COLUMNS;
        self.picker.cursor = 0;
        self.rebuild_picker();
    }

    fn rebuild_picker(&mut self) {
        let filtered = self.columns.filter_columns(&self.picker.query);
        let buckets = self.columns.group_columns(&filtered);

        let mut lines = Vec::new();
        for bucket in buckets.iter() {
            lines.push(PickerLine::Group {
                group_key: bucket.group.map(|g| g.group_key.clone()),
                label: bucket.label().to_string(),
                visible: bucket
                    .columns
                    .iter()
                    .filter(|c| self.columns.is_visible(&c.key))
                    .count(),
                total: bucket.columns.len(),
                expanded: bucket.expanded,
            });
            if bucket.expanded {
                lines.extend(bucket.columns.iter().map(|c| PickerLine::Column {
                    key: c.key.clone(),
                    label: c.label.clone(),
                    visible: self.columns.is_visible(&c.key),
                }));
            }
        }
        self.picker.cursor = self.picker.cursor.min(lines.len().saturating_sub(1));
        self.picker.lines = lines;
    }

    fn move_picker_selection(&mut self, step: i32) {
        let last = self.picker.lines.len().saturating_sub(1);
        let cursor = self.picker.cursor as i64 + step as i64;
        self.picker.cursor = cursor.clamp(0, last as i64) as usize;
    }

    fn picker_toggle(&mut self) {
        match self.picker.lines.get(self.picker.cursor).cloned() {
            Some(PickerLine::Group {
                group_key: Some(group_key),
                ..
            }) => self.columns.toggle_group(&group_key),
            Some(PickerLine::Column { key, .. }) => {
                self.columns.toggle(&key);
                self.update_table_data();
            }
            _ => {}
        }
        self.rebuild_picker();
    }

    fn select_all_columns(&mut self) {
        if !self.columns.can_select_all() {
            self.set_status_message("All columns are already visible");
            return;
        }
        self.columns.select_all();
        self.after_visibility_change();
    }

    fn deselect_all_columns(&mut self) {
        if !self.columns.can_deselect_all() {
            self.set_status_message("All columns are already hidden");
            return;
        }
        self.columns.deselect_all();
        self.after_visibility_change();
    }

    fn apply_preset(&mut self, idx: usize) {
        let Some(preset) = self.presets.get(idx) else {
            trace!("No preset #{idx}");
            return;
        };
        self.columns.apply(preset);
        let label = preset.label.clone();
        self.after_visibility_change();
        info!("Applied column preset {label}");
        self.set_status_message(format!("Preset \"{label}\" applied"));
    }

    fn after_visibility_change(&mut self) {
        let visible = self.columns.visible_count();
        let total = self.columns.columns().len();
        self.set_status_message(format!("{visible}/{total} columns visible"));
        self.update_table_data();
        self.rebuild_picker();
    }

    // -------------------- Modus handling ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                if !self.table.filter.is_empty() {
                    self.filter("");
                }
            }
            Modus::COLUMNS => {
                self.previous_modus = Modus::COLUMNS;
                self.modus = Modus::TABLE;
                self.update_table_data();
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?}");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        match mode {
            CMDMode::FilterRows => self.input.set(&self.table.filter),
            CMDMode::SearchColumns => {
                self.picker.saved_query = self.picker.query.clone();
                self.input.set(&self.picker.query);
            }
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.cmd_mode == Some(CMDMode::SearchColumns) {
            // Column search narrows the picker while typing
            self.picker.query = self.last_input.input.clone();
            self.rebuild_picker();
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(CMDMode::FilterRows) if !self.last_input.canceled => self.filter(&cmd_input),
            Some(CMDMode::FilterRows) => {}
            Some(CMDMode::SearchColumns) => {
                if self.last_input.canceled {
                    self.picker.query = std::mem::take(&mut self.picker.saved_query);
                }
                self.picker.cursor = 0;
                self.rebuild_picker();
            }
            None => info!("Cmd mode is none!"),
        }
        self.cmd_mode = None;
        self.input.clear();
    }

    fn show_picker(&self) -> bool {
        self.modus == Modus::COLUMNS
            || (self.modus == Modus::CMDINPUT && self.previous_modus == Modus::COLUMNS)
            || (self.modus == Modus::POPUP && self.previous_modus == Modus::COLUMNS)
    }

    fn update_uidata(&mut self) {
        let (table, marks) = self.table_views();
        let picker = self.show_picker().then(|| PickerData {
            lines: self.picker.lines.clone(),
            selected: self.picker.cursor,
            query: self.picker.query.clone(),
            visible_count: self.columns.visible_count(),
            total: self.columns.columns().len(),
            can_select_all: self.columns.can_select_all(),
            can_deselect_all: self.columns.can_deselect_all(),
            presets: self.presets.iter().map(|p| p.label.clone()).collect(),
        });
        let t = &self.table;
        self.uidata = UIData {
            name: self.register.name.clone(),
            table,
            marks,
            nrows: t.rows.len(),
            total_rows: self.register.nrows(),
            selected_row: t.curser_row,
            selected_column: t.curser_column,
            abs_selected_row: t.abs_row(),
            marked_count: t.marked.len(),
            filter: t.filter.clone(),
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            picker,
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::columns::VISIBILITY_STORAGE_KEY;
    use crate::register::Column;
    use crate::storage::MemoryStore;
    use ratatui::crossterm::event::KeyCode;

    fn col(name: &str, values: &[&str]) -> Column {
        Column::new(name, values.iter().map(|s| s.to_string()).collect())
    }

    fn model_with(config: AVConfig, persisted: Option<&str>) -> Model {
        let register = Register::from_columns(
            "assets.csv",
            vec![
                col("id", &["a1", "a2", "a3"]),
                col("name", &["Drill", "Ladder", "Mixer"]),
                col("departmentName", &["Site A", "Site B", "Site A"]),
                col("quantity", &["2", "1", "3"]),
                col("notes", &["", "", "old"]),
            ],
        );
        let store = match persisted {
            Some(raw) => MemoryStore::with_entry(VISIBILITY_STORAGE_KEY, raw),
            None => MemoryStore::new(),
        };
        let columns = ColumnVisibility::new(register.definitions(), catalog::groups(), Box::new(store));
        Model::init(&config, register, columns, catalog::presets(), 120, 20)
    }

    fn model() -> Model {
        model_with(AVConfig::default(), None)
    }

    fn header(m: &Model) -> Vec<String> {
        m.get_uidata().table.iter().map(|c| c.name.clone()).collect()
    }

    fn send(m: &mut Model, msg: Message) {
        m.update(Some(msg)).unwrap();
    }

    fn type_keys(m: &mut Model, s: &str) {
        for c in s.chars() {
            send(m, Message::RawKey(KeyEvent::from(KeyCode::Char(c))));
        }
    }

    #[test]
    fn table_shows_only_visible_columns() {
        let m = model_with(AVConfig::default(), Some(r#"{"notes": false, "id": false}"#));
        assert_eq!(header(&m), vec!["Asset name", "Department", "Quantity"]);
        assert_eq!(m.get_uidata().nrows, 3);
    }

    #[test]
    fn preset_from_picker_updates_table() {
        let mut m = model();
        send(&mut m, Message::ColumnPicker);
        assert!(m.get_uidata().picker.is_some());

        // Preset 4 is "Compact"
        send(&mut m, Message::Preset(3));
        assert_eq!(header(&m), vec!["Asset name", "Department"]);
        let picker = m.get_uidata().picker.as_ref().unwrap();
        assert_eq!(picker.visible_count, 2);

        send(&mut m, Message::Exit);
        assert!(m.get_uidata().picker.is_none());
        assert_eq!(header(&m), vec!["Asset name", "Department"]);
    }

    #[test]
    fn picker_toggles_column_and_collapses_group() {
        let mut m = model();
        send(&mut m, Message::ColumnPicker);
        let lines = m.get_uidata().picker.as_ref().unwrap().lines.clone();
        assert!(matches!(&lines[0], PickerLine::Group { label, .. } if label == "Identification"));
        assert!(matches!(&lines[1], PickerLine::Column { key, .. } if key == "id"));

        // Hide "id"
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::ToggleMark);
        assert!(!header(&m).contains(&"Asset ID".to_string()));

        // Collapse "Identification"
        send(&mut m, Message::MoveUp);
        send(&mut m, Message::ToggleMark);
        let lines = &m.get_uidata().picker.as_ref().unwrap().lines;
        assert!(matches!(&lines[0], PickerLine::Group { expanded: false, visible: 1, total: 2, .. }));
        assert!(matches!(&lines[1], PickerLine::Group { label, .. } if label == "Location"));
    }

    #[test]
    fn select_all_is_refused_when_everything_is_visible() {
        let mut m = model();
        send(&mut m, Message::ColumnPicker);
        let picker = m.get_uidata().picker.as_ref().unwrap();
        assert!(!picker.can_select_all);
        send(&mut m, Message::SelectAll);
        assert_eq!(m.get_uidata().status_message, "All columns are already visible");

        send(&mut m, Message::DeselectAll);
        assert!(header(&m).is_empty());
        send(&mut m, Message::DeselectAll);
        assert_eq!(m.get_uidata().status_message, "All columns are already hidden");
        send(&mut m, Message::SelectAll);
        assert_eq!(header(&m).len(), 5);
    }

    #[test]
    fn column_search_narrows_picker_while_typing() {
        let mut m = model();
        send(&mut m, Message::ColumnPicker);
        send(&mut m, Message::Filter);
        assert!(m.raw_keyevents());
        type_keys(&mut m, "DEPART");

        let lines = &m.get_uidata().picker.as_ref().unwrap().lines;
        assert_eq!(lines.len(), 2);
        assert!(matches!(&lines[1], PickerLine::Column { key, .. } if key == "departmentName"));

        send(&mut m, Message::RawKey(KeyEvent::from(KeyCode::Enter)));
        assert!(!m.raw_keyevents());
        assert_eq!(m.get_uidata().picker.as_ref().unwrap().query, "DEPART");
    }

    #[test]
    fn escape_in_column_search_keeps_previous_query() {
        let mut m = model();
        send(&mut m, Message::ColumnPicker);
        send(&mut m, Message::Filter);
        type_keys(&mut m, "name");
        send(&mut m, Message::RawKey(KeyEvent::from(KeyCode::Enter)));

        send(&mut m, Message::Filter);
        type_keys(&mut m, "x");
        assert_eq!(m.get_uidata().picker.as_ref().unwrap().query, "namex");
        send(&mut m, Message::RawKey(KeyEvent::from(KeyCode::Esc)));

        assert!(!m.raw_keyevents());
        let picker = m.get_uidata().picker.as_ref().unwrap();
        assert_eq!(picker.query, "name");
        assert!(
            picker
                .lines
                .iter()
                .any(|l| matches!(l, PickerLine::Column { key, .. } if key == "name"))
        );
    }

    #[test]
    fn filter_rows_and_clear_with_escape() {
        let mut m = model();
        send(&mut m, Message::Filter);
        type_keys(&mut m, "site a");
        send(&mut m, Message::RawKey(KeyEvent::from(KeyCode::Enter)));
        assert_eq!(m.get_uidata().nrows, 2);
        assert_eq!(m.get_uidata().table[1].data, vec!["Drill", "Mixer"]);

        send(&mut m, Message::Exit);
        assert_eq!(m.get_uidata().nrows, 3);
    }

    #[test]
    fn cursor_stays_inside_rows() {
        let mut m = model();
        send(&mut m, Message::MoveEnd);
        assert_eq!(m.get_uidata().abs_selected_row, 2);
        send(&mut m, Message::MoveDown);
        assert_eq!(m.get_uidata().abs_selected_row, 2);
        send(&mut m, Message::MovePageUp);
        assert_eq!(m.get_uidata().abs_selected_row, 0);
    }

    #[test]
    fn narrow_screen_scrolls_columns() {
        let mut m = model();
        send(&mut m, Message::Resize(30, 20));
        let first = header(&m)[0].clone();
        for _ in 0..10 {
            send(&mut m, Message::MoveRight);
        }
        assert_ne!(header(&m)[0], first);
        // "notes" is the last register column, cut to the remaining width
        assert_eq!(m.table.shown.last().map(|&(cidx, _)| cidx), Some(4));
        assert_eq!(header(&m).last().unwrap(), "N...");
    }

    #[test]
    fn print_marked_rows_writes_label_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("labels.html");
        let config = AVConfig::default().label_output(output.clone()).company("Acme");
        let mut m = model_with(config, None);

        // Mark "Drill" (2) and "Mixer" (3)
        send(&mut m, Message::ToggleMark);
        send(&mut m, Message::MoveDown);
        send(&mut m, Message::ToggleMark);
        assert_eq!(m.get_uidata().marked_count, 2);

        send(&mut m, Message::PrintLabels);
        assert!(m.get_uidata().status_message.starts_with("Printed 5 labels for 2 assets on 1 sheets"));
        assert_eq!(m.get_uidata().marked_count, 0);

        let html = std::fs::read_to_string(&output).unwrap();
        assert_eq!(html.matches("data-asset=\"a3\"").count(), 3);
        assert!(!html.contains("Ladder"));
    }

    #[test]
    fn print_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = AVConfig::default().label_output(dir.path().join("no").join("labels.html"));
        let mut m = model_with(config, None);
        send(&mut m, Message::PrintLabels);
        assert!(m.get_uidata().status_message.starts_with("Printing labels failed"));
        assert_eq!(m.status, Status::READY);
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut m = model();
        send(&mut m, Message::Help);
        assert!(m.get_uidata().show_popup);
        send(&mut m, Message::Exit);
        assert!(!m.get_uidata().show_popup);
        send(&mut m, Message::Quit);
        assert_eq!(m.status, Status::QUITTING);
    }
}
