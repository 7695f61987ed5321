use tracing::trace;

use crate::table::Table;

pub const COLUMN_WIDTH_MARGIN: usize = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// The first rows of the loaded table, with a row cursor and a scroll window.
#[derive(Debug, Default)]
pub struct Preview {
    columns: Vec<ColumnView>,
    nrows: usize,
    curser_row: usize, // Absolute row inside the preview
    offset_row: usize,
    offset_column: usize,
    height: usize,
}

impl Preview {
    pub fn empty() -> Self {
        Preview::default()
    }

    /// Copies at most `limit` rows of every column. Widths are capped at `max_column_width`.
    pub fn from_table(table: &Table, limit: usize, max_column_width: usize) -> Self {
        let nrows = table.nrows().min(limit);
        let columns = table
            .columns()
            .iter()
            .map(|c| {
                let data: Vec<String> = c.display[..nrows].to_vec();
                let max_width = data.iter().map(|d| d.chars().count()).max().unwrap_or(0);
                let width = (c.name.chars().count().max(max_width) + COLUMN_WIDTH_MARGIN)
                    .min(max_column_width);
                ColumnView {
                    name: c.name.clone(),
                    width,
                    data,
                }
            })
            .collect();
        trace!("Preview of {} rows from {}", nrows, table.name());

        Preview {
            columns,
            nrows,
            ..Preview::default()
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn selected_row(&self) -> usize {
        self.curser_row
    }

    pub fn offset_row(&self) -> usize {
        self.offset_row
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
        self.scroll_to_cursor();
    }

    /// Columns starting at the horizontal offset that fit into `width`, rows limited to the
    /// current window. The last column may be cut to the remaining width.
    pub fn visible_columns(&self, width: usize) -> Vec<ColumnView> {
        let rbegin = self.offset_row.min(self.nrows);
        let rend = (rbegin + self.height.max(1)).min(self.nrows);

        let mut visible = Vec::new();
        let mut used = 0;
        for column in self.columns.iter().skip(self.offset_column) {
            if used >= width {
                break;
            }
            let render_width = column.width.min(width - used);
            visible.push(ColumnView {
                name: Preview::get_visible_name(&column.name, render_width),
                width: render_width,
                data: column.data[rbegin..rend].to_vec(),
            });
            used += render_width + 1; // one spacer character
        }
        visible
    }

    pub fn selected_cell(&self) -> Option<&str> {
        self.columns
            .get(self.offset_column)
            .and_then(|c| c.data.get(self.curser_row))
            .map(String::as_str)
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        let len = name.chars().count();
        if len <= width {
            name.to_string()
        } else if width < 3 {
            name.chars().take(width).collect()
        } else {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            reduced
        }
    }

    fn scroll_to_cursor(&mut self) {
        let height = self.page();
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }
    }

    pub fn move_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
        self.scroll_to_cursor();
    }

    pub fn move_down(&mut self, size: usize) {
        if self.nrows > 0 {
            self.curser_row = self.curser_row.saturating_add(size).min(self.nrows - 1);
            self.scroll_to_cursor();
        }
    }

    pub fn move_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
    }

    pub fn move_end(&mut self) {
        self.curser_row = self.nrows.saturating_sub(1);
        self.scroll_to_cursor();
    }

    pub fn move_left(&mut self) {
        self.offset_column = self.offset_column.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.offset_column + 1 < self.columns.len() {
            self.offset_column += 1;
        }
    }

    pub fn page(&self) -> usize {
        self.height.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PREVIEW_ROW_LIMIT;
    use crate::table::tests::load_fixture;

    #[test]
    fn preview_is_capped_at_limit() {
        let table = load_fixture("wide.csv");
        assert_eq!(table.nrows(), 150);
        let preview = Preview::from_table(&table, PREVIEW_ROW_LIMIT, 30);
        assert_eq!(preview.nrows(), PREVIEW_ROW_LIMIT);
    }

    #[test]
    fn small_table_is_shown_completely() {
        let table = load_fixture("example.csv");
        let preview = Preview::from_table(&table, PREVIEW_ROW_LIMIT, 30);
        assert_eq!(preview.nrows(), 5);
        let names: Vec<String> = preview
            .visible_columns(100)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn short_headers_survive_narrow_columns() {
        let table = load_fixture("example.csv");
        let preview = Preview::from_table(&table, PREVIEW_ROW_LIMIT, 30);
        let visible = preview.visible_columns(100);
        let headers: Vec<(&str, usize)> =
            visible.iter().map(|c| (c.name.as_str(), c.width)).collect();
        assert_eq!(headers, vec![("a", 2), ("b", 3), ("c", 2)]);
    }

    #[test]
    fn window_follows_cursor() {
        let table = load_fixture("wide.csv");
        let mut preview = Preview::from_table(&table, PREVIEW_ROW_LIMIT, 30);
        preview.set_height(10);

        preview.move_down(15);
        assert_eq!(preview.selected_row(), 15);
        assert_eq!(preview.offset_row(), 6);

        preview.move_end();
        assert_eq!(preview.selected_row(), 99);
        assert_eq!(preview.offset_row(), 90);
        let visible = preview.visible_columns(200);
        assert_eq!(visible[0].data.len(), 10);
        assert_eq!(visible[0].data[9], "99");

        preview.move_up(200);
        assert_eq!(preview.selected_row(), 0);
        assert_eq!(preview.offset_row(), 0);
    }

    #[test]
    fn narrow_view_cuts_columns() {
        let table = load_fixture("example.csv");
        let mut preview = Preview::from_table(&table, PREVIEW_ROW_LIMIT, 30);
        preview.set_height(5);
        let visible = preview.visible_columns(4);
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[1].width, 1);

        preview.move_right();
        assert_eq!(preview.visible_columns(100)[0].name, "b");
        assert_eq!(preview.selected_cell(), Some("10"));
    }

    #[test]
    fn long_names_are_shortened() {
        assert_eq!(Preview::get_visible_name("temperature", 7), "temp...");
        assert_eq!(Preview::get_visible_name("temp", 7), "temp");
        assert_eq!(Preview::get_visible_name("temp", 2), "te");
        assert_eq!(Preview::get_visible_name("a", 1), "a");
    }
}
