use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tabcompare_common::{CellValue, TabCompareError};
use tracing::debug;

/// Where a dataset was loaded from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub path: PathBuf,
    /// 1-based sheet index
    pub sheet_index: usize,
    pub sheet_name: String,
}

/// One loaded sheet: ordered columns and ordered rows of typed cells
///
/// Rows are stored positionally against `columns`, so every row carries
/// exactly one value per column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularDataset {
    source: DatasetSource,
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularDataset {
    /// Build a dataset, checking that column names are unique and every row
    /// matches the column count
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, TabCompareError> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(TabCompareError::Format(format!(
                "duplicate column name '{}'",
                duplicate
            )));
        }

        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(TabCompareError::Format(format!(
                "row {} has {} cells, expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self {
            source: DatasetSource::default(),
            columns,
            rows,
        })
    }

    pub(crate) fn from_parts(
        source: DatasetSource,
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        Self {
            source,
            columns,
            rows,
        }
    }

    pub fn with_source(mut self, source: DatasetSource) -> Self {
        self.source = source;
        self
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        self.rows.get(index).map(|cells| RowView {
            columns: &self.columns,
            cells,
        })
    }

    /// Value of `column` in row `index`
    pub fn value(&self, index: usize, column: &str) -> Option<&CellValue> {
        self.row(index).and_then(|row| row.get(column))
    }

    pub(crate) fn into_parts(self) -> (DatasetSource, Vec<String>, Vec<Vec<CellValue>>) {
        (self.source, self.columns, self.rows)
    }
}

/// Name-keyed view of one row
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    cells: &'a [CellValue],
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.cells[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> + 'a {
        self.columns
            .iter()
            .map(|c| c.as_str())
            .zip(self.cells.iter())
    }

    pub fn cells(&self) -> &'a [CellValue] {
        self.cells
    }
}

/// A file and the 1-based sheet to read from it
///
/// The index is signed so that out-of-range requests, negative ones
/// included, are rejected as `Range` errors by the loader.
#[derive(Debug, Clone, Copy)]
pub struct SheetRef<'a> {
    pub path: &'a Path,
    pub sheet_index: i64,
}

impl<'a> SheetRef<'a> {
    pub fn new(path: &'a Path, sheet_index: i64) -> Self {
        Self { path, sheet_index }
    }
}

/// Loads and validates spreadsheet sheets and CSV files
pub struct DatasetLoader {
    accepted_extensions: Vec<String>,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            accepted_extensions: ["xlsx", "xlsm", "xlsb", "xls", "ods", "csv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }

    pub fn with_accepted_extensions(mut self, extensions: Vec<String>) -> Self {
        self.accepted_extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Validate both inputs of a comparison, one check at a time across both
    ///
    /// Existence of both files is checked before either is parsed, both are
    /// parsed before sheet ranges are checked, and so on. Either selected sheet
    /// being empty rejects the pair.
    pub fn validate_pair(
        &self,
        first: SheetRef<'_>,
        second: SheetRef<'_>,
    ) -> Result<(), TabCompareError> {
        ensure_file(first.path)?;
        ensure_file(second.path)?;

        let mut first_book = self.open(first.path)?;
        let mut second_book = self.open(second.path)?;

        let first_sheet = first_book.check_range(first.sheet_index)?;
        let second_sheet = second_book.check_range(second.sheet_index)?;

        let first_grid = first_book.read_sheet(first_sheet)?;
        let second_grid = second_book.read_sheet(second_sheet)?;
        first_grid.ensure_data()?;
        second_grid.ensure_data()?;

        debug!(
            "Validated {} (sheet {}) and {} (sheet {})",
            first.path.display(),
            first.sheet_index,
            second.path.display(),
            second.sheet_index
        );
        Ok(())
    }

    /// Load one sheet; `sheet_index` is 1-based
    pub fn load(&self, path: &Path, sheet_index: i64) -> Result<TabularDataset, TabCompareError> {
        ensure_file(path)?;
        let mut book = self.open(path)?;
        let sheet_index = book.check_range(sheet_index)?;
        let grid = book.read_sheet(sheet_index)?;
        grid.ensure_data()?;

        let dataset = grid.into_dataset(path, sheet_index);
        debug!(
            "Loaded {} rows x {} columns from {} (sheet {})",
            dataset.row_count(),
            dataset.column_count(),
            path.display(),
            sheet_index
        );
        Ok(dataset)
    }

    fn open(&self, path: &Path) -> Result<SourceBook, TabCompareError> {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !self.accepted_extensions.iter().any(|accepted| *accepted == ext) {
            return Err(TabCompareError::Format(format!(
                "{} has unsupported extension '{}'",
                path.display(),
                ext
            )));
        }

        if ext == "csv" {
            return read_csv(path).map(SourceBook::Csv);
        }

        let workbook = open_workbook_auto(path).map_err(|e| {
            TabCompareError::Format(format!("{}: {}", path.display(), e))
        })?;
        Ok(SourceBook::Workbook {
            path: path.to_path_buf(),
            workbook,
        })
    }
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_file(path: &Path) -> Result<(), TabCompareError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TabCompareError::NotFound(path.display().to_string()))
    }
}

enum SourceBook {
    Workbook {
        path: PathBuf,
        workbook: Sheets<BufReader<File>>,
    },
    Csv(SheetGrid),
}

impl SourceBook {
    fn sheet_count(&self) -> usize {
        match self {
            SourceBook::Workbook { workbook, .. } => workbook.sheet_names().len(),
            SourceBook::Csv(_) => 1,
        }
    }

    /// Accept a requested 1-based index in `[1, sheet_count]`
    fn check_range(&self, sheet_index: i64) -> Result<usize, TabCompareError> {
        let count = self.sheet_count();
        match usize::try_from(sheet_index) {
            Ok(index) if (1..=count).contains(&index) => Ok(index),
            _ => Err(TabCompareError::Range(format!(
                "sheet {} requested, file has {} sheet(s)",
                sheet_index, count
            ))),
        }
    }

    fn read_sheet(&mut self, sheet_index: usize) -> Result<SheetGrid, TabCompareError> {
        match self {
            SourceBook::Csv(grid) => Ok(grid.clone()),
            SourceBook::Workbook { path, workbook } => {
                let name = workbook
                    .sheet_names()
                    .get(sheet_index - 1)
                    .cloned()
                    .unwrap_or_default();
                let range = workbook
                    .worksheet_range_at(sheet_index - 1)
                    .ok_or_else(|| {
                        TabCompareError::Range(format!("sheet {} is not readable", sheet_index))
                    })?
                    .map_err(|e| TabCompareError::Format(format!("{}: {}", path.display(), e)))?;
                Ok(SheetGrid::from_range(name, &range))
            }
        }
    }
}

/// Raw cells of one sheet, header row included
#[derive(Debug, Clone)]
struct SheetGrid {
    name: String,
    cells: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    fn from_range(name: String, range: &Range<Data>) -> Self {
        let cells = range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();
        Self { name, cells }
    }

    fn ensure_data(&self) -> Result<(), TabCompareError> {
        let has_data = self
            .cells
            .iter()
            .any(|row| row.iter().any(CellValue::has_data));
        if has_data {
            Ok(())
        } else {
            Err(TabCompareError::EmptyDataset(format!(
                "sheet '{}' has no data",
                self.name
            )))
        }
    }

    fn into_dataset(self, path: &Path, sheet_index: usize) -> TabularDataset {
        let width = self.cells.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows = self.cells.into_iter();

        let header = rows.next().unwrap_or_default();
        let columns = column_names(&header, width);

        let rows = rows
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();

        let source = DatasetSource {
            path: path.to_path_buf(),
            sheet_index,
            sheet_name: self.name,
        };
        TabularDataset::from_parts(source, columns, rows)
    }
}

/// Header cells become column names; blanks are `Unnamed: <n>` and repeats
/// get a `.1`, `.2`, ... suffix so that names stay unique.
fn column_names(header: &[CellValue], width: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(width);

    for idx in 0..width {
        let base = match header.get(idx) {
            Some(cell) if cell.has_data() => cell.to_string(),
            _ => format!("Unnamed: {}", idx),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.clone()) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }

    names
}

fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Null,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

fn read_csv(path: &Path) -> Result<SheetGrid, TabCompareError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| TabCompareError::Format(format!("{}: {}", path.display(), e)))?;

    let mut cells = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| TabCompareError::Format(format!("{}: {}", path.display(), e)))?;
        cells.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Null
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(SheetGrid { name, cells })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_csv, write_workbook, Fx};
    use tempfile::TempDir;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_load_header_and_rows_in_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("people.xlsx");
        write_workbook(
            &path,
            &[(
                "People",
                vec![
                    vec![Fx::S("id"), Fx::S("name"), Fx::S("active")],
                    vec![Fx::N(1.0), Fx::S("Alice"), Fx::B(true)],
                    vec![Fx::N(2.0), Fx::S("Bob"), Fx::B(false)],
                ],
            )],
        );

        let dataset = DatasetLoader::new().load(&path, 1).unwrap();

        assert_eq!(dataset.columns(), ["id", "name", "active"]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.value(0, "id"), Some(&CellValue::Number(1.0)));
        assert_eq!(dataset.value(1, "name"), Some(&text("Bob")));
        assert_eq!(dataset.value(1, "active"), Some(&CellValue::Bool(false)));
        assert_eq!(dataset.source().sheet_name, "People");
        assert_eq!(dataset.source().sheet_index, 1);
    }

    #[test]
    fn test_load_selects_requested_sheet() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("book.xlsx");
        write_workbook(
            &path,
            &[
                ("First", vec![vec![Fx::S("a")], vec![Fx::N(1.0)]]),
                ("Second", vec![vec![Fx::S("b")], vec![Fx::N(2.0)]]),
            ],
        );

        let dataset = DatasetLoader::new().load(&path, 2).unwrap();
        assert_eq!(dataset.columns(), ["b"]);
        assert_eq!(dataset.value(0, "b"), Some(&CellValue::Number(2.0)));
    }

    #[test]
    fn test_blank_cells_load_as_null() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gaps.xlsx");
        write_workbook(
            &path,
            &[(
                "Sheet1",
                vec![
                    vec![Fx::S("a"), Fx::S("b")],
                    vec![Fx::N(1.0), Fx::Blank],
                    vec![Fx::Blank, Fx::S("x")],
                ],
            )],
        );

        let dataset = DatasetLoader::new().load(&path, 1).unwrap();
        assert_eq!(dataset.value(0, "b"), Some(&CellValue::Null));
        assert_eq!(dataset.value(1, "a"), Some(&CellValue::Null));
    }

    #[test]
    fn test_column_names_are_unique() {
        let header = vec![text("a"), CellValue::Null, text("a"), text("a")];
        assert_eq!(
            column_names(&header, 5),
            ["a", "Unnamed: 1", "a.1", "a.2", "Unnamed: 4"]
        );
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = DatasetLoader::new()
            .load(&temp.path().join("nope.xlsx"), 1)
            .unwrap_err();
        assert!(matches!(err, TabCompareError::NotFound(_)));
    }

    #[test]
    fn test_wrong_extension_is_format_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let err = DatasetLoader::new().load(&path, 1).unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_corrupt_workbook_is_format_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.xlsx");
        std::fs::write(&path, b"definitely not a zip container").unwrap();
        let err = DatasetLoader::new().load(&path, 1).unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_restricted_extensions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.csv");
        write_csv(&path, "a\n1\n");
        let loader = DatasetLoader::new().with_accepted_extensions(vec![".XLSX".to_string()]);
        let err = loader.load(&path, 1).unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_sheet_index_out_of_range() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("book.xlsx");
        write_workbook(&path, &[("Only", vec![vec![Fx::S("a")]])]);

        let loader = DatasetLoader::new();
        assert!(matches!(
            loader.load(&path, 0).unwrap_err(),
            TabCompareError::Range(_)
        ));
        assert!(matches!(
            loader.load(&path, 2).unwrap_err(),
            TabCompareError::Range(_)
        ));
        assert!(matches!(
            loader.load(&path, -1).unwrap_err(),
            TabCompareError::Range(_)
        ));
        assert!(matches!(
            loader.load(&path, i64::MIN).unwrap_err(),
            TabCompareError::Range(_)
        ));
    }

    #[test]
    fn test_validate_pair_rejects_negative_sheet() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.csv");
        write_csv(&path, "id\n1\n");

        let err = DatasetLoader::new()
            .validate_pair(SheetRef::new(&path, 1), SheetRef::new(&path, -1))
            .unwrap_err();
        match err {
            TabCompareError::Range(msg) => assert!(msg.contains("sheet -1 requested")),
            other => panic!("expected range error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_sheet_is_empty_dataset() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blank.xlsx");
        write_workbook(&path, &[("Blank", vec![])]);
        let err = DatasetLoader::new().load(&path, 1).unwrap_err();
        assert!(matches!(err, TabCompareError::EmptyDataset(_)));
    }

    #[test]
    fn test_validate_pair_checks_existence_before_format() {
        let temp = TempDir::new().unwrap();
        let broken = temp.path().join("broken.xlsx");
        std::fs::write(&broken, b"garbage").unwrap();
        let missing = temp.path().join("missing.xlsx");

        let err = DatasetLoader::new()
            .validate_pair(SheetRef::new(&broken, 1), SheetRef::new(&missing, 1))
            .unwrap_err();
        assert!(matches!(err, TabCompareError::NotFound(_)));
    }

    #[test]
    fn test_validate_pair_checks_format_before_range() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good.xlsx");
        write_workbook(&good, &[("S", vec![vec![Fx::S("a")]])]);
        let broken = temp.path().join("broken.xlsx");
        std::fs::write(&broken, b"garbage").unwrap();

        let err = DatasetLoader::new()
            .validate_pair(SheetRef::new(&good, 9), SheetRef::new(&broken, 1))
            .unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_validate_pair_rejects_either_blank_sheet() {
        let temp = TempDir::new().unwrap();
        let full = temp.path().join("full.xlsx");
        write_workbook(&full, &[("S", vec![vec![Fx::S("a")], vec![Fx::N(1.0)]])]);
        let blank = temp.path().join("blank.xlsx");
        write_workbook(&blank, &[("S", vec![])]);

        let loader = DatasetLoader::new();
        assert!(matches!(
            loader
                .validate_pair(SheetRef::new(&full, 1), SheetRef::new(&blank, 1))
                .unwrap_err(),
            TabCompareError::EmptyDataset(_)
        ));
        assert!(matches!(
            loader
                .validate_pair(SheetRef::new(&blank, 1), SheetRef::new(&full, 1))
                .unwrap_err(),
            TabCompareError::EmptyDataset(_)
        ));
        assert!(loader
            .validate_pair(SheetRef::new(&full, 1), SheetRef::new(&full, 1))
            .is_ok());
    }

    #[test]
    fn test_csv_loads_as_text() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.csv");
        write_csv(&path, "id,name\n1,Alice\n2,\n3\n");

        let dataset = DatasetLoader::new().load(&path, 1).unwrap();
        assert_eq!(dataset.columns(), ["id", "name"]);
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.value(0, "id"), Some(&text("1")));
        assert_eq!(dataset.value(1, "name"), Some(&CellValue::Null));
        assert_eq!(dataset.value(2, "name"), Some(&CellValue::Null));
        assert_eq!(dataset.source().sheet_name, "data");
    }

    #[test]
    fn test_csv_has_a_single_sheet() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.csv");
        write_csv(&path, "id\n1\n");
        let err = DatasetLoader::new().load(&path, 2).unwrap_err();
        assert!(matches!(err, TabCompareError::Range(_)));
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = TabularDataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![CellValue::Null]],
        )
        .unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_new_rejects_duplicate_columns() {
        let err = TabularDataset::new(
            vec!["k".to_string(), "k".to_string()],
            vec![vec![text("first"), text("second")]],
        )
        .unwrap_err();
        match err {
            TabCompareError::Format(msg) => assert!(msg.contains("'k'")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_row_view_iterates_in_column_order() {
        let dataset = TabularDataset::new(
            vec!["x".to_string(), "y".to_string()],
            vec![vec![text("1"), text("2")]],
        )
        .unwrap();
        let row = dataset.row(0).unwrap();
        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs, vec![("x", &text("1")), ("y", &text("2"))]);
        assert!(dataset.row(1).is_none());
    }
}
