use crate::core::{Row, Value};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Rows written by an insert, upsert, update or delete
    pub affected_rows: usize,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            affected_rows: 0,
        }
    }

    pub fn affected(count: usize) -> Self {
        Self {
            affected_rows: count,
            ..Self::default()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in the first row
    pub fn first_value(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.first().and_then(|row| row.get(idx))
    }

    pub fn print(&self) {
        if self.columns.is_empty() {
            println!("{} row(s) affected", self.affected_rows);
            return;
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();

        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", col, width = widths[i]))
            .collect();

        println!("{}", header.join(" | "));

        let separator: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        println!("{}", separator);

        for row in &self.rows {
            let row_str: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, val)| format!("{:width$}", val.to_string(), width = widths[i]))
                .collect();
            println!("{}", row_str.join(" | "));
        }

        println!("\n{} row(s)", self.rows.len());
    }
}
