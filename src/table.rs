//! Column-aligned plain-text tables for terminal output

use std::io::{self, Write};

const PADDING: usize = 2;

#[derive(Clone, Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<I, S>(&mut self, cells: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.rows
            .push(cells.into_iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every column but the last is padded to its widest cell plus two spaces
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        let mut widths = vec![0usize; columns];
        for line in std::iter::once(&self.headers).chain(self.rows.iter()) {
            for (i, cell) in line.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        for line in std::iter::once(&self.headers).chain(self.rows.iter()) {
            let mut rendered = String::new();
            for (i, cell) in line.iter().enumerate() {
                rendered.push_str(cell);
                if i + 1 < line.len() {
                    let pad = widths[i] - cell.chars().count() + PADDING;
                    rendered.extend(std::iter::repeat(' ').take(pad));
                }
            }
            writeln!(out, "{rendered}")?;
        }
        Ok(())
    }
}
