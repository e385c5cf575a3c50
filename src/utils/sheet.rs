// src/utils/sheet.rs

//! Answer-key workbook parsing.
//!
//! Layout of the first worksheet, one question per row:
//!
//! | Question | Option A | Option B | ... | Answer |
//!
//! The header row is optional. The last non-empty cell of a row is the
//! answer and the cells between the question and the answer are options.
//! A single-letter answer (`B`) names an option by position and resolves to
//! that option's text.

use std::{fmt, io::Cursor};

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};

/// One question read from the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub content: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug)]
pub enum SheetError {
    /// The bytes are not a readable .xlsx workbook.
    Unreadable(String),
    NoWorksheet,
    NoQuestions,
    /// 1-based sheet row holding a question without an answer.
    MissingAnswer(usize),
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetError::Unreadable(msg) => write!(f, "Unreadable workbook: {}", msg),
            SheetError::NoWorksheet => write!(f, "Workbook has no worksheet"),
            SheetError::NoQuestions => write!(f, "Workbook contains no questions"),
            SheetError::MissingAnswer(row) => write!(f, "Row {} has no answer", row),
        }
    }
}

impl std::error::Error for SheetError {}

/// Reads the questions out of an uploaded .xlsx file.
pub fn parse_answer_key(bytes: &[u8]) -> Result<Vec<ParsedQuestion>, SheetError> {
    let mut workbook: Xlsx<Cursor<&[u8]>> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: calamine::XlsxError| SheetError::Unreadable(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SheetError::NoWorksheet)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SheetError::Unreadable(e.to_string()))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    parse_rows(&rows, first_row)
}

/// Turns already-extracted cell text into questions.
///
/// `first_row` is the 0-based sheet row of `rows[0]`, used for error messages.
pub fn parse_rows(rows: &[Vec<String>], first_row: usize) -> Result<Vec<ParsedQuestion>, SheetError> {
    let mut questions = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let cells: Vec<&str> = row.iter().map(|c| c.trim()).collect();
        let Some(content) = cells.first().filter(|c| !c.is_empty()) else {
            continue;
        };

        if idx == 0 && content.eq_ignore_ascii_case("question") {
            continue;
        }

        let last = cells
            .iter()
            .rposition(|c| !c.is_empty())
            .unwrap_or(0);
        if last == 0 {
            return Err(SheetError::MissingAnswer(first_row + idx + 1));
        }

        let options: Vec<String> = cells[1..last]
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        questions.push(ParsedQuestion {
            content: content.to_string(),
            answer: resolve_answer(cells[last], &options),
            options,
        });
    }

    if questions.is_empty() {
        return Err(SheetError::NoQuestions);
    }

    Ok(questions)
}

/// Maps a letter answer onto its option text when such an option exists.
fn resolve_answer(raw: &str, options: &[String]) -> String {
    let mut chars = raw.chars();
    if let (Some(letter), None) = (chars.next(), chars.next()) {
        if letter.is_ascii_alphabetic() {
            let index = (letter.to_ascii_uppercase() as u8 - b'A') as usize;
            if let Some(option) = options.get(index) {
                return option.clone();
            }
        }
    }
    raw.to_string()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
