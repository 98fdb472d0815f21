//! Token programs.
//!
//! A [`Formula`] is the parsed, executable form of a formula: a sequence of
//! [`Token`]s in reverse Polish order. Programs are produced by a parser that
//! lives outside this crate; the engine only interprets them.
//!
//! Conditional formatting stores a rule's formula relative to the top-left
//! cell of its region. [`Formula::shifted`] moves relative references so the
//! same program can be evaluated for any cell in the region. References that
//! would move off the grid become [`Token::RefError`], mirroring how edits
//! that delete a referenced cell turn it into `#REF!`.

use std::fmt;
use std::sync::Arc;

use super::cell_ref::{CellAddress, CellRangeAddress};
use super::value::{ErrorCode, ValueEval};

/// Sheet qualifier of a 3-D reference (`Sheet1!A1` or `Sheet1:Sheet3!A1`).
#[derive(Clone, Debug, PartialEq)]
pub struct SheetSpan {
    pub first: String,
    pub last: Option<String>,
}

impl SheetSpan {
    pub fn single(name: impl Into<String>) -> Self {
        SheetSpan {
            first: name.into(),
            last: None,
        }
    }

    pub fn range(first: impl Into<String>, last: impl Into<String>) -> Self {
        SheetSpan {
            first: first.into(),
            last: Some(last.into()),
        }
    }
}

impl fmt::Display for SheetSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last {
            Some(last) => write!(f, "{}:{}", self.first, last),
            None => f.write_str(&self.first),
        }
    }
}

/// Two corners of an area reference, each with its own relative flags.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaAddress {
    pub first: CellAddress,
    pub last: CellAddress,
}

impl AreaAddress {
    pub fn new(first: CellAddress, last: CellAddress) -> Self {
        AreaAddress { first, last }
    }

    pub fn parse(text: &str) -> Option<AreaAddress> {
        let (first, last) = text.split_once(':')?;
        Some(AreaAddress::new(
            CellAddress::parse(first)?,
            CellAddress::parse(last)?,
        ))
    }

    pub fn range(&self) -> CellRangeAddress {
        CellRangeAddress::new(self.first.row, self.first.col, self.last.row, self.last.col)
    }

    fn shifted(&self, delta_row: isize, delta_col: isize) -> Option<AreaAddress> {
        Some(AreaAddress::new(
            self.first.shifted(delta_row, delta_col)?,
            self.last.shifted(delta_row, delta_col)?,
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Percent,
}

/// One element of a token program.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorCode),
    /// An omitted function argument.
    Missing,
    Ref(CellAddress),
    Area(AreaAddress),
    Ref3d { sheets: SheetSpan, address: CellAddress },
    Area3d { sheets: SheetSpan, area: AreaAddress },
    /// A reference that no longer points at a cell.
    RefError,
    /// Array constant (`{1,2;3,4}`), values in row-major order.
    Array {
        rows: usize,
        cols: usize,
        values: Vec<ValueEval>,
    },
    /// A defined name.
    Name(String),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Func { name: String, argc: usize },
}

impl Token {
    /// Build a reference token from text: `A1`, `$A$1:B2`, `Sheet2!A1`,
    /// `Sheet1:Sheet3!A1:B2`. Returns None for anything else.
    pub fn reference(text: &str) -> Option<Token> {
        let (sheets, local) = match text.rsplit_once('!') {
            Some((sheet, local)) => {
                let sheet = sheet.trim_matches('\'');
                let span = match sheet.split_once(':') {
                    Some((first, last)) => SheetSpan::range(first, last),
                    None => SheetSpan::single(sheet),
                };
                (Some(span), local)
            }
            None => (None, text),
        };
        let token = if local.contains(':') {
            let area = AreaAddress::parse(local)?;
            match sheets {
                Some(sheets) => Token::Area3d { sheets, area },
                None => Token::Area(area),
            }
        } else {
            let address = CellAddress::parse(local)?;
            match sheets {
                Some(sheets) => Token::Ref3d { sheets, address },
                None => Token::Ref(address),
            }
        };
        Some(token)
    }

    pub fn func(name: &str, argc: usize) -> Token {
        Token::Func {
            name: name.to_ascii_uppercase(),
            argc,
        }
    }

    pub fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    fn shifted(&self, delta_row: isize, delta_col: isize) -> Token {
        let moved = match self {
            Token::Ref(address) => address.shifted(delta_row, delta_col).map(Token::Ref),
            Token::Area(area) => area.shifted(delta_row, delta_col).map(Token::Area),
            Token::Ref3d { sheets, address } => {
                address
                    .shifted(delta_row, delta_col)
                    .map(|address| Token::Ref3d {
                        sheets: sheets.clone(),
                        address,
                    })
            }
            Token::Area3d { sheets, area } => {
                area.shifted(delta_row, delta_col).map(|area| Token::Area3d {
                    sheets: sheets.clone(),
                    area,
                })
            }
            other => Some(other.clone()),
        };
        moved.unwrap_or(Token::RefError)
    }
}

/// An immutable, cheaply clonable token program.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    tokens: Arc<[Token]>,
}

impl Formula {
    pub fn new(tokens: Vec<Token>) -> Self {
        Formula {
            tokens: tokens.into(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True if the program calls the named function anywhere.
    pub fn calls_function(&self, name: &str) -> bool {
        self.tokens.iter().any(|token| match token {
            Token::Func { name: f, .. } => f.eq_ignore_ascii_case(name),
            _ => false,
        })
    }

    /// A copy of this program with every relative reference component moved
    /// by the given deltas. The stored program is never modified.
    pub fn shifted(&self, delta_row: isize, delta_col: isize) -> Formula {
        if delta_row == 0 && delta_col == 0 {
            return self.clone();
        }
        Formula {
            tokens: self
                .tokens
                .iter()
                .map(|token| token.shifted(delta_row, delta_col))
                .collect(),
        }
    }
}

impl From<Vec<Token>> for Formula {
    fn from(tokens: Vec<Token>) -> Self {
        Formula::new(tokens)
    }
}
