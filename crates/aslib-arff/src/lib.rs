//! Minimal ARFF writer for scenario tables.
//!
//! A [`Table`] carries its attribute schema alongside its rows and refuses to
//! render unless every row matches that schema, so a malformed table can
//! never reach disk half-written.

use std::fmt::Write as _;

use thiserror::Error;

/// Errors raised while validating or rendering a table.
#[derive(Debug, Error)]
pub enum ArffError {
    /// A row's value count does not match the declared attribute count.
    #[error("schema mismatch in relation '{relation}': row {row} has {found} values, expected {expected}")]
    SchemaMismatch {
        relation: String,
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A numeric cell holds NaN or an infinity.
    #[error("non-finite numeric in relation '{relation}' at row {row}, attribute '{attribute}'")]
    NonFiniteValue {
        relation: String,
        row: usize,
        attribute: String,
    },
    /// A symbol cell names a value outside its attribute's nominal domain.
    #[error("undeclared symbol '{symbol}' in relation '{relation}' at row {row}, attribute '{attribute}'")]
    UndeclaredSymbol {
        relation: String,
        row: usize,
        attribute: String,
        symbol: String,
    },
    /// A cell kind does not fit its attribute type.
    #[error("type mismatch in relation '{relation}' at row {row}, attribute '{attribute}': {detail}")]
    TypeMismatch {
        relation: String,
        row: usize,
        attribute: String,
        detail: String,
    },
}

/// Declared type of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    Numeric,
    Text,
    Nominal(Vec<String>),
}

/// One column of a table: a name plus its declared type.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub ty: AttributeType,
}

impl Attribute {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: AttributeType::Numeric,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: AttributeType::Text,
        }
    }

    pub fn nominal(name: impl Into<String>, domain: &[&str]) -> Self {
        Self {
            name: name.into(),
            ty: AttributeType::Nominal(domain.iter().map(|s| (*s).to_string()).collect()),
        }
    }
}

/// One value of a row. `Missing` renders as `?` and is distinct from any
/// real numeric value, including 0.0.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Numeric(f64),
    Text(String),
    Symbol(String),
    Missing,
}

impl Cell {
    pub fn symbol(value: impl Into<String>) -> Self {
        Self::Symbol(value.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// A named relation with a fixed attribute schema and row data.
#[derive(Debug, Clone)]
pub struct Table {
    relation: String,
    attributes: Vec<Attribute>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(relation: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            relation: relation.into(),
            attributes,
            rows: Vec::new(),
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Appends a row without checking it. Validation happens as a whole in
    /// [`Table::validate`] so the assembler's invariant violations surface
    /// with row indices before anything is written.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Checks every row against the attribute schema: arity, finite
    /// numerics, nominal domain membership, and cell/type agreement.
    pub fn validate(&self) -> Result<(), ArffError> {
        let expected = self.attributes.len();
        for (row_idx, row) in self.rows.iter().enumerate() {
            if row.len() != expected {
                return Err(ArffError::SchemaMismatch {
                    relation: self.relation.clone(),
                    row: row_idx,
                    expected,
                    found: row.len(),
                });
            }
            for (attr, cell) in self.attributes.iter().zip(row.iter()) {
                self.validate_cell(row_idx, attr, cell)?;
            }
        }
        Ok(())
    }

    fn validate_cell(&self, row: usize, attr: &Attribute, cell: &Cell) -> Result<(), ArffError> {
        match (&attr.ty, cell) {
            (_, Cell::Missing) => Ok(()),
            (AttributeType::Numeric, Cell::Numeric(v)) => {
                if v.is_finite() {
                    Ok(())
                } else {
                    Err(ArffError::NonFiniteValue {
                        relation: self.relation.clone(),
                        row,
                        attribute: attr.name.clone(),
                    })
                }
            }
            (AttributeType::Text, Cell::Text(_)) => Ok(()),
            (AttributeType::Nominal(domain), Cell::Symbol(sym)) => {
                if domain.iter().any(|d| d == sym) {
                    Ok(())
                } else {
                    Err(ArffError::UndeclaredSymbol {
                        relation: self.relation.clone(),
                        row,
                        attribute: attr.name.clone(),
                        symbol: sym.clone(),
                    })
                }
            }
            (ty, cell) => Err(ArffError::TypeMismatch {
                relation: self.relation.clone(),
                row,
                attribute: attr.name.clone(),
                detail: format!("attribute type {:?} cannot hold cell {:?}", ty, cell),
            }),
        }
    }

    /// Validates the full table, then renders it as ARFF text. Nothing is
    /// produced for an invalid table.
    pub fn render(&self) -> Result<String, ArffError> {
        self.validate()?;
        let mut out = String::new();
        let _ = writeln!(out, "@RELATION {}", self.relation);
        out.push('\n');
        for attr in &self.attributes {
            match &attr.ty {
                AttributeType::Numeric => {
                    let _ = writeln!(out, "@ATTRIBUTE {} NUMERIC", attr.name);
                }
                AttributeType::Text => {
                    let _ = writeln!(out, "@ATTRIBUTE {} STRING", attr.name);
                }
                AttributeType::Nominal(domain) => {
                    let _ = writeln!(out, "@ATTRIBUTE {} {{{}}}", attr.name, domain.join(","));
                }
            }
        }
        out.push('\n');
        out.push_str("@DATA\n");
        for row in &self.rows {
            let rendered: Vec<String> = row.iter().map(render_cell).collect();
            let _ = writeln!(out, "{}", rendered.join(","));
        }
        Ok(out)
    }
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Numeric(v) => format_numeric(*v),
        Cell::Text(s) => quote(s),
        Cell::Symbol(s) => s.clone(),
        Cell::Missing => "?".to_string(),
    }
}

fn format_numeric(v: f64) -> String {
    // `{}` keeps integers short (1 not 1.0) and round-trips the rest.
    format!("{}", v)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::new(
            "SAMPLE",
            vec![
                Attribute::text("instance_id"),
                Attribute::numeric("repetition"),
                Attribute::nominal("runstatus", &["ok", "other"]),
            ],
        )
    }

    #[test]
    fn renders_header_and_rows() {
        let mut table = sample_table();
        table.push_row(vec![
            Cell::text("task_3"),
            Cell::Numeric(1.0),
            Cell::symbol("ok"),
        ]);
        let rendered = table.render().expect("render");
        assert!(rendered.starts_with("@RELATION SAMPLE\n"));
        assert!(rendered.contains("@ATTRIBUTE instance_id STRING"));
        assert!(rendered.contains("@ATTRIBUTE repetition NUMERIC"));
        assert!(rendered.contains("@ATTRIBUTE runstatus {ok,other}"));
        assert!(rendered.contains("@DATA\n\"task_3\",1,ok\n"));
    }

    #[test]
    fn ragged_row_is_rejected_before_any_output() {
        let mut table = sample_table();
        table.push_row(vec![Cell::text("task_3"), Cell::Numeric(1.0)]);
        let err = table.render().expect_err("ragged row must fail");
        match err {
            ArffError::SchemaMismatch {
                row,
                expected,
                found,
                ..
            } => {
                assert_eq!(row, 0);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn missing_renders_as_question_mark_and_zero_stays_zero() {
        let mut table = Table::new(
            "T",
            vec![Attribute::numeric("a"), Attribute::numeric("b")],
        );
        table.push_row(vec![Cell::Numeric(0.0), Cell::Missing]);
        let rendered = table.render().expect("render");
        assert!(rendered.contains("0,?"));
    }

    #[test]
    fn symbol_outside_nominal_domain_is_rejected() {
        let mut table = sample_table();
        table.push_row(vec![
            Cell::text("task_3"),
            Cell::Numeric(1.0),
            Cell::symbol("exploded"),
        ]);
        assert!(matches!(
            table.render(),
            Err(ArffError::UndeclaredSymbol { .. })
        ));
    }

    #[test]
    fn non_finite_numeric_is_rejected() {
        let mut table = Table::new("T", vec![Attribute::numeric("a")]);
        table.push_row(vec![Cell::Numeric(f64::NAN)]);
        assert!(matches!(
            table.render(),
            Err(ArffError::NonFiniteValue { .. })
        ));
    }

    #[test]
    fn text_cells_are_quoted_and_escaped() {
        let mut table = Table::new("T", vec![Attribute::text("name")]);
        table.push_row(vec![Cell::text("weka \"J48\"")]);
        let rendered = table.render().expect("render");
        assert!(rendered.contains("\"weka \\\"J48\\\"\""));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut table = Table::new("T", vec![Attribute::numeric("a")]);
        table.push_row(vec![Cell::text("oops")]);
        assert!(matches!(table.render(), Err(ArffError::TypeMismatch { .. })));
    }
}
