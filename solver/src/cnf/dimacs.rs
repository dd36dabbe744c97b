//! Reading and writing formulas in the DIMACS CNF format.
//!
//! Lines starting with `c` are comments. A header `p cnf N M` declares the
//! variable and clause counts. Every following record is a sequence of
//! nonzero signed integers terminated by `0`; records may span lines.

use crate::cnf::Formula;
use crate::lits::Lit;
use std::fmt::Write as _;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing `p cnf` problem header")]
    MissingHeader,
    #[error("malformed problem header: `{0}`")]
    BadHeader(String),
    #[error("invalid token `{0}`")]
    BadToken(String),
    #[error("literal {0} outside the declared variable range 1..={1}")]
    LitOutOfRange(i32, u32),
    #[error("unterminated clause at end of input")]
    UnterminatedClause,
}

/// Parses a formula from DIMACS text.
///
/// The declared clause count is not enforced: solver inputs in the wild
/// routinely get it wrong and the actual clauses are authoritative.
pub fn parse(input: &str) -> Result<Formula, ParseError> {
    let mut lines = input.lines().filter(|l| !l.trim_start().starts_with('c'));
    let header = loop {
        match lines.next() {
            Some(l) if l.trim().is_empty() => continue,
            Some(l) => break l,
            None => return Err(ParseError::MissingHeader),
        }
    };
    let num_vars = parse_header(header)?;

    let mut clauses = Vec::new();
    let mut current: Vec<Lit> = Vec::new();
    let mut open = false;
    for token in lines.flat_map(|l| l.split_whitespace()) {
        let i: i32 = token
            .parse()
            .map_err(|_| ParseError::BadToken(token.to_string()))?;
        match Lit::from_dimacs(i) {
            None => {
                clauses.push(std::mem::take(&mut current));
                open = false;
            }
            Some(lit) => {
                if lit.var().id() > num_vars {
                    return Err(ParseError::LitOutOfRange(i, num_vars));
                }
                current.push(lit);
                open = true;
            }
        }
    }
    if open {
        return Err(ParseError::UnterminatedClause);
    }
    Ok(Formula::new(num_vars, clauses))
}

fn parse_header(line: &str) -> Result<u32, ParseError> {
    let bad = || ParseError::BadHeader(line.to_string());
    let mut fields = line.split_whitespace();
    if fields.next() != Some("p") || fields.next() != Some("cnf") {
        return Err(bad());
    }
    let num_vars = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let _num_clauses: u64 = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if fields.next().is_some() {
        return Err(bad());
    }
    Ok(num_vars)
}

/// Serialises a formula back to DIMACS text. Reparsing the output yields an
/// identical internal representation.
pub fn write(formula: &Formula) -> String {
    let mut out = String::new();
    writeln!(out, "p cnf {} {}", formula.num_vars(), formula.num_clauses()).unwrap();
    for cl in formula.clauses() {
        for &lit in formula.clause(cl) {
            write!(out, "{} ", lit).unwrap();
        }
        out.push_str("0\n");
    }
    out
}
