//! Ticker symbols
//!
//! Tickers are case-insensitive at the edges and canonical (trimmed,
//! uppercase) everywhere inside the workspace, so `aapl`, ` AAPL ` and `Aapl`
//! all address the same cache entry and the same report titles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A canonical, uppercase ticker symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Canonicalise a raw ticker
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSymbol`] for empty input or input containing
    /// whitespace or a list separator.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidSymbol("empty ticker".to_string()));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c == ',') {
            return Err(Error::InvalidSymbol(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered, duplicate-free list of symbols
///
/// Parsed from the comma-separated form users type (`"AAPL, MSFT, GOOGL"`)
/// and rendered back in the same form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolSet(Vec<Symbol>);

impl SymbolSet {
    /// Build a set from already-canonical symbols, keeping first occurrences
    pub fn from_symbols(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        let mut out: Vec<Symbol> = Vec::new();
        for symbol in symbols {
            if !out.contains(&symbol) {
                out.push(symbol);
            }
        }
        Self(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for SymbolSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let symbols = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Symbol::new)
            .collect::<Result<Vec<_>>>()?;

        if symbols.is_empty() {
            return Err(Error::InvalidSymbol(format!("no symbols in '{s}'")));
        }
        Ok(Self::from_symbols(symbols))
    }
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, symbol) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(symbol.as_str())?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SymbolSet {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
