//! Compact symbolic encoding of scope sets
//!
//! Each registered scope carries a short glyph; a scope set encodes as the
//! concatenation of glyphs in input order. Decoding is a greedy
//! left-to-right scan that always tries the longest registered symbol
//! first, so a symbol that is a prefix of another can never shadow it.
//! Unrecognized fragments are skipped one character at a time instead of
//! failing the whole parse.

use std::collections::HashMap;
use tracing::warn;

/// Glyph emitted for scopes with no registered symbol
pub const UNKNOWN_SYMBOL: &str = "?";

/// Symbol registry with a cached decode order.
///
/// The (symbol, scope) list is kept sorted by symbol length descending and
/// rebuilt only when a scope is registered, never per parse call.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    by_scope: HashMap<String, String>,
    ordered: Vec<(String, String)>,
}

impl SymbolTable {
    /// Register (or re-register) a scope's symbol and rebuild the decode
    /// order. Empty symbols are rejected: they would match at every
    /// position of every input.
    pub fn register(&mut self, scope: &str, symbol: &str) {
        if symbol.is_empty() {
            warn!(scope, "refusing to register empty scope symbol");
            return;
        }
        self.by_scope.insert(scope.to_string(), symbol.to_string());
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let mut ordered: Vec<(String, String)> = self
            .by_scope
            .iter()
            .map(|(scope, symbol)| (symbol.clone(), scope.clone()))
            .collect();
        // Longest first; ties broken lexicographically for determinism.
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        self.ordered = ordered;
    }

    /// The registered symbol for a scope, if any
    pub fn symbol_for(&self, scope: &str) -> Option<&str> {
        self.by_scope.get(scope).map(String::as_str)
    }

    /// Concatenated glyphs for `scopes` in input order; unknown scopes
    /// map to [`UNKNOWN_SYMBOL`].
    pub fn encode(&self, scopes: &[String]) -> String {
        scopes
            .iter()
            .map(|scope| self.symbol_for(scope).unwrap_or(UNKNOWN_SYMBOL))
            .collect()
    }

    /// Greedy longest-match decode. See the module docs for the scan rule.
    pub fn decode(&self, encoded: &str) -> Vec<String> {
        let mut scopes = Vec::new();
        let mut rest = encoded;
        'scan: while !rest.is_empty() {
            for (symbol, scope) in &self.ordered {
                if rest.starts_with(symbol.as_str()) {
                    scopes.push(scope.clone());
                    rest = &rest[symbol.len()..];
                    continue 'scan;
                }
            }
            // No symbol matches here: skip one character and keep going.
            let mut chars = rest.chars();
            chars.next();
            rest = chars.as_str();
        }
        scopes
    }
}
