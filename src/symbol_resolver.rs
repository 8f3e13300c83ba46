use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::hash_map::Entry;
use std::fmt;

use crate::error::{ArchiveError, Result};

/// Quote currencies every listed symbol is assumed to trade against.
pub const MAJOR_CURRENCIES: [&str; 2] = ["BTC", "ETH"];

pub const ARTIFACT_CURRENCIES: [&str; 1] = ["DBTC"];

/// Currency decomposition of a symbol.
///
/// The price of a trade is given in the quote currency (on `XZCBTC` it is in
/// BTC), the amount in the base currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Pair {
    base: String,
    quote: String,
}

impl Pair {
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// What to do when two currency pairs concatenate to the same symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the pair quoted in a major currency, else the first one generated.
    #[default]
    PreferMajorQuote,
    /// Fail on any symbol with more than one decomposition.
    Reject,
}

#[derive(Debug)]
struct Decomposition {
    chosen: Pair,
    rivals: Vec<Pair>,
}

/// Infers base/quote currencies of concatenated symbols such as `MAIDBTC`.
#[derive(Debug, Clone)]
pub struct SymbolResolver {
    majors: Vec<String>,
    artifacts: Vec<String>,
    policy: CollisionPolicy,
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new(&MAJOR_CURRENCIES, &ARTIFACT_CURRENCIES, CollisionPolicy::default())
    }
}

impl SymbolResolver {
    pub fn new<S: AsRef<str>>(majors: &[S], artifacts: &[S], policy: CollisionPolicy) -> Self {
        Self {
            majors: majors.iter().map(|s| s.as_ref().to_string()).collect(),
            artifacts: artifacts.iter().map(|s| s.as_ref().to_string()).collect(),
            policy,
        }
    }

    fn is_major(&self, currency: &str) -> bool {
        self.majors.iter().any(|m| m == currency)
    }

    /// Bootstrap tokens plus every symbol with a major currency stripped out.
    pub fn universe<S: AsRef<str>>(&self, symbols: &[S]) -> BTreeSet<String> {
        let mut universe: BTreeSet<String> =
            self.majors.iter().chain(&self.artifacts).cloned().collect();

        for symbol in symbols {
            let symbol = symbol.as_ref();
            for major in &self.majors {
                if symbol.contains(major.as_str()) {
                    let candidate = symbol.replace(major.as_str(), "");
                    if !candidate.is_empty() {
                        universe.insert(candidate);
                    }
                }
            }
        }
        universe
    }

    /// Every ordered pair of distinct currencies, keyed by their concatenation.
    fn permutations(&self, universe: &BTreeSet<String>) -> FxHashMap<String, Decomposition> {
        let mut table: FxHashMap<String, Decomposition> = FxHashMap::default();

        for base in universe {
            for quote in universe {
                if base == quote {
                    continue;
                }
                let pair = Pair {
                    base: base.clone(),
                    quote: quote.clone(),
                };
                match table.entry(format!("{}{}", base, quote)) {
                    Entry::Vacant(slot) => {
                        slot.insert(Decomposition {
                            chosen: pair,
                            rivals: Vec::new(),
                        });
                    }
                    Entry::Occupied(mut slot) => {
                        debug!("{} collides with {} on '{}'", pair, slot.get().chosen, slot.key());
                        let found = slot.get_mut();
                        if self.is_major(&pair.quote) && !self.is_major(&found.chosen.quote) {
                            let previous = std::mem::replace(&mut found.chosen, pair);
                            found.rivals.push(previous);
                        } else {
                            found.rivals.push(pair);
                        }
                    }
                }
            }
        }
        table
    }

    /// Maps every symbol, lowercased, to its currency pair.
    ///
    /// Symbols are matched case-sensitively against the universe. A single
    /// unresolvable symbol fails the whole build.
    pub fn build<S: AsRef<str>>(&self, symbols: &[S]) -> Result<FxHashMap<String, Pair>> {
        let universe = self.universe(symbols);
        let table = self.permutations(&universe);

        let mut pairs = FxHashMap::default();
        for symbol in symbols {
            let symbol = symbol.as_ref();
            let found = table
                .get(symbol)
                .ok_or_else(|| ArchiveError::unresolved(symbol))?;

            if self.policy == CollisionPolicy::Reject && !found.rivals.is_empty() {
                let candidates: Vec<String> = std::iter::once(&found.chosen)
                    .chain(&found.rivals)
                    .map(|p| p.to_string())
                    .collect();
                return Err(ArchiveError::AmbiguousSymbol {
                    symbol: symbol.to_string(),
                    candidates: candidates.join(", "),
                });
            }
            pairs.insert(symbol.to_lowercase(), found.chosen.clone());
        }

        let contested = table.values().filter(|d| !d.rivals.is_empty()).count();
        info!(
            "Resolved {} symbols against {} currencies ({} contested concatenations)",
            pairs.len(),
            universe.len(),
            contested
        );
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_pair(pairs: &FxHashMap<String, Pair>, symbol: &str, base: &str, quote: &str) {
        let pair = pairs
            .get(symbol)
            .unwrap_or_else(|| panic!("{} not resolved", symbol));
        assert_eq!((pair.base(), pair.quote()), (base, quote), "{}", symbol);
    }

    #[test]
    fn test_build_pairs() {
        let symbols = ["2GIVEBTC", "2GIVEBTC", "XZCBTC", "MAIDBTC"];
        let pairs = SymbolResolver::default().build(&symbols).unwrap();

        assert_eq!(pairs.len(), 3);
        assert_pair(&pairs, "2givebtc", "2GIVE", "BTC");
        assert_pair(&pairs, "xzcbtc", "XZC", "BTC");
        assert_pair(&pairs, "maidbtc", "MAID", "BTC");
    }

    #[test]
    fn test_universe() {
        let universe = SymbolResolver::default().universe(&["NEOETH", "WBTCETH", "BTC"]);
        let expected: BTreeSet<String> = ["BTC", "ETH", "DBTC", "NEO", "WBTC", "WETH"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(universe, expected);
    }

    #[test]
    fn test_concatenations_resolve_back() {
        let symbols = ["LTCBTC", "NEOETH", "LTCETH", "NEOBTC", "ETHBTC", "BTCETH", "WBTCETH"];
        let pairs = SymbolResolver::default().build(&symbols).unwrap();

        assert_pair(&pairs, "ltcbtc", "LTC", "BTC");
        assert_pair(&pairs, "neoeth", "NEO", "ETH");
        assert_pair(&pairs, "ltceth", "LTC", "ETH");
        assert_pair(&pairs, "neobtc", "NEO", "BTC");
        assert_pair(&pairs, "ethbtc", "ETH", "BTC");
        assert_pair(&pairs, "btceth", "BTC", "ETH");
        assert_pair(&pairs, "wbtceth", "WBTC", "ETH");
    }

    #[test]
    fn test_unresolved_symbol() {
        let err = SymbolResolver::default()
            .build(&["MAIDBTC", "FOOUSD"])
            .unwrap_err();
        match err {
            ArchiveError::UnresolvedSymbol { symbol } => assert_eq!(symbol, "FOOUSD"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bare_major_is_unresolved() {
        assert!(matches!(
            SymbolResolver::default().build(&["BTC"]),
            Err(ArchiveError::UnresolvedSymbol { .. })
        ));
    }

    #[test]
    fn test_substring_match_is_case_sensitive() {
        assert!(matches!(
            SymbolResolver::default().build(&["maidbtc"]),
            Err(ArchiveError::UnresolvedSymbol { .. })
        ));
    }

    #[test]
    fn test_collision_prefers_major_quote() {
        // XDBTC is both XD+BTC and X+DBTC
        let resolver = SymbolResolver::default();
        let forward = resolver.build(&["XDBTC", "XBTC"]).unwrap();
        let backward = resolver.build(&["XBTC", "XDBTC"]).unwrap();

        assert_pair(&forward, "xdbtc", "XD", "BTC");
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_collision_reject() {
        let resolver = SymbolResolver::new(&MAJOR_CURRENCIES, &ARTIFACT_CURRENCIES, CollisionPolicy::Reject);

        match resolver.build(&["XDBTC", "XBTC"]).unwrap_err() {
            ArchiveError::AmbiguousSymbol { symbol, candidates } => {
                assert_eq!(symbol, "XDBTC");
                assert!(candidates.contains("XD/BTC"));
                assert!(candidates.contains("X/DBTC"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        // uncontested symbols still resolve
        let pairs = resolver.build(&["MAIDBTC"]).unwrap();
        assert_pair(&pairs, "maidbtc", "MAID", "BTC");
    }

    #[test]
    fn test_custom_majors() {
        let resolver = SymbolResolver::new(&["USDT"], &[], CollisionPolicy::default());
        let pairs = resolver.build(&["BTCUSDT", "ETHUSDT"]).unwrap();
        assert_pair(&pairs, "btcusdt", "BTC", "USDT");
        assert_pair(&pairs, "ethusdt", "ETH", "USDT");
    }

    #[test]
    fn test_pair_serializes() {
        let pairs = SymbolResolver::default().build(&["MAIDBTC"]).unwrap();
        let json = serde_json::to_string(&pairs["maidbtc"]).unwrap();
        assert_eq!(json, r#"{"base":"MAID","quote":"BTC"}"#);
    }
}
