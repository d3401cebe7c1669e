/// Well-identifier reconciliation.
///
/// BSK exports spell the same physical well many ways: different
/// separators, casing, zero-padding, stray whitespace, transposed
/// township/range prefixes. Downstream joins against the operations well
/// registry need exactly one spelling. This module turns a raw identifier
/// into that canonical spelling or reports that it cannot.
///
/// Resolution order:
///   1. normalize (trim, upper-case, whitespace handling);
///   2. strip non-essential separators to form a lookup key and consult the
///      variant mapping table;
///   3. on a miss, accept the normalized value if it matches the canonical
///      grammar;
///   4. rewrite a known bad prefix and retry 2 and 3 once.
///
/// The mapping wins over the grammar, so a well-formed but known-wrong
/// identifier is still corrected. Anything else is unresolved. A variant missing from the mapping must fail
/// here rather than pass through under a wrong identifier.

use std::collections::HashMap;

use regex::Regex;

use crate::config::WellsConfig;
use crate::error::{EtlError, Result};

// ---------------------------------------------------------------------------
// Resolution result
// ---------------------------------------------------------------------------

/// Which step produced the canonical identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    /// Already canonical after normalization.
    Grammar,
    /// Found in the variant mapping table.
    Mapping,
    /// Resolved after rewriting a known bad prefix.
    PrefixAlias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub canonical: String,
    pub via: ResolvedVia,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WellReconciler {
    grammar: Regex,
    strip_chars: Vec<char>,
    whitespace_separator: Option<char>,
    /// Lookup key → canonical identifier.
    mapping: HashMap<String, String>,
    /// Upper-cased (bad prefix, replacement), longest prefix first.
    prefix_aliases: Vec<(String, String)>,
}

impl WellReconciler {
    /// Compiles the grammar and indexes the mapping table.
    ///
    /// Fails if the grammar does not compile, if a mapping value is not
    /// itself canonical, or if two variants share a lookup key but disagree
    /// on the canonical value.
    pub fn from_config(config: &WellsConfig) -> Result<Self> {
        let grammar = Regex::new(&format!("^(?:{})$", config.grammar)).map_err(|e| {
            EtlError::Config(format!("wells.grammar '{}' is not a valid pattern: {}", config.grammar, e))
        })?;

        let mut reconciler = Self {
            grammar,
            strip_chars: config.strip_chars.chars().collect(),
            whitespace_separator: config.whitespace_separator,
            mapping: HashMap::with_capacity(config.mapping.len()),
            prefix_aliases: Vec::with_capacity(config.prefix_aliases.len()),
        };

        for (variant, canonical) in &config.mapping {
            let canonical = canonical.trim();
            if !reconciler.grammar.is_match(canonical) {
                return Err(EtlError::Config(format!(
                    "well mapping '{}' → '{}': target does not match wells.grammar",
                    variant, canonical
                )));
            }
            let key = reconciler.lookup_key(&reconciler.normalize(variant));
            if key.is_empty() {
                return Err(EtlError::Config(format!(
                    "well mapping variant '{}' is empty after normalization",
                    variant
                )));
            }
            match reconciler.mapping.get(&key) {
                Some(existing) if existing != canonical => {
                    return Err(EtlError::Config(format!(
                        "well mapping variants normalizing to '{}' disagree: '{}' vs '{}'",
                        key, existing, canonical
                    )));
                }
                _ => {
                    reconciler.mapping.insert(key, canonical.to_string());
                }
            }
        }

        for (from, to) in &config.prefix_aliases {
            let from = from.trim().to_uppercase();
            if from.is_empty() {
                return Err(EtlError::Config("wells.prefix_aliases has an empty prefix".to_string()));
            }
            reconciler.prefix_aliases.push((from, to.trim().to_uppercase()));
        }
        reconciler
            .prefix_aliases
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(reconciler)
    }

    /// Number of distinct lookup keys in the mapping table.
    pub fn mapping_len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_canonical(&self, identifier: &str) -> bool {
        self.grammar.is_match(identifier)
    }

    /// Resolves a raw identifier, or returns `None` if it is unrecognized.
    pub fn reconcile(&self, raw: &str) -> Option<Resolution> {
        let normalized = self.normalize(raw);
        if normalized.is_empty() {
            return None;
        }

        if let Some(found) = self.resolve_once(&normalized) {
            return Some(found);
        }

        for (from, to) in &self.prefix_aliases {
            if let Some(rest) = normalized.strip_prefix(from.as_str()) {
                let rewritten = format!("{}{}", to, rest);
                return self.resolve_once(&rewritten).map(|found| Resolution {
                    canonical: found.canonical,
                    via: ResolvedVia::PrefixAlias,
                });
            }
        }

        None
    }

    fn resolve_once(&self, normalized: &str) -> Option<Resolution> {
        if let Some(canonical) = self.mapping.get(&self.lookup_key(normalized)) {
            return Some(Resolution {
                canonical: canonical.clone(),
                via: ResolvedVia::Mapping,
            });
        }
        self.grammar.is_match(normalized).then(|| Resolution {
            canonical: normalized.to_string(),
            via: ResolvedVia::Grammar,
        })
    }

    /// Trim, upper-case, and drop internal whitespace. If a whitespace
    /// separator is configured and missing, the first whitespace run
    /// becomes that separator first.
    fn normalize(&self, raw: &str) -> String {
        let upper = raw.trim().to_uppercase();
        let mut out = String::with_capacity(upper.len());
        let mut substitute = self
            .whitespace_separator
            .is_some_and(|sep| !upper.contains(sep));
        let mut in_space = false;

        for c in upper.chars() {
            if c.is_whitespace() {
                if substitute && !in_space {
                    if let Some(sep) = self.whitespace_separator {
                        out.push(sep);
                    }
                }
                in_space = true;
                continue;
            }
            if in_space {
                substitute = false;
            }
            in_space = false;
            out.push(c);
        }
        out
    }

    fn lookup_key(&self, normalized: &str) -> String {
        normalized
            .chars()
            .filter(|c| !c.is_whitespace() && !self.strip_chars.contains(c))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EtlConfig;

    fn wells(text: &str) -> WellsConfig {
        EtlConfig::from_toml_str(text).expect("test config should parse").wells
    }

    fn simple() -> WellReconciler {
        WellReconciler::from_config(&wells(
            r#"
            [wells]
            grammar = 'W\d{3}'
            [wells.mapping]
            "W-12" = "W012"
            "W-7" = "W007"
            "North Well" = "W101"
            "#,
        ))
        .expect("reconciler should build")
    }

    /// State well numbers, as used by the shipped BSK configuration.
    fn state_wells() -> WellReconciler {
        WellReconciler::from_config(&wells(
            r#"
            [wells]
            grammar = '\d{2}S/\d{2}E-\d{2}[A-R]\d{2}'
            whitespace_separator = "-"
            [wells.mapping]
            "30S/25E-ISH01" = "30S/25E-15H01"
            "30S/25E-020D1" = "30S/25E-20D01"
            [wells.prefix_aliases]
            "30E/25S" = "30S/25E"
            "#,
        ))
        .expect("reconciler should build")
    }

    fn canonical(r: &WellReconciler, raw: &str) -> Option<String> {
        r.reconcile(raw).map(|found| found.canonical)
    }

    // --- Variants ----------------------------------------------------------

    #[test]
    fn test_casing_and_separator_variants_share_one_canonical_id() {
        let r = simple();
        for raw in ["W-12", "w12", " W12 ", "w-12", "W_12", "W 12", "W.12"] {
            assert_eq!(
                canonical(&r, raw).as_deref(),
                Some("W012"),
                "'{}' should reconcile to W012",
                raw
            );
        }
    }

    #[test]
    fn test_already_canonical_ids_pass_through() {
        let r = simple();
        let found = r.reconcile("W012").unwrap();
        assert_eq!(found.canonical, "W012");
        assert_eq!(found.via, ResolvedVia::Grammar);
        assert_eq!(canonical(&r, " w450 ").as_deref(), Some("W450"));
    }

    #[test]
    fn test_mapping_hits_report_their_source() {
        let r = simple();
        assert_eq!(r.reconcile("north well").unwrap().via, ResolvedVia::Mapping);
        assert_eq!(canonical(&r, "NORTH-WELL").as_deref(), Some("W101"));
    }

    #[test]
    fn test_mapping_overrides_grammar_valid_variant() {
        let r = WellReconciler::from_config(&wells(
            "[wells]\ngrammar = 'W\\d{3}'\n[wells.mapping]\n\"W100\" = \"W101\"\n",
        ))
        .unwrap();

        let found = r.reconcile("W100").unwrap();
        assert_eq!(found.canonical, "W101");
        assert_eq!(found.via, ResolvedVia::Mapping);
        assert_eq!(canonical(&r, " w-100 ").as_deref(), Some("W101"));
        // The mapping target itself is untouched.
        assert_eq!(r.reconcile("W101").unwrap().via, ResolvedVia::Grammar);
    }

    #[test]
    fn test_mapping_overrides_grammar_after_prefix_rewrite() {
        let r = WellReconciler::from_config(&wells(
            r#"
            [wells]
            grammar = '\d{2}S/\d{2}E-\d{2}[A-R]\d{2}'
            [wells.mapping]
            "30S/25E-22N01" = "30S/25E-22N02"
            [wells.prefix_aliases]
            "30E/25S" = "30S/25E"
            "#,
        ))
        .unwrap();

        let found = r.reconcile("30E/25S-22N01").unwrap();
        assert_eq!(found.canonical, "30S/25E-22N02");
        assert_eq!(found.via, ResolvedVia::PrefixAlias);
    }

    // --- Fail closed -------------------------------------------------------

    #[test]
    fn test_unmapped_identifiers_are_unresolved() {
        let r = simple();
        for raw in ["W-999-X", "W12A", "W-13", "", "   ", "Well 12"] {
            assert_eq!(r.reconcile(raw), None, "'{}' must not resolve", raw);
        }
    }

    // --- State well numbers -------------------------------------------------

    #[test]
    fn test_state_well_space_is_read_as_separator() {
        let r = state_wells();
        assert_eq!(canonical(&r, "30S/25E 15H01").as_deref(), Some("30S/25E-15H01"));
        assert_eq!(canonical(&r, "30s/25e-15h01").as_deref(), Some("30S/25E-15H01"));
        // Spaces around an existing hyphen are simply removed.
        assert_eq!(canonical(&r, "30S/25E - 15H01").as_deref(), Some("30S/25E-15H01"));
    }

    #[test]
    fn test_state_well_known_misspellings_map() {
        let r = state_wells();
        assert_eq!(canonical(&r, "30S/25E-ISH01").as_deref(), Some("30S/25E-15H01"));
        assert_eq!(canonical(&r, "30S/25E-020D1").as_deref(), Some("30S/25E-20D01"));
        assert_eq!(canonical(&r, "30S/25E 020D1").as_deref(), Some("30S/25E-20D01"));
    }

    #[test]
    fn test_state_well_transposed_prefix_is_rewritten() {
        let r = state_wells();
        let found = r.reconcile("30E/25S-22N01").unwrap();
        assert_eq!(found.canonical, "30S/25E-22N01");
        assert_eq!(found.via, ResolvedVia::PrefixAlias);
        assert_eq!(canonical(&r, "30E/25S 020D1").as_deref(), Some("30S/25E-20D01"));
    }

    #[test]
    fn test_state_well_bad_padding_without_mapping_is_unresolved() {
        let r = state_wells();
        assert_eq!(r.reconcile("30S/25E-5H01"), None);
        assert_eq!(r.reconcile("30S/25E-15H"), None);
        assert_eq!(r.reconcile("30E/25S-5H01"), None);
    }

    // --- Configuration checks ----------------------------------------------

    #[test]
    fn test_mapping_targets_must_be_canonical() {
        let err = WellReconciler::from_config(&wells(
            "[wells]\ngrammar = 'W\\d{3}'\n[wells.mapping]\n\"W-12\" = \"W12\"\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("does not match"), "got: {}", err);
    }

    #[test]
    fn test_conflicting_variants_are_rejected() {
        let result = WellReconciler::from_config(&wells(
            "[wells]\ngrammar = 'W\\d{3}'\n[wells.mapping]\n\"W-12\" = \"W012\"\n\"w 12\" = \"W120\"\n",
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_equivalent_variants_with_same_target_are_fine() {
        let r = WellReconciler::from_config(&wells(
            "[wells]\ngrammar = 'W\\d{3}'\n[wells.mapping]\n\"W-12\" = \"W012\"\n\"w 12\" = \"W012\"\n",
        ))
        .unwrap();
        assert_eq!(r.mapping_len(), 1);
    }

    #[test]
    fn test_invalid_grammar_is_a_config_error() {
        let result = WellReconciler::from_config(&wells("[wells]\ngrammar = 'W(\\d{3}'\n"));
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_grammar_is_anchored() {
        let r = simple();
        assert!(r.is_canonical("W012"));
        assert!(!r.is_canonical("XW012"));
        assert!(!r.is_canonical("W0123"));
    }
}
