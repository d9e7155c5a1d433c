//! Macro-category taxonomy for organizational codes.
//!
//! Every IPA category code belongs to at most one macro-category. The
//! code-to-category index is built once on first use and never mutated.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

/// A named grouping of organizational codes used to bucket tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroCategory {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(skip)]
    pub membership_codes: &'static [&'static str],
}

/// Number of macro-categories in the taxonomy.
pub const MACRO_CATEGORY_COUNT: usize = 10;

static MACRO_CATEGORIES: [MacroCategory; MACRO_CATEGORY_COUNT] = [
    MacroCategory {
        id: "1",
        name: "Altre Pubbliche Amministrazioni locali",
        membership_codes: &[
            "L37", "L10", "L19", "L13", "L2", "L20", "L21", "L1", "L40", "L11", "L39", "L46",
            "L34", "L35", "L47", "L12", "L24", "L42", "L36", "L44", "L16", "L38", "L31",
        ],
    },
    MacroCategory {
        id: "2",
        name: "Aziende Ospedaliere e ASL",
        membership_codes: &["L8", "L22", "L7"],
    },
    MacroCategory {
        id: "3",
        name: "Comuni e città metropolitane",
        membership_codes: &["L18", "L6", "L45"],
    },
    MacroCategory {
        id: "4",
        name: "Province",
        membership_codes: &["L5"],
    },
    MacroCategory {
        id: "5",
        name: "Pubbliche Amministrazioni Centrali",
        membership_codes: &[
            "C10", "C13", "C5", "C7", "C3", "C14", "C1", "C2", "C17", "C16", "C11",
        ],
    },
    MacroCategory {
        id: "6",
        name: "Regioni",
        membership_codes: &["L4"],
    },
    MacroCategory {
        id: "7",
        name: "Scuole",
        membership_codes: &["L33"],
    },
    MacroCategory {
        id: "8",
        name: "Università e AFAM",
        membership_codes: &["L17", "L15", "L43"],
    },
    MacroCategory {
        id: "9",
        name: "Istituti di Ricerca",
        membership_codes: &["C8", "C12", "L28"],
    },
    MacroCategory {
        id: "10",
        name: "Stazioni Appaltanti",
        membership_codes: &["SAG", "S01", "SA"],
    },
];

static CODE_INDEX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();

fn code_index() -> &'static HashMap<&'static str, usize> {
    CODE_INDEX.get_or_init(|| {
        let mut index = HashMap::with_capacity(64);
        for (position, category) in MACRO_CATEGORIES.iter().enumerate() {
            for code in category.membership_codes {
                index.insert(*code, position);
            }
        }
        index
    })
}

/// All macro-categories in taxonomy order.
pub fn all() -> &'static [MacroCategory] {
    &MACRO_CATEGORIES
}

/// Returns the macro-category owning `code`, or `None` for codes outside
/// the taxonomy.
pub fn category_of(code: &str) -> Option<&'static MacroCategory> {
    code_index()
        .get(code)
        .and_then(|position| MACRO_CATEGORIES.get(*position))
}

/// Position of the category owning `code` within [`all`].
///
/// Used by aggregations that keep one counter slot per category.
pub fn position_of(code: &str) -> Option<usize> {
    code_index().get(code).copied()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_every_listed_code_maps_to_its_category() {
        for category in all() {
            for code in category.membership_codes {
                let found = category_of(code).expect("listed code must resolve");
                assert_eq!(found.id, category.id, "code {code}");
            }
        }
    }

    #[test]
    fn test_unknown_code_is_uncategorized() {
        assert!(category_of("L999").is_none());
        assert!(category_of("").is_none());
        assert!(category_of("l37").is_none());
        assert!(position_of("X1").is_none());
    }

    #[test]
    fn test_codes_partition_the_taxonomy() {
        let mut seen = HashSet::new();
        for category in all() {
            for code in category.membership_codes {
                assert!(seen.insert(*code), "code {code} listed twice");
            }
        }
        assert_eq!(seen.len(), code_index().len());
    }

    #[test]
    fn test_taxonomy_order_and_ids() {
        let ids: Vec<&str> = all().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
        assert_eq!(category_of("L18").map(|c| c.name), Some("Comuni e città metropolitane"));
        assert_eq!(position_of("SA"), Some(9));
    }
}
