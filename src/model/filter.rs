use crate::model::PackageAttr;

/// A predicate for filtering methods by tags.
#[derive(Debug, Clone, PartialEq)]
pub enum TagPredicate {
    Include(String),
    Exclude(String),
    And(Vec<TagPredicate>),
    Or(Vec<TagPredicate>),
}

impl TagPredicate {
    fn matches(&self, tags: &[String]) -> bool {
        match self {
            Self::Include(tag) => tags.iter().any(|t| t == tag),
            Self::Exclude(tag) => !tags.iter().any(|t| t == tag),
            Self::And(preds) => preds.iter().all(|p| p.matches(tags)),
            Self::Or(preds) => preds.iter().any(|p| p.matches(tags)),
        }
    }
}

/// Parse a filter string into a `TagPredicate`.
///
/// Supports:
/// - Single tag: `"smoke"` → `Include("smoke")`
/// - Comma-separated (OR): `"smoke,critical"` → `Or([Include("smoke"), Include("critical")])`
/// - NOT prefix: `"NOT slow"` → `Exclude("slow")`
/// - AND NOT: `"smoke AND NOT slow"` → `And([Include("smoke"), Exclude("slow")])`
///
/// # Errors
///
/// Returns an error if the filter string is empty or has invalid syntax.
pub fn parse_filter(input: &str) -> Result<TagPredicate, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty filter string".to_owned());
    }

    if input.contains(" AND ") {
        let parts: Vec<&str> = input.split(" AND ").collect();
        let preds: Result<Vec<TagPredicate>, String> =
            parts.iter().map(|p| parse_single(p.trim())).collect();
        return Ok(TagPredicate::And(preds?));
    }

    if input.contains(',') {
        let parts: Vec<&str> = input.split(',').collect();
        let preds: Result<Vec<TagPredicate>, String> =
            parts.iter().map(|p| parse_single(p.trim())).collect();
        return Ok(TagPredicate::Or(preds?));
    }

    parse_single(input)
}

fn parse_single(input: &str) -> Result<TagPredicate, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty tag in filter".to_owned());
    }

    if let Some(tag) = input.strip_prefix("NOT ") {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err("empty tag after NOT".to_owned());
        }
        Ok(TagPredicate::Exclude(tag.to_owned()))
    } else {
        Ok(TagPredicate::Include(input.to_owned()))
    }
}

/// Criteria for selecting a sub-hierarchy for one run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Keep only these packages; `None` keeps all.
    pub packages: Option<Vec<String>>,
    /// Keep only methods at or above this level.
    pub min_level: u32,
    /// Keep only methods whose tags match; `None` keeps all.
    pub tags: Option<TagPredicate>,
}

impl Selection {
    fn keeps_package(&self, name: &str) -> bool {
        self.packages
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == name))
    }
}

/// Duplicate the part of the hierarchy matching `selection`.
///
/// The duplicate is shallow — suite factories are shared — and preserves
/// every `suite_id`/`method_id`. Run [`super::mark::sort_and_mark`] on the
/// result only if re-marking is explicitly wanted. Suites and packages left
/// without methods are dropped.
pub fn select(packages: &[PackageAttr], selection: &Selection) -> Vec<PackageAttr> {
    packages
        .iter()
        .filter(|pkg| selection.keeps_package(&pkg.name))
        .filter_map(|pkg| {
            let suites: Vec<_> = pkg
                .suites
                .iter()
                .filter_map(|suite| {
                    let mut kept = suite.clone();
                    kept.methods.retain(|method| {
                        method.level >= selection.min_level
                            && selection
                                .tags
                                .as_ref()
                                .is_none_or(|pred| pred.matches(&method.tags))
                    });
                    if kept.methods.is_empty() { None } else { Some(kept) }
                })
                .collect();
            if suites.is_empty() {
                None
            } else {
                Some(PackageAttr {
                    name: pkg.name.clone(),
                    ncycles: pkg.ncycles,
                    suites,
                })
            }
        })
        .collect()
}
