/// Sentinel for any enrichment field that could not be determined.
///
/// Marketo expects revenue and company-size values from a closed set, while
/// the model answers in whatever spelling it likes ("$10M-$50M",
/// "5001-10,000", "about 51-200 employees"). Each table below maps accepted
/// spellings to the canonical label stored in the CRM; anything that matches
/// no entry normalizes to this sentinel.
pub const UNKNOWN: &str = "Unknown";

/// Accepted revenue spellings -> canonical bucket label, ordered smallest to
/// largest. The no-space spellings are what the model most often produces.
const REVENUE_BUCKETS: &[(&str, &str)] = &[
    ("Under $1M", "Under $1M"),
    ("$1M - $10M", "$1M - $10M"),
    ("$1M-$10M", "$1M - $10M"),
    ("$10M - $50M", "$10M - $50M"),
    ("$10M-$50M", "$10M - $50M"),
    ("$50M - $100M", "$50M - $100M"),
    ("$50M-$100M", "$50M - $100M"),
    ("$100M - $500M", "$100M - $500M"),
    ("$100M-$500M", "$100M - $500M"),
    ("$500M - $1B", "$500M - $1B"),
    ("$500M-$1B", "$500M - $1B"),
    ("$1B - $10B", "$1B - $10B"),
    ("$1B-$10B", "$1B - $10B"),
    ("$10B+", "$10B+"),
];

/// Accepted company-size spellings -> canonical bucket label. The comma
/// spellings match the ranges listed in the prompt.
const COMPANY_SIZE_BUCKETS: &[(&str, &str)] = &[
    ("1-10", "1-10"),
    ("11-50", "11-50"),
    ("51-200", "51-200"),
    ("201-500", "201-500"),
    ("501-1000", "501-1000"),
    ("1001-5000", "1001-5000"),
    ("5001-10000", "5001-10000"),
    ("5001-10,000", "5001-10000"),
    ("10000+", "10000+"),
    ("10,000+", "10000+"),
];

/// Normalizes a revenue estimate to its canonical bucket label.
pub fn standardize_revenue(value: &str) -> String {
    standardize(value, REVENUE_BUCKETS)
}

/// Normalizes a company-size estimate to its canonical bucket label.
pub fn standardize_company_size(value: &str) -> String {
    standardize(value, COMPANY_SIZE_BUCKETS)
}

/// Exact-key match first, then a substring scan for free-text values.
/// The substring pass prefers the longest matching key so "501-1000" can
/// never be shadowed by "1-10". Matching is case-sensitive.
fn standardize(value: &str, table: &[(&str, &str)]) -> String {
    let trimmed = value.trim();

    for (key, canonical) in table {
        if trimmed == *key {
            return (*canonical).to_string();
        }
    }

    let mut best: Option<(&str, &str)> = None;
    for (key, canonical) in table {
        if trimmed.contains(key) {
            match best {
                Some((best_key, _)) if best_key.len() >= key.len() => {}
                _ => best = Some((key, canonical)),
            }
        }
    }

    match best {
        Some((_, canonical)) => canonical.to_string(),
        None => UNKNOWN.to_string(),
    }
}
