//! Deterministic requirement extraction from catalog vocabulary.

use std::ops::Range;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};

use super::{ParserError, RequirementParser};
use crate::catalog::Catalog;
use crate::ir::{
    OrderBy, RelativeWindow, SortDirection, StructuredRequirement, TimeRange, TimeRangeKind,
    NONE_DIMENSION,
};

struct TimeRule {
    pattern: Regex,
    range: fn(&Captures<'_>) -> TimeRange,
}

fn rule(pattern: &str, range: fn(&Captures<'_>) -> TimeRange) -> TimeRule {
    TimeRule {
        pattern: Regex::new(pattern).expect("valid regex"),
        range,
    }
}

/// Time expressions in priority order; the first rule that matches wins.
static TIME_RULES: LazyLock<Vec<TimeRule>> = LazyLock::new(|| {
    vec![
        rule(
            r"(\d{4}-\d{1,2}-\d{1,2})\s*(?:to|until|through|and|~|至|到|-)\s*(\d{4}-\d{1,2}-\d{1,2})",
            |c| TimeRange {
                kind: TimeRangeKind::Absolute,
                value: format!("{}/{}", &c[1], &c[2]),
            },
        ),
        rule(
            r"\b(?:last|past|previous)\s+(\d+)\s+days?\b|(?:最近|过去|近)\s*(\d+)\s*(?:天|日)",
            |c| {
                let n = c.get(1).or_else(|| c.get(2)).map_or("", |m| m.as_str());
                match n.parse().ok().and_then(RelativeWindow::last_n_days) {
                    Some(window) => TimeRange::relative(window.as_str()),
                    None => TimeRange::relative(format!("last_{}_days", n)),
                }
            },
        ),
        rule(r"\b(?:last|past)\s+week\b|最近一周|近一周|过去一周", |_| {
            TimeRange::relative(RelativeWindow::Last7Days.as_str())
        }),
        rule(r"\byesterday\b|昨天|昨日", |_| {
            TimeRange::relative(RelativeWindow::Yesterday.as_str())
        }),
        rule(r"\btoday\b|今天|今日", |_| {
            TimeRange::relative(RelativeWindow::Today.as_str())
        }),
        rule(r"\bthis\s+month\b|\bmonth\s+to\s+date\b|本月|这个月", |_| {
            TimeRange::relative(RelativeWindow::ThisMonth.as_str())
        }),
        rule(r"\b(?:last|previous)\s+month\b|上个月|上月", |_| {
            TimeRange::relative(RelativeWindow::LastMonth.as_str())
        }),
        rule(r"\ball[\s-]+time\b|历史以来|全部时间|所有时间", |_| {
            TimeRange::relative(RelativeWindow::AllTime.as_str())
        }),
    ]
});

static TOTALS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:total|totals|overall|altogether)\b|总体|总计|整体|汇总|合计")
        .expect("valid regex")
});

static RANK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(top|bottom)\s*(\d+)\b|(前|后)\s*(\d+)").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Metric,
    Dimension,
}

#[derive(Debug, Clone)]
struct VocabularyEntry {
    /// Lowercased phrase.
    phrase: String,
    term: Term,
    /// Canonical catalog name.
    name: String,
}

/// Matches metric and dimension names, synonyms, time phrases and ranking
/// phrases in English and Chinese.
///
/// Longer phrases are matched first and masked out, so "cost per click"
/// never also reads as "cost". Phrases starting or ending with an ASCII
/// word character only match on word boundaries; CJK phrases match
/// anywhere. Filters are never extracted.
#[derive(Debug, Clone)]
pub struct KeywordParser {
    vocabulary: Vec<VocabularyEntry>,
}

impl KeywordParser {
    pub fn new(catalog: &Catalog) -> Self {
        let mut vocabulary = Vec::new();
        for metric in catalog.metrics() {
            let phrases = std::iter::once(&metric.name).chain(&metric.synonyms);
            for phrase in phrases {
                vocabulary.push(VocabularyEntry {
                    phrase: phrase.to_lowercase(),
                    term: Term::Metric,
                    name: metric.name.clone(),
                });
            }
        }
        for dimension in catalog.dimensions() {
            let phrases = std::iter::once(&dimension.name).chain(&dimension.synonyms);
            for phrase in phrases {
                vocabulary.push(VocabularyEntry {
                    phrase: phrase.to_lowercase(),
                    term: Term::Dimension,
                    name: dimension.name.clone(),
                });
            }
        }
        vocabulary.retain(|e| !e.phrase.trim().is_empty());
        vocabulary.sort_by(|a, b| {
            b.phrase
                .chars()
                .count()
                .cmp(&a.phrase.chars().count())
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        vocabulary.dedup_by(|a, b| a.phrase == b.phrase);

        Self { vocabulary }
    }

    /// Extract a candidate requirement from `text`.
    pub fn extract(&self, text: &str) -> StructuredRequirement {
        let mut masked = text.to_lowercase();
        let mut ir = StructuredRequirement::new();

        let time = TIME_RULES.iter().find_map(|rule| {
            rule.pattern
                .captures(&masked)
                .map(|caps| ((rule.range)(&caps), whole_match(&caps)))
        });
        if let Some((range, span)) = time {
            ir.time_range = Some(range);
            mask(&mut masked, span);
        }

        let ranking = RANK_RE.captures(&masked).map(|caps| {
            let word = caps.get(1).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            let count = caps.get(2).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
            let direction = match word {
                "bottom" | "后" => SortDirection::Asc,
                _ => SortDirection::Desc,
            };
            (count.parse::<u64>().ok(), direction, whole_match(&caps))
        });
        let mut rank = None;
        if let Some((limit, direction, span)) = ranking {
            rank = limit.map(|limit| (limit, direction));
            mask(&mut masked, span);
        }

        let mut hits: Vec<(usize, &VocabularyEntry)> = Vec::new();
        for entry in &self.vocabulary {
            let found: Vec<Range<usize>> = masked
                .match_indices(entry.phrase.as_str())
                .map(|(start, m)| start..start + m.len())
                .filter(|span| at_word_boundary(&masked, span))
                .collect();
            for span in found {
                hits.push((span.start, entry));
                mask(&mut masked, span);
            }
        }
        hits.sort_by_key(|(pos, _)| *pos);

        for (_, entry) in hits {
            let names = match entry.term {
                Term::Metric => &mut ir.metrics,
                Term::Dimension => &mut ir.dimensions,
            };
            if !names.contains(&entry.name) {
                names.push(entry.name.clone());
            }
        }

        if ir.dimensions.is_empty() && TOTALS_RE.is_match(&masked) {
            ir.dimensions.push(NONE_DIMENSION.to_string());
        }

        if let Some((limit, direction)) = rank {
            ir.limit = Some(limit);
            if let Some(first) = ir.metrics.first() {
                ir.order_by = Some(OrderBy {
                    field: first.clone(),
                    direction,
                });
            }
        }

        tracing::debug!(
            metrics = ?ir.metrics,
            dimensions = ?ir.dimensions,
            time_range = ?ir.time_range.as_ref().map(|t| &t.value),
            "keyword extraction"
        );
        ir
    }
}

#[async_trait]
impl RequirementParser for KeywordParser {
    async fn parse(&self, text: &str) -> Result<StructuredRequirement, ParserError> {
        Ok(self.extract(text))
    }
}

fn whole_match(caps: &Captures<'_>) -> Range<usize> {
    caps.get(0).map_or(0..0, |m| m.range())
}

/// Blank out a matched span without shifting byte offsets.
fn mask(text: &mut String, span: Range<usize>) {
    let blanks = " ".repeat(span.len());
    text.replace_range(span, &blanks);
}

fn at_word_boundary(text: &str, span: &Range<usize>) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let phrase = &text[span.clone()];
    let before = text[..span.start].chars().next_back();
    let after = text[span.end..].chars().next();

    let open_ok = !(phrase.chars().next().is_some_and(is_word) && before.is_some_and(is_word));
    let close_ok = !(phrase.chars().next_back().is_some_and(is_word) && after.is_some_and(is_word));
    open_ok && close_ok
}
