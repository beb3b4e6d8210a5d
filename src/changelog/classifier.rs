use regex::Regex;
use serde::Serialize;

use super::item::Item;
use crate::config::CategoryConfig;
use crate::error::{ChangelogError, ChangelogResult};

/// Items of one kind bucketed into label sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    pub items: Vec<Item>,
}

impl Partition {
    pub fn total(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Changelog {
    pub issues: Partition,
    pub pull_requests: Partition,
}

/// Label regexes applied before classification. Items whose joined label
/// text does not match are dropped.
#[derive(Debug, Default)]
pub struct LabelFilters {
    issue: Option<Regex>,
    pull_request: Option<Regex>,
}

impl LabelFilters {
    pub fn new(issue: Option<&str>, pull_request: Option<&str>) -> ChangelogResult<Self> {
        Ok(Self {
            issue: issue.map(compile).transpose()?,
            pull_request: pull_request.map(compile).transpose()?,
        })
    }

    pub fn keeps(&self, item: &Item) -> bool {
        let pattern = if item.is_pull_request() {
            &self.pull_request
        } else {
            &self.issue
        };
        pattern
            .as_ref()
            .map_or(true, |re| re.is_match(&item.label_text()))
    }
}

fn compile(pattern: &str) -> ChangelogResult<Regex> {
    Regex::new(pattern).map_err(|source| ChangelogError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

pub struct Classifier {
    categories: Vec<CategoryConfig>,
    default_section: String,
}

impl Classifier {
    pub fn new(categories: Vec<CategoryConfig>, default_section: impl Into<String>) -> Self {
        Self {
            categories,
            default_section: default_section.into(),
        }
    }

    /// Index of the first category claiming one of the item's labels.
    fn category_of(&self, item: &Item) -> Option<usize> {
        self.categories
            .iter()
            .position(|category| item.labels.iter().any(|label| category.matches(label)))
    }

    pub fn classify(&self, items: Vec<Item>) -> Changelog {
        let (pull_requests, issues): (Vec<Item>, Vec<Item>) =
            items.into_iter().partition(|item| item.is_pull_request());

        Changelog {
            issues: self.partition(issues),
            pull_requests: self.partition(pull_requests),
        }
    }

    fn partition(&self, items: Vec<Item>) -> Partition {
        // One bucket per category plus the default bucket at the end.
        let mut buckets: Vec<Vec<Item>> = vec![Vec::new(); self.categories.len() + 1];
        let fallback = self.categories.len();

        for item in items {
            let index = self.category_of(&item).unwrap_or(fallback);
            buckets[index].push(item);
        }

        let names = self
            .categories
            .iter()
            .map(|c| c.name.clone())
            .chain(std::iter::once(self.default_section.clone()));

        let sections = names
            .zip(buckets)
            .filter(|(_, items)| !items.is_empty())
            .map(|(name, items)| Section { name, items })
            .collect();

        Partition { sections }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::item::ItemKind;
    use crate::config::Config;
    use pretty_assertions::assert_eq;

    fn item(number: u64, kind: ItemKind, labels: &[&str]) -> Item {
        Item {
            number,
            title: format!("Item {}", number),
            author: "dev".to_string(),
            author_url: None,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            closed_at: None,
            kind,
            url: Some(format!("https://github.com/org/repo/issues/{}", number)),
        }
    }

    fn default_classifier() -> Classifier {
        let config = Config::default();
        Classifier::new(config.categories, config.default_section)
    }

    fn section_names(partition: &Partition) -> Vec<&str> {
        partition.sections.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn bug_and_unlabeled_issue() {
        let changelog = default_classifier().classify(vec![
            item(1, ItemKind::Issue, &["bug"]),
            item(2, ItemKind::Issue, &[]),
        ]);

        assert_eq!(section_names(&changelog.issues), vec!["Bug", "Other"]);
        assert_eq!(changelog.issues.sections[0].items[0].number, 1);
        assert_eq!(changelog.issues.sections[1].items[0].number, 2);
        assert!(changelog.pull_requests.sections.is_empty());
    }

    #[test]
    fn every_item_lands_in_exactly_one_section() {
        let items = vec![
            item(1, ItemKind::Issue, &["bug", "enhancement"]),
            item(2, ItemKind::PullRequest, &["docs"]),
            item(3, ItemKind::Issue, &["question"]),
            item(4, ItemKind::PullRequest, &["Bug"]),
            item(5, ItemKind::Issue, &["enhancement", "bug"]),
            item(6, ItemKind::PullRequest, &[]),
        ];
        let changelog = default_classifier().classify(items.clone());

        let mut seen: Vec<u64> = changelog
            .issues
            .sections
            .iter()
            .chain(changelog.pull_requests.sections.iter())
            .flat_map(|s| s.items.iter().map(|i| i.number))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(changelog.issues.total() + changelog.pull_requests.total(), items.len());
    }

    #[test]
    fn first_configured_category_wins() {
        let changelog = default_classifier().classify(vec![item(
            5,
            ItemKind::Issue,
            &["enhancement", "bug"],
        )]);
        assert_eq!(section_names(&changelog.issues), vec!["Bug"]);
    }

    #[test]
    fn api_order_is_kept_within_sections() {
        let changelog = default_classifier().classify(vec![
            item(9, ItemKind::Issue, &["bug"]),
            item(3, ItemKind::Issue, &["bug"]),
            item(7, ItemKind::Issue, &["bug"]),
        ]);
        let numbers: Vec<u64> = changelog.issues.sections[0]
            .items
            .iter()
            .map(|i| i.number)
            .collect();
        assert_eq!(numbers, vec![9, 3, 7]);
    }

    #[test]
    fn no_items_no_sections() {
        let changelog = default_classifier().classify(Vec::new());
        assert_eq!(changelog, Changelog::default());
    }

    #[test]
    fn label_filters_apply_per_kind() {
        let filters = LabelFilters::new(Some("bug"), None).unwrap();
        assert!(filters.keeps(&item(1, ItemKind::Issue, &["bug"])));
        assert!(!filters.keeps(&item(2, ItemKind::Issue, &["question"])));
        assert!(filters.keeps(&item(3, ItemKind::PullRequest, &[])));
    }

    #[test]
    fn bad_regex_is_reported() {
        let err = LabelFilters::new(None, Some("(unclosed")).unwrap_err();
        assert!(matches!(err, ChangelogError::InvalidRegex { .. }));
    }
}
