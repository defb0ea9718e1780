//! Coverage links and their aggregation
//!
//! Links come from two origins: the protocol's own metadata (highest
//! authority) and links discovered in project READMEs. The aggregator merges
//! them so that no two surviving links share a normalized URL and the link
//! from the higher-priority origin wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::{DataSource, Degradation, ProtocolDetail};

/// A discovered reference about a protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageLink {
    pub title: String,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub summary: String,
}

impl CoverageLink {
    /// Identity key used for de-duplication
    pub fn key(&self) -> String {
        normalize_url(&self.url)
    }
}

/// Lowercase and strip surrounding whitespace and trailing slashes
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// Where a batch of links came from, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkOrigin {
    Metadata,
    Readme,
}

impl LinkOrigin {
    /// Provenance tag contributed to the bundle's `dataSource`
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Metadata => "defillama",
            Self::Readme => "github",
        }
    }
}

/// The analyst-coverage bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystCoverage {
    pub articles: Vec<CoverageLink>,
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Degradation>,
}

/// Collects link batches and merges them by origin priority
#[derive(Debug, Default)]
pub struct CoverageAggregator {
    batches: Vec<(LinkOrigin, Vec<CoverageLink>)>,
    degraded: Vec<Degradation>,
}

impl CoverageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, origin: LinkOrigin, links: Vec<CoverageLink>) {
        self.batches.push((origin, links));
    }

    /// Record a lookup that failed instead of contributing links
    pub fn degrade(&mut self, degradation: Degradation) {
        self.degraded.push(degradation);
    }

    /// Merge all batches. Metadata links go first regardless of insertion
    /// order; within an origin, batches keep the order they were added in.
    /// With no surviving links the bundle is `unavailable` if any lookup
    /// failed and `no_data` otherwise.
    pub fn build(mut self) -> AnalystCoverage {
        self.batches.sort_by_key(|(origin, _)| *origin);

        let mut seen: HashSet<String> = HashSet::new();
        let mut articles = Vec::new();
        let mut sources = Vec::new();

        for (origin, links) in self.batches {
            for link in links {
                if link.url.trim().is_empty() {
                    continue;
                }
                if seen.insert(link.key()) {
                    sources.push(origin.tag());
                    articles.push(link);
                }
            }
        }

        let fallback = if self.degraded.is_empty() {
            DataSource::NoData
        } else {
            DataSource::Unavailable
        };

        AnalystCoverage {
            articles,
            data_source: DataSource::from_sources(sources, fallback),
            degraded: self.degraded,
        }
    }
}

/// Links stated in the protocol's own metadata
pub fn metadata_links(detail: &ProtocolDetail) -> Vec<CoverageLink> {
    let mut links = Vec::new();

    if let Some(url) = detail.url.as_deref().filter(|u| !u.trim().is_empty()) {
        links.push(CoverageLink {
            title: format!("{} official website", detail.name),
            source: "Protocol metadata".to_string(),
            url: url.trim().to_string(),
            date: None,
            summary: "Project homepage as listed by the TVL aggregator".to_string(),
        });
    }

    if let Some(handle) = detail.twitter.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        let handle = handle.trim_start_matches('@');
        links.push(CoverageLink {
            title: format!("@{} on X", handle),
            source: "Protocol metadata".to_string(),
            url: format!("https://x.com/{}", handle),
            date: None,
            summary: "Official social account".to_string(),
        });
    }

    for url in detail.audit_links.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        links.push(CoverageLink {
            title: format!("{} audit report", detail.name),
            source: "Protocol metadata".to_string(),
            url: url.to_string(),
            date: None,
            summary: "Audit report linked from protocol metadata".to_string(),
        });
    }

    links
}

/// Fixed categories recognised in README links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCategory {
    Documentation,
    Governance,
    Discord,
    Telegram,
    Blog,
    Security,
    Analytics,
}

impl LinkCategory {
    pub const ALL: [LinkCategory; 7] = [
        Self::Documentation,
        Self::Governance,
        Self::Discord,
        Self::Telegram,
        Self::Blog,
        Self::Security,
        Self::Analytics,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Documentation => "Documentation",
            Self::Governance => "Governance",
            Self::Discord => "Discord",
            Self::Telegram => "Telegram",
            Self::Blog => "Blog",
            Self::Security => "Security",
            Self::Analytics => "Analytics",
        }
    }

    /// Lowercase substrings matched against link text and URL
    fn patterns(&self) -> &'static [&'static str] {
        match self {
            Self::Documentation => &["docs", "documentation", "gitbook", "whitepaper"],
            Self::Governance => &["governance", "snapshot.org", "tally.xyz", "forum"],
            Self::Discord => &["discord"],
            Self::Telegram => &["telegram", "t.me/"],
            Self::Blog => &["blog", "medium.com", "mirror.xyz", "substack"],
            Self::Security => &["security", "audit", "bug bounty", "bugbounty", "immunefi"],
            Self::Analytics => &["analytics", "dune.com", "dashboard", "defillama", "tokenterminal"],
        }
    }

    /// First category whose patterns match the text or URL
    pub fn classify(text: &str, url: &str) -> Option<Self> {
        let text = text.to_lowercase();
        let url = url.to_lowercase();
        Self::ALL.into_iter().find(|category| {
            category
                .patterns()
                .iter()
                .any(|p| text.contains(p) || url.contains(p))
        })
    }
}

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!?)\[([^\[\]]*)\]\((https?://[^)\s]+)\)").unwrap()
});

static HTML_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["'](https?://[^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
});

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Scan README text for links in the fixed categories.
/// Image links are skipped; `repo` names the README's repository.
pub fn readme_links(readme: &str, repo: &str) -> Vec<CoverageLink> {
    let mut found: Vec<(String, String)> = Vec::new();

    for cap in MARKDOWN_LINK.captures_iter(readme) {
        if &cap[1] == "!" {
            continue;
        }
        found.push((cap[2].trim().to_string(), cap[3].to_string()));
    }
    for cap in HTML_ANCHOR.captures_iter(readme) {
        let text = HTML_TAG.replace_all(&cap[2], "").trim().to_string();
        found.push((text, cap[1].to_string()));
    }

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter_map(|(text, url)| {
            let category = LinkCategory::classify(&text, &url)?;
            if !seen.insert(normalize_url(&url)) {
                return None;
            }
            let title = if text.is_empty() {
                category.name().to_string()
            } else {
                format!("{}: {}", category.name(), text)
            };
            Some(CoverageLink {
                title,
                source: format!("GitHub README ({})", repo),
                url,
                date: None,
                summary: format!("{} link found in the {} README", category.name(), repo),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str, source: &str) -> CoverageLink {
        CoverageLink {
            title: "t".to_string(),
            source: source.to_string(),
            url: url.to_string(),
            date: None,
            summary: String::new(),
        }
    }

    #[test]
    fn test_duplicate_url_keeps_metadata_link() {
        let mut aggregator = CoverageAggregator::new();
        // README batch arrives first but must still lose the tie
        aggregator.add(LinkOrigin::Readme, vec![link("https://docs.example.org/", "readme")]);
        aggregator.add(LinkOrigin::Metadata, vec![link("https://docs.example.org", "metadata")]);

        let coverage = aggregator.build();
        assert_eq!(coverage.articles.len(), 1);
        assert_eq!(coverage.articles[0].source, "metadata");
        assert_eq!(coverage.data_source.to_string(), "defillama");
    }

    #[test]
    fn test_data_source_lists_contributors() {
        let mut aggregator = CoverageAggregator::new();
        aggregator.add(LinkOrigin::Metadata, vec![link("https://a.org", "m")]);
        aggregator.add(LinkOrigin::Readme, vec![link("https://b.org", "r")]);
        let coverage = aggregator.build();
        assert_eq!(coverage.data_source.to_string(), "defillama, github");
    }

    #[test]
    fn test_empty_is_no_data() {
        let coverage = CoverageAggregator::new().build();
        assert!(coverage.articles.is_empty());
        assert_eq!(coverage.data_source, DataSource::NoData);
    }

    #[test]
    fn test_failed_lookup_without_links_is_unavailable() {
        let mut aggregator = CoverageAggregator::new();
        aggregator.degrade(Degradation::new("readme:quiet", "connection failed"));
        let coverage = aggregator.build();
        assert!(coverage.articles.is_empty());
        assert_eq!(coverage.data_source, DataSource::Unavailable);
        assert_eq!(coverage.degraded[0].capability, "readme:quiet");

        // Surviving links still name their contributors
        let mut aggregator = CoverageAggregator::new();
        aggregator.add(LinkOrigin::Metadata, vec![link("https://a.org", "m")]);
        aggregator.degrade(Degradation::new("readme:quiet", "connection failed"));
        let coverage = aggregator.build();
        assert_eq!(coverage.data_source.to_string(), "defillama");
        assert_eq!(coverage.degraded.len(), 1);
    }

    #[test]
    fn test_metadata_links() {
        let detail = ProtocolDetail {
            name: "Aave".into(),
            url: Some("https://aave.com".into()),
            twitter: Some("aave".into()),
            audit_links: vec!["https://example.com/audit.pdf".into(), "  ".into()],
            ..Default::default()
        };
        let links = metadata_links(&detail);
        assert_eq!(links.len(), 3);
        assert_eq!(links[1].url, "https://x.com/aave");
    }

    #[test]
    fn test_classify_categories() {
        assert_eq!(
            LinkCategory::classify("Read the docs", "https://example.org"),
            Some(LinkCategory::Documentation)
        );
        assert_eq!(
            LinkCategory::classify("Chat", "https://DISCORD.gg/abc"),
            Some(LinkCategory::Discord)
        );
        assert_eq!(LinkCategory::classify("Home", "https://example.org"), None);
    }

    #[test]
    fn test_readme_links() {
        let readme = r#"
# Protocol
[![badge](https://img.shields.io/discord/1.svg)](https://discord.gg/proto)
- [Documentation](https://docs.proto.fi)
- [Join us on Discord](https://discord.gg/proto)
- [Governance Forum](https://gov.proto.fi)
- [Source](https://github.com/proto/core)
<a href="https://t.me/proto"><b>Telegram</b></a>
See also [docs again](https://docs.proto.fi/)
"#;
        let links = readme_links(readme, "proto/core");
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://docs.proto.fi",
                "https://discord.gg/proto",
                "https://gov.proto.fi",
                "https://t.me/proto",
            ]
        );
        assert!(links[3].title.starts_with("Telegram"));
        assert_eq!(links[0].source, "GitHub README (proto/core)");
    }
}
