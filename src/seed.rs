//! Derived-seed synthesis.
//!
//! Registering a seed can synthesize additional crawl origins: `robots.txt`
//! and `sitemap.xml` at the site root, and VCS metadata files at the seed's
//! own path depth. A guard pattern skips VCS synthesis when the seed already
//! lies inside such a metadata directory, so crawling a discovered `.git`
//! tree cannot recursively re-seed itself.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::config::SpiderConfig;

const ROOT_SEEDS: [&str; 2] = ["/robots.txt", "/sitemap.xml"];
const VCS_SEEDS: [&str; 3] = [".svn/entries", ".svn/wc.db", ".git/index"];

fn vcs_guard() -> &'static Regex {
    static GUARD: OnceLock<Regex> = OnceLock::new();
    GUARD.get_or_init(|| Regex::new(r"(?i)/\.(svn|git)(/|$)").expect("valid guard pattern"))
}

/// Synthesizes the derived seeds the configuration asks for. The returned
/// list never contains the seed itself and carries no duplicates.
pub(crate) fn derived_seeds(seed: &Url, config: &SpiderConfig) -> Vec<Url> {
    let mut derived = Vec::new();

    let enabled_roots = [config.handle_robots_txt, config.handle_sitemap_xml];
    for (path, enabled) in ROOT_SEEDS.iter().zip(enabled_roots) {
        if !enabled {
            continue;
        }
        if let Ok(url) = seed.join(path) {
            derived.push(url);
        }
    }

    if config.handle_vcs_metadata {
        if vcs_guard().is_match(seed.path()) {
            debug!(seed = %seed, "seed already inside a VCS metadata directory, not re-seeding");
        } else {
            // `Url::join` resolves these relative to the seed's directory,
            // keeping the synthesized files at the same path depth.
            for relative in VCS_SEEDS {
                if let Ok(url) = seed.join(relative) {
                    derived.push(url);
                }
            }
        }
    }

    derived.retain(|url| url != seed);
    derived.dedup();
    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(robots: bool, sitemap: bool, vcs: bool) -> SpiderConfig {
        SpiderConfig {
            handle_robots_txt: robots,
            handle_sitemap_xml: sitemap,
            handle_vcs_metadata: vcs,
            ..SpiderConfig::default()
        }
    }

    fn urls(seed: &str, config: &SpiderConfig) -> Vec<String> {
        derived_seeds(&Url::parse(seed).unwrap(), config)
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn root_seeds_are_site_anchored() {
        let derived = urls("http://example.com/app/deep/page", &config(true, true, false));
        assert_eq!(
            derived,
            vec![
                "http://example.com/robots.txt".to_string(),
                "http://example.com/sitemap.xml".to_string(),
            ]
        );
    }

    #[test]
    fn vcs_seeds_stay_at_the_seed_path_depth() {
        let derived = urls("http://example.com/app/page", &config(false, false, true));
        assert_eq!(
            derived,
            vec![
                "http://example.com/app/.svn/entries".to_string(),
                "http://example.com/app/.svn/wc.db".to_string(),
                "http://example.com/app/.git/index".to_string(),
            ]
        );
    }

    #[test]
    fn vcs_synthesis_skipped_inside_metadata_directories() {
        assert!(urls("http://example.com/app/.git/index", &config(false, false, true)).is_empty());
        assert!(urls("http://example.com/x/.SVN/entries", &config(false, false, true)).is_empty());
    }

    #[test]
    fn disabled_toggles_synthesize_nothing() {
        assert!(urls("http://example.com/a", &config(false, false, false)).is_empty());
    }

    #[test]
    fn derived_never_contains_the_seed_itself() {
        let derived = urls("http://example.com/robots.txt", &config(true, true, false));
        assert_eq!(derived, vec!["http://example.com/sitemap.xml".to_string()]);
    }
}
