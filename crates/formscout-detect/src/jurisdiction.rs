//! URL → jurisdiction mapping.
//!
//! Rules are tried in order and the first match wins, so the table lists the
//! most specific hosts first: known registration sub-domains, then agency
//! domains (optionally narrowed by path), then state portals, then any `.gov`.

use formscout_core::Jurisdiction;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::error::DetectError;

/// Declarative form of a [`JurisdictionRule`].
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    /// Host pattern (matched against the lowercase host).
    pub host: &'static str,
    /// Optional path pattern (matched against the lowercase path).
    pub path: Option<&'static str>,
    pub code: &'static str,
    pub prior: u8,
}

const fn rule(host: &'static str, path: Option<&'static str>, code: &'static str, prior: u8) -> RuleSpec {
    RuleSpec {
        host,
        path,
        code,
        prior,
    }
}

const REGISTRATION_PATH: &str = r"(regist|business|corp|formation|llc|entity|license|filing)";

pub const BUILTIN_RULES: &[RuleSpec] = &[
    // District of Columbia
    rule(r"^mytax\.dc\.gov$", None, "DC", 80),
    rule(r"^corponline\.(dcra|dlcp)\.dc\.gov$", None, "DC", 90),
    rule(r"(^|\.)dc\.gov$", Some(REGISTRATION_PATH), "DC", 65),
    rule(r"(^|\.)dc\.gov$", None, "DC", 45),
    // California
    rule(r"^bizfileonline\.sos\.ca\.gov$", None, "CA", 90),
    rule(r"(^|\.)sos\.ca\.gov$", None, "CA", 60),
    rule(r"(^|\.)ca\.gov$", None, "CA", 35),
    // Texas
    rule(r"^direct\.sos\.state\.tx\.us$", None, "TX", 85),
    rule(r"(^|\.)sos\.(state\.tx\.us|texas\.gov)$", None, "TX", 60),
    rule(r"(^|\.)texas\.gov$", None, "TX", 35),
    // New York
    rule(r"^apps\.dos\.ny\.gov$", None, "NY", 80),
    rule(r"(^|\.)dos\.ny\.gov$", None, "NY", 60),
    rule(r"(^|\.)ny\.gov$", None, "NY", 35),
    // Florida
    rule(r"(^|\.)sunbiz\.org$", None, "FL", 80),
    rule(r"(^|\.)dos\.fl\.gov$", None, "FL", 55),
    rule(r"(^|\.)myflorida\.com$", None, "FL", 35),
    // Delaware
    rule(r"^icis\.corp\.delaware\.gov$", None, "DE", 90),
    rule(r"(^|\.)corp\.delaware\.gov$", None, "DE", 70),
    rule(r"(^|\.)delaware\.gov$", None, "DE", 35),
    // Federal (EIN application)
    rule(r"^sa\.www4\.irs\.gov$", None, "US", 90),
    rule(r"(^|\.)irs\.gov$", Some(r"(ein|employer-id)"), "US", 65),
    rule(r"(^|\.)irs\.gov$", None, "US", 35),
    // Any other government site
    rule(r"\.gov$", Some(REGISTRATION_PATH), "GOV", 40),
    rule(r"\.gov$", None, "GOV", 25),
];

/// Prior given to pages that match no rule.
pub const UNKNOWN_PRIOR: u8 = 10;

#[derive(Debug, Clone)]
pub struct JurisdictionRule {
    host: Regex,
    path: Option<Regex>,
    code: String,
    prior: u8,
}

impl JurisdictionRule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, DetectError> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|source| DetectError::Rule {
                code: spec.code.to_string(),
                source,
            })
        };
        Ok(Self {
            host: compile(spec.host)?,
            path: spec.path.map(compile).transpose()?,
            code: spec.code.to_string(),
            prior: spec.prior,
        })
    }

    fn matches(&self, host: &str, path: &str) -> bool {
        self.host.is_match(host) && self.path.as_ref().is_none_or(|p| p.is_match(path))
    }
}

#[derive(Debug, Clone)]
pub struct JurisdictionAnalyzer {
    rules: Vec<JurisdictionRule>,
}

impl JurisdictionAnalyzer {
    pub fn builtin() -> Result<Self, DetectError> {
        Self::from_specs(BUILTIN_RULES)
    }

    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, DetectError> {
        let rules = specs
            .iter()
            .map(JurisdictionRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Map a page URL to its jurisdiction. Unparseable or unmatched URLs are
    /// [`Jurisdiction::unknown`].
    pub fn analyze(&self, page_url: &str) -> Jurisdiction {
        let Some((host, path)) = host_and_path(page_url) else {
            debug!(url = page_url, "unparseable page URL");
            return Jurisdiction::unknown(UNKNOWN_PRIOR);
        };

        self.rules
            .iter()
            .find(|r| r.matches(&host, &path))
            .map(|r| Jurisdiction {
                code: r.code.clone(),
                prior: r.prior,
            })
            .unwrap_or_else(|| Jurisdiction::unknown(UNKNOWN_PRIOR))
    }
}

/// Lowercase host and path. Scheme-less input (`mytax.dc.gov/...`) is
/// treated as https.
fn host_and_path(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    let parsed = Url::parse(raw)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{raw}")).ok())?;
    let host = parsed.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    Some((host, parsed.path().to_ascii_lowercase()))
}
