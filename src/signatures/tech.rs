use serde::{Deserialize, Serialize};

const PATTERN_WEIGHT: u32 = 30;
const HEADER_WEIGHT: u32 = 40;
const SCRIPT_WEIGHT: u32 = 30;
const MAX_CONFIDENCE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TechCategory {
    Framework,
    Cms,
    Server,
    Security,
    Analytics,
}

impl TechCategory {
    pub const ALL: [TechCategory; 5] = [
        TechCategory::Framework,
        TechCategory::Cms,
        TechCategory::Server,
        TechCategory::Security,
        TechCategory::Analytics,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TechCategory::Framework => "Framework",
            TechCategory::Cms => "CMS/Platform",
            TechCategory::Server => "Server/CDN",
            TechCategory::Security => "Security/WAF",
            TechCategory::Analytics => "Analytics",
        }
    }
}

pub struct TechSignature {
    pub name: &'static str,
    pub category: TechCategory,
    pub patterns: &'static [&'static str],
    pub headers: &'static [&'static str],
    pub scripts: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechHit {
    pub name: &'static str,
    pub category: TechCategory,
    pub confidence: u32,
    pub evidence: Vec<String>,
}

const fn sig(
    name: &'static str,
    category: TechCategory,
    patterns: &'static [&'static str],
    headers: &'static [&'static str],
    scripts: &'static [&'static str],
) -> TechSignature {
    TechSignature {
        name,
        category,
        patterns,
        headers,
        scripts,
    }
}

use TechCategory::{Analytics, Cms, Framework, Security, Server};

pub const TECH_SIGNATURES: &[TechSignature] = &[
    sig("React", Framework, &["react", "_reactRootContainer", "__REACT_DEVTOOLS_GLOBAL_HOOK__"], &[], &["react.js", "react.min.js", "react.production.min.js"]),
    sig("Vue.js", Framework, &["__vue__", "Vue.config"], &[], &["vue.js", "vue.min.js", "vue.runtime"]),
    sig("Angular", Framework, &["ng-version", "ng-app", "__ng_"], &[], &["angular.js", "angular.min.js", "@angular/core"]),
    sig("jQuery", Framework, &["jquery"], &[], &["jquery.js", "jquery.min.js", "jquery-"]),
    sig("Next.js", Framework, &["__NEXT_DATA__", "_next/static", "next/router"], &["x-nextjs-cache", "x-nextjs-matched-path"], &["_next/"]),
    sig("Nuxt.js", Framework, &["__NUXT__", "_nuxt/"], &[], &["_nuxt/"]),
    sig("Svelte", Framework, &["svelte-"], &[], &["svelte"]),
    sig("WordPress", Cms, &["wp-content", "wp-includes", "wp-json"], &["x-powered-by: wp", "wp-json"], &["wp-includes", "wp-content"]),
    sig("Drupal", Cms, &["Drupal.settings", "drupal.js", "/sites/default/"], &["x-drupal-cache", "x-generator: drupal"], &["drupal"]),
    sig("Joomla", Cms, &["/components/com_", "/media/jui/", "Joomla!"], &[], &["joomla"]),
    sig("Shopify", Cms, &["Shopify.theme", "cdn.shopify.com", "myshopify.com"], &["x-shopify-stage"], &["cdn.shopify.com"]),
    sig("Magento", Cms, &["Mage.Cookies", "/static/version", "mage/"], &[], &["mage/", "magento"]),
    sig("Ghost", Cms, &["ghost-", "ghost/"], &["x-ghost-"], &["ghost"]),
    sig("nginx", Server, &[], &["server: nginx"], &[]),
    sig("Apache", Server, &[], &["server: apache"], &[]),
    sig("IIS", Server, &[], &["server: microsoft-iis", "x-powered-by: asp.net"], &[]),
    sig("Cloudflare", Server, &[], &["server: cloudflare", "cf-ray"], &[]),
    sig("AWS", Server, &[], &["x-amz-", "x-amzn-", "server: amazons3"], &[]),
    sig("Vercel", Server, &[], &["x-vercel-", "server: vercel"], &[]),
    sig("Netlify", Server, &[], &["x-nf-", "server: netlify"], &[]),
    sig("Cloudflare WAF", Security, &[], &["cf-ray", "cf-cache-status"], &[]),
    sig("AWS WAF", Security, &[], &["x-amzn-waf"], &[]),
    sig("Akamai", Security, &[], &["x-akamai-", "akamai-"], &[]),
    sig("Sucuri", Security, &[], &["x-sucuri-"], &[]),
    sig("Imperva", Security, &[], &["x-iinfo"], &[]),
    sig("Google Analytics", Analytics, &["google-analytics.com/analytics.js", "gtag(", "ga("], &[], &["google-analytics.com", "googletagmanager.com"]),
    sig("Google Tag Manager", Analytics, &["googletagmanager.com/gtm.js"], &[], &["googletagmanager.com"]),
    sig("Facebook Pixel", Analytics, &["connect.facebook.net", "fbq("], &[], &["connect.facebook.net"]),
    sig("Hotjar", Analytics, &["hotjar.com", "hj("], &[], &["static.hotjar.com"]),
    sig("Mixpanel", Analytics, &["mixpanel.com", "mixpanel.init"], &[], &["cdn.mxpnl.com"]),
];

pub fn fingerprint(
    categories: &[TechCategory],
    body: &str,
    header_text: &str,
    script_text: &str,
) -> Vec<TechHit> {
    TECH_SIGNATURES
        .iter()
        .filter(|s| categories.contains(&s.category))
        .filter_map(|s| score(s, body, header_text, script_text))
        .collect()
}

fn score(signature: &TechSignature, body: &str, header_text: &str, script_text: &str) -> Option<TechHit> {
    let mut confidence = 0;
    let mut evidence = Vec::new();

    for pattern in signature.patterns {
        if body.contains(&pattern.to_lowercase()) {
            confidence += PATTERN_WEIGHT;
            evidence.push(format!("Pattern: {}", pattern));
        }
    }
    for header in signature.headers {
        if header_text.contains(&header.to_lowercase()) {
            confidence += HEADER_WEIGHT;
            evidence.push(format!("Header: {}", header));
        }
    }
    for script in signature.scripts {
        if script_text.contains(&script.to_lowercase()) {
            confidence += SCRIPT_WEIGHT;
            evidence.push(format!("Script: {}", script));
        }
    }

    if evidence.is_empty() {
        return None;
    }

    Some(TechHit {
        name: signature.name,
        category: signature.category,
        confidence: confidence.min(MAX_CONFIDENCE),
        evidence,
    })
}
