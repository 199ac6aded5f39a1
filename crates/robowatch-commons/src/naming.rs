use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

/// Prefixes stripped from cluster resource names before hash removal,
/// longest first so `rpa-cronjob-` wins over `rpa-`.
const NAME_PREFIXES: [&str; 5] = ["rpa-cronjob-", "rpa-job-", "cronjob-", "job-", "rpa-"];

lazy_static! {
    // Kubernetes double hash, e.g. "-w5mwl-tt5tw". Both segments must carry
    // a digit, otherwise trailing words of a long robot name would be eaten.
    static ref DOUBLE_HASH: Regex =
        Regex::new(r"^(?P<stem>.+)-(?P<h1>[a-z0-9]{4,10})-(?P<h2>[a-z0-9]{4,10})$").unwrap();
    // Single hash or timestamp, e.g. "-29387700".
    static ref SINGLE_HASH: Regex = Regex::new(r"^(?P<stem>.+)-(?P<h>[a-z0-9]+)$").unwrap();
    // Trailing numeric suffix on cronjob resource names.
    static ref TRAILING_DIGITS: Regex = Regex::new(r"-\d+$").unwrap();
}

fn looks_like_hash(segment: &str) -> bool {
    segment.chars().any(|c| c.is_ascii_digit())
}

/// Folds a name for comparison: lowercase with `-` and `_` removed.
pub fn normalize(name: &str) -> String {
    name.to_lowercase().replace(['-', '_'], "")
}

/// Two slugs refer to the same robot iff their normalized forms are equal.
pub fn names_match(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Recovers the robot slug from a bare resource name: strip the first
/// matching prefix, then the Kubernetes double hash, then a single
/// hash/timestamp suffix.
pub fn slug_from_resource_name(name: &str) -> String {
    let mut slug = name.to_lowercase();

    for prefix in NAME_PREFIXES {
        if let Some(rest) = slug.strip_prefix(prefix) {
            slug = rest.to_string();
            break;
        }
    }

    if let Some(caps) = DOUBLE_HASH.captures(&slug) {
        if looks_like_hash(&caps["h1"]) && looks_like_hash(&caps["h2"]) {
            slug = caps["stem"].to_string();
        }
    }

    if let Some(caps) = SINGLE_HASH.captures(&slug) {
        if looks_like_hash(&caps["h"]) {
            slug = caps["stem"].to_string();
        }
    }

    slug
}

/// Canonical slug for a cluster resource: identification labels win, the
/// name-derived slug is the fallback.
pub fn robot_slug(labels: &BTreeMap<String, String>, name: &str) -> String {
    if let Some(label) = labels
        .get("nome_robo")
        .or_else(|| labels.get("nome-robo"))
        .or_else(|| labels.get("app"))
    {
        return label.to_lowercase();
    }
    slug_from_resource_name(name)
}

/// Robot name behind a cronjob resource name (`rpa-cronjob-<name>` or
/// `<name>-cronjob`, optionally with a numeric suffix).
pub fn cronjob_robot_name(name: &str) -> String {
    let stripped = name
        .strip_prefix("rpa-cronjob-")
        .or_else(|| name.strip_suffix("-cronjob"))
        .unwrap_or(name);
    TRAILING_DIGITS.replace(stripped, "").into_owned()
}

/// Robot name behind a deployment resource name.
pub fn deployment_robot_name(name: &str) -> String {
    name.strip_prefix("deployment-")
        .or_else(|| name.strip_suffix("-deployment"))
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Att_Infos-Bitrix"), "attinfosbitrix");
        assert!(names_match("att_infos_bitrix", "att-infos-bitrix"));
        assert!(names_match("att_infos_bitrix", "att_infos_bitrix"));
        assert!(!names_match("att_infos_bitrix", "att_infos"));
    }

    #[test]
    fn test_slug_from_job_name_with_double_hash() {
        assert_eq!(
            slug_from_resource_name("rpa-job-att-infos-bitrix-9pltw-rz6lg"),
            "att-infos-bitrix"
        );
    }

    #[test]
    fn test_slug_from_cronjob_job_name() {
        // The trailing segment is a timestamp, the word before it is part of
        // the robot name and must survive.
        assert_eq!(
            slug_from_resource_name("rpa-cronjob-painel-de-processos-acessorias-29387700"),
            "painel-de-processos-acessorias"
        );
    }

    #[test]
    fn test_slug_prefix_order() {
        assert_eq!(slug_from_resource_name("rpa-job-bot-123456"), "bot");
        assert_eq!(slug_from_resource_name("job-bot-123456"), "bot");
        assert_eq!(slug_from_resource_name("rpa-bot-123456"), "bot");
    }

    #[test]
    fn test_slug_is_reflexive_for_plain_names() {
        // A name with no prefix and no digit-bearing suffix passes through.
        assert_eq!(slug_from_resource_name("painel-de-processos"), "painel-de-processos");
        assert!(names_match(
            slug_from_resource_name("painel-de-processos").as_str(),
            "painel-de-processos"
        ));
    }

    #[test]
    fn test_label_wins_over_name() {
        let mut labels = BTreeMap::new();
        labels.insert("nome_robo".to_string(), "Att_Infos_Bitrix".to_string());
        assert_eq!(robot_slug(&labels, "whatever-xyz12"), "att_infos_bitrix");

        let mut dashed = BTreeMap::new();
        dashed.insert("nome-robo".to_string(), "bot-a".to_string());
        assert_eq!(robot_slug(&dashed, "x"), "bot-a");

        let mut app = BTreeMap::new();
        app.insert("app".to_string(), "bot-b".to_string());
        assert_eq!(robot_slug(&app, "x"), "bot-b");
    }

    #[test]
    fn test_dashboard_grouping_normalization() {
        let slug = slug_from_resource_name("rpa-cronjob-painel-de-processos-acessorias-29387700");
        assert_eq!(normalize(&slug), "paineldeprocessosacessorias");
    }

    #[test]
    fn test_cronjob_robot_name() {
        assert_eq!(
            cronjob_robot_name("rpa-cronjob-painel-de-processos-acessorias"),
            "painel-de-processos-acessorias"
        );
        assert_eq!(cronjob_robot_name("daily-export-cronjob"), "daily-export");
        assert_eq!(cronjob_robot_name("rpa-cronjob-bot-42"), "bot");
    }

    #[test]
    fn test_deployment_robot_name() {
        assert_eq!(deployment_robot_name("deployment-api-proxy"), "api-proxy");
        assert_eq!(deployment_robot_name("api-proxy-deployment"), "api-proxy");
        assert_eq!(deployment_robot_name("api-proxy"), "api-proxy");
    }
}
