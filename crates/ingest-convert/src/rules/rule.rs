//! `rules` lines into route rules.
//!
//! A line is `KIND,payload,target[,options...]` or `MATCH,target`.

use ingest_schema::RouteRule;

use super::RulesError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Domain,
    DomainSuffix,
    DomainKeyword,
    DomainRegex,
    IpCidr,
    SrcIpCidr,
    Geoip,
    Geosite,
    DstPort,
    SrcPort,
    ProcessName,
}

impl RuleKind {
    fn parse(kind: &str) -> Option<Self> {
        let kind = match kind {
            "DOMAIN" => Self::Domain,
            "DOMAIN-SUFFIX" => Self::DomainSuffix,
            "DOMAIN-KEYWORD" => Self::DomainKeyword,
            "DOMAIN-REGEX" => Self::DomainRegex,
            "IP-CIDR" | "IP-CIDR6" => Self::IpCidr,
            "SRC-IP-CIDR" => Self::SrcIpCidr,
            "GEOIP" => Self::Geoip,
            "GEOSITE" => Self::Geosite,
            "DST-PORT" => Self::DstPort,
            "SRC-PORT" => Self::SrcPort,
            "PROCESS-NAME" => Self::ProcessName,
            _ => return None,
        };
        Some(kind)
    }
}

/// Route rules plus the catch-all target, if a `MATCH` line was present.
#[derive(Debug, Default)]
pub struct Translated {
    pub rules: Vec<RouteRule>,
    pub final_outbound: Option<String>,
}

/// Translate rule lines. `resolve` maps a target name to an outbound tag,
/// returning `None` for names that do not exist.
///
/// Adjacent lines with the same kind and target collapse into one rule.
pub fn translate_rules<F>(lines: &[String], resolve: F) -> Result<Translated, RulesError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = Translated::default();
    let mut last: Option<(RuleKind, String)> = None;

    for (index, line) in lines.iter().enumerate() {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let kind_name = parts[0].to_ascii_uppercase();

        let rule_error = |reason: &str| RulesError::Rule {
            index,
            rule: line.clone(),
            reason: reason.to_string(),
        };
        let target_of = |name: &str| {
            resolve(name).ok_or_else(|| RulesError::UnknownTarget {
                context: format!("rules[{}]", index),
                target: name.to_string(),
            })
        };

        if kind_name == "MATCH" || kind_name == "FINAL" {
            let name = parts
                .get(1)
                .copied()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| rule_error("missing target"))?;
            out.final_outbound = Some(target_of(name)?);
            if index + 1 < lines.len() {
                tracing::warn!(
                    ignored = lines.len() - index - 1,
                    "rules after {} are unreachable and were dropped",
                    kind_name
                );
            }
            break;
        }

        let Some(kind) = RuleKind::parse(&kind_name) else {
            tracing::warn!(rule = %line, "unsupported rule kind skipped");
            last = None;
            continue;
        };
        if parts.len() < 3 || parts[1].is_empty() || parts[2].is_empty() {
            return Err(rule_error("expected KIND,payload,target"));
        }
        let payload = parts[1];
        let target = target_of(parts[2])?;

        if kind == RuleKind::SrcPort && payload.contains('-') {
            tracing::warn!(rule = %line, "source port ranges are not supported, rule skipped");
            last = None;
            continue;
        }

        let coalesce = matches!(&last, Some((k, t)) if *k == kind && *t == target);
        if !coalesce {
            out.rules.push(RouteRule::to(target.clone()));
        }
        let rule = out
            .rules
            .last_mut()
            .ok_or_else(|| rule_error("no rule to extend"))?;
        apply(kind, payload, rule).map_err(|reason| rule_error(&reason))?;
        last = Some((kind, target));
    }

    Ok(out)
}

fn apply(kind: RuleKind, payload: &str, rule: &mut RouteRule) -> Result<(), String> {
    match kind {
        RuleKind::Domain => rule.domain.push(payload.to_string()),
        RuleKind::DomainSuffix => rule.domain_suffix.push(payload.to_string()),
        RuleKind::DomainKeyword => rule.domain_keyword.push(payload.to_string()),
        RuleKind::DomainRegex => rule.domain_regex.push(payload.to_string()),
        RuleKind::IpCidr => rule.ip_cidr.push(payload.to_string()),
        RuleKind::SrcIpCidr => rule.source_ip_cidr.push(payload.to_string()),
        RuleKind::Geoip if payload.eq_ignore_ascii_case("lan") => rule.ip_is_private = Some(true),
        RuleKind::Geoip => rule.geoip.push(payload.to_ascii_lowercase()),
        RuleKind::Geosite => rule.geosite.push(payload.to_ascii_lowercase()),
        RuleKind::ProcessName => rule.process_name.push(payload.to_string()),
        RuleKind::DstPort => match payload.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                rule.port_range.push(format!("{}:{}", start, end));
            }
            None => rule.port.push(parse_port(payload)?),
        },
        RuleKind::SrcPort => rule.source_port.push(parse_port(payload)?),
    }
    Ok(())
}

fn parse_port(text: &str) -> Result<u16, String> {
    text.trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid port '{}'", text))
}
