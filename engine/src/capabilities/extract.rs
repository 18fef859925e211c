//! Curated company profile
//!
//! [`EntityProfile`] is the single field set produced by both the cache-hit
//! path ([`EntityProfile::from_cached`]) and the fresh-fetch path
//! ([`EntityProfile::from_detail`]). Serialization always emits every field,
//! so the key set of a cached document equals that of a fresh one.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpoSummary {
    pub description: Option<String>,
    pub went_public_on: Option<String>,
    pub stock_symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AcquisitionSummary {
    pub name: Option<String>,
    pub permalink: Option<String>,
    pub announced_on: Option<String>,
    pub price_usd: Option<u64>,
    pub short_description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvestmentSummary {
    pub name: Option<String>,
    pub investor: Option<String>,
    pub funding_round: Option<String>,
    pub announced_on: Option<String>,
    pub amount_usd: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EntityProfile {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub revenue_range: Option<String>,
    #[serde(alias = "total_funding_amount_usd", alias = "funding_total_usd")]
    pub total_funding_usd: Option<u64>,
    pub employee_range: Option<String>,
    pub industries: Vec<String>,
    pub categories: Vec<String>,
    pub founded_on: Option<String>,
    pub last_funding_type: Option<String>,
    pub last_funding_date: Option<String>,
    pub ipos: Vec<IpoSummary>,
    pub acquisitions: Vec<AcquisitionSummary>,
    pub acquired_by: Vec<AcquisitionSummary>,
    pub investments: Vec<InvestmentSummary>,
}

/// Field names shared by every serialized profile.
pub const PROFILE_FIELDS: [&str; 15] = [
    "name",
    "description",
    "location",
    "revenue_range",
    "total_funding_usd",
    "employee_range",
    "industries",
    "categories",
    "founded_on",
    "last_funding_type",
    "last_funding_date",
    "ipos",
    "acquisitions",
    "acquired_by",
    "investments",
];

/// Decode a revenue bracket enum (`r_00010000`) into a label. Values that are
/// already labels, or that do not match a known bracket, pass through.
pub fn decode_revenue_range(value: &str) -> String {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"r_(\d+)").ok());

    let bracket = pattern
        .as_ref()
        .and_then(|re| re.captures(value))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok());

    let label = match bracket {
        Some(0) => "Less than $1M",
        Some(1_000) => "$1M to $10M",
        Some(10_000) => "$10M to $50M",
        Some(50_000) => "$50M to $100M",
        Some(100_000) => "$100M to $500M",
        Some(500_000) => "$500M to $1B",
        Some(1_000_000) => "$1B to $10B",
        Some(10_000_000) => "$10B+",
        _ => return value.to_string(),
    };
    label.to_string()
}

/// Decode an employee bracket enum (`c_00051_00100`) into `51-100`.
pub fn decode_employee_range(value: &str) -> String {
    let Some(rest) = value.strip_prefix("c_") else {
        return value.to_string();
    };
    let mut parts = rest.splitn(2, '_');
    let low = parts.next().and_then(|p| p.parse::<u64>().ok());
    let high = parts.next();

    match (low, high) {
        (Some(low), Some("max")) => format!("{}+", low),
        (Some(low), Some(high)) => match high.parse::<u64>() {
            Ok(high) => format!("{}-{}", low, high),
            Err(_) => value.to_string(),
        },
        _ => value.to_string(),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
}

/// Crunchbase wraps dates and identifiers as `{"value": ...}`; accept both.
fn value_str(v: Option<&Value>) -> Option<String> {
    let v = v?;
    non_empty(v.as_str().or_else(|| v.get("value").and_then(Value::as_str)))
}

fn money_usd(v: Option<&Value>) -> Option<u64> {
    let usd = v?.get("value_usd")?;
    usd.as_u64().or_else(|| usd.as_f64().map(|f| f as u64))
}

fn card<'a>(data: &'a Value, name: &str) -> &'a [Value] {
    data.get("cards")
        .and_then(|c| c.get(name))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn identifier_values(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| value_str(Some(i)))
                .collect()
        })
        .unwrap_or_default()
}

fn format_location(headquarters: &Value) -> Option<String> {
    let identifiers = headquarters
        .get("location_identifiers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let by_type = |kind: &str| {
        identifiers
            .iter()
            .find(|l| l.get("location_type").and_then(Value::as_str) == Some(kind))
            .and_then(|l| value_str(Some(l)))
    };

    let mut parts: Vec<String> = Vec::new();
    parts.extend(non_empty(headquarters.get("street_1").and_then(Value::as_str)));
    parts.extend(by_type("city"));
    parts.extend(by_type("region"));
    parts.extend(non_empty(headquarters.get("postal_code").and_then(Value::as_str)));
    parts.extend(by_type("country"));

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

impl EntityProfile {
    /// Extract the profile from a detail document
    /// (`{"properties": {...}, "cards": {"fields": {...}, ...}}`).
    pub fn from_detail(data: &Value) -> Self {
        let null = Value::Null;
        let fields = data
            .get("cards")
            .and_then(|c| c.get("fields"))
            .or_else(|| data.get("properties"))
            .unwrap_or(&null);

        let name = non_empty(str_at(data, &["properties", "identifier", "value"]))
            .or_else(|| value_str(fields.get("identifier")));

        let ipos = card(data, "ipos")
            .iter()
            .map(|ipo| IpoSummary {
                description: value_str(ipo.get("short_description")),
                went_public_on: value_str(ipo.get("went_public_on")),
                stock_symbol: value_str(ipo.get("stock_full_symbol")),
            })
            .collect();

        let acquisition = |item: &Value| AcquisitionSummary {
            name: value_str(item.get("identifier")),
            permalink: non_empty(str_at(item, &["identifier", "permalink"])),
            announced_on: value_str(item.get("announced_on")),
            price_usd: money_usd(item.get("price")),
            short_description: value_str(item.get("short_description")),
        };

        let investments = card(data, "raised_investments")
            .iter()
            .map(|inv| InvestmentSummary {
                name: value_str(inv.get("identifier")),
                investor: value_str(inv.get("investor_identifier")),
                funding_round: value_str(inv.get("funding_round_identifier")),
                announced_on: value_str(inv.get("announced_on")),
                amount_usd: money_usd(inv.get("money_invested")),
            })
            .collect();

        Self {
            name,
            description: value_str(fields.get("description"))
                .or_else(|| value_str(fields.get("short_description"))),
            location: card(data, "headquarters_address")
                .first()
                .and_then(format_location),
            revenue_range: value_str(fields.get("revenue_range"))
                .map(|r| decode_revenue_range(&r)),
            total_funding_usd: money_usd(fields.get("funding_total"))
                .or_else(|| money_usd(fields.get("money_raised"))),
            employee_range: value_str(fields.get("num_employees_enum"))
                .map(|e| decode_employee_range(&e)),
            industries: identifier_values(fields.get("category_groups")),
            categories: identifier_values(fields.get("categories")),
            founded_on: value_str(fields.get("founded_on")),
            last_funding_type: value_str(fields.get("last_funding_type")),
            last_funding_date: value_str(fields.get("last_funding_at")),
            ipos,
            acquisitions: card(data, "acquirer_acquisitions")
                .iter()
                .map(acquisition)
                .collect(),
            acquired_by: card(data, "acquiree_acquisitions")
                .iter()
                .map(acquisition)
                .collect(),
            investments,
        }
    }

    /// Project a cached document onto the profile fields. Keys outside the
    /// field set are ignored. Returns `None` when a known key has the wrong
    /// shape, in which case the caller treats the entry as a miss.
    pub fn from_cached(document: &Value) -> Option<Self> {
        let mut profile: EntityProfile = serde_json::from_value(document.clone()).ok()?;

        if profile.location.is_none() {
            let parts: Vec<&str> = ["city", "region", "country"]
                .iter()
                .filter_map(|k| document.get(k).and_then(Value::as_str))
                .filter(|s| !s.trim().is_empty())
                .collect();
            if !parts.is_empty() {
                profile.location = Some(parts.join(", "));
            }
        }

        profile.revenue_range = profile.revenue_range.map(|r| decode_revenue_range(&r));
        profile.employee_range = profile.employee_range.map(|e| decode_employee_range(&e));

        Some(profile)
    }

    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        *self == EntityProfile::default()
    }

    /// Plain-text rendering, one line per present field.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut push = |label: &str, value: Option<String>| {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                lines.push(format!("{}: {}", label, v));
            }
        };
        let list = |items: &[String]| Some(items.join(", "));

        push("Name", self.name.clone());
        push("Description", self.description.clone());
        push("Location", self.location.clone());
        push("Revenue range", self.revenue_range.clone());
        push("Total funding (USD)", self.total_funding_usd.map(|f| f.to_string()));
        push("Employees", self.employee_range.clone());
        push("Industries", list(&self.industries));
        push("Categories", list(&self.categories));
        push("Founded on", self.founded_on.clone());
        push("Last funding type", self.last_funding_type.clone());
        push("Last funding date", self.last_funding_date.clone());

        let ipos: Vec<String> = self
            .ipos
            .iter()
            .map(|i| {
                join_present(&[
                    i.stock_symbol.clone(),
                    i.went_public_on.as_ref().map(|d| format!("public on {}", d)),
                    i.description.clone(),
                ])
            })
            .collect();
        push("IPOs", Some(ipos.join("; ")));

        let acquisitions = |items: &[AcquisitionSummary]| {
            items
                .iter()
                .map(|a| {
                    join_present(&[
                        a.name.clone(),
                        a.announced_on.as_ref().map(|d| format!("announced {}", d)),
                        a.price_usd.map(|p| format!("${}", p)),
                        a.short_description.clone(),
                    ])
                })
                .collect::<Vec<_>>()
                .join("; ")
        };
        push("Acquisitions", Some(acquisitions(&self.acquisitions)));
        push("Acquired by", Some(acquisitions(&self.acquired_by)));

        let investments: Vec<String> = self
            .investments
            .iter()
            .map(|i| {
                join_present(&[
                    i.name.clone(),
                    i.investor.as_ref().map(|v| format!("investor {}", v)),
                    i.amount_usd.map(|a| format!("${}", a)),
                    i.announced_on.clone(),
                ])
            })
            .collect();
        push("Investments", Some(investments.join("; ")));

        lines.join("\n")
    }
}

fn join_present(parts: &[Option<String>]) -> String {
    parts
        .iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail_fixture() -> Value {
        json!({
            "properties": {"identifier": {"uuid": "u-1", "value": "Acme Corp"}},
            "cards": {
                "fields": {
                    "description": "Maker of anvils",
                    "revenue_range": "r_00010000",
                    "funding_total": {"value": 20000000, "currency": "USD", "value_usd": 20000000},
                    "num_employees_enum": "c_00051_00100",
                    "category_groups": [{"value": "Manufacturing"}],
                    "categories": [{"value": "Industrial"}, {"value": "Hardware"}],
                    "founded_on": {"value": "1999-04-01", "precision": "day"},
                    "last_funding_type": "series_b",
                    "last_funding_at": "2021-06-01"
                },
                "headquarters_address": [{
                    "street_1": "1 Desert Rd",
                    "postal_code": "85001",
                    "location_identifiers": [
                        {"location_type": "city", "value": "Phoenix"},
                        {"location_type": "region", "value": "Arizona"},
                        {"location_type": "country", "value": "United States"}
                    ]
                }],
                "ipos": [{"stock_full_symbol": "NASDAQ:ACME", "went_public_on": "2010-01-05"}],
                "acquirer_acquisitions": [{
                    "identifier": {"value": "Roadrunner Labs", "permalink": "roadrunner-labs"},
                    "announced_on": {"value": "2015-03-01"},
                    "price": {"value_usd": 5000000}
                }],
                "acquiree_acquisitions": [],
                "raised_investments": [{
                    "identifier": {"value": "Series B - Acme Corp"},
                    "investor_identifier": {"value": "Coyote Ventures"},
                    "money_invested": {"value_usd": 7000000}
                }]
            }
        })
    }

    #[test]
    fn test_revenue_range_decoding() {
        assert_eq!(decode_revenue_range("r_00000000"), "Less than $1M");
        assert_eq!(decode_revenue_range("r_00001000"), "$1M to $10M");
        assert_eq!(decode_revenue_range("r_00010000"), "$10M to $50M");
        assert_eq!(decode_revenue_range("r_00050000"), "$50M to $100M");
        assert_eq!(decode_revenue_range("r_00100000"), "$100M to $500M");
        assert_eq!(decode_revenue_range("r_00500000"), "$500M to $1B");
        assert_eq!(decode_revenue_range("r_01000000"), "$1B to $10B");
        assert_eq!(decode_revenue_range("r_10000000"), "$10B+");
        assert_eq!(decode_revenue_range("$10M to $50M"), "$10M to $50M");
        assert_eq!(decode_revenue_range("r_00000042"), "r_00000042");
    }

    #[test]
    fn test_employee_range_decoding() {
        assert_eq!(decode_employee_range("c_00051_00100"), "51-100");
        assert_eq!(decode_employee_range("c_10001_max"), "10001+");
        assert_eq!(decode_employee_range("51-100"), "51-100");
    }

    #[test]
    fn test_from_detail() {
        let profile = EntityProfile::from_detail(&detail_fixture());

        assert_eq!(profile.name.as_deref(), Some("Acme Corp"));
        assert_eq!(profile.revenue_range.as_deref(), Some("$10M to $50M"));
        assert_eq!(profile.total_funding_usd, Some(20_000_000));
        assert_eq!(profile.employee_range.as_deref(), Some("51-100"));
        assert_eq!(profile.industries, vec!["Manufacturing"]);
        assert_eq!(profile.categories, vec!["Industrial", "Hardware"]);
        assert_eq!(profile.founded_on.as_deref(), Some("1999-04-01"));
        assert_eq!(
            profile.location.as_deref(),
            Some("1 Desert Rd, Phoenix, Arizona, 85001, United States")
        );
        assert_eq!(profile.ipos[0].stock_symbol.as_deref(), Some("NASDAQ:ACME"));
        assert_eq!(profile.acquisitions[0].price_usd, Some(5_000_000));
        assert!(profile.acquired_by.is_empty());
        assert_eq!(profile.investments[0].investor.as_deref(), Some("Coyote Ventures"));
    }

    #[test]
    fn test_cached_and_fresh_share_field_set() {
        let fresh = EntityProfile::from_detail(&detail_fixture()).to_document();
        let cached = EntityProfile::from_cached(&json!({"name": "Acme Corp"}))
            .unwrap()
            .to_document();

        let keys = |v: &Value| {
            let mut k: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
            k.sort();
            k
        };
        assert_eq!(keys(&fresh), keys(&cached));

        let mut expected: Vec<String> = PROFILE_FIELDS.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(keys(&fresh), expected);
    }

    #[test]
    fn test_from_cached_projects_and_decodes() {
        let doc = json!({
            "name": "Acme Corp",
            "revenue_range": "r_00010000",
            "total_funding_amount_usd": 20000000,
            "city": "Phoenix",
            "country": "United States",
            "internal_notes": "dropped"
        });

        let profile = EntityProfile::from_cached(&doc).unwrap();
        assert_eq!(profile.revenue_range.as_deref(), Some("$10M to $50M"));
        assert_eq!(profile.total_funding_usd, Some(20_000_000));
        assert_eq!(profile.location.as_deref(), Some("Phoenix, United States"));
        assert!(!profile.to_document().as_object().unwrap().contains_key("internal_notes"));
    }

    #[test]
    fn test_from_cached_rejects_bad_shapes() {
        assert!(EntityProfile::from_cached(&json!({"industries": "not a list"})).is_none());
    }

    #[test]
    fn test_render_skips_empty_fields() {
        let profile = EntityProfile {
            name: Some("Acme Corp".into()),
            revenue_range: Some("$10M to $50M".into()),
            ..Default::default()
        };
        assert_eq!(
            profile.render(),
            "Name: Acme Corp\nRevenue range: $10M to $50M"
        );
    }
}
