//! Topic routing
//!
//! Topics are classified by an ordered list of rules, evaluated first match
//! wins, with case-insensitive substring matching. The default table encodes
//! the precedence the sensing device relies on:
//!
//! ```text
//! 1. "raw" … "gas"   → RawGas       (diagnostic, checked before plain gas)
//! 2. "temp"          → Temperature
//! 3. "hum"           → Humidity
//! 4. "gas"           → Gas
//! 5. "image"         → Image
//! ```
//!
//! Tables are plain data and deserialize from the `ingest.routing` section of
//! the daemon configuration.

use crate::events::ChannelKind;
use serde::{Deserialize, Serialize};

/// Predicate over a topic string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicPattern {
    /// Topic contains the token anywhere
    Contains(String),
    /// Topic contains every token, in this order, without overlap
    Sequence(Vec<String>),
}

impl TopicPattern {
    pub fn contains(token: &str) -> Self {
        TopicPattern::Contains(token.to_string())
    }

    pub fn sequence(tokens: &[&str]) -> Self {
        TopicPattern::Sequence(tokens.iter().map(|t| t.to_string()).collect())
    }

    /// Match against an already lower-cased topic
    fn matches_lower(&self, topic: &str) -> bool {
        match self {
            TopicPattern::Contains(token) => topic.contains(&token.to_lowercase()),
            TopicPattern::Sequence(tokens) => {
                let mut rest = topic;
                for token in tokens {
                    let token = token.to_lowercase();
                    match rest.find(&token) {
                        Some(at) => rest = &rest[at + token.len()..],
                        None => return false,
                    }
                }
                true
            }
        }
    }
}

/// One routing rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub pattern: TopicPattern,
    pub channel: ChannelKind,
}

impl RoutingRule {
    pub fn new(pattern: TopicPattern, channel: ChannelKind) -> Self {
        Self { pattern, channel }
    }
}

/// Ordered, first-match-wins rule list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(vec![
            RoutingRule::new(TopicPattern::sequence(&["raw", "gas"]), ChannelKind::RawGas),
            RoutingRule::new(TopicPattern::contains("temp"), ChannelKind::Temperature),
            RoutingRule::new(TopicPattern::contains("hum"), ChannelKind::Humidity),
            RoutingRule::new(TopicPattern::contains("gas"), ChannelKind::Gas),
            RoutingRule::new(TopicPattern::contains("image"), ChannelKind::Image),
        ])
    }
}

impl RoutingTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Channel of the first rule matching `topic`
    pub fn classify(&self, topic: &str) -> Option<ChannelKind> {
        let topic = topic.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches_lower(&topic))
            .map(|rule| rule.channel)
    }
}

/// First decimal number embedded in `text`.
///
/// Accepts an optional sign, optional integer digits and an optional
/// fraction, and must end in a digit: `"t=+21.5C"` gives 21.5, `"7."` gives 7,
/// `".5"` gives 0.5. Exponents are not recognised.
pub fn first_numeric_token(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let digits_from = |mut at: usize| {
        while at < bytes.len() && bytes[at].is_ascii_digit() {
            at += 1;
        }
        at
    };

    for start in 0..bytes.len() {
        let body = if matches!(bytes[start], b'+' | b'-') { start + 1 } else { start };
        let int_end = digits_from(body);

        let end = if int_end < bytes.len()
            && bytes[int_end] == b'.'
            && bytes.get(int_end + 1).is_some_and(u8::is_ascii_digit)
        {
            digits_from(int_end + 1)
        } else if int_end > body {
            int_end
        } else {
            continue;
        };

        return text[start..end].parse().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_precedence() {
        let table = RoutingTable::default();
        assert_eq!(table.classify("banana/temperature"), Some(ChannelKind::Temperature));
        assert_eq!(table.classify("banana/Humidity"), Some(ChannelKind::Humidity));
        assert_eq!(table.classify("banana/gas"), Some(ChannelKind::Gas));
        assert_eq!(table.classify("banana/raw_gas"), Some(ChannelKind::RawGas));
        assert_eq!(table.classify("banana/RAW/GAS"), Some(ChannelKind::RawGas));
        assert_eq!(table.classify("banana/image_b64"), Some(ChannelKind::Image));
        assert_eq!(table.classify("banana/status"), None);
    }

    #[test]
    fn sequence_requires_order() {
        let table = RoutingTable::default();
        // "raw" after "gas" is not the raw-gas qualifier
        assert_eq!(table.classify("gas/raw"), Some(ChannelKind::Gas));
    }

    #[test]
    fn first_match_wins() {
        let table = RoutingTable::new(vec![
            RoutingRule::new(TopicPattern::contains("hum"), ChannelKind::Humidity),
            RoutingRule::new(TopicPattern::contains("temp"), ChannelKind::Temperature),
        ]);
        assert_eq!(table.classify("temp_hum"), Some(ChannelKind::Humidity));
    }

    #[test]
    fn table_from_yaml_shape() {
        let json = r#"[{"pattern":{"contains":"img"},"channel":"image"},
                       {"pattern":{"sequence":["raw","gas"]},"channel":"raw_gas"}]"#;
        let table: RoutingTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.classify("cam/IMG"), Some(ChannelKind::Image));
        assert_eq!(table.classify("raw-sensor/gas"), Some(ChannelKind::RawGas));
    }

    #[test]
    fn numeric_token_scan() {
        assert_eq!(first_numeric_token("24.5"), Some(24.5));
        assert_eq!(first_numeric_token("t=+21.5C"), Some(21.5));
        assert_eq!(first_numeric_token("humidity: -3"), Some(-3.0));
        assert_eq!(first_numeric_token("7."), Some(7.0));
        assert_eq!(first_numeric_token("level .5"), Some(0.5));
        assert_eq!(first_numeric_token("1.2.3"), Some(1.2));
        assert_eq!(first_numeric_token("- nothing"), None);
        assert_eq!(first_numeric_token(""), None);
    }
}
