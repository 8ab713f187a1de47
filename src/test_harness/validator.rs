//! Boolean-matrix result validation
//!
//! Test cases assert by selecting boolean expressions. A case fails as soon
//! as any value in its result is `false`; it passes when at least one value
//! is `true`. A result without any boolean asserted nothing and is reported
//! as invalid, which is a warning and not a failure.

use super::types::{Row, ScalarValue};
use serde::{Deserialize, Serialize};

/// Classification of one case's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "message", rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    /// A `false` value was found; the message names the offending row
    Fail(String),
    /// No boolean anywhere: the case passed without asserting anything
    Invalid,
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Fail(_))
    }

    /// Messages contributed to the aggregated error list
    pub fn errors(&self) -> Vec<String> {
        match self {
            Verdict::Fail(message) => vec![message.clone()],
            Verdict::Pass | Verdict::Invalid => Vec::new(),
        }
    }
}

/// Classify `rows` captured for the case `name`
pub fn validate(name: &str, rows: &[Row]) -> Verdict {
    let mut found_true = false;

    for row in rows {
        log::debug!("testing line: {}", row);
        for value in row.values() {
            match value {
                ScalarValue::Boolean(false) => {
                    log::info!("======> TEST FAILED ======> {}", name);
                    return Verdict::Fail(format!(
                        "{}: test line has failure, line={}",
                        name, row
                    ));
                }
                ScalarValue::Boolean(true) => found_true = true,
                _ => {}
            }
        }
    }

    if found_true {
        log::info!("======> TEST SUCCEEDED ======> {}", name);
        Verdict::Pass
    } else {
        let rendered: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        log::warn!(
            "======> TEST INVALID ======> test did not contain any boolean, results are not reliable: {} -> [{}]",
            name,
            rendered.join(";\n")
        );
        Verdict::Invalid
    }
}
