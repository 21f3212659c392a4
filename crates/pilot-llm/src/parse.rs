//! Response parsing with a repair pass, transliterated from
//! `preprocessDeepSeekResponse`/`parseCompetitorReport`: try the raw body
//! first; on failure, re-slice from the first `{` to the last `}` and
//! retry once; if that also fails, surface both strings (spec §4.8 step 5,
//! E4 scenario).

use crate::{CompetitorReport, LlmError};

fn repair_slice(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        Some(&raw[start..=end])
    } else {
        None
    }
}

pub fn parse_competitor_report(raw: &str) -> Result<CompetitorReport, LlmError> {
    if let Ok(report) = serde_json::from_str::<CompetitorReport>(raw) {
        return Ok(report);
    }

    let cleaned = repair_slice(raw).unwrap_or(raw);
    serde_json::from_str::<CompetitorReport>(cleaned).map_err(|_| LlmError::Malformed {
        original: raw.to_string(),
        cleaned: cleaned.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_directly() {
        let raw = r#"{"summary":"ok","recommendations":[],"market_insights":["a"]}"#;
        let report = parse_competitor_report(raw).unwrap();
        assert_eq!(report.summary, "ok");
    }

    #[test]
    fn repairs_json_wrapped_in_prose() {
        let raw = "Here is the analysis:\n```json\n{\"summary\":\"ok\",\"recommendations\":[],\"market_insights\":[]}\n```\nLet me know if you need more.";
        let report = parse_competitor_report(raw).unwrap();
        assert_eq!(report.summary, "ok");
    }

    #[test]
    fn still_malformed_after_repair_reports_both_strings() {
        let raw = "not json at all { still not json";
        let err = parse_competitor_report(raw).unwrap_err();
        match err {
            LlmError::Malformed { original, cleaned } => {
                assert_eq!(original, raw);
                assert!(!cleaned.is_empty());
            }
            _ => panic!("expected Malformed"),
        }
    }
}
