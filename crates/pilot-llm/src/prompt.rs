//! English prompt builder. Same structure as the original's
//! `buildCompetitorAnalysisPrompt` (main product, numbered competitor list,
//! then a strict-JSON-schema instruction block) — not a translation of its
//! wording.

use crate::{CompetitorAnalysisData, ProductData};

fn describe(label: &str, p: &ProductData) -> String {
    format!(
        "{label}: {title} (ASIN {asin}) — price {price:.2} {currency}, BSR {bsr}, rating {rating:.1} ({review_count} reviews)",
        label = label,
        title = p.title,
        asin = p.asin,
        price = p.price,
        currency = p.currency,
        bsr = p.bsr,
        rating = p.rating,
        review_count = p.review_count,
    )
}

pub fn build_competitor_analysis_prompt(data: &CompetitorAnalysisData) -> String {
    let mut out = String::new();
    out.push_str("You are an e-commerce competitive analyst. Compare the main product against its competitors and produce actionable recommendations.\n\n");
    out.push_str(&describe("Main product", &data.main));
    out.push('\n');

    out.push_str("\nCompetitors:\n");
    for (i, c) in data.competitors.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, describe("Competitor", c)));
    }

    out.push_str(
        "\nRespond with strict JSON only, matching exactly this schema, with no \
         surrounding prose or markdown fences:\n\
         {\n  \"summary\": string,\n  \"recommendations\": [\n    {\"type\": string, \"priority\": string, \"title\": string, \"description\": string, \"impact\": string}\n  ],\n  \"market_insights\": [string]\n}\n",
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_main_and_every_competitor() {
        let data = CompetitorAnalysisData {
            main: ProductData::zero_valued("B08N5WRWNW", "Echo Dot"),
            competitors: vec![
                ProductData::zero_valued("B07XJ8C8F5", "Rival Speaker"),
                ProductData::zero_valued("B09ABCDEF0", "Another Speaker"),
            ],
        };
        let prompt = build_competitor_analysis_prompt(&data);
        assert!(prompt.contains("Echo Dot"));
        assert!(prompt.contains("Rival Speaker"));
        assert!(prompt.contains("Another Speaker"));
        assert!(prompt.contains("market_insights"));
    }
}
