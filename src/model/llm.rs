//! Chat-completions decision model.
//!
//! Talks to any OpenAI-compatible endpoint (DeepSeek by default), asks
//! for strict JSON, and decodes the answer into a [`TradeDecision`].
//! Network and decode failures surface as errors so the session driver
//! can retry.

use super::{DecisionModel, SessionContext, TradeDecision};
use crate::config::LlmConfig;
use crate::error::{AgentError, Result};
use crate::types::{decimal_from_value, Direction};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use std::fmt::Write as _;

pub struct LlmModel {
    http: Client,
    config: LlmConfig,
    name: String,
}

impl LlmModel {
    pub fn from_config(config: LlmConfig) -> Self {
        let name = format!(
            "{}:{}",
            config.provider,
            config.model.as_deref().unwrap_or("default")
        );
        Self {
            http: Client::new(),
            config,
            name,
        }
    }

    fn endpoint(&self) -> (String, String) {
        match self.config.provider.to_lowercase().as_str() {
            "deepseek" => (
                "https://api.deepseek.com".to_string(),
                self.config
                    .model
                    .clone()
                    .unwrap_or_else(|| "deepseek-chat".to_string()),
            ),
            "openai" | "gpt" => (
                self.config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com".to_string()),
                self.config
                    .model
                    .clone()
                    .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ),
            "ollama" => (
                self.config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                self.config
                    .model
                    .clone()
                    .unwrap_or_else(|| "qwen2.5:14b".to_string()),
            ),
            _ => (
                self.config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.deepseek.com".to_string()),
                self.config
                    .model
                    .clone()
                    .unwrap_or_else(|| "deepseek-chat".to_string()),
            ),
        }
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        let (base_url, model) = self.endpoint();

        let request = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": SYSTEM_RULES},
                {"role": "user", "content": prompt}
            ],
            "response_format": {"type": "json_object"}
        });

        let mut req = self
            .http
            .post(format!("{}/v1/chat/completions", base_url))
            .header("content-type", "application/json");

        if !self.config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let resp: serde_json::Value = req.json(&request).send().await?.json().await?;

        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AgentError::Llm("Empty model response".into()))
    }

    /// Decode a model answer into a decision. Tolerates prose or code
    /// fences around the JSON object but not a missing or inconsistent
    /// object.
    fn parse_decision(response: &str) -> Result<TradeDecision> {
        let json_str = match (response.find('{'), response.rfind('}')) {
            (Some(start), Some(end)) if end >= start => &response[start..=end],
            _ => response.trim(),
        };

        let parsed: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| AgentError::Decision(format!("Undecodable model answer: {}", e)))?;

        let reason = parsed["reason"].as_str().unwrap_or("").to_string();
        match parsed["action"].as_str().unwrap_or("") {
            action @ ("buy" | "sell") => {
                let symbol = match parsed["symbol"].as_str() {
                    Some(s) if !s.trim().is_empty() => s.trim().to_string(),
                    _ => {
                        return Err(AgentError::Decision(format!(
                            "{} decision without a symbol",
                            action
                        )))
                    }
                };
                let quantity = decimal_from_value(&parsed["quantity"])
                    .filter(|q| *q > Decimal::ZERO)
                    .ok_or_else(|| {
                        AgentError::Decision(format!("{} decision without a usable quantity", action))
                    })?;
                let direction = if action == "buy" {
                    Direction::Buy
                } else {
                    Direction::Sell
                };
                Ok(TradeDecision::Trade {
                    symbol,
                    direction,
                    quantity,
                    reason,
                })
            }
            "hold" | "no_trade" => Ok(TradeDecision::Hold { reason }),
            other => Err(AgentError::Decision(format!(
                "Unknown action {:?} in model answer",
                other
            ))),
        }
    }

    fn build_prompt(ctx: &SessionContext) -> String {
        let mut prompt = format!(
            "Trading date: {}\nAvailable cash: {}\n\nCurrent holdings (shares):\n",
            ctx.date, ctx.cash
        );
        let mut any_holding = false;
        for (symbol, shares) in &ctx.positions {
            if symbol == crate::types::CASH || shares.is_zero() {
                continue;
            }
            any_holding = true;
            let name = ctx.names.get(symbol).map(String::as_str).unwrap_or("");
            let _ = writeln!(prompt, "  {} {} : {}", symbol, name, shares);
        }
        if !any_holding {
            prompt.push_str("  (none)\n");
        }

        prompt.push_str("\nToday's opening prices:\n");
        for (symbol, price) in &ctx.today_open {
            let name = ctx.names.get(symbol).map(String::as_str).unwrap_or("");
            match price {
                Some(p) => {
                    let _ = writeln!(prompt, "  {} {} : {}", symbol, name, p);
                }
                None => {
                    let _ = writeln!(prompt, "  {} {} : unavailable", symbol, name);
                }
            }
        }

        let mut any_profit = false;
        for (symbol, profit) in &ctx.yesterday_profit {
            if profit.is_zero() {
                continue;
            }
            if !any_profit {
                prompt.push_str("\nYesterday's profit by holding:\n");
                any_profit = true;
            }
            let _ = writeln!(prompt, "  {} : {}", symbol, profit);
        }

        prompt.push_str(
            "\nDecide one action for today. Respond with JSON only:\n\
             {\"action\": \"buy\"|\"sell\"|\"hold\", \"symbol\": \"600519.SH\", \
             \"quantity\": 100, \"reason\": \"...\"}\n\
             For hold, symbol and quantity may be omitted.",
        );
        prompt
    }
}

/// Ground rules the model must respect; validation happens again at
/// execution time, this only steers the answer.
const SYSTEM_RULES: &str = "You are a cautious A-share portfolio manager trading \
SSE 50 constituents in a simulated account.\n\
Rules:\n\
- Trades fill at today's opening price.\n\
- Buy and sell in board lots of 100 shares.\n\
- T+1: shares bought today cannot be sold until the next trading day.\n\
- Daily price moves are limited to +-10%; do not assume fills beyond that.\n\
- Costs: 0.03% commission (5 CNY minimum), 0.1% stamp tax on sells, \
0.001% transfer fee on Shanghai symbols.\n\
- At most one action per day. Hold is always acceptable.\n\
Answer with a single JSON object and nothing else.";

#[async_trait]
impl DecisionModel for LlmModel {
    async fn decide(&self, ctx: &SessionContext) -> Result<TradeDecision> {
        let prompt = Self::build_prompt(ctx);
        let response = self.call_llm(&prompt).await?;
        tracing::debug!("Model answer: {}", response);
        Self::parse_decision(&response)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Positions;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn context() -> SessionContext {
        let mut positions = Positions::new();
        positions.insert(crate::types::CASH.to_string(), dec!(88000.0));
        positions.insert("600519.SH".to_string(), dec!(100));
        positions.insert("601318.SH".to_string(), dec!(0));
        let mut today_open = BTreeMap::new();
        today_open.insert("600519.SH".to_string(), Some(dec!(1412.5)));
        today_open.insert("601318.SH".to_string(), None);
        let mut yesterday_profit = BTreeMap::new();
        yesterday_profit.insert("600519.SH".to_string(), dec!(250.0));
        yesterday_profit.insert("601318.SH".to_string(), dec!(0));
        let mut names = BTreeMap::new();
        names.insert("600519.SH".to_string(), "贵州茅台".to_string());
        SessionContext {
            date: "2025-10-10".to_string(),
            positions,
            cash: dec!(88000.0),
            today_open,
            yesterday_profit,
            names,
        }
    }

    #[test]
    fn test_parse_clean_buy() {
        let decision = LlmModel::parse_decision(
            r#"{"action": "buy", "symbol": "600519.SH", "quantity": 100, "reason": "momentum"}"#,
        )
        .unwrap();
        assert_eq!(
            decision,
            TradeDecision::Trade {
                symbol: "600519.SH".to_string(),
                direction: Direction::Buy,
                quantity: dec!(100),
                reason: "momentum".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_fenced_sell() {
        let raw = "Here is my decision:\n```json\n{\"action\": \"sell\", \"symbol\": \"601318.SH\", \"quantity\": 200, \"reason\": \"take profit\"}\n```";
        let decision = LlmModel::parse_decision(raw).unwrap();
        match decision {
            TradeDecision::Trade {
                symbol,
                direction,
                quantity,
                ..
            } => {
                assert_eq!(symbol, "601318.SH");
                assert_eq!(direction, Direction::Sell);
                assert_eq!(quantity, dec!(200));
            }
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_quoted_quantity() {
        let decision = LlmModel::parse_decision(
            r#"{"action": "buy", "symbol": "600036.SH", "quantity": "300", "reason": ""}"#,
        )
        .unwrap();
        match decision {
            TradeDecision::Trade { quantity, .. } => assert_eq!(quantity, dec!(300)),
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_hold() {
        let decision =
            LlmModel::parse_decision(r#"{"action": "hold", "reason": "nothing attractive"}"#)
                .unwrap();
        assert_eq!(
            decision,
            TradeDecision::Hold {
                reason: "nothing attractive".to_string()
            }
        );
    }

    #[test]
    fn test_parse_no_trade_alias() {
        let decision = LlmModel::parse_decision(r#"{"action": "no_trade"}"#).unwrap();
        assert!(matches!(decision, TradeDecision::Hold { .. }));
    }

    #[test]
    fn test_parse_buy_without_symbol_fails() {
        let err = LlmModel::parse_decision(r#"{"action": "buy", "quantity": 100}"#).unwrap_err();
        assert!(err.to_string().contains("symbol"));
    }

    #[test]
    fn test_parse_buy_with_zero_quantity_fails() {
        let err = LlmModel::parse_decision(
            r#"{"action": "buy", "symbol": "600519.SH", "quantity": 0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn test_parse_unknown_action_fails() {
        assert!(LlmModel::parse_decision(r#"{"action": "short", "symbol": "600519.SH"}"#).is_err());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(LlmModel::parse_decision("I would rather not say").is_err());
    }

    #[test]
    fn test_prompt_mentions_key_facts() {
        let prompt = LlmModel::build_prompt(&context());
        assert!(prompt.contains("2025-10-10"));
        assert!(prompt.contains("88000"));
        assert!(prompt.contains("600519.SH"));
        assert!(prompt.contains("1412.5"));
        assert!(prompt.contains("unavailable"));
        assert!(prompt.contains("\"action\""));
        // Zero-share holdings stay out of the holdings table.
        assert!(!prompt.contains("601318.SH  : 0"));
    }
}
