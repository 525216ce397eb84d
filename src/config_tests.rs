//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.signature, "deepseek-chat");
        assert_eq!(config.init_date, "2025-10-09");
        assert_eq!(config.base_log_dir, "./data/agent_data_astock");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 500);
    }

    #[test]
    fn test_ledger_config_default() {
        let config = LedgerConfig::default();
        assert_eq!(config.initial_cash, dec!(100000.0));
        assert_eq!(config.symbols.len(), 50);
        assert!(config.symbols.contains(&"600519.SH".to_string()));
        assert!(config.symbols.contains(&"601318.SH".to_string()));
    }

    #[test]
    fn test_agent_config_deserialize() {
        let toml_str = r#"
signature = "qwen-max"
init_date = "2025-01-02"
base_log_dir = "/tmp/agents"
max_retries = 5
base_delay_ms = 100
"#;
        let config: AgentConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.signature, "qwen-max");
        assert_eq!(config.init_date, "2025-01-02");
        assert_eq!(config.base_log_dir, "/tmp/agents");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay_ms, 100);
    }

    #[test]
    fn test_agent_config_partial() {
        let toml_str = r#"
signature = "gpt-4o"
"#;
        let config: AgentConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.signature, "gpt-4o");
        assert_eq!(config.max_retries, 3); // defaults fill the rest
    }

    #[test]
    fn test_ledger_config_deserialize() {
        let toml_str = r#"
initial_cash = 50000.0
symbols = ["600519.SH", "601318.SH"]
"#;
        let config: LedgerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.initial_cash, dec!(50000.0));
        assert_eq!(config.symbols.len(), 2);
    }

    #[test]
    fn test_market_config_defaults() {
        let config: MarketConfig = toml::from_str("").unwrap();
        assert_eq!(config.price_file, "./data/A_stock_data.jsonl");
    }

    #[test]
    fn test_llm_config_minimal() {
        let toml_str = r#"
provider = "deepseek"
api_key = "sk-xxx"
"#;
        let config: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider, "deepseek");
        assert_eq!(config.api_key, "sk-xxx");
        assert!(config.model.is_none());
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_llm_config_with_model() {
        let toml_str = r#"
provider = "openai"
api_key = "sk-xxx"
model = "gpt-4"
base_url = "https://api.openai.com/v1"
"#;
        let config: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, Some("gpt-4".to_string()));
        assert_eq!(config.base_url, Some("https://api.openai.com/v1".to_string()));
    }

    #[test]
    fn test_llm_config_ollama() {
        let toml_str = r#"
provider = "ollama"
"#;
        let config: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.api_key, ""); // defaults to empty
    }

    #[test]
    fn test_runtime_config_defaults() {
        let config: RuntimeConfig = toml::from_str("").unwrap();
        assert_eq!(config.path, "data/.runtime_env.json");
    }

    #[test]
    fn test_config_all_sections_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.agent.signature, "deepseek-chat");
        assert_eq!(config.ledger.initial_cash, dec!(100000.0));
        assert_eq!(config.llm.provider, "deepseek");
        assert_eq!(config.market.price_file, "./data/A_stock_data.jsonl");
    }

    #[test]
    fn test_config_sections_deserialize() {
        let toml_str = r#"
[agent]
signature = "qwen-max"

[ledger]
initial_cash = 200000.0

[llm]
provider = "openai"
api_key = "sk-yyy"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.signature, "qwen-max");
        assert_eq!(config.ledger.initial_cash, dec!(200000.0));
        assert_eq!(config.ledger.symbols.len(), 50); // untouched section keeps defaults
        assert_eq!(config.llm.provider, "openai");
    }

    #[test]
    fn test_agent_paths_layout() {
        let config = AgentConfig {
            base_log_dir: "/tmp/agents".to_string(),
            ..AgentConfig::default()
        };
        assert_eq!(
            config.position_file("deepseek-chat"),
            std::path::PathBuf::from("/tmp/agents/deepseek-chat/position/position.jsonl")
        );
        assert_eq!(
            config.session_log_file("deepseek-chat", "2025-10-10"),
            std::path::PathBuf::from("/tmp/agents/deepseek-chat/log/2025-10-10/log.jsonl")
        );
    }
}
