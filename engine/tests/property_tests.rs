use proptest::prelude::*;
use reel_engine::bot::telegram::{truncate_for_telegram, MESSAGE_LIMIT};
use reel_engine::config::Config;
use reel_engine::secrets::scrub;

// Any valid configuration survives serialization and still validates.
proptest! {
    #[test]
    fn test_config_serialization_round_trip(
        log_level in "error|warn|info|debug|trace",
        default_provider in "openai|ollama",
        threshold in 0.0..=2.0f64,
        history_limit in 1usize..50,
        plan_retries in 0u32..5,
    ) {
        let mut config = Config::default();
        config.core.log_level = log_level.clone();
        config.llm.default_provider = default_provider.clone();
        config.index.distance_threshold = threshold;
        config.bot.history_limit = history_limit;
        config.agent.plan_retries = plan_retries;
        prop_assert!(config.validate().is_ok());

        let text = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml_str(&text).unwrap();

        prop_assert!(parsed.validate().is_ok());
        prop_assert_eq!(parsed.core.log_level, log_level);
        prop_assert_eq!(parsed.llm.default_provider, default_provider);
        prop_assert_eq!(parsed.bot.history_limit, history_limit);
        prop_assert_eq!(parsed.agent.plan_retries, plan_retries);
        prop_assert!((parsed.index.distance_threshold - threshold).abs() < 1e-9);
    }
}

// Thresholds outside the cosine distance range never validate.
proptest! {
    #[test]
    fn test_out_of_range_threshold_rejected(threshold in 2.0001..100.0f64, negate in any::<bool>()) {
        let mut config = Config::default();
        config.index.distance_threshold = if negate { -threshold } else { threshold };
        prop_assert!(config.validate().is_err());
    }
}

proptest! {
    #[test]
    fn test_openai_keys_are_scrubbed(key in "[a-zA-Z0-9]{20,48}", prefix in "[a-z ]{0,20}") {
        let secret = format!("sk-{}", key);
        let text = format!("{}{} trailing", prefix, secret);
        let scrubbed = scrub(&text);
        prop_assert!(!scrubbed.contains(&secret));
        prop_assert!(scrubbed.contains("[REDACTED]"));
    }

    #[test]
    fn test_telegram_tokens_are_scrubbed(
        bot_id in "[1-9][0-9]{7,9}",
        tail in "[a-zA-Z0-9_-]{34}[a-zA-Z0-9]",
    ) {
        let token = format!("{}:{}", bot_id, tail);
        let text = format!("token {} leaked", token);
        prop_assert!(!scrub(&text).contains(&tail));
    }

    #[test]
    fn test_catalog_keys_are_scrubbed(parts in prop::collection::vec("[A-Z0-9]{7}", 4)) {
        let key = parts.join("-");
        let text = format!("X-API-KEY: {} rejected", key);
        let scrubbed = scrub(&text);
        prop_assert!(!scrubbed.contains(&key));
        prop_assert!(scrubbed.starts_with("X-API-KEY: [REDACTED]"));
    }

    #[test]
    fn test_bearer_tokens_are_scrubbed(token in "[a-zA-Z0-9._]{20,60}") {
        let text = format!("Authorization: Bearer {}", token);
        prop_assert!(!scrub(&text).contains(&token));
    }

    // Plain prose without key-shaped tokens passes through untouched.
    #[test]
    fn test_plain_text_is_not_scrubbed(text in "[a-z ,.!?]{0,200}") {
        prop_assert_eq!(scrub(&text), text);
    }
}

proptest! {
    #[test]
    fn test_replies_fit_telegram_limit(text in "\\PC{0,6000}") {
        let out = truncate_for_telegram(&text);
        prop_assert!(out.chars().count() <= MESSAGE_LIMIT);
        if text.chars().count() <= MESSAGE_LIMIT {
            prop_assert_eq!(out, text);
        } else {
            prop_assert!(out.ends_with("(truncated)"));
        }
    }
}
