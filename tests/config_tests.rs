//! Configuration Tests
//!
//! Settings files, environment overlays, validation, and building advisors
//! from settings.
//!
//! Run: cargo nextest run --test config_tests

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use tool_search::config::{ConfigError, EnvConfigProvider};
use tool_search::tools::search::IdleSweeper;
use tool_search::{
    ChatModel, ChatRequest, ConversationAdvisor, FnTool, Message, ModelRequest, PreSelectAdvisor,
    SearchBackend, SearchRequest, SearchType, StopReason, ToolCallLoop, ToolCallback,
    ToolRegistry, ToolSearchAdvisor, ToolSearchSettings, ToolSelection,
};

fn registry() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::with_tools([
        Arc::new(FnTool::constant("weather", "Get the weather forecast", "Sunny"))
            as Arc<dyn ToolCallback>,
    ]))
}

// =============================================================================
// Files
// =============================================================================

mod file_tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"backend": "semantic", "accumulate": false, "similarity_threshold": 0.5}}"#
        )
        .unwrap();

        let settings = ToolSearchSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.backend, SearchBackend::Semantic);
        assert!(!settings.accumulate);
        assert_eq!(settings.similarity_threshold, 0.5);
        assert_eq!(settings.max_iterations, 20);
        assert_eq!(
            settings.build_engine().unwrap().search_type(),
            SearchType::Semantic
        );
    }

    #[test]
    fn test_missing_and_malformed_files() {
        assert!(matches!(
            ToolSearchSettings::from_file("/nonexistent/tool-search.json"),
            Err(ConfigError::Io(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            ToolSearchSettings::from_file(file.path()),
            Err(ConfigError::Serialization(_))
        ));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(ToolSearchSettings::from_json_str(r#"{"backend": "graph"}"#).is_err());
    }
}

// =============================================================================
// Environment
// =============================================================================

mod env_tests {
    use super::*;

    #[test]
    fn test_env_overlay() {
        let prefix = "CONFIG_TESTS_OVERLAY_";
        // SAFETY: Test-only environment setup with a unique prefix
        unsafe {
            std::env::set_var("CONFIG_TESTS_OVERLAY_BACKEND", "lucene");
            std::env::set_var("CONFIG_TESTS_OVERLAY_MAX_RESULTS", "3");
            std::env::set_var("CONFIG_TESTS_OVERLAY_ACCUMULATE", "false");
            std::env::set_var("CONFIG_TESTS_OVERLAY_SESSION_IDLE_TTL_SECS", "600");
        }

        let settings = ToolSearchSettings::default()
            .with_env_provider(&EnvConfigProvider::prefixed(prefix))
            .unwrap();
        assert_eq!(settings.backend, SearchBackend::Keyword);
        assert_eq!(settings.max_results, Some(3));
        assert!(!settings.accumulate);
        assert_eq!(
            settings.session_idle_ttl(),
            Some(std::time::Duration::from_secs(600))
        );

        unsafe {
            std::env::remove_var("CONFIG_TESTS_OVERLAY_BACKEND");
            std::env::remove_var("CONFIG_TESTS_OVERLAY_MAX_RESULTS");
            std::env::remove_var("CONFIG_TESTS_OVERLAY_ACCUMULATE");
            std::env::remove_var("CONFIG_TESTS_OVERLAY_SESSION_IDLE_TTL_SECS");
        }
    }

    #[test]
    fn test_invalid_env_value_names_the_variable() {
        // SAFETY: Test-only environment setup with a unique prefix
        unsafe {
            std::env::set_var("CONFIG_TESTS_BAD_MIN_SCORE", "high");
        }

        let err = ToolSearchSettings::default()
            .with_env_provider(&EnvConfigProvider::prefixed("CONFIG_TESTS_BAD_"))
            .unwrap_err();
        assert!(err.to_string().contains("CONFIG_TESTS_BAD_MIN_SCORE"));

        unsafe {
            std::env::remove_var("CONFIG_TESTS_BAD_MIN_SCORE");
        }
    }
}

// =============================================================================
// Advisors From Settings
// =============================================================================

mod advisor_tests {
    use super::*;

    #[test]
    fn test_tool_search_advisor_from_settings() {
        let settings = ToolSearchSettings {
            backend: SearchBackend::Keyword,
            accumulate: false,
            advisor_order: 10,
            system_prompt_suffix: Some("\nSearch first.".into()),
            ..Default::default()
        };
        let advisor = ToolSearchAdvisor::from_settings(&settings, registry()).unwrap();
        assert!(!advisor.accumulates());
        assert_eq!(advisor.order(), 10);
        assert_eq!(advisor.catalog().engine().search_type(), SearchType::Keyword);

        let started = advisor
            .on_conversation_start(
                ChatRequest::new("Base.").with_tools(ToolSelection::new().with_name("weather")),
            )
            .unwrap();
        assert_eq!(started.system, "Base.\nSearch first.");
        advisor.on_conversation_end(&started).unwrap();
    }

    #[test]
    fn test_pre_select_advisor_from_settings() {
        let settings = ToolSearchSettings {
            max_results: Some(1),
            ..Default::default()
        };
        let advisor = PreSelectAdvisor::from_settings(&settings, registry()).unwrap();
        assert_eq!(advisor.name(), "PreSelectToolCallingAdvisor");
        assert_eq!(advisor.catalog().engine().search_type(), SearchType::Pattern);
    }

    #[test]
    fn test_invalid_settings_fail_to_build() {
        let settings = ToolSearchSettings {
            max_results: Some(50),
            ..Default::default()
        };
        match ToolSearchAdvisor::from_settings(&settings, registry()) {
            Err(err) => assert!(err.is_configuration_error()),
            Ok(_) => panic!("max_results above the cap must be rejected"),
        }
        assert!(PreSelectAdvisor::from_settings(&settings, registry()).is_err());
    }

    #[tokio::test]
    async fn test_abandoned_conversation_is_swept() {
        let settings = ToolSearchSettings {
            backend: SearchBackend::Semantic,
            session_idle_ttl_secs: Some(60),
            ..Default::default()
        };
        let engine = settings.build_engine().unwrap();
        let engine_sweeper = IdleSweeper::from_settings(&settings, engine).unwrap();
        assert!(engine_sweeper.is_running());

        let advisor = ToolSearchAdvisor::from_settings(&settings, registry()).unwrap();
        let started = advisor
            .on_conversation_start(
                ChatRequest::new("").with_tools(ToolSelection::new().with_name("weather")),
            )
            .unwrap();
        let conversation_id = started.conversation_id.clone().unwrap();
        assert_eq!(advisor.catalog().open_conversations(), 1);

        // the end hook never runs
        let sweeper = IdleSweeper::spawn(
            Arc::clone(advisor.catalog()),
            Duration::ZERO,
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(advisor.catalog().open_conversations(), 0);
        let response = advisor
            .catalog()
            .engine()
            .search(&SearchRequest::new(conversation_id, "Get the weather forecast"))
            .unwrap();
        assert!(response.is_empty());
        sweeper.stop();
    }

    #[tokio::test]
    async fn test_loop_iteration_cap_from_settings() {
        struct AlwaysCallsTool;

        #[async_trait::async_trait]
        impl ChatModel for AlwaysCallsTool {
            async fn call(&self, _request: &ModelRequest) -> tool_search::Result<Message> {
                Ok(Message::assistant_with_content(vec![
                    tool_search::ContentBlock::tool_use("t", "weather", serde_json::json!({})),
                ]))
            }
        }

        let settings = ToolSearchSettings::from_json_str(r#"{"max_iterations": 3}"#).unwrap();
        let agent = ToolCallLoop::builder(Arc::new(AlwaysCallsTool))
            .with_settings(&settings)
            .build();

        let result = agent.run(ChatRequest::new("")).await.unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.stop_reason, StopReason::MaxIterations);
    }
}
