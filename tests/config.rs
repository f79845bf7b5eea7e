// ABOUTME: Integration tests for agent configuration and deployment manifests.
// ABOUTME: Tests YAML parsing, env-backed secrets, discovery, and init scaffolding.

use stagehand::config::*;
use stagehand::error::Error;
use stagehand::types::{ArtifactReference, StorageObject};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod agent_config {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.control_plane.is_none());
        assert_eq!(config.tools.dir, PathBuf::from(".stagehand/tools"));
        assert_eq!(config.engine.retry_delay, Duration::from_secs(1));
        assert_eq!(config.grace_period(Platform::Kubernetes), Duration::from_secs(30));
        assert!(!config.agent_id.as_str().is_empty());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
agent_id: agent-eu-1
control_plane:
  address: cp.internal:9090
  api_key: literal-key
  poll_interval: 2s
  report_retry:
    max_attempts: 8
    initial_backoff: 250ms
    max_backoff: 1m
tools:
  dir: /opt/stagehand/tools
engine:
  retry_delay: 3s
  report_flush_timeout: 30s
platforms:
  lambda:
    grace_period: 5s
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.agent_id.as_str(), "agent-eu-1");

        let cp = config.control_plane.as_ref().unwrap();
        assert_eq!(cp.address, "cp.internal:9090");
        assert_eq!(cp.poll_interval, Duration::from_secs(2));
        assert_eq!(cp.report_retry.max_attempts, 8);
        assert_eq!(cp.report_retry.initial_backoff, Duration::from_millis(250));
        assert_eq!(cp.report_retry.max_backoff, Duration::from_secs(60));
        assert_eq!(cp.api_key.as_ref().unwrap().resolve().unwrap(), "literal-key");

        assert_eq!(config.tools.dir, PathBuf::from("/opt/stagehand/tools"));
        assert_eq!(config.engine.retry_delay, Duration::from_secs(3));
        assert_eq!(config.engine.report_flush_timeout, Duration::from_secs(30));
        assert_eq!(config.grace_period(Platform::Lambda), Duration::from_secs(5));
        assert_eq!(config.grace_period(Platform::Terraform), Duration::from_secs(60));
    }

    #[test]
    fn unknown_platform_is_rejected() {
        assert!(Config::from_yaml("platforms:\n  nomad:\n    grace_period: 1s\n").is_err());
    }
}

mod env_values {
    use super::*;

    #[test]
    fn api_key_from_environment() {
        let config = Config::from_yaml(
            "control_plane:\n  address: cp:80\n  api_key:\n    env: STAGEHAND_TEST_API_KEY\n",
        )
        .unwrap();
        let key = config.control_plane.unwrap().api_key.unwrap();

        temp_env::with_var("STAGEHAND_TEST_API_KEY", Some("from_environment"), || {
            assert_eq!(key.resolve().unwrap(), "from_environment");
        });
    }

    #[test]
    fn missing_env_var_falls_back_to_default() {
        let value = EnvValue::FromEnv {
            var: "STAGEHAND_TEST_UNSET_A".to_string(),
            default: Some("fallback".to_string()),
        };
        temp_env::with_var_unset("STAGEHAND_TEST_UNSET_A", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn missing_env_var_without_default_is_an_error() {
        let value = EnvValue::FromEnv {
            var: "STAGEHAND_TEST_UNSET_B".to_string(),
            default: None,
        };
        temp_env::with_var_unset("STAGEHAND_TEST_UNSET_B", || {
            let err = value.resolve().unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(ref v) if v == "STAGEHAND_TEST_UNSET_B"));
        });
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".stagehand")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "agent_id: hidden\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.agent_id.as_str(), "hidden");
    }

    #[test]
    fn missing_config_is_reported_or_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
        assert!(Config::discover_or_default(dir.path()).is_ok());
    }

    #[test]
    fn init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("agent-7"), Some("cp.example.com:8080"), false).unwrap();

        let config = temp_env::with_var("STAGEHAND_API_KEY", Some("k"), || {
            Config::discover(dir.path()).unwrap()
        });
        assert_eq!(config.agent_id.as_str(), "agent-7");
        assert_eq!(config.control_plane.unwrap().address, "cp.example.com:8080");
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "agent_id: old\n").unwrap();

        let err = init_config(dir.path(), None, None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        init_config(dir.path(), Some("new"), None, true).unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().agent_id.as_str(), "new");
    }

    #[test]
    fn init_rejects_blank_agent_id() {
        let dir = tempfile::tempdir().unwrap();
        let err = init_config(dir.path(), Some("  "), None, false).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}

mod manifest {
    use super::*;

    #[test]
    fn parse_terraform_pipeline() {
        let yaml = r#"
application: network
artifact:
  image: repo/network:3.1
target:
  platform: terraform
  workspace: staging
  terraformVersion: "1.7.5"
  vars:
    - region=eu-west-1
  varFiles:
    - staging.tfvars
autoRollback: true
dependencies:
  - modules/vpc
pipeline:
  stages:
    - kind: PLAN
    - kind: APPLY
      with:
        requiresApproval: true
"#;
        let spec = DeploymentSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.application.as_str(), "network");
        assert_eq!(spec.platform(), Platform::Terraform);
        assert_eq!(spec.target.tool_version(), Some("1.7.5"));
        assert!(spec.auto_rollback);
        assert_eq!(spec.dependencies, vec![PathBuf::from("modules/vpc")]);

        let Target::Terraform(ref input) = spec.target else {
            panic!("expected terraform target");
        };
        assert_eq!(input.workspace.as_deref(), Some("staging"));
        assert_eq!(input.var_files, vec!["staging.tfvars".to_string()]);

        let stages = spec.pipeline.unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].index, 1);
        assert!(stages[1].options.requires_approval());
    }

    #[test]
    fn storage_artifact() {
        let yaml = r#"
application: my-fn
artifact:
  storage:
    bucket: releases
    key: my-fn/build.zip
    version: "42"
target:
  platform: lambda
"#;
        let spec = DeploymentSpec::from_yaml(yaml).unwrap();
        assert_eq!(
            spec.artifact,
            ArtifactReference::Storage(StorageObject {
                bucket: "releases".to_string(),
                key: "my-fn/build.zip".to_string(),
                version: "42".to_string(),
            })
        );
    }

    #[test]
    fn artifact_must_pick_one_form() {
        let yaml = r#"
application: my-fn
artifact:
  image: repo/my-fn:1
  storage:
    bucket: releases
    key: my-fn.zip
target:
  platform: lambda
"#;
        assert!(DeploymentSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn invalid_application_name_is_rejected() {
        let yaml = r#"
application: "web app"
artifact:
  image: repo/web:1
target:
  platform: kubernetes
"#;
        let err = DeploymentSpec::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("invalid character"));
    }

    #[test]
    fn load_records_app_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.stagehand.yaml");
        fs::write(
            &path,
            "application: web\nartifact:\n  image: repo/web:1\ntarget:\n  platform: kubernetes\n",
        )
        .unwrap();

        let spec = DeploymentSpec::load(&path).unwrap();
        assert_eq!(spec.app_dir, dir.path());
        assert!(spec.pipeline.is_none());
    }
}
