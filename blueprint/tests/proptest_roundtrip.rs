//! Property-based tests for the save/load pipeline.
//!
//! - Round trip: load(save(v)) == v for JSON, YAML and CSV
//! - Idempotency: saving a loaded value reproduces the stored bytes

use blueprint::test_support::{LogLevel, Workspace, WorkspaceConfig, memory_installation};
use proptest::prelude::*;

fn arb_log_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn)
    ]
}

fn arb_config() -> impl Strategy<Value = WorkspaceConfig> {
    (
        prop::string::string_regex(r"[a-z0-9_ ]{0,12}").unwrap(),
        prop::string::string_regex(r"[a-z/]{0,8}").unwrap(),
        prop::option::of(0u32..64),
        prop::option::of(arb_log_level()),
        prop::option::of(prop::collection::vec(
            prop::string::string_regex(r"[a-z]{0,8}").unwrap(),
            0..4,
        )),
    )
        .prop_map(|(db, start, threads, level, groups)| WorkspaceConfig {
            inventory_database: db,
            workspace_start_path: start,
            num_threads: threads,
            log_level: level,
            include_group_names: groups,
        })
}

/// Rows with optional deployment names drawn from `deployment`.
fn arb_workspaces(
    deployment: impl Strategy<Value = String>,
) -> impl Strategy<Value = Vec<Workspace>> {
    prop::collection::vec(
        (
            any::<i64>(),
            prop::string::string_regex(r"[a-z ,]{0,10}").unwrap(),
            prop::option::of(deployment),
        )
            .prop_map(|(id, name, deployment)| Workspace {
                deployment_name: deployment,
                ..Workspace::new(id, &name)
            }),
        0..6,
    )
}

proptest! {
    #[test]
    fn config_round_trips_through_every_text_format(cfg in arb_config()) {
        let (_storage, installation) = memory_installation("me@example.com", "blueprint");
        for file in ["config.yml", "config.yaml", "config.json"] {
            installation.save(&cfg, Some(file)).unwrap();
            let back: WorkspaceConfig = installation.load(Some(file)).unwrap();
            prop_assert_eq!(&back, &cfg);
        }
    }

    #[test]
    fn saving_a_loaded_value_is_idempotent(cfg in arb_config()) {
        let (storage, installation) = memory_installation("me@example.com", "blueprint");
        let path = installation.save(&cfg, None).unwrap();
        let first = storage.file(&path).unwrap();
        let loaded: WorkspaceConfig = installation.load(None).unwrap();
        installation.save(&loaded, None).unwrap();
        prop_assert_eq!(storage.file(&path).unwrap(), first);
    }

    #[test]
    fn workspace_rows_round_trip_through_json(
        rows in arb_workspaces(prop::string::string_regex(r"[a-z]{0,6}").unwrap())
    ) {
        let (_storage, installation) = memory_installation("me@example.com", "blueprint");
        installation.save(&rows, Some("workspaces.json")).unwrap();
        let back: Vec<Workspace> = installation.load(Some("workspaces.json")).unwrap();
        prop_assert_eq!(back, rows);
    }

    // An empty optional cell reads back as None, so CSV deployments are non-empty.
    #[test]
    fn workspace_rows_round_trip_through_csv(
        rows in arb_workspaces(prop::string::string_regex(r"[a-z]{1,6}").unwrap())
    ) {
        let (_storage, installation) = memory_installation("me@example.com", "blueprint");
        installation.save(&rows, Some("workspaces.csv")).unwrap();
        let back: Vec<Workspace> = installation.load(Some("workspaces.csv")).unwrap();
        prop_assert_eq!(back, rows);
    }
}
