//! Scenario: installing and removing the managed block leaves the rest of
//! the table untouched.

use crate::prelude::Harness;
use clodputer_engine::{
    generate_cron_section, remove_existing_section, CRON_SECTION_BEGIN, CRON_SECTION_END,
};
use serial_test::serial;

fn daily_task() -> serde_json::Value {
    serde_json::json!({
        "name": "daily",
        "agent": {"prompt": "morning summary"},
        "schedule": {"expression": "0 8 * * *"}
    })
}

#[test]
#[serial]
fn install_then_uninstall_restores_the_original_table() {
    std::env::remove_var("CLODPUTER_CLAUDE_BIN");
    std::env::remove_var("CLODPUTER_EXTRA_ARGS");
    let harness = Harness::new();
    let record: clodputer_core::TaskRecord =
        serde_json::from_value(daily_task()).unwrap();
    let original = "# user\n* * * * * echo hi\n";

    // Install: strip (no-op here) + append the generated block.
    let section = generate_cron_section(&[record], &harness.root).unwrap();
    let installed = format!("{}{}", remove_existing_section(original), section);

    // Everything before the block is the original, byte for byte.
    assert!(installed.starts_with(original));
    let block_start = installed.find(CRON_SECTION_BEGIN).unwrap();
    assert_eq!(&installed[..block_start], original);
    assert!(installed.contains("# Task: daily"));
    assert!(installed.contains("0 8 * * * "));
    assert!(installed.trim_end().ends_with(CRON_SECTION_END));

    // Uninstall restores the original exactly.
    let restored = remove_existing_section(&installed);
    assert_eq!(restored, original);
}

#[test]
#[serial]
fn reinstall_is_idempotent_beyond_the_timestamp() {
    std::env::remove_var("CLODPUTER_CLAUDE_BIN");
    std::env::remove_var("CLODPUTER_EXTRA_ARGS");
    let harness = Harness::new();
    let record: clodputer_core::TaskRecord =
        serde_json::from_value(daily_task()).unwrap();
    let original = "# user\n* * * * * echo hi\n";
    let section = generate_cron_section(&[record], &harness.root).unwrap();

    let once = format!("{}{}", remove_existing_section(original), section);
    let twice = format!("{}{}", remove_existing_section(&once), section);
    assert_eq!(once, twice);
    assert_eq!(twice.matches(CRON_SECTION_BEGIN).count(), 1);
}
