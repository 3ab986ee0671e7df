// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    high    = { "high", true },
    normal  = { "normal", true },
    upper   = { "HIGH", false },
    urgent  = { "urgent", false },
    empty   = { "", false },
)]
fn priority_parsing(input: &str, ok: bool) {
    assert_eq!(parse_priority(input).is_ok(), ok);
}

#[test]
fn queue_status_works_on_a_fresh_root() {
    let tmp = tempfile::tempdir().unwrap();
    let root = StateRoot::new(tmp.path());
    root.ensure().unwrap();
    queue_status(&root).unwrap();
}

#[test]
fn cancel_of_unknown_id_is_not_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let root = StateRoot::new(tmp.path());
    root.ensure().unwrap();
    queue_cancel(&root, "nope").unwrap();
}
