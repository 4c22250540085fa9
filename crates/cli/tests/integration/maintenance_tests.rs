use predicates::prelude::*;

use super::common::{KEY_A, KEY_B, TWO_TASKS, TestEnv};

#[test]
fn status_after_build_is_up_to_date() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();

  env
    .plumbops("status")
    .assert()
    .success()
    .stdout(predicate::str::contains(KEY_A))
    .stdout(predicate::str::contains("up to date"));

  assert_eq!(env.compiled().len(), 2);
}

#[test]
fn status_json_flags_tampered_artifact() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  std::fs::write(env.artifact(KEY_B), "tampered").unwrap();

  let output = env.plumbops("status").arg("--json").output().unwrap();
  assert!(output.status.success());

  let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(rows[0]["fresh"], true);
  assert_eq!(rows[1]["fresh"], false);
  assert_eq!(rows[1]["detail"], "artifact changed since last build");
}

#[test]
fn prune_dry_run_lists_orphans_without_removing() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  env.write_playbook(&TWO_TASKS.replace("name: a", "name: a2"));
  env.build().assert().success();

  env
    .plumbops("prune")
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains(KEY_A))
    .stdout(predicate::str::contains("Dry run"));

  assert!(env.artifact(KEY_A).is_file());
  assert!(env.manifest().get(KEY_A).is_some());
}

#[test]
fn prune_removes_orphans() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  env.write_playbook(&TWO_TASKS.replace("name: a", "name: a2"));
  env.build().assert().success();

  env
    .plumbops("prune")
    .arg("--yes")
    .assert()
    .success()
    .stdout(predicate::str::contains("Prune complete"));

  assert!(!env.artifact(KEY_A).exists());
  let manifest = env.manifest();
  assert!(manifest.get(KEY_A).is_none());
  assert!(manifest.get("0-file-a2-linux-amd64").is_some());
  assert!(manifest.get(KEY_B).is_some());
}

#[test]
fn prune_without_confirmation_refuses_in_non_interactive_mode() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  env.write_playbook(&TWO_TASKS.replace("name: a", "name: a2"));

  env
    .plumbops("prune")
    .assert()
    .failure()
    .stderr(predicate::str::contains("--yes"));

  assert!(env.artifact(KEY_A).is_file());
}

#[test]
fn deploy_without_inventory_fails_before_building() {
  let env = TestEnv::two_tasks();

  env
    .plumbops("deploy")
    .assert()
    .failure()
    .stderr(predicate::str::contains("inventory.yaml"));

  assert!(env.compiled().is_empty());
}
