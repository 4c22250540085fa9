use predicates::prelude::*;

use super::common::{KEY_A, KEY_B, TestEnv};

#[test]
fn first_build_compiles_every_task() {
  let env = TestEnv::two_tasks();

  env
    .build()
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("Built {}", KEY_A)))
    .stdout(predicate::str::contains(format!("Built {}", KEY_B)));

  assert_eq!(env.compiled(), vec!["task-0-file-a", "task-1-shell-b"]);
  assert!(env.artifact(KEY_A).is_file());
  assert!(env.artifact(KEY_B).is_file());

  let manifest = env.manifest();
  assert_eq!(manifest.as_object().unwrap().len(), 2);
  assert_eq!(manifest[KEY_A]["module"], "file");
  assert_eq!(manifest[KEY_B]["module"], "shell");
  assert_eq!(manifest[KEY_B]["source"], "playbook.yaml");
  assert_eq!(manifest[KEY_A]["sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn piped_output_has_one_plain_line_per_task() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  env.write_playbook(&super::common::TWO_TASKS.replace("name: a", "name: a2"));

  let output = env.build().output().unwrap();
  let stdout = String::from_utf8(output.stdout).unwrap();
  let lines: Vec<&str> = stdout.lines().collect();

  assert!(lines.contains(&"Built 0-file-a2-linux-amd64"), "{}", stdout);
  assert!(lines.contains(&format!("Skipping {} (unchanged)", KEY_B).as_str()), "{}", stdout);
}

#[test]
fn second_build_skips_and_keeps_manifest_identical() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  let before = std::fs::read(env.manifest_path()).unwrap();

  env
    .build()
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("Skipping {} (unchanged)", KEY_A)))
    .stdout(predicate::str::contains(format!("Skipping {} (unchanged)", KEY_B)));

  assert_eq!(env.compiled().len(), 2);
  assert_eq!(std::fs::read(env.manifest_path()).unwrap(), before);
}

#[test]
fn both_entry_points_share_one_cache() {
  let env = TestEnv::two_tasks();
  env.plumbops("build").assert().success();

  env
    .build()
    .assert()
    .success()
    .stdout(predicate::str::contains("Skipping"))
    .stdout(predicate::str::contains("Built").not());

  assert_eq!(env.compiled().len(), 2);
}

#[test]
fn force_rebuilds_everything() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  let old = env.manifest();

  env.build().arg("--force").assert().success();

  assert_eq!(env.compiled().len(), 4);
  let manifest = env.manifest();
  assert_ne!(manifest[KEY_A]["sha256"], old[KEY_A]["sha256"]);
}

#[test]
fn deleted_artifact_is_rebuilt() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  std::fs::remove_file(env.artifact(KEY_A)).unwrap();

  env
    .build()
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("Built {}", KEY_A)))
    .stdout(predicate::str::contains(format!("Skipping {} (unchanged)", KEY_B)));

  assert_eq!(env.compiled().len(), 3);
}

#[test]
fn corrupt_manifest_triggers_full_rebuild() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();
  std::fs::write(env.manifest_path(), "{\"0-file-a-linux-amd64\": {\"sha2").unwrap();

  env.build().assert().success();

  assert_eq!(env.compiled().len(), 4);
  assert_eq!(env.manifest().as_object().unwrap().len(), 2);
}

#[test]
fn failed_task_is_reported_and_run_continues() {
  let env = TestEnv::two_tasks();

  env
    .build()
    .env("FAKE_CARGO_FAIL", "task-0-file-a")
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("Built {}", KEY_B)))
    .stderr(predicate::str::contains(format!("Failed {}", KEY_A)))
    .stderr(predicate::str::contains("could not compile"));

  let manifest = env.manifest();
  assert!(manifest.get(KEY_A).is_none());
  assert!(manifest.get(KEY_B).is_some());
}

#[test]
fn strict_mode_exits_non_zero_after_saving_manifest() {
  let env = TestEnv::two_tasks();

  env
    .build()
    .arg("--strict")
    .env("FAKE_CARGO_FAIL", "task-1-shell-b")
    .assert()
    .failure();

  assert!(env.manifest().get(KEY_A).is_some());
}

#[test]
fn unknown_module_fails_only_its_task() {
  let env = TestEnv::with_playbook(
    r#"
tasks:
  - name: a
    module: package
  - name: b
    module: shell
    params: {cmd: "true"}
"#,
  );

  env
    .build()
    .assert()
    .success()
    .stderr(predicate::str::contains("unknown module 'package'"))
    .stdout(predicate::str::contains("Built 1-shell-b-linux-amd64"));
}

#[test]
fn json_report_lists_outcomes() {
  let env = TestEnv::two_tasks();
  let output = env.build().arg("--json").output().unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let outcomes = report["outcomes"].as_array().unwrap();
  assert_eq!(outcomes.len(), 2);
  assert_eq!(outcomes[0]["cacheKey"], KEY_A);
  assert_eq!(outcomes[0]["state"], "built");
  assert_eq!(report["target"], "linux/amd64");
}

#[test]
fn renamed_task_keeps_old_entry() {
  let env = TestEnv::two_tasks();
  env.build().assert().success();

  env.write_playbook(&super::common::TWO_TASKS.replace("name: a", "name: a2"));
  env
    .build()
    .assert()
    .success()
    .stdout(predicate::str::contains("Built 0-file-a2-linux-amd64"));

  let manifest = env.manifest();
  assert_eq!(manifest.as_object().unwrap().len(), 3);
  assert!(manifest.get(KEY_A).is_some());
}

#[test]
fn keep_sources_leaves_generated_units() {
  let env = TestEnv::two_tasks();
  env.build().arg("--keep-sources").assert().success();

  let unit = env.out_dir().join(".units").join("0-file-a");
  assert!(unit.join("Cargo.toml").is_file());
  let main_rs = std::fs::read_to_string(unit.join("src/main.rs")).unwrap();
  assert!(main_rs.contains("plumbops_modules::file::FileModule"));
}
