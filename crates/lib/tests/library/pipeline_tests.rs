//! End-to-end behavior of the build pipeline against a fake toolchain.

use std::time::Duration;

use plumbops_lib::out_lock::{LockMode, OutDirLock};
use plumbops_lib::pipeline::{PipelineError, TaskState};
use plumbops_lib::playbook::Task;
use plumbops_lib::util::hash::hash_file;

use super::common::{FakeToolchain, KEY_A, KEY_B, TestEnv, two_task_playbook};

mod first_run {
  use super::*;

  #[tokio::test]
  async fn builds_every_task_and_records_it() {
    let env = TestEnv::new();
    let pipeline = env.pipeline(FakeToolchain::default());

    let report = pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().calls(), 2);
    assert_eq!(report.built(), 2);
    assert_eq!(report.outcomes[0].cache_key, KEY_A);
    assert_eq!(report.outcomes[1].cache_key, KEY_B);

    let manifest = env.manifest();
    assert_eq!(manifest.len(), 2);
    for (key, module) in [(KEY_A, "file"), (KEY_B, "shell")] {
      let entry = manifest.get(key).unwrap();
      assert_eq!(entry.sha256, hash_file(&env.artifact(key)).unwrap());
      assert!(entry.sha256.is_well_formed());
      assert_eq!(entry.module, module);
      assert_eq!(entry.source, "site.yml");
      assert!(entry.built_at.ends_with('Z'), "UTC timestamp: {}", entry.built_at);
    }
  }

  #[tokio::test]
  async fn manifest_uses_camel_case_fields() {
    let env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&env.manifest_bytes()).unwrap();
    let entry = &raw[KEY_A];
    assert!(entry["sha256"].is_string());
    assert!(entry["builtAt"].is_string());
    assert_eq!(entry["module"], "file");
  }

  #[tokio::test]
  async fn removes_generated_units_after_success() {
    let env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();

    assert!(!env.unit_dir("0-file-a").exists());
    assert!(!env.unit_dir("1-shell-b").exists());
  }

  #[tokio::test]
  async fn keep_sources_leaves_units_in_place() {
    let mut env = TestEnv::new();
    env.config.keep_sources = true;
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();

    assert!(env.unit_dir("0-file-a").join("Cargo.toml").is_file());
    assert!(env.unit_dir("1-shell-b").join("params.json").is_file());
  }

  #[tokio::test]
  async fn empty_playbook_writes_empty_manifest() {
    let env = TestEnv::new();
    let report = env
      .pipeline(FakeToolchain::default())
      .run(&Default::default())
      .await
      .unwrap();

    assert!(report.outcomes.is_empty());
    assert!(env.manifest_path().is_file());
    assert!(env.manifest().is_empty());
  }
}

mod incremental {
  use super::*;

  #[tokio::test]
  async fn second_run_is_a_no_op() {
    let env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();
    let before = env.manifest_bytes();

    let pipeline = env.pipeline(FakeToolchain::default());
    let report = pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().calls(), 0);
    assert_eq!(report.skipped(), 2);
    assert_eq!(env.manifest_bytes(), before);
  }

  #[tokio::test]
  async fn force_rebuilds_everything() {
    let mut env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();
    let old = env.manifest();

    env.config.force = true;
    let pipeline = env.pipeline(FakeToolchain::default());
    let report = pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().calls(), 2);
    assert_eq!(report.built(), 2);
    let manifest = env.manifest();
    for key in [KEY_A, KEY_B] {
      let fresh = hash_file(&env.artifact(key)).unwrap();
      assert_eq!(manifest.get(key).unwrap().sha256, fresh);
      assert_eq!(
        report.outcomes.iter().find(|o| o.cache_key == key).unwrap().state,
        TaskState::Built { sha256: fresh }
      );
    }
    assert_ne!(manifest.get(KEY_A).unwrap().sha256, old.get(KEY_A).unwrap().sha256);
  }

  #[tokio::test]
  async fn deleted_artifact_is_rebuilt() {
    let env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();
    std::fs::remove_file(env.artifact(KEY_B)).unwrap();

    let pipeline = env.pipeline(FakeToolchain::default());
    pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().built(), vec!["task-1-shell-b".to_string()]);
    assert!(env.artifact(KEY_B).is_file());
  }

  #[tokio::test]
  async fn tampered_artifact_is_rebuilt() {
    let env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();
    std::fs::write(env.artifact(KEY_A), b"tampered").unwrap();

    let pipeline = env.pipeline(FakeToolchain::default());
    pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().built(), vec!["task-0-file-a".to_string()]);
    assert_eq!(
      env.manifest().get(KEY_A).unwrap().sha256,
      hash_file(&env.artifact(KEY_A)).unwrap()
    );
  }

  #[tokio::test]
  async fn corrupt_manifest_means_full_rebuild() {
    let env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();

    let bytes = env.manifest_bytes();
    std::fs::write(env.manifest_path(), &bytes[..bytes.len() / 2]).unwrap();

    let pipeline = env.pipeline(FakeToolchain::default());
    let report = pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().calls(), 2);
    assert_eq!(report.built(), 2);
    assert_eq!(env.manifest().len(), 2);
  }

  #[tokio::test]
  async fn renamed_task_adds_entry_and_keeps_old_one() {
    let env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();

    let mut playbook = two_task_playbook();
    playbook.tasks[0].name = "a2".to_string();

    let pipeline = env.pipeline(FakeToolchain::default());
    let report = pipeline.run(&playbook).await.unwrap();

    assert_eq!(pipeline.toolchain().built(), vec!["task-0-file-a2".to_string()]);
    assert_eq!(report.skipped(), 1);

    let manifest = env.manifest();
    assert_eq!(manifest.len(), 3);
    assert!(manifest.contains_key("0-file-a2-linux-amd64"));
    assert!(manifest.contains_key(KEY_A));
    assert!(manifest.contains_key(KEY_B));
  }

  #[tokio::test]
  async fn other_target_gets_its_own_entries() {
    let mut env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();

    env.config.target = "darwin/arm64".parse().unwrap();
    let pipeline = env.pipeline(FakeToolchain::default());
    pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().calls(), 2);
    let manifest = env.manifest();
    assert_eq!(manifest.len(), 4);
    assert!(manifest.contains_key("0-file-a-darwin-arm64"));
  }
}

mod failures {
  use super::*;

  #[tokio::test]
  async fn failed_task_keeps_prior_entry_and_run_continues() {
    let mut env = TestEnv::new();
    env.pipeline(FakeToolchain::default()).run(&two_task_playbook()).await.unwrap();
    let old_a = env.manifest().get(KEY_A).unwrap().clone();

    env.config.force = true;
    let pipeline = env.pipeline(FakeToolchain::failing("file-a"));
    let report = pipeline.run(&two_task_playbook()).await.unwrap();

    assert_eq!(pipeline.toolchain().calls(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.built(), 1);
    assert!(matches!(&report.outcomes[0].state, TaskState::Failed { error } if error.contains("could not compile")));

    let manifest = env.manifest();
    assert_eq!(manifest.get(KEY_A), Some(&old_a));
    assert_eq!(
      manifest.get(KEY_B).unwrap().sha256,
      hash_file(&env.artifact(KEY_B)).unwrap()
    );
  }

  #[tokio::test]
  async fn failed_unit_is_kept_for_inspection() {
    let env = TestEnv::new();
    env
      .pipeline(FakeToolchain::failing("shell-b"))
      .run(&two_task_playbook())
      .await
      .unwrap();

    assert!(env.unit_dir("1-shell-b").join("src").join("main.rs").is_file());
    assert!(!env.manifest().contains_key(KEY_B));
  }

  #[tokio::test]
  async fn unknown_module_fails_only_that_task() {
    let env = TestEnv::new();
    let mut playbook = two_task_playbook();
    playbook.tasks.push(Task::new("c", "package", Default::default()));

    let pipeline = env.pipeline(FakeToolchain::default());
    let report = pipeline.run(&playbook).await.unwrap();

    assert_eq!(pipeline.toolchain().calls(), 2);
    assert_eq!(report.built(), 2);
    match &report.outcomes[2].state {
      TaskState::Failed { error } => assert!(error.contains("package"), "{}", error),
      other => panic!("expected failure, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn slow_build_times_out() {
    let mut env = TestEnv::new();
    env.config.task_timeout = Some(Duration::from_millis(50));

    let report = env
      .pipeline(FakeToolchain::slow(Duration::from_secs(30)))
      .run(&two_task_playbook())
      .await
      .unwrap();

    assert_eq!(report.failed(), 2);
    assert!(matches!(&report.outcomes[1].state, TaskState::Failed { error } if error.contains("time budget")));
    assert!(env.manifest().is_empty());
  }

  #[tokio::test]
  async fn concurrent_run_is_rejected() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.out_dir()).unwrap();
    let holder = env.config.lock_holder("build");
    let _held = OutDirLock::acquire(env.out_dir(), LockMode::Exclusive, &holder).unwrap();

    let pipeline = env.pipeline(FakeToolchain::default());
    let err = pipeline.run(&two_task_playbook()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Lock(_)));
    assert_eq!(pipeline.toolchain().calls(), 0);
  }

  #[tokio::test]
  async fn missing_playbook_is_fatal() {
    let env = TestEnv::new();
    let err = env.pipeline(FakeToolchain::default()).run_from_config().await.unwrap_err();
    assert!(matches!(err, PipelineError::Playbook(_)));
    assert!(!env.out_dir().exists());
  }
}

mod concurrency {
  use super::*;

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn sequential_and_parallel_runs_agree() {
    let mut playbook = two_task_playbook();
    for i in 0..6 {
      playbook.tasks.push(Task::new(&format!("echo {}", i), "shell", Default::default()));
    }

    let mut serial = TestEnv::new();
    serial.config.jobs = 1;
    let serial_report = serial.pipeline(FakeToolchain::default()).run(&playbook).await.unwrap();

    let mut parallel = TestEnv::new();
    parallel.config.jobs = 8;
    let parallel_report = parallel.pipeline(FakeToolchain::default()).run(&playbook).await.unwrap();

    let keys = |r: &plumbops_lib::pipeline::BuildReport| r.outcomes.iter().map(|o| o.cache_key.clone()).collect::<Vec<_>>();
    assert_eq!(keys(&serial_report), keys(&parallel_report));
    assert_eq!(serial_report.built(), 8);
    assert_eq!(parallel_report.built(), 8);

    let serial_keys: Vec<String> = serial.manifest().keys().cloned().collect();
    let parallel_keys: Vec<String> = parallel.manifest().keys().cloned().collect();
    assert_eq!(serial_keys, parallel_keys);
  }

  fn shell_tasks(count: usize) -> plumbops_lib::playbook::Playbook {
    plumbops_lib::playbook::Playbook {
      tasks: (0..count)
        .map(|i| Task::new(&format!("step {}", i), "shell", Default::default()))
        .collect(),
    }
  }

  #[tokio::test]
  async fn never_exceeds_the_job_limit() {
    let mut env = TestEnv::new();
    env.config.jobs = 2;
    let pipeline = env.pipeline(FakeToolchain::slow(Duration::from_millis(50)));

    let report = pipeline.run(&shell_tasks(6)).await.unwrap();

    assert_eq!(report.built(), 6);
    assert_eq!(pipeline.toolchain().peak_in_flight(), 2);
  }

  #[tokio::test]
  async fn time_budget_is_per_task_not_per_run() {
    let mut env = TestEnv::new();
    env.config.jobs = 4;
    // Four builds back to back would take 4x the per-build time.
    env.config.task_timeout = Some(Duration::from_millis(900));
    let pipeline = env.pipeline(FakeToolchain::slow(Duration::from_millis(300)));

    let report = pipeline.run(&shell_tasks(4)).await.unwrap();

    assert_eq!(report.failed(), 0, "{:?}", report.outcomes);
    assert_eq!(report.built(), 4);
    assert_eq!(pipeline.toolchain().peak_in_flight(), 4);
  }

  #[tokio::test]
  async fn queued_tasks_do_not_spend_their_budget_waiting() {
    let mut env = TestEnv::new();
    env.config.jobs = 1;
    env.config.task_timeout = Some(Duration::from_millis(400));
    let pipeline = env.pipeline(FakeToolchain::slow(Duration::from_millis(150)));

    let report = pipeline.run(&shell_tasks(4)).await.unwrap();
    assert_eq!(report.built(), 4, "{:?}", report.outcomes);
  }
}

mod persistence {
  use super::*;

  #[tokio::test]
  async fn unwritable_manifest_aborts_the_run() {
    let env = TestEnv::new();
    // A directory where the manifest file belongs cannot be replaced by a rename.
    std::fs::create_dir_all(env.manifest_path().join("blocker")).unwrap();

    let pipeline = env.pipeline(FakeToolchain::default());
    let err = pipeline.run(&two_task_playbook()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Persist(_)), "{}", err);
    assert_eq!(pipeline.toolchain().calls(), 2);
    assert!(env.manifest_path().is_dir());
  }
}
