//! Integration tests for host file distribution:
//! - one real file plus guard files per distinct webpath host
//! - collapsing identical hosts into one file
//! - retiring files of hosts that were renamed away
//! - per-target failures and backups before overwrite
//! - rewritten files keeping their permissions

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use host_settings::{
    DistributionOptions, FileRole, FixedClock, HostFileDistributor, LEGACY_BACKUP_STUB,
    SettingsError, SettingsTree, codec,
};

fn distributor() -> HostFileDistributor<FixedClock> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    HostFileDistributor::with_clock(FixedClock(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()))
}

fn tree_with_hosts(admin: &str, delivery: &str, delivery_ssl: &str) -> SettingsTree {
    let mut tree = SettingsTree::new();
    tree.set_bulk("foo", [("one", "bar"), ("two", "baz")]);
    set_hosts(&mut tree, admin, delivery, delivery_ssl);
    tree
}

fn set_hosts(tree: &mut SettingsTree, admin: &str, delivery: &str, delivery_ssl: &str) {
    tree.set("webpath", "admin", admin);
    tree.set("webpath", "delivery", delivery);
    tree.set("webpath", "deliverySSL", delivery_ssl);
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").file_name().into_string().expect("utf-8 name"))
        .collect();
    names.sort();
    names
}

fn read(dir: &Path, name: &str) -> SettingsTree {
    codec::read_file(&dir.join(name)).expect("parse distributed file")
}

#[test]
fn identical_hosts_collapse_into_one_real_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tree = tree_with_hosts("dummy", "dummy", "dummy");

    let report = distributor()
        .distribute(&tree, dir.path(), &DistributionOptions::new())
        .expect("distribute");

    assert_eq!(file_names(dir.path()), vec!["dummy.conf.php"]);
    assert_eq!(read(dir.path(), "dummy.conf.php"), tree);
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.real_file().map(|f| f.host.as_str()), Some("dummy"));
    assert!(report.backups.is_empty());
}

#[test]
fn host_topology_changes_over_three_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let distributor = distributor();
    let options = DistributionOptions::new();

    // Single host.
    let mut tree = tree_with_hosts("dummy", "dummy", "dummy");
    distributor.distribute(&tree, dir.path(), &options).expect("first run");
    assert!(dir.path().join("dummy.conf.php").exists());

    // Delivery moves to its own host; admin keeps a guard file.
    set_hosts(&mut tree, "dummy", "delivery", "delivery");
    let report = distributor.distribute(&tree, dir.path(), &options).expect("second run");
    assert_eq!(read(dir.path(), "delivery.conf.php"), tree);
    assert_eq!(read(dir.path(), "dummy.conf.php"), SettingsTree::guard("delivery"));
    assert_eq!(
        report.backups,
        vec![dir.path().join("20240315_old.dummy.conf.php")],
        "existing admin file must be backed up before it becomes a guard"
    );
    let roles: Vec<_> = report.written.iter().map(|f| (f.host.as_str(), f.role)).collect();
    assert_eq!(roles, vec![("dummy", FileRole::Guard), ("delivery", FileRole::Real)]);

    // Three distinct hosts; the old delivery file is retired.
    set_hosts(&mut tree, "dummy", "newhost", "newSSLhost");
    let report = distributor.distribute(&tree, dir.path(), &options).expect("third run");
    let guard = SettingsTree::guard("newhost");
    assert_eq!(read(dir.path(), "newhost.conf.php"), tree);
    assert_eq!(read(dir.path(), "dummy.conf.php"), guard);
    assert_eq!(read(dir.path(), "newSSLhost.conf.php"), guard);
    assert!(
        !dir.path().join("delivery.conf.php").exists(),
        "old real config file was not removed"
    );
    assert_eq!(report.removed_orphans, vec![dir.path().join("delivery.conf.php")]);
    assert!(dir.path().join("20240315_0_old.dummy.conf.php").exists());
}

#[test]
fn rename_cleanup_deletes_previous_real_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let distributor = distributor();
    let options = DistributionOptions::new().with_backup(false);

    let mut tree = tree_with_hosts("delivery", "delivery", "delivery");
    distributor.distribute(&tree, dir.path(), &options).expect("first run");
    set_hosts(&mut tree, "newhost", "newhost", "newhost");
    distributor.distribute(&tree, dir.path(), &options).expect("second run");

    assert_eq!(file_names(dir.path()), vec!["newhost.conf.php"]);
}

#[test]
fn discriminated_runs_leave_other_trees_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let distributor = distributor();
    fs::write(dir.path().join("other.conf.php"), "").expect("seed");
    fs::write(dir.path().join("gone.oa_test.conf.php"), "").expect("seed");
    fs::write(dir.path().join("20240101_old.gone.oa_test.conf.php"), "").expect("seed");

    let tree = tree_with_hosts("localhost", "localhost", "localhost");
    let options = DistributionOptions::new().with_discriminator("oa_test");
    distributor.distribute(&tree, dir.path(), &options).expect("distribute");

    assert_eq!(
        file_names(dir.path()),
        vec![
            "20240101_old.gone.oa_test.conf.php",
            "localhost.oa_test.conf.php",
            "other.conf.php",
        ]
    );
}

#[test]
fn url_webpath_values_name_files_by_host() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tree = tree_with_hosts(
        "admin.example.com/openx/www/admin",
        "ads.example.com/openx/www/delivery",
        "https://ads.example.com:443/openx/www/delivery",
    );
    distributor()
        .distribute(&tree, dir.path(), &DistributionOptions::new())
        .expect("distribute");

    assert_eq!(
        file_names(dir.path()),
        vec!["admin.example.com.conf.php", "ads.example.com.conf.php"]
    );
    assert_eq!(
        read(dir.path(), "admin.example.com.conf.php"),
        SettingsTree::guard("ads.example.com")
    );
}

#[test]
fn failed_target_is_reported_and_others_still_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A non-empty directory where the admin guard file should go.
    let blocked = dir.path().join("dummy.conf.php");
    fs::create_dir(&blocked).expect("mkdir");
    fs::write(blocked.join("keep"), "").expect("seed");
    fs::write(dir.path().join("stale.conf.php"), "").expect("seed");

    let tree = tree_with_hosts("dummy", "newhost", "newhost");
    let options = DistributionOptions::new().with_backup(false);
    let err = distributor()
        .distribute(&tree, dir.path(), &options)
        .expect_err("admin target must fail");

    let SettingsError::PartialDistributionFailure { failures } = err else {
        panic!("expected partial failure, got {err:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].host, "dummy");
    assert_eq!(failures[0].path, blocked);

    assert_eq!(read(dir.path(), "newhost.conf.php"), tree);
    assert!(
        dir.path().join("stale.conf.php").exists(),
        "orphan cleanup must not run after a failed write"
    );
}

#[test]
fn missing_webpath_aborts_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut tree = SettingsTree::new();
    tree.set("webpath", "admin", "a");
    tree.set("webpath", "delivery", "d");

    let err = distributor()
        .distribute(&tree, dir.path(), &DistributionOptions::new())
        .expect_err("deliverySSL is missing");
    assert!(matches!(err, SettingsError::MissingWebpath("deliverySSL")));
    assert!(file_names(dir.path()).is_empty());
}

#[test]
fn legacy_host_file_is_rewritten_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("old.conf.ini"), "[foo]\none=secret ; hand edited\n").expect("seed");

    let tree = tree_with_hosts("old", "old", "old");
    let report = distributor()
        .distribute(&tree, dir.path(), &DistributionOptions::new())
        .expect("distribute");

    assert_eq!(
        file_names(dir.path()),
        vec!["20240315_old.old.conf.ini.php", "old.conf.ini"]
    );
    assert_eq!(read(dir.path(), "old.conf.ini"), tree);
    assert_eq!(
        fs::read_to_string(dir.path().join("20240315_old.old.conf.ini.php")).expect("read backup"),
        LEGACY_BACKUP_STUB
    );
    assert_eq!(report.backups.len(), 1);
}

#[test]
fn stale_legacy_file_next_to_primary_is_left_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("h.conf.ini"), "[foo]\none=stale\n").expect("seed");
    fs::write(dir.path().join("h.conf.php"), "[foo]\none = \"old\"\n").expect("seed");

    let tree = tree_with_hosts("h", "h", "h");
    distributor()
        .distribute(&tree, dir.path(), &DistributionOptions::new().with_backup(false))
        .expect("distribute");

    assert_eq!(read(dir.path(), "h.conf.php"), tree);
    assert_eq!(read(dir.path(), "h.conf.ini").get("foo", "one"), Some("stale"));
}

#[cfg(unix)]
#[test]
fn redistribution_keeps_restricted_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let tree = tree_with_hosts("h", "h", "h");
    let options = DistributionOptions::new().with_backup(false);
    distributor().distribute(&tree, dir.path(), &options).expect("first run");

    let path = dir.path().join("h.conf.php");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod");
    distributor().distribute(&tree, dir.path(), &options).expect("second run");

    let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
