use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn command(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("privado").expect("binary exists");
    cmd.env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.child("config").path())
        .env("XDG_DATA_HOME", temp.child("data").path())
        .env_remove("PRIVADO_DOCKER_ACCESS_KEY")
        .env_remove("PRIVADO_LOG");
    cmd
}

#[test]
fn scan_missing_repository_is_a_path_error() {
    let temp = assert_fs::TempDir::new().unwrap();

    command(&temp)
        .arg("scan")
        .arg(temp.child("does-not-exist").path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Could not resolve path"));
}

#[test]
fn ignore_default_rules_requires_external_config() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("repo").create_dir_all().unwrap();

    command(&temp)
        .arg("scan")
        .arg("--ignore-default-rules")
        .arg(temp.child("repo").path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Default rules cannot be ignored without any external config"));
}

#[test]
fn missing_external_config_directory_is_rejected() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("repo").create_dir_all().unwrap();

    command(&temp)
        .arg("scan")
        .arg("-c")
        .arg(temp.child("no-rules").path())
        .arg(temp.child("repo").path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Could not validate the config directory"));
}

#[test]
fn declining_to_overwrite_existing_results_cancels_the_scan() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("repo/.privado").create_dir_all().unwrap();
    temp.child("repo/.privado/privado.json").write_str("{}").unwrap();

    command(&temp)
        .arg("scan")
        .arg(temp.child("repo").path())
        .write_stdin("n\n")
        .assert()
        .code(5)
        .stdout(predicate::str::contains("Scan report already exists (.privado/privado.json)"))
        .stdout(predicate::str::contains("Terminating.."))
        .stdout(predicate::str::contains("Scanning directory").not());

    temp.child("data/privado/config.json").assert(predicate::path::missing());
}

#[test]
fn missing_access_key_fails_before_any_container_work() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("repo").create_dir_all().unwrap();

    command(&temp)
        .arg("scan")
        .arg(temp.child("repo").path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("> Scanning directory:"))
        .stderr(predicate::str::contains("Cannot fetch docker access key"));

    temp.child("data/privado/config.json").assert(predicate::path::missing());
}

#[test]
fn overwrite_flag_skips_the_confirmation_prompt() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("repo/.privado").create_dir_all().unwrap();
    temp.child("repo/.privado/privado.json").write_str("{}").unwrap();

    command(&temp)
        .arg("scan")
        .arg("--overwrite")
        .arg(temp.child("repo").path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Scan report already exists").not())
        .stderr(predicate::str::contains("Cannot fetch docker access key"));
}

#[test]
fn version_flag_works() {
    let temp = assert_fs::TempDir::new().unwrap();

    command(&temp).arg("--version").assert().success().stdout(predicate::str::contains("privado"));
}
