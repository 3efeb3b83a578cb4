use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = cargo_bin_cmd!("remembermectl");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sweep"))
        .stdout(predicate::str::contains("revoke"))
        .stdout(predicate::str::contains("issue"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn sweep_help_documents_cutoff() {
    let mut cmd = cargo_bin_cmd!("remembermectl");
    cmd.args(["sweep", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--before"))
        .stdout(predicate::str::contains("RFC 3339"));
}

#[test]
fn rejects_malformed_cutoff() {
    let mut cmd = cargo_bin_cmd!("remembermectl");
    cmd.args(["sweep", "--before", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RFC 3339"));
}
