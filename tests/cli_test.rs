use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn command() -> Command {
    let mut cmd = Command::new(cargo_bin!());
    cmd.env_remove("E2PAYMENTS_API_KEY")
        .env_remove("DB_PATH")
        .env_remove("SESSION_DURATION_SECS")
        .env_remove("SWEEP_INTERVAL_SECS");
    cmd
}

#[test]
fn test_help_lists_options() -> Result<(), Box<dyn std::error::Error>> {
    command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--session-duration-secs"))
        .stdout(predicate::str::contains("--db-path"))
        .stdout(predicate::str::contains("sweep"));

    Ok(())
}

#[test]
fn test_sweep_once_in_simulation_mode() -> Result<(), Box<dyn std::error::Error>> {
    command()
        .arg("sweep")
        .assert()
        .success()
        .stdout(predicate::str::contains("sessions_expired: 0"))
        .stdout(predicate::str::contains("payments_purged: 0"))
        .stdout(predicate::str::contains("gateway_reachable: true"))
        .stderr(predicate::str::contains("SIMULATION MODE"));

    Ok(())
}

#[test]
fn test_sweep_without_probe() -> Result<(), Box<dyn std::error::Error>> {
    command()
        .args(["--no-gateway-probe", "sweep"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gateway_reachable: skipped"));

    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    command()
        .args(["--session-duration-secs", "10", "--sweep-interval-secs", "30", "sweep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sweep interval"));

    Ok(())
}
