use crate::harness::{Assertion, ErrorMatch, Scenario};
use harness_core::{SessionState, StepStatus};

const WHALE: &str = "erd1whale";

#[test]
fn test_lending_flow() {
    Scenario::new("lending_flow")
        .from_fixture("default")
        .ledger_funds(WHALE, 1_000_000_000_000_000_000_000)
        .load("devnet")
        .assert_state(SessionState::Loaded)
        .begin_step("Sync whale")
        .sync_users(&["whale"])
        .end_step()
        .assert(Assertion::AccountSynced("whale".into()))
        .assert_state(SessionState::Active)
        .begin_step("Issue USD")
        .issue_token("whale", "USD", 6, "usd")
        .end_step()
        .begin_step("Deploy lending pool")
        .deploy("whale", "pool")
        .end_step()
        .begin_step("Deposit")
        .call("whale", "deposit")
        .sync_users(&["whale"])
        .save_nonce("whale", "whaleNonce")
        .end_step()
        .assert(Assertion::TokenExists {
            name: "usd".into(),
            ticker: "USD".into(),
        })
        .assert(Assertion::AccountNonce {
            role: "whale".into(),
            nonce: 3,
        })
        .assert_breadcrumb("whaleNonce", 3u64)
        .assert_step("Issue USD", StepStatus::Passed)
        .assert_attempts("Issue USD", 1)
        .assert_attempts("Sync whale", 0)
        .assert(Assertion::CorrelationConsistent)
        .generate_report()
        .assert_state(SessionState::Finalized)
        .assert(Assertion::ReportContains(
            "Session report: devnet (chain D)".into(),
        ))
        .assert(Assertion::ReportContains(
            "Steps: 4 passed, 0 failed, 0 skipped".into(),
        ))
        .assert(Assertion::ReportContains(
            "breadcrumb whaleNonce: u64 = 3".into(),
        ))
        .destroy()
        .assert_state(SessionState::Destroyed)
        .assert(Assertion::LockFileExists(false))
        .run()
        .unwrap();
}

#[test]
fn test_report_written_to_run_directory() {
    Scenario::new("report_files")
        .from_fixture("default")
        .with_file_reports()
        .load("devnet")
        .begin_step("Remember nonce")
        .save_breadcrumb("nonce", 5u64)
        .end_step()
        .generate_report()
        .assert(Assertion::ReportFileExists)
        .assert(Assertion::ReportContains("breadcrumb nonce: u64 = 5".into()))
        .run()
        .unwrap();
}

#[test]
fn test_zero_step_session_reports_empty() {
    Scenario::new("zero_steps")
        .from_fixture("default")
        .load("devnet")
        .generate_report()
        .assert(Assertion::StepCount(0))
        .assert(Assertion::ReportContains(
            "Steps: 0 passed, 0 failed, 0 skipped".into(),
        ))
        .destroy()
        .run()
        .unwrap();
}

#[test]
fn test_without_session_toml_no_roles_exist() {
    Scenario::new("no_config")
        .load("devnet")
        .begin_step("Sync whale")
        .sync_users(&["whale"])
        .expect_error(ErrorMatch::UnknownRole)
        .end_step()
        .assert_step("Sync whale", StepStatus::Failed)
        .run()
        .unwrap();
}

#[test]
fn test_sync_rejects_unknown_role_before_querying() {
    Scenario::new("unknown_role")
        .from_fixture("default")
        .load("devnet")
        .begin_step("Sync")
        .sync_users(&["whale", "ghost"])
        .expect_error(ErrorMatch::UnknownRole)
        .end_step()
        .assert(Assertion::Custom(Box::new(|session, ledger| {
            anyhow::ensure!(ledger.queries() == 0, "ledger was queried");
            anyhow::ensure!(
                !session.get_user("whale")?.synced,
                "whale synced despite the failed sync"
            );
            Ok(())
        })))
        .run()
        .unwrap();
}
