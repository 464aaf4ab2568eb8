use crate::harness::{
    call, deploy, issue_token, sync_users, with_default_retries, Assertion, Scenario,
    ScriptedStep,
};
use harness_core::{SessionState, StepStatus};
use std::time::Duration;

fn lending_steps() -> Vec<ScriptedStep> {
    vec![
        ScriptedStep::new("Issue USD")
            .action(sync_users(&["whale"]))
            .action(issue_token("whale", "USD", 6, "usd")),
        ScriptedStep::new("Deposit").action(call("firstUser", "deposit")),
        ScriptedStep::new("Withdraw").action(call("firstUser", "withdraw")),
    ]
}

#[test]
fn test_bail_skips_remaining_steps() {
    Scenario::new("bail")
        .from_fixture("default")
        .ledger_rejects("deposit", "pool paused")
        .load("devnet")
        .run_suite(lending_steps(), true)
        .assert_step("Issue USD", StepStatus::Passed)
        .assert_step("Deposit", StepStatus::Failed)
        .assert_step("Withdraw", StepStatus::Skipped)
        .assert(Assertion::LedgerReceived {
            operation: "withdraw".into(),
            count: 0,
        })
        .assert_state(SessionState::Finalized)
        .assert(Assertion::ReportContains(
            "Steps: 1 passed, 1 failed, 1 skipped".into(),
        ))
        .assert(Assertion::ReportContains("pool paused".into()))
        .run()
        .unwrap();
}

#[test]
fn test_without_bail_every_step_runs() {
    Scenario::new("no_bail")
        .from_fixture("default")
        .ledger_rejects("deposit", "pool paused")
        .load("devnet")
        .run_suite(lending_steps(), false)
        .assert_step("Deposit", StepStatus::Failed)
        .assert_step("Withdraw", StepStatus::Passed)
        .assert(Assertion::ReportContains(
            "Steps: 2 passed, 1 failed, 0 skipped".into(),
        ))
        .assert(Assertion::CorrelationConsistent)
        .run()
        .unwrap();
}

#[test]
fn test_step_timeout_fails_step() {
    Scenario::new("step_timeout")
        .from_fixture("default")
        .ledger_latency(Duration::from_secs(4))
        .load("devnet")
        .run_suite(
            vec![
                ScriptedStep::new("Slow deploy")
                    .timeout(Duration::from_secs(3))
                    .action(deploy("whale", "pool")),
                ScriptedStep::new("After"),
            ],
            true,
        )
        .assert_step("Slow deploy", StepStatus::Failed)
        .assert_step("After", StepStatus::Skipped)
        .assert(Assertion::ReportContains(
            "step Slow deploy timed out after 3000ms".into(),
        ))
        .assert(Assertion::AddressMissing("pool".into()))
        .run()
        .unwrap();
}

#[test]
fn test_suite_default_retries() {
    Scenario::new("suite_default_retries")
        .from_fixture("default")
        .ledger_fails_next("deploy", 5)
        .load("devnet")
        .run_suite(
            vec![with_default_retries(
                ScriptedStep::new("Flaky deploy").action(deploy("whale", "pool")),
            )],
            true,
        )
        .assert_step("Flaky deploy", StepStatus::Passed)
        .assert_attempts("Flaky deploy", 6)
        .run()
        .unwrap();
}

#[test]
fn test_timed_out_step_keeps_attempts() {
    // Each deploy fails after 2s; the step gives up at 7s during the fourth.
    Scenario::new("timed_out_attempts")
        .from_fixture("default")
        .ledger_latency(Duration::from_secs(2))
        .ledger_fails_next("deploy", 5)
        .load("devnet")
        .run_suite(
            vec![with_default_retries(
                ScriptedStep::new("Flaky deploy")
                    .timeout(Duration::from_secs(7))
                    .action(deploy("whale", "pool")),
            )],
            true,
        )
        .assert(Assertion::LedgerReceived {
            operation: "deploy".into(),
            count: 4,
        })
        .assert_step("Flaky deploy", StepStatus::Failed)
        .assert_attempts("Flaky deploy", 4)
        .run()
        .unwrap();
}

#[test]
fn test_suite_writes_report_files() {
    Scenario::new("suite_report_files")
        .from_fixture("default")
        .with_file_reports()
        .load("devnet")
        .run_suite(lending_steps(), true)
        .assert(Assertion::ReportFileExists)
        .destroy()
        .assert_state(SessionState::Destroyed)
        .run()
        .unwrap();
}
