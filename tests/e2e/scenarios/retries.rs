use crate::harness::{Assertion, ErrorMatch, Scenario};
use harness_core::{FailureClass, RetryOverride, SessionState, StepDecl, StepStatus};
use std::time::Duration;

// session.toml fixture: 3 attempts, 5s per attempt, 30s total, default_retries = 5

#[test]
fn test_transient_failures_are_absorbed() {
    Scenario::new("transient_absorbed")
        .from_fixture("default")
        .ledger_fails_next("deploy", 2)
        .load("devnet")
        .begin_step("Deploy pool")
        .deploy("whale", "pool")
        .end_step()
        .assert_step("Deploy pool", StepStatus::Passed)
        .assert_attempts("Deploy pool", 3)
        .assert(Assertion::LedgerReceived {
            operation: "deploy".into(),
            count: 3,
        })
        .assert(Assertion::CorrelationConsistent)
        .run()
        .unwrap();
}

#[test]
fn test_retries_exhausted() {
    Scenario::new("retries_exhausted")
        .from_fixture("default")
        .ledger_fails_next("deploy", 3)
        .load("devnet")
        .begin_step("Deploy pool")
        .deploy("whale", "pool")
        .expect_error(ErrorMatch::OperationFailed {
            class: FailureClass::Retryable,
            attempts: Some(3),
        })
        .end_step()
        .assert_step("Deploy pool", StepStatus::Failed)
        .assert_attempts("Deploy pool", 3)
        .assert(Assertion::AddressMissing("pool".into()))
        .run()
        .unwrap();
}

#[test]
fn test_rejection_is_not_retried() {
    Scenario::new("rejection_fatal")
        .from_fixture("default")
        .ledger_rejects("deposit", "insufficient funds")
        .load("devnet")
        .begin_step("Deposit")
        .call("firstUser", "deposit")
        .expect_error(ErrorMatch::OperationFailed {
            class: FailureClass::Fatal,
            attempts: Some(1),
        })
        .end_step()
        .assert(Assertion::LedgerReceived {
            operation: "deposit".into(),
            count: 1,
        })
        .generate_report()
        .assert(Assertion::ReportContains("insufficient funds".into()))
        .run()
        .unwrap();
}

#[test]
fn test_default_retries_override() {
    Scenario::new("default_retries")
        .from_fixture("default")
        .ledger_fails_next("deploy", 5)
        .load("devnet")
        .begin_step_with(StepDecl::new("Flaky deploy").retries(RetryOverride::Default))
        .deploy("whale", "pool")
        .end_step()
        .assert_step("Flaky deploy", StepStatus::Passed)
        .assert_attempts("Flaky deploy", 6)
        .run()
        .unwrap();
}

#[test]
fn test_zero_retries_override() {
    Scenario::new("zero_retries")
        .from_fixture("default")
        .ledger_fails_next("deploy", 1)
        .load("devnet")
        .begin_step_with(StepDecl::new("One shot").retries(RetryOverride::Count(0)))
        .deploy("whale", "pool")
        .expect_error(ErrorMatch::OperationFailed {
            class: FailureClass::Retryable,
            attempts: Some(1),
        })
        .end_step()
        .run()
        .unwrap();
}

#[test]
fn test_slow_ledger_times_out_each_attempt() {
    Scenario::new("per_attempt_timeout")
        .from_fixture("default")
        .ledger_latency(Duration::from_secs(10))
        .load("devnet")
        .begin_step("Slow deploy")
        .deploy("whale", "pool")
        .expect_error(ErrorMatch::OperationFailed {
            class: FailureClass::Retryable,
            attempts: Some(3),
        })
        .end_step()
        .assert(Assertion::LedgerReceived {
            operation: "deploy".into(),
            count: 3,
        })
        .run()
        .unwrap();
}

#[test]
fn test_step_timeout_bounds_interaction() {
    Scenario::new("bounded_step")
        .from_fixture("default")
        .ledger_latency(Duration::from_secs(4))
        .load("devnet")
        .begin_step_with(StepDecl::new("Bounded").timeout(Duration::from_secs(1)))
        .deploy("whale", "pool")
        .expect_error(ErrorMatch::StepTimedOut {
            timeout_ms: Some(1000),
        })
        .end_step()
        .assert_step("Bounded", StepStatus::Failed)
        .assert_attempts("Bounded", 1)
        .assert(Assertion::AddressMissing("pool".into()))
        .run()
        .unwrap();
}

#[test]
fn test_unreachable_network_blocks_load() {
    Scenario::new("network_down")
        .from_fixture("default")
        .ledger_offline(true)
        .load("devnet")
        .expect_error(ErrorMatch::NetworkUnreachable)
        .assert_state(SessionState::Uninitialized)
        .assert(Assertion::LockFileExists(false))
        .ledger_offline(false)
        .load("devnet")
        .assert_state(SessionState::Loaded)
        .run()
        .unwrap();
}

#[test]
fn test_network_drop_mid_run() {
    Scenario::new("network_drop")
        .from_fixture("default")
        .load("devnet")
        .ledger_offline(true)
        .begin_step("Sync")
        .sync_users(&["whale"])
        .expect_error(ErrorMatch::NetworkUnreachable)
        .end_step()
        .begin_step("Issue")
        .issue_token("whale", "USD", 6, "usd")
        .expect_error(ErrorMatch::OperationFailed {
            class: FailureClass::Retryable,
            attempts: Some(3),
        })
        .end_step()
        .assert_step("Sync", StepStatus::Failed)
        .assert_step("Issue", StepStatus::Failed)
        .run()
        .unwrap();
}
