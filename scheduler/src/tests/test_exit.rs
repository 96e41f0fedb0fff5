use crate::{Completion, DoResult, Scheduler, SchedulerConfig};

#[test]
fn test_completion_exit_codes() {
    assert_eq!(Completion::None.exit_code(), 0);
    assert_eq!(Completion::Bool(true).exit_code(), 0);
    assert_eq!(Completion::Bool(false).exit_code(), 1);
    assert_eq!(Completion::Int(0).exit_code(), 0);
    assert_eq!(Completion::Int(7).exit_code(), 7);
}

fn run_reporting(completions: Vec<Completion>, extra_bail: u32) -> i32 {
    let sched = Scheduler::new(SchedulerConfig {
        workers: 2,
        extra_bail,
    });
    sched.run_to_completion(|s| {
        for completion in completions {
            s.submit(
                Box::new(()),
                Box::new(|_input| DoResult::Done(Box::new(()))),
                Box::new(move |s, _outcome| s.report_exit(completion)),
            );
        }
    })
}

#[test]
fn test_false_completion_fails_the_run() {
    assert_eq!(run_reporting(vec![Completion::Bool(false)], 0), 1);
}

#[test]
fn test_numeric_completion_passes_through() {
    assert_eq!(run_reporting(vec![Completion::Int(42)], 0), 42);
}

#[test]
fn test_extra_bail_ignores_first_completions() {
    // With one bail, the first completion observed is swallowed. Submission
    // order does not decide completion order, so report both the same value.
    assert_eq!(
        run_reporting(vec![Completion::Bool(false), Completion::Bool(false)], 2),
        0
    );
    assert_eq!(run_reporting(vec![Completion::Bool(false)], 1), 0);
}

#[test]
fn test_status_defaults_to_success() {
    let sched = Scheduler::new(SchedulerConfig::default());
    assert_eq!(sched.run_to_completion(|_s| {}), 0);
}
