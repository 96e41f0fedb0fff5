use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::channel;

use crate::{DoResult, Scheduler, SchedulerConfig};

#[test]
fn test_delayed_call_runs_exactly_once() {
    let ran = Arc::new(AtomicUsize::new(0));

    let sched = Scheduler::new(SchedulerConfig::default());
    sched.run_to_completion(|s| {
        let ran = Arc::clone(&ran);
        s.submit_delayed(Box::new(move |_s| {
            ran.fetch_add(1, Ordering::SeqCst);
        }));
    });

    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn test_delayed_calls_keep_submission_order() {
    let (tx, rx) = channel();

    let sched = Scheduler::new(SchedulerConfig::default());
    sched.run_to_completion(|s| {
        for i in 0..5 {
            let tx = tx.clone();
            s.submit_delayed(Box::new(move |_s| {
                tx.send(i).ok();
            }));
        }
    });

    let got: Vec<i32> = rx.try_iter().collect();
    assert_eq!(got, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_done_dispatch_beats_delayed_calls() {
    // A completion that lands while delayed calls are queued is dispatched
    // first on each tick.
    let (tx, rx) = channel();

    let sched = Scheduler::new(SchedulerConfig::default());
    sched.run_to_completion(|s| {
        let tx_done = tx.clone();
        s.submit(
            Box::new(()),
            Box::new(|_input| DoResult::Done(Box::new(()))),
            Box::new(move |s, _outcome| {
                tx_done.send("callback").ok();
                let tx_tail = tx_done.clone();
                s.submit_delayed(Box::new(move |_s| {
                    tx_tail.send("delayed").ok();
                }));
            }),
        );
    });

    let got: Vec<&str> = rx.try_iter().collect();
    assert_eq!(got, vec!["callback", "delayed"]);
}

#[test]
fn test_delayed_call_can_chain() {
    let depth = Arc::new(AtomicUsize::new(0));

    fn tick(s: &Scheduler, remaining: usize, depth: Arc<AtomicUsize>) {
        depth.fetch_add(1, Ordering::SeqCst);
        if remaining > 0 {
            s.submit_delayed(Box::new(move |s| tick(s, remaining - 1, depth)));
        }
    }

    let sched = Scheduler::new(SchedulerConfig::default());
    sched.run_to_completion(|s| {
        let depth = Arc::clone(&depth);
        s.submit_delayed(Box::new(move |s| tick(s, 99, depth)));
    });

    assert_eq!(depth.load(Ordering::SeqCst), 100);
}
