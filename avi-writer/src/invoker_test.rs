use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use super::SequentialInvoker;
use crate::error::Error;

fn slow_push(value: u32) -> impl FnOnce(&mut Vec<u32>) -> crate::Result<()> + Send + 'static {
    move |log: &mut Vec<u32>| {
        std::thread::sleep(Duration::from_millis(2));
        log.push(value);
        Ok(())
    }
}

#[test]
fn test_blocking_waits_behind_async() -> anyhow::Result<()> {
    let invoker = SequentialInvoker::new("order", Vec::new())?;

    let first = invoker.invoke_async(slow_push(1))?;
    let second = invoker.invoke_async(slow_push(2))?;
    invoker.invoke(slow_push(3))?;
    // The blocking call returned, so both earlier async submissions have run.
    assert_eq!(invoker.pending_invocations(), 0);
    first.wait()?;
    second.wait()?;
    invoker.invoke(slow_push(4))?;

    let log = invoker.into_inner()?;
    assert_eq!(log, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_submission_order_across_threads() -> anyhow::Result<()> {
    // Threads 0..4 submit under a shared lock so their interleaving is known;
    // thread 4 calls `invoke` with no lock and is only ordered against itself.
    let invoker = Arc::new(SequentialInvoker::new("threads", Vec::new())?);
    let submitted = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for t in 0..4u32 {
        let invoker = invoker.clone();
        let submitted = submitted.clone();
        handles.push(std::thread::spawn(move || {
            let mut pending = Vec::new();
            for i in 0..25u32 {
                let id = t * 100 + i;
                let mut order = submitted.lock().unwrap();
                let handle = invoker
                    .invoke_async(move |log: &mut Vec<u32>| {
                        log.push(id);
                        Ok(())
                    })
                    .unwrap();
                order.push(id);
                drop(order);
                if i % 3 == 0 {
                    handle.wait().unwrap();
                } else {
                    pending.push(handle);
                }
            }
            for handle in pending {
                handle.wait().unwrap();
            }
        }));
    }
    {
        let invoker = invoker.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..25u32 {
                invoker
                    .invoke(move |log: &mut Vec<u32>| {
                        log.push(400 + i);
                        Ok(())
                    })
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let invoker = Arc::try_unwrap(invoker).map_err(|_| anyhow::anyhow!("invoker still shared"))?;
    let executed = invoker.into_inner()?;
    assert_eq!(executed.len(), 125);

    let locked: Vec<u32> = executed.iter().copied().filter(|id| *id < 400).collect();
    assert_eq!(locked, *submitted.lock().unwrap());
    for t in 0..5u32 {
        let own: Vec<u32> = executed.iter().copied().filter(|id| id / 100 == t).collect();
        assert_eq!(own, (t * 100..t * 100 + 25).collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn test_blocking_call_from_callback_is_rejected() -> anyhow::Result<()> {
    let invoker = Arc::new(SequentialInvoker::new("reentrant", Vec::new())?);

    let inner = invoker.clone();
    let result = invoker.invoke(move |_: &mut Vec<u32>| inner.wait_for_pending_invocations());
    assert!(matches!(result, Err(Error::Invocation(_))));

    // the worker is still serving
    invoker.invoke(slow_push(5))?;
    let invoker = Arc::try_unwrap(invoker).map_err(|_| anyhow::anyhow!("invoker still shared"))?;
    assert_eq!(invoker.into_inner()?, vec![5]);
    Ok(())
}

#[test]
fn test_callbacks_never_overlap() -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(false));
    let invoker = SequentialInvoker::new("overlap", ())?;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let running = running.clone();
        handles.push(invoker.invoke_async(move |_| {
            assert!(!running.swap(true, Ordering::SeqCst), "callbacks overlapped");
            std::thread::sleep(Duration::from_millis(1));
            running.store(false, Ordering::SeqCst);
            Ok(())
        })?);
    }
    for handle in handles {
        handle.wait()?;
    }
    Ok(())
}

#[test]
fn test_drain_waits_for_everything_submitted() -> anyhow::Result<()> {
    let invoker = SequentialInvoker::new("drain", Vec::new())?;
    for i in 0..10 {
        let _ = invoker.invoke_async(slow_push(i))?;
    }
    invoker.wait_for_pending_invocations()?;
    assert_eq!(invoker.pending_invocations(), 0);

    let log = invoker.into_inner()?;
    assert_eq!(log, (0..10).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_failure_is_reported_to_its_submitter_only() -> anyhow::Result<()> {
    let invoker = SequentialInvoker::new("failure", Vec::new())?;

    let ok_before = invoker.invoke_async(slow_push(1))?;
    let failing = invoker.invoke_async(|_: &mut Vec<u32>| Err(Error::argument("bad unit")))?;
    let ok_after = invoker.invoke_async(slow_push(2))?;

    ok_before.wait()?;
    assert!(matches!(failing.wait(), Err(Error::Argument(_))));
    ok_after.wait()?;

    let blocking = invoker.invoke(|_: &mut Vec<u32>| Err(Error::state("closed")));
    assert!(matches!(blocking, Err(Error::InvalidState(_))));
    invoker.invoke(slow_push(3))?;

    assert_eq!(invoker.into_inner()?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_panic_does_not_stop_the_queue() -> anyhow::Result<()> {
    let invoker = SequentialInvoker::new("panic", Vec::new())?;

    let panicking = invoker.invoke_async(|_: &mut Vec<u32>| panic!("encoder exploded"))?;
    invoker.invoke(slow_push(7))?;

    match panicking.wait() {
        Err(Error::Invocation(msg)) => assert!(msg.contains("encoder exploded")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(invoker.into_inner()?, vec![7]);
    Ok(())
}

#[test]
fn test_drop_runs_queued_work() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let invoker = SequentialInvoker::new("drop", ())?;
        for i in 0..5 {
            let log = log.clone();
            let _ = invoker.invoke_async(move |_| {
                std::thread::sleep(Duration::from_millis(1));
                log.lock().unwrap().push(i);
                Ok(())
            })?;
        }
    }
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_invocation_is_awaitable() -> anyhow::Result<()> {
    let invoker = SequentialInvoker::new("await", Vec::new())?;
    let a = invoker.invoke_async(slow_push(1))?;
    let b = invoker.invoke_async(slow_push(2))?;
    b.await?;
    a.await?;
    let log = tokio::task::spawn_blocking(move || invoker.into_inner()).await??;
    assert_eq!(log, vec![1, 2]);
    Ok(())
}
