//! Fixed-size pool of engine sessions with work distribution and
//! per-job deadlines.
//!
//! Small hand-rolled concurrency primitives rather than an extra crate:
//! each session lives behind its own `tokio::sync::Mutex`, dispatch is a
//! shared atomic counter over the record vector, and cancellation is an
//! `Arc<AtomicBool>` rather than `tokio_util::sync::CancellationToken`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::analysis::{Analysis, Record};
use crate::filter::Filter;
use crate::protocol::ProtocolDescriptor;

use super::session::EngineSession;
use super::types::EngineResult;

/// A pool slot: `None` while a replacement session is being spawned in
/// the background after a failure.
struct Slot {
    session: Mutex<Option<EngineSession>>,
}

/// Fixed-size pool of engine sessions.
pub struct EnginePool {
    descriptor: Arc<ProtocolDescriptor>,
    slots: Vec<Arc<Slot>>,
}

impl EnginePool {
    /// Spawn `instances` engine sessions from `descriptor`. Fails if any
    /// session cannot be started; partially started sessions are
    /// released.
    pub async fn spawn(descriptor: Arc<ProtocolDescriptor>, instances: usize) -> EngineResult<EnginePool> {
        let mut slots = Vec::with_capacity(instances);
        for i in 0..instances {
            info!("starting engine instance {}/{}", i + 1, instances);
            let session = EngineSession::spawn(descriptor.clone()).await?;
            slots.push(Arc::new(Slot {
                session: Mutex::new(Some(session)),
            }));
        }
        Ok(EnginePool { descriptor, slots })
    }

    pub fn instances(&self) -> usize {
        self.slots.len()
    }

    /// Analyze every record in `records`, mutating each in place. Returns
    /// only once every record has a populated analysis, or an error
    /// analysis when the session assigned to it failed: no record is
    /// ever left without one.
    pub async fn analyse_all(
        &self,
        records: &mut [Record],
        accel: Option<Arc<Filter>>,
        node_cap: u64,
        time_ms: u64,
        cancel: &Arc<AtomicBool>,
    ) {
        let total = records.len();
        if total == 0 {
            return;
        }
        // Interior-mutability-free sharing: each index is claimed by
        // exactly one worker via `next`, so concurrent access to
        // disjoint elements never races; the mutex only serializes the
        // (rare) moment two workers would otherwise touch the same
        // index, which never happens, so contention is effectively nil.
        let results: Vec<Mutex<Option<Analysis>>> = (0..total).map(|_| Mutex::new(None)).collect();
        let results = Arc::new(results);
        let positions: Vec<String> = records.iter().map(|r| r.position.clone()).collect();
        let positions = Arc::new(positions);
        let next = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let slot = slot.clone();
            let next = next.clone();
            let results = results.clone();
            let positions = positions.clone();
            let descriptor = self.descriptor.clone();
            let accel = accel.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    if idx >= total {
                        break;
                    }
                    if cancel.load(Ordering::Relaxed) {
                        *results[idx].lock().await = Some(Analysis::error());
                        continue;
                    }

                    let analysis = analyze_with_replacement(
                        &slot,
                        &descriptor,
                        &positions[idx],
                        accel.as_deref(),
                        node_cap,
                        time_ms,
                        &cancel,
                    )
                    .await;
                    *results[idx].lock().await = Some(analysis);
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        // Every worker's clone of `results` is dropped when its task
        // returns, and all tasks have been joined above, so this is the
        // sole remaining reference.
        let results = Arc::try_unwrap(results).expect("all worker tasks joined");
        for (record, slot) in records.iter_mut().zip(results.into_iter()) {
            record.analysis = slot.into_inner();
        }
    }

    /// Send the quit command to every session, wait up to the per-session
    /// grace window, then forcibly terminate. No
    /// leaked child processes on any exit path.
    pub async fn close(self) {
        let mut handles = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            handles.push(tokio::spawn(async move {
                if let Some(session) = slot.session.lock().await.take() {
                    session.shutdown().await;
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// How long a worker waits on a slot whose replacement session is still
/// spawning before giving up on it. Bounds the wait even when
/// `spawn_replacement` itself fails and never refills the slot (engine
/// binary removed mid-run, handshake failure, ...): past this, the job
/// gets an error analysis instead of blocking `analyse_all` forever.
const REPLACEMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const REPLACEMENT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run one job on `slot`'s session. On failure, mark the session gone and
/// spawn its replacement in the background without blocking this job's
/// caller; the current job gets an error
/// analysis. A worker whose slot is mid-replacement waits for it rather
/// than stealing another worker's session, since the session free-list
/// (here, one slot per worker) is the pool's only contended resource.
async fn analyze_with_replacement(
    slot: &Arc<Slot>,
    descriptor: &Arc<ProtocolDescriptor>,
    position: &str,
    accel: Option<&Filter>,
    node_cap: u64,
    time_ms: u64,
    cancel: &Arc<AtomicBool>,
) -> Analysis {
    let waiting_since = std::time::Instant::now();
    loop {
        let mut guard = slot.session.lock().await;
        match guard.as_mut() {
            Some(session) => {
                match session.analyze(position, node_cap, time_ms, accel).await {
                    Ok(analysis) => return analysis,
                    Err(e) => {
                        warn!("engine session failed during analysis, replacing: {e}");
                        *guard = None;
                        drop(guard);
                        spawn_replacement(slot.clone(), descriptor.clone());
                        return Analysis::error();
                    }
                }
            }
            None => {
                drop(guard);
                if cancel.load(Ordering::Relaxed) {
                    return Analysis::error();
                }
                if waiting_since.elapsed() >= REPLACEMENT_WAIT_TIMEOUT {
                    error!("gave up waiting for a replacement engine session after {REPLACEMENT_WAIT_TIMEOUT:?}, failing this job");
                    return Analysis::error();
                }
                tokio::time::sleep(REPLACEMENT_POLL_INTERVAL).await;
            }
        }
    }
}

fn spawn_replacement(slot: Arc<Slot>, descriptor: Arc<ProtocolDescriptor>) {
    tokio::spawn(async move {
        match EngineSession::spawn(descriptor).await {
            Ok(session) => {
                *slot.session.lock().await = Some(session);
                info!("replacement engine session ready");
            }
            Err(e) => {
                error!("failed to spawn replacement engine session: {e}");
            }
        }
    });
}
