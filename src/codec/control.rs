//! Per-instance codec work pipeline
//!
//! Implements the control-message model shared by all four codec interfaces:
//! an ordered queue of work items, one worker per instance, a generation
//! counter that invalidates stale work, queue-depth accounting observable as
//! `encodeQueueSize`/`decodeQueueSize`, and flush barriers that resolve
//! futures once all prior work has drained.
//!
//! Callbacks into caller code are never invoked from the worker. The worker
//! posts events to a per-instance dispatcher thread which invokes the output
//! and error callbacks, and fires `dequeue` events, in order. This is the
//! ThreadsafeFunction analogue for a host without a JavaScript event loop.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use tokio::sync::oneshot;

use crate::codec::events::{Event, EventTarget};
use crate::webcodecs::error::{abort_error, invalid_state_error, DOMException, Result};

/// Codec lifecycle state (W3C WebCodecs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecState {
  /// Codec not configured
  #[default]
  Unconfigured,
  /// Codec configured and accepting work
  Configured,
  /// Codec closed (terminal)
  Closed,
}

impl CodecState {
  pub fn as_str(&self) -> &'static str {
    match self {
      CodecState::Unconfigured => "unconfigured",
      CodecState::Configured => "configured",
      CodecState::Closed => "closed",
    }
  }

  fn to_u8(self) -> u8 {
    match self {
      CodecState::Unconfigured => 0,
      CodecState::Configured => 1,
      CodecState::Closed => 2,
    }
  }

  fn from_u8(value: u8) -> Self {
    match value {
      1 => CodecState::Configured,
      2 => CodecState::Closed,
      _ => CodecState::Unconfigured,
    }
  }
}

/// The codec-specific half of a pipeline: runs on the worker thread and
/// turns configs and inputs into outputs by driving a backend session.
///
/// Errors returned from any method are fatal for the instance: the pipeline
/// closes and the error is delivered through the error callback.
pub trait CodecProcessor: Send + 'static {
  type Config: Send + 'static;
  type Input: Send + 'static;
  type Output: Send + 'static;

  /// Tear down any existing backend session and build a new one
  fn configure(&mut self, config: Self::Config) -> Result<()>;

  /// Feed one input and collect whatever outputs the backend produced
  fn process(&mut self, input: Self::Input) -> Result<Vec<Self::Output>>;

  /// Ask the backend for trailing output (flush barrier)
  fn drain(&mut self) -> Result<Vec<Self::Output>>;

  /// Release the backend session (close)
  fn teardown(&mut self) {}
}

/// Output callback type for a codec instance
pub type OutputCallback<O> = Arc<dyn Fn(O) + Send + Sync>;

/// Error callback type for a codec instance
pub type ErrorCallback = Arc<dyn Fn(DOMException) + Send + Sync>;

enum WorkItem<P: CodecProcessor> {
  Configure { config: P::Config, generation: u64 },
  Process { input: P::Input, generation: u64 },
  Flush { id: u64, generation: u64 },
  Shutdown,
}

enum DispatchEvent<O> {
  Output { output: O, generation: u64 },
  Error(DOMException),
  Dequeue,
  FlushDone { id: u64, generation: u64 },
}

struct PendingFlush {
  id: u64,
  resolver: oneshot::Sender<Result<()>>,
}

/// State shared between the caller, the worker, and the dispatcher
struct PipelineShared {
  state: AtomicU8,
  generation: AtomicU64,
  queue_depth: AtomicU32,
  next_flush_id: AtomicU64,
  pending_flushes: Mutex<Vec<PendingFlush>>,
}

impl PipelineShared {
  fn new() -> Self {
    Self {
      state: AtomicU8::new(CodecState::Unconfigured.to_u8()),
      generation: AtomicU64::new(0),
      queue_depth: AtomicU32::new(0),
      next_flush_id: AtomicU64::new(0),
      pending_flushes: Mutex::new(Vec::new()),
    }
  }

  fn state(&self) -> CodecState {
    CodecState::from_u8(self.state.load(Ordering::SeqCst))
  }

  fn set_state(&self, state: CodecState) {
    self.state.store(state.to_u8(), Ordering::SeqCst);
  }

  fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  fn bump_generation(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
  }

  /// Reject every pending flush future with the given diagnostic
  fn reject_pending_flushes(&self, error: &DOMException) {
    let pending: Vec<PendingFlush> = {
      let mut list = self.pending_flushes.lock().expect("flush list poisoned");
      list.drain(..).collect()
    };
    for entry in pending {
      let _ = entry.resolver.send(Err(error.clone()));
    }
  }

  fn take_pending_flush(&self, id: u64) -> Option<PendingFlush> {
    let mut list = self.pending_flushes.lock().expect("flush list poisoned");
    list
      .iter()
      .position(|entry| entry.id == id)
      .map(|index| list.remove(index))
  }

  /// Worker-side fatal transition. Returns false when the instance was
  /// already closed (the error must not be reported twice).
  fn begin_fatal(&self, error: &DOMException) -> bool {
    let previous = self
      .state
      .swap(CodecState::Closed.to_u8(), Ordering::SeqCst);
    if CodecState::from_u8(previous) == CodecState::Closed {
      return false;
    }
    self.bump_generation();
    self.queue_depth.store(0, Ordering::SeqCst);
    self.reject_pending_flushes(error);
    true
  }
}

/// The work pipeline owned by one codec instance.
///
/// Public methods run on the calling thread and return promptly; all heavy
/// work happens on the worker. `flush()` is the only suspending method.
pub struct CodecPipeline<P: CodecProcessor> {
  shared: Arc<PipelineShared>,
  work_tx: Sender<WorkItem<P>>,
  events: Arc<EventTarget>,
}

impl<P: CodecProcessor> CodecPipeline<P> {
  pub fn new(
    processor: P,
    output: OutputCallback<P::Output>,
    error: ErrorCallback,
    events: Arc<EventTarget>,
  ) -> Self {
    let shared = Arc::new(PipelineShared::new());
    let (work_tx, work_rx) = unbounded::<WorkItem<P>>();
    let (event_tx, event_rx) = unbounded::<DispatchEvent<P::Output>>();

    {
      let shared = shared.clone();
      thread::Builder::new()
        .name("webcodecs-worker".into())
        .spawn(move || worker_loop(processor, work_rx, event_tx, shared))
        .expect("failed to spawn codec worker");
    }

    {
      let shared = shared.clone();
      let events = events.clone();
      thread::Builder::new()
        .name("webcodecs-dispatch".into())
        .spawn(move || dispatcher_loop(event_rx, shared, output, error, events))
        .expect("failed to spawn codec dispatcher");
    }

    Self {
      shared,
      work_tx,
      events,
    }
  }

  pub fn state(&self) -> CodecState {
    self.shared.state()
  }

  /// The publicly observed queue depth: accepted encode/decode items the
  /// worker has not yet extracted.
  pub fn queue_size(&self) -> u32 {
    self.shared.queue_depth.load(Ordering::SeqCst)
  }

  pub fn events(&self) -> &Arc<EventTarget> {
    &self.events
  }

  /// Accept a syntactically valid configuration.
  ///
  /// The state moves to `configured` synchronously; semantic validation and
  /// backend construction run as a work item. A semantic failure closes the
  /// instance through the error callback.
  pub fn configure(&self, config: P::Config) -> Result<()> {
    if self.shared.state() == CodecState::Closed {
      return Err(invalid_state_error("Codec is closed"));
    }
    self.shared.set_state(CodecState::Configured);
    let item = WorkItem::Configure {
      config,
      generation: self.shared.generation(),
    };
    self
      .work_tx
      .send(item)
      .map_err(|_| invalid_state_error("Codec worker has shut down"))
  }

  /// Accept one encode/decode input. Raises the queue depth by one.
  pub fn submit(&self, input: P::Input) -> Result<()> {
    if self.shared.state() != CodecState::Configured {
      return Err(invalid_state_error("Codec is not configured"));
    }
    self.shared.queue_depth.fetch_add(1, Ordering::SeqCst);
    let item = WorkItem::Process {
      input,
      generation: self.shared.generation(),
    };
    self
      .work_tx
      .send(item)
      .map_err(|_| invalid_state_error("Codec worker has shut down"))
  }

  /// Enqueue a flush barrier and return a future that completes when all
  /// work accepted before the barrier has drained.
  ///
  /// The barrier is enqueued synchronously, before this method returns; only
  /// the completion is awaited. The future fails with `AbortError` when a
  /// reset or close supersedes the flush, and with the backend diagnostic
  /// when drainage itself faults.
  pub fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
    let enqueued: Result<oneshot::Receiver<Result<()>>> = (|| {
      if self.shared.state() != CodecState::Configured {
        return Err(invalid_state_error("Codec is not configured"));
      }

      let id = self.shared.next_flush_id.fetch_add(1, Ordering::SeqCst);
      let (resolver, future) = oneshot::channel();
      {
        let mut list = self
          .shared
          .pending_flushes
          .lock()
          .expect("flush list poisoned");
        list.push(PendingFlush { id, resolver });
      }

      let item = WorkItem::Flush {
        id,
        generation: self.shared.generation(),
      };
      if self.work_tx.send(item).is_err() {
        self.shared.take_pending_flush(id);
        return Err(invalid_state_error("Codec worker has shut down"));
      }
      Ok(future)
    })();

    async move {
      match enqueued {
        Err(err) => Err(err),
        Ok(future) => match future.await {
          Ok(result) => result,
          Err(_) => Err(abort_error("Codec was torn down during flush")),
        },
      }
    }
  }

  /// Cancel queued and in-flight work and return to `unconfigured`.
  ///
  /// Pending flush futures fail with `AbortError` before this returns.
  pub fn reset(&self) -> Result<()> {
    if self.shared.state() == CodecState::Closed {
      return Err(invalid_state_error("Codec is closed"));
    }
    self.shared.bump_generation();
    self.shared.set_state(CodecState::Unconfigured);
    self.shared.queue_depth.store(0, Ordering::SeqCst);
    self
      .shared
      .reject_pending_flushes(&abort_error("Codec was reset"));
    Ok(())
  }

  /// Terminate the instance permanently. A second close is an error.
  pub fn close(&self) -> Result<()> {
    if self.shared.state() == CodecState::Closed {
      return Err(invalid_state_error("Codec is already closed"));
    }
    self.shared.bump_generation();
    self.shared.set_state(CodecState::Closed);
    self.shared.queue_depth.store(0, Ordering::SeqCst);
    self
      .shared
      .reject_pending_flushes(&abort_error("Codec was closed"));
    let _ = self.work_tx.send(WorkItem::Shutdown);
    Ok(())
  }
}

impl<P: CodecProcessor> Drop for CodecPipeline<P> {
  fn drop(&mut self) {
    // Dropping work_tx disconnects the worker; Shutdown just makes it prompt
    let _ = self.work_tx.send(WorkItem::Shutdown);
  }
}

fn worker_loop<P: CodecProcessor>(
  mut processor: P,
  work_rx: Receiver<WorkItem<P>>,
  event_tx: Sender<DispatchEvent<P::Output>>,
  shared: Arc<PipelineShared>,
) {
  while let Ok(item) = work_rx.recv() {
    match item {
      WorkItem::Shutdown => break,
      WorkItem::Configure { config, generation } => {
        if generation != shared.generation() {
          continue;
        }
        if let Err(err) = processor.configure(config) {
          if shared.begin_fatal(&err) {
            let _ = event_tx.send(DispatchEvent::Error(err));
          }
        }
      }
      WorkItem::Process { input, generation } => {
        if generation != shared.generation() {
          // Stale: the reset that invalidated it already cleared the depth
          continue;
        }
        let _ = shared
          .queue_depth
          .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
            depth.checked_sub(1)
          });
        let _ = event_tx.send(DispatchEvent::Dequeue);

        match processor.process(input) {
          Ok(outputs) => {
            for output in outputs {
              let _ = event_tx.send(DispatchEvent::Output { output, generation });
            }
          }
          Err(err) => {
            if shared.begin_fatal(&err) {
              let _ = event_tx.send(DispatchEvent::Error(err));
            }
          }
        }
      }
      WorkItem::Flush { id, generation } => {
        if generation != shared.generation() {
          // The reset/close that invalidated the barrier already aborted it
          continue;
        }
        match processor.drain() {
          Ok(outputs) => {
            for output in outputs {
              let _ = event_tx.send(DispatchEvent::Output { output, generation });
            }
            let _ = event_tx.send(DispatchEvent::FlushDone { id, generation });
          }
          Err(err) => {
            if shared.begin_fatal(&err) {
              let _ = event_tx.send(DispatchEvent::Error(err));
            }
          }
        }
      }
    }
  }
  processor.teardown();
}

fn dispatcher_loop<O>(
  event_rx: Receiver<DispatchEvent<O>>,
  shared: Arc<PipelineShared>,
  output: OutputCallback<O>,
  error: ErrorCallback,
  events: Arc<EventTarget>,
) {
  while let Ok(event) = event_rx.recv() {
    match event {
      DispatchEvent::Output {
        output: value,
        generation,
      } => {
        // Suppress outputs superseded by reset/close, including resets made
        // from inside an earlier callback of the same flush
        if generation != shared.generation() || shared.state() == CodecState::Closed {
          continue;
        }
        output(value);
      }
      DispatchEvent::Dequeue => {
        if shared.state() != CodecState::Closed && events.has_listeners("dequeue") {
          events.dispatch_event(&Event::new("dequeue"));
        }
      }
      DispatchEvent::Error(err) => {
        // State is already Closed; this is the last observable callback
        error(err);
      }
      DispatchEvent::FlushDone { id, generation } => {
        // Resolution runs only after every preceding output callback has
        // returned; a reset made inside one of them bumped the generation
        // and already rejected the pending entry
        if let Some(entry) = shared.take_pending_flush(id) {
          let result = if generation == shared.generation() {
            Ok(())
          } else {
            Err(abort_error("Codec was reset during flush"))
          };
          let _ = entry.resolver.send(result);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;

  /// Processor that echoes inputs and counts lifecycle calls
  struct EchoProcessor {
    configured: Arc<AtomicUsize>,
    drained: Arc<AtomicUsize>,
    fail_configure: bool,
  }

  impl CodecProcessor for EchoProcessor {
    type Config = u32;
    type Input = u32;
    type Output = u32;

    fn configure(&mut self, _config: u32) -> Result<()> {
      if self.fail_configure {
        return Err(crate::webcodecs::error::not_supported_error("nope"));
      }
      self.configured.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }

    fn process(&mut self, input: u32) -> Result<Vec<u32>> {
      // Keep the worker observably busy so cancellation tests have a window
      thread::sleep(Duration::from_millis(1));
      Ok(vec![input])
    }

    fn drain(&mut self) -> Result<Vec<u32>> {
      self.drained.fetch_add(1, Ordering::SeqCst);
      Ok(Vec::new())
    }
  }

  #[allow(clippy::type_complexity)]
  fn echo_pipeline(
    fail_configure: bool,
  ) -> (
    CodecPipeline<EchoProcessor>,
    Arc<Mutex<Vec<u32>>>,
    Arc<Mutex<Vec<DOMException>>>,
  ) {
    let outputs = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let processor = EchoProcessor {
      configured: Arc::new(AtomicUsize::new(0)),
      drained: Arc::new(AtomicUsize::new(0)),
      fail_configure,
    };
    let outputs_cb = outputs.clone();
    let errors_cb = errors.clone();
    let pipeline = CodecPipeline::new(
      processor,
      Arc::new(move |value| outputs_cb.lock().unwrap().push(value)),
      Arc::new(move |err| errors_cb.lock().unwrap().push(err)),
      Arc::new(EventTarget::new()),
    );
    (pipeline, outputs, errors)
  }

  #[tokio::test]
  async fn test_flush_drains_outputs_in_order() {
    let (pipeline, outputs, _errors) = echo_pipeline(false);
    pipeline.configure(0).unwrap();
    for value in 0..10 {
      pipeline.submit(value).unwrap();
    }
    pipeline.flush().await.unwrap();
    assert_eq!(*outputs.lock().unwrap(), (0..10).collect::<Vec<u32>>());
    assert_eq!(pipeline.queue_size(), 0);
  }

  #[tokio::test]
  async fn test_submit_requires_configured() {
    let (pipeline, _outputs, _errors) = echo_pipeline(false);
    let err = pipeline.submit(1).unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::InvalidStateError
    );
  }

  #[tokio::test]
  async fn test_reset_aborts_pending_flush() {
    let (pipeline, _outputs, _errors) = echo_pipeline(false);
    pipeline.configure(0).unwrap();

    // Stall the worker long enough to race reset against the flush
    for value in 0..200 {
      pipeline.submit(value).unwrap();
    }
    let flush = pipeline.flush();
    pipeline.reset().unwrap();
    let err = flush.await.unwrap_err();
    assert_eq!(
      err.name(),
      crate::webcodecs::error::DOMExceptionName::AbortError
    );
    assert_eq!(pipeline.queue_size(), 0);
    assert_eq!(pipeline.state(), CodecState::Unconfigured);
  }

  #[tokio::test]
  async fn test_configure_failure_closes_through_error_callback() {
    let (pipeline, _outputs, errors) = echo_pipeline(true);
    pipeline.configure(0).unwrap();

    // Error delivery is asynchronous
    for _ in 0..100 {
      if pipeline.state() == CodecState::Closed {
        break;
      }
      thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(pipeline.state(), CodecState::Closed);
    thread::sleep(Duration::from_millis(50));
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(
      errors[0].name(),
      crate::webcodecs::error::DOMExceptionName::NotSupportedError
    );
  }

  #[tokio::test]
  async fn test_double_close_is_error() {
    let (pipeline, _outputs, _errors) = echo_pipeline(false);
    pipeline.close().unwrap();
    assert!(pipeline.close().is_err());
    assert_eq!(pipeline.state(), CodecState::Closed);
  }

  #[tokio::test]
  async fn test_consecutive_flushes() {
    let (pipeline, outputs, _errors) = echo_pipeline(false);
    pipeline.configure(0).unwrap();
    pipeline.submit(1).unwrap();
    pipeline.flush().await.unwrap();
    pipeline.submit(2).unwrap();
    pipeline.flush().await.unwrap();
    assert_eq!(*outputs.lock().unwrap(), vec![1, 2]);
  }

  #[test]
  fn test_state_strings() {
    assert_eq!(CodecState::Unconfigured.as_str(), "unconfigured");
    assert_eq!(CodecState::Configured.as_str(), "configured");
    assert_eq!(CodecState::Closed.as_str(), "closed");
  }
}
