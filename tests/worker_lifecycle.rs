use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use dualsight::{
    handoff_channel, AnnotationSink, CancellationToken, ClassCatalog, ControlEvent, DetectError,
    DetectionResult, Detector, DetectorKind, DetectorToggles, Frame, FrameSource, JoinOutcome,
    LifecycleState, Session, SessionOptions, ShutdownReason, StubFaceIdentifier,
    StubObjectDetector, WorkerHandle,
};

/// Face identifier that reports each call and blocks until released.
struct GatedIdentifier {
    started: Sender<()>,
    release: Receiver<()>,
}

impl Detector for GatedIdentifier {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::FaceIdentification
    }

    fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult, DetectError> {
        let _ = self.started.send(());
        self.release
            .recv()
            .map_err(|_| DetectError::capability("gated", "gate dropped"))?;
        Ok(DetectionResult::new())
    }
}

fn gated() -> (GatedIdentifier, Receiver<()>, Sender<()>) {
    let (started_tx, started_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();
    (
        GatedIdentifier {
            started: started_tx,
            release: release_rx,
        },
        started_rx,
        release_tx,
    )
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn small_frame() -> Frame {
    Frame::filled(32, 24, [0, 0, 0]).unwrap()
}

#[test]
fn idle_worker_keeps_polling_until_cancelled() {
    let (_handoff, mailbox) = handoff_channel();
    let cancel = CancellationToken::new();
    let mut worker = WorkerHandle::spawn(
        Box::new(StubFaceIdentifier::new(1)),
        mailbox,
        cancel.clone(),
        Duration::from_millis(10),
    )
    .unwrap();

    // Many poll timeouts pass without a frame.
    std::thread::sleep(Duration::from_millis(100));
    assert!(worker.is_running());

    cancel.cancel();
    assert!(wait_until(|| !worker.is_running()));
    assert_eq!(worker.stop(Duration::from_secs(1)), JoinOutcome::Joined);
    assert_eq!(worker.stats().frames_processed, 0);
}

#[test]
fn cancel_during_processing_finishes_the_frame() {
    let (identifier, started, release) = gated();
    let (handoff, mailbox) = handoff_channel();
    let cancel = CancellationToken::new();
    let mut worker = WorkerHandle::spawn(
        Box::new(identifier),
        mailbox,
        cancel.clone(),
        Duration::from_millis(10),
    )
    .unwrap();

    handoff.try_submit(&small_frame());
    started
        .recv_timeout(Duration::from_secs(2))
        .expect("identifier started");

    cancel.cancel();
    std::thread::sleep(Duration::from_millis(30));
    assert!(worker.is_running());

    release.send(()).unwrap();
    assert_eq!(worker.stop(Duration::from_secs(1)), JoinOutcome::Joined);
    assert_eq!(worker.stats().frames_processed, 1);
    assert!(handoff.try_take_result().is_some());
}

#[test]
fn stop_detaches_a_worker_stuck_in_detection() {
    let (identifier, started, release) = gated();
    let (handoff, mailbox) = handoff_channel();
    let mut worker = WorkerHandle::spawn(
        Box::new(identifier),
        mailbox,
        CancellationToken::new(),
        Duration::from_millis(10),
    )
    .unwrap();

    handoff.try_submit(&small_frame());
    started
        .recv_timeout(Duration::from_secs(2))
        .expect("identifier started");

    let begun = Instant::now();
    assert_eq!(worker.stop(Duration::from_millis(50)), JoinOutcome::TimedOut);
    assert!(begun.elapsed() < Duration::from_secs(1));
    assert_eq!(worker.stop(Duration::from_millis(50)), JoinOutcome::AlreadyStopped);

    // Let the detached thread finish.
    drop(release);
}

#[test]
fn newest_result_is_dropped_while_the_slot_is_full() {
    let (handoff, mailbox) = handoff_channel();
    let mut worker = WorkerHandle::spawn(
        Box::new(StubFaceIdentifier::new(2)),
        mailbox,
        CancellationToken::new(),
        Duration::from_millis(10),
    )
    .unwrap();

    for _ in 0..2 {
        assert!(wait_until(|| !handoff.frame_pending()));
        handoff.try_submit(&small_frame());
    }
    assert!(wait_until(|| worker.stats().results_dropped == 1));
    let stats = worker.stats();
    assert_eq!(stats.frames_processed, 2);
    assert_eq!(stats.results_published, 1);

    // The oldest unconsumed result wins: the stub's first answer is unmatched.
    let result = handoff.try_take_result().expect("published result");
    assert_eq!(result.class_ids(), &[-1]);
    assert!(handoff.try_take_result().is_none());
    assert_eq!(worker.stop(Duration::from_secs(1)), JoinOutcome::Joined);
}

/// Frame source that succeeds `frames_before_failure` times, then errors.
struct ScriptedSource {
    produced: u64,
    frames_before_failure: Option<u64>,
    switches: u32,
    released: u32,
    healthy_for: Option<u64>,
}

impl ScriptedSource {
    fn endless() -> Self {
        Self {
            produced: 0,
            frames_before_failure: None,
            switches: 0,
            released: 0,
            healthy_for: None,
        }
    }

    fn failing_after(frames: u64) -> Self {
        Self {
            frames_before_failure: Some(frames),
            ..Self::endless()
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Frame> {
        if self
            .frames_before_failure
            .is_some_and(|limit| self.produced >= limit)
        {
            return Err(anyhow!("device unplugged"));
        }
        self.produced += 1;
        Frame::filled(64, 48, [10, 10, 10])
    }

    fn switch_device(&mut self) -> Result<()> {
        self.switches += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn is_healthy(&self) -> bool {
        self.healthy_for.map_or(true, |frames| self.produced <= frames)
    }

    fn release(&mut self) {
        self.released += 1;
    }
}

#[derive(Default)]
struct RecordingSink {
    presented: Vec<usize>,
    closed: u32,
}

impl AnnotationSink for RecordingSink {
    fn present(&mut self, _frame: &Frame, fused: &DetectionResult) -> Result<()> {
        self.presented.push(fused.len());
        Ok(())
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}

fn session(max_frames: Option<u64>) -> Session {
    let catalog = ClassCatalog::new(
        vec!["person".into(), "car".into()],
        vec!["alice".into()],
    );
    let options = SessionOptions {
        worker_poll: Duration::from_millis(10),
        join_timeout: Duration::from_secs(1),
        max_frames,
        ..SessionOptions::default()
    };
    Session::start(
        Box::new(StubObjectDetector::new(catalog.object_count())),
        Box::new(StubFaceIdentifier::new(catalog.identity_count())),
        &catalog,
        Arc::new(DetectorToggles::new(true, true)),
        options,
    )
    .unwrap()
}

#[test]
fn quit_event_stops_the_session_and_cleans_up() {
    let (events_tx, events_rx) = bounded(4);
    events_tx.send(ControlEvent::Quit).unwrap();

    let mut source = ScriptedSource::endless();
    let mut sink = RecordingSink::default();
    let summary = session(None)
        .run(&mut source, &mut sink, &events_rx)
        .unwrap();

    assert_eq!(summary.reason, ShutdownReason::Quit);
    assert_eq!(summary.final_state, LifecycleState::Stopped);
    assert_eq!(summary.frames, 0);
    assert_eq!(source.released, 1);
    assert_eq!(sink.closed, 1);
}

#[test]
fn frame_limit_ends_the_run() {
    let (_events_tx, events_rx) = unbounded();
    let mut source = ScriptedSource::endless();
    let mut sink = RecordingSink::default();
    let summary = session(Some(5))
        .run(&mut source, &mut sink, &events_rx)
        .unwrap();

    assert_eq!(summary.reason, ShutdownReason::FrameLimit);
    assert_eq!(summary.frames, 5);
    assert_eq!(sink.presented.len(), 5);
    // The object detector fires on the first frame and its result persists.
    assert!(sink.presented.iter().all(|&len| len >= 1));
    assert_eq!(summary.orchestrator.object_runs, 1);
    assert_eq!(summary.final_state, LifecycleState::Stopped);
}

#[test]
fn unhealthy_source_frames_are_counted() {
    let (_events_tx, events_rx) = unbounded();
    let mut source = ScriptedSource {
        healthy_for: Some(2),
        ..ScriptedSource::endless()
    };
    let mut sink = RecordingSink::default();
    let summary = session(Some(5))
        .run(&mut source, &mut sink, &events_rx)
        .unwrap();

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.unhealthy_frames, 3);
}

#[test]
fn switch_camera_event_reaches_the_source() {
    let (events_tx, events_rx) = unbounded();
    events_tx.send(ControlEvent::SwitchCamera).unwrap();
    events_tx.send(ControlEvent::ToggleFace).unwrap();

    let mut source = ScriptedSource::endless();
    let mut sink = RecordingSink::default();
    let session = session(Some(2));
    let toggles = session.lifecycle().toggles().clone();
    let summary = session.run(&mut source, &mut sink, &events_rx).unwrap();

    assert_eq!(source.switches, 1);
    assert!(!toggles.face_enabled());
    assert_eq!(summary.frames, 2);
}

#[test]
fn source_failure_is_fatal_but_cleanup_still_runs() {
    let (_events_tx, events_rx) = unbounded();
    let mut source = ScriptedSource::failing_after(3);
    let mut sink = RecordingSink::default();

    let err = session(None)
        .run(&mut source, &mut sink, &events_rx)
        .unwrap_err();

    assert!(err.to_string().contains("device unplugged"));
    assert_eq!(sink.presented.len(), 3);
    assert_eq!(source.released, 1);
    assert_eq!(sink.closed, 1);
}
