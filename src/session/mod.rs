//! Session lifecycle controller.
//!
//! Consumes the ordered protocol event stream, drives the pairing state
//! machine, owns the reconnect-after-logout policy, and exposes the send
//! operation through [`SessionHandle`].

use crate::jid::Jid;
use crate::state::{SessionSnapshot, SessionStore, SessionWatch};
use crate::store::DeviceStore;
use crate::transport::{DynTransport, SessionEvent, TransportError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Delay before the single reconnect attempt after a logout.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle phases of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, no pairing activity yet.
    Init,
    /// A pairing code has been (or is about to be) issued.
    AwaitingCode,
    /// Paired and able to send.
    Ready,
    /// Logged out by the server; a reconnect is scheduled.
    LoggedOut,
    /// Fatal failure; the gateway is shutting down.
    Terminated,
}

/// Errors returned to send callers.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("session not ready")]
    NotReady,

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Cheap handle for HTTP handlers: state snapshots and sends.
///
/// Sends never touch the session state lock, so they run concurrently with
/// each other and with readers.
#[derive(Clone)]
pub struct SessionHandle {
    watch: SessionWatch,
    transport: DynTransport,
    send_timeout: Duration,
}

impl SessionHandle {
    pub fn snapshot(&self) -> SessionSnapshot {
        self.watch.snapshot()
    }

    /// Send a text message. Fails fast when the session is not ready,
    /// without contacting the protocol layer; otherwise forwards under the
    /// configured timeout and returns the transport's verdict verbatim.
    pub async fn send_text(&self, to: &Jid, text: &str) -> Result<String, SendError> {
        if !self.watch.snapshot().ready {
            return Err(SendError::NotReady);
        }
        match tokio::time::timeout(self.send_timeout, self.transport.send_text(to, text)).await {
            Ok(result) => result.map_err(SendError::from),
            Err(_) => Err(SendError::Timeout(self.send_timeout)),
        }
    }
}

/// Drives session state from protocol events. Sole writer of the store.
pub struct SessionController {
    store: SessionStore,
    transport: DynTransport,
    events: mpsc::Receiver<SessionEvent>,
    devices: DeviceStore,
    phase: SessionPhase,
    send_timeout: Duration,
    fatal: CancellationToken,
    shutdown: CancellationToken,
}

impl SessionController {
    /// `fatal` is cancelled by the controller on unrecoverable failures;
    /// `shutdown` is cancelled by the coordinator to stop the controller.
    pub fn new(
        transport: DynTransport,
        events: mpsc::Receiver<SessionEvent>,
        devices: DeviceStore,
        send_timeout: Duration,
        fatal: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            transport,
            events,
            devices,
            phase: SessionPhase::Init,
            send_timeout,
            fatal,
            shutdown,
        }
    }

    /// Startup fast path: a persisted device identity means no pairing will
    /// happen, the session starts out ready.
    pub fn resume_ready(&mut self) {
        tracing::info!("persisted device identity found, session starts ready");
        self.store.mark_ready();
        self.phase = SessionPhase::Ready;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            watch: self.store.watch(),
            transport: self.transport.clone(),
            send_timeout: self.send_timeout,
        }
    }

    /// Process events until shutdown or a fatal failure.
    pub async fn run(mut self) {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => event,
            };
            match event {
                Some(event) => self.on_event(event).await,
                None => self.fail("protocol event stream closed unexpectedly"),
            }
            if self.phase == SessionPhase::Terminated {
                break;
            }
        }
        tracing::debug!("session controller stopped");
    }

    async fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PairingCode(code) => match self.phase {
                SessionPhase::Ready => {
                    tracing::debug!("ignoring pairing code while ready");
                }
                SessionPhase::Terminated => {}
                _ => {
                    tracing::info!("pairing code received, scan to link the device");
                    self.store.set_pending_code(code);
                    self.phase = SessionPhase::AwaitingCode;
                }
            },
            SessionEvent::PairSuccess => {
                tracing::info!("device paired, session ready");
                self.store.mark_ready();
                self.phase = SessionPhase::Ready;
                if let Some(identity) = self.transport.device_identity() {
                    if let Err(err) = self.devices.save(&identity) {
                        tracing::warn!(error = %err, "failed to persist device identity");
                    }
                }
            }
            SessionEvent::LoggedOut => {
                tracing::warn!("logged out by server");
                self.store.mark_logged_out();
                if let Err(err) = self.devices.clear() {
                    tracing::warn!(error = %err, "failed to clear device identity");
                }
                self.phase = SessionPhase::LoggedOut;
                self.reconnect_after(RECONNECT_DELAY).await;
            }
            SessionEvent::StreamFault(reason) => {
                self.fail(&format!("unrecoverable stream fault: {reason}"));
            }
            SessionEvent::Other(kind) => {
                tracing::trace!(kind = %kind, "ignoring protocol event");
            }
        }
    }

    /// Exactly one reconnect attempt, after `delay`. The wait races the
    /// shutdown token so teardown never blocks on it; failure is fatal.
    async fn reconnect_after(&mut self, delay: Duration) {
        tracing::info!(delay_secs = delay.as_secs(), "scheduling reconnect");
        tokio::select! {
            _ = self.shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        match self.transport.connect().await {
            Ok(()) => {
                tracing::info!("reconnected, awaiting session events");
                self.phase = SessionPhase::AwaitingCode;
            }
            Err(err) => self.fail(&format!("reconnect failed: {err}")),
        }
    }

    fn fail(&mut self, reason: &str) {
        tracing::error!(reason, "fatal session error, requesting shutdown");
        self.phase = SessionPhase::Terminated;
        self.fatal.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeviceIdentity;
    use crate::transport::{SessionTransport, TransportResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct MockTransport {
        connects: AtomicUsize,
        connect_results: Mutex<VecDeque<TransportResult<()>>>,
        sent: Mutex<Vec<(String, String)>>,
        send_hangs: AtomicBool,
        identity: Mutex<Option<DeviceIdentity>>,
    }

    #[async_trait]
    impl SessionTransport for MockTransport {
        async fn connect(&self) -> TransportResult<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.connect_results.lock().pop_front().unwrap_or(Ok(()))
        }

        async fn disconnect(&self) {}

        async fn send_text(&self, to: &Jid, text: &str) -> TransportResult<String> {
            if self.send_hangs.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.sent.lock().push((to.to_string(), text.to_string()));
            Ok("MSG-1".to_string())
        }

        fn device_identity(&self) -> Option<DeviceIdentity> {
            self.identity.lock().clone()
        }
    }

    struct Rig {
        handle: SessionHandle,
        events: mpsc::Sender<SessionEvent>,
        transport: Arc<MockTransport>,
        devices: DeviceStore,
        fatal: CancellationToken,
        shutdown: CancellationToken,
        _dir: tempfile::TempDir,
    }

    fn spawn_rig(transport: MockTransport) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let devices = DeviceStore::open(dir.path().join("device.json")).unwrap();
        let transport = Arc::new(transport);
        let (tx, rx) = mpsc::channel(16);
        let fatal = CancellationToken::new();
        let shutdown = CancellationToken::new();
        let controller = SessionController::new(
            transport.clone(),
            rx,
            devices.clone(),
            Duration::from_secs(1),
            fatal.clone(),
            shutdown.clone(),
        );
        let handle = controller.handle();
        tokio::spawn(controller.run());
        Rig {
            handle,
            events: tx,
            transport,
            devices,
            fatal,
            shutdown,
            _dir: dir,
        }
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        // Generous iteration count: under paused time each sleep advances
        // the clock, and the reconnect delay alone consumes 5s of it.
        for _ in 0..2000 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    fn jid() -> Jid {
        "491700000001@s.whatsapp.net".parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_flow_updates_state_and_persists_identity() {
        let rig = spawn_rig(MockTransport {
            identity: Mutex::new(Some(DeviceIdentity {
                jid: jid().to_string(),
                credentials: serde_json::Value::Null,
            })),
            ..MockTransport::default()
        });

        rig.events
            .send(SessionEvent::PairingCode("2@ABC".into()))
            .await
            .unwrap();
        let handle = rig.handle.clone();
        wait_for(move || handle.snapshot().pending_code.as_deref() == Some("2@ABC")).await;
        assert!(!rig.handle.snapshot().ready);

        rig.events.send(SessionEvent::PairSuccess).await.unwrap();
        let handle = rig.handle.clone();
        wait_for(move || handle.snapshot().ready).await;
        assert_eq!(rig.handle.snapshot().pending_code, None);
        assert!(rig.devices.load().unwrap().is_some());

        rig.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_code_ignored_while_ready() {
        let rig = spawn_rig(MockTransport::default());
        rig.events.send(SessionEvent::PairSuccess).await.unwrap();
        rig.events
            .send(SessionEvent::PairingCode("2@LATE".into()))
            .await
            .unwrap();
        rig.events
            .send(SessionEvent::Other("Receipt".into()))
            .await
            .unwrap();
        let handle = rig.handle.clone();
        wait_for(move || handle.snapshot().ready).await;
        assert_eq!(rig.handle.snapshot().pending_code, None);
        rig.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_schedules_one_delayed_reconnect() {
        let rig = spawn_rig(MockTransport::default());
        rig.events.send(SessionEvent::PairSuccess).await.unwrap();
        let handle = rig.handle.clone();
        wait_for(move || handle.snapshot().ready).await;

        let before = tokio::time::Instant::now();
        rig.events.send(SessionEvent::LoggedOut).await.unwrap();
        let handle = rig.handle.clone();
        wait_for(move || !handle.snapshot().ready).await;

        let transport = rig.transport.clone();
        wait_for(move || transport.connects.load(Ordering::SeqCst) == 1).await;
        assert!(before.elapsed() >= RECONNECT_DELAY);

        // A fresh code after the reconnect restores the pairing state.
        rig.events
            .send(SessionEvent::PairingCode("2@NEW".into()))
            .await
            .unwrap();
        let handle = rig.handle.clone();
        wait_for(move || handle.snapshot().pending_code.as_deref() == Some("2@NEW")).await;
        assert_eq!(rig.transport.connects.load(Ordering::SeqCst), 1);
        assert!(!rig.fatal.is_cancelled());
        rig.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_failure_is_fatal() {
        let rig = spawn_rig(MockTransport {
            connect_results: Mutex::new(VecDeque::from([Err(
                TransportError::ConnectionFailed("dns".into()),
            )])),
            ..MockTransport::default()
        });
        rig.events.send(SessionEvent::PairSuccess).await.unwrap();
        rig.events.send(SessionEvent::LoggedOut).await.unwrap();
        tokio::time::timeout(Duration::from_secs(30), rig.fatal.cancelled())
            .await
            .expect("reconnect failure should cancel the fatal token");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_fault_is_fatal() {
        let rig = spawn_rig(MockTransport::default());
        rig.events
            .send(SessionEvent::StreamFault("stream error".into()))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), rig.fatal.cancelled())
            .await
            .expect("stream fault should cancel the fatal token");
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_stream_close_is_fatal() {
        let rig = spawn_rig(MockTransport::default());
        drop(rig.events);
        tokio::time::timeout(Duration::from_secs(5), rig.fatal.cancelled())
            .await
            .expect("closed event stream should cancel the fatal token");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_ready() {
        let rig = spawn_rig(MockTransport::default());
        let err = rig.handle.send_text(&jid(), "hi").await.unwrap_err();
        assert!(matches!(err, SendError::NotReady));
        assert!(rig.transport.sent.lock().is_empty());
        rig.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_forwards_when_ready() {
        let rig = spawn_rig(MockTransport::default());
        rig.events.send(SessionEvent::PairSuccess).await.unwrap();
        let handle = rig.handle.clone();
        wait_for(move || handle.snapshot().ready).await;

        let id = rig.handle.send_text(&jid(), "hello").await.unwrap();
        assert_eq!(id, "MSG-1");
        assert_eq!(
            rig.transport.sent.lock().as_slice(),
            &[(jid().to_string(), "hello".to_string())]
        );
        rig.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_times_out() {
        let rig = spawn_rig(MockTransport {
            send_hangs: AtomicBool::new(true),
            ..MockTransport::default()
        });
        rig.events.send(SessionEvent::PairSuccess).await.unwrap();
        let handle = rig.handle.clone();
        wait_for(move || handle.snapshot().ready).await;

        let err = rig.handle.send_text(&jid(), "hello").await.unwrap_err();
        assert!(matches!(err, SendError::Timeout(_)));
        rig.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_resume_ready_fast_path() {
        let dir = tempfile::tempdir().unwrap();
        let devices = DeviceStore::open(dir.path().join("device.json")).unwrap();
        let (_tx, rx) = mpsc::channel(1);
        let mut controller = SessionController::new(
            Arc::new(MockTransport::default()),
            rx,
            devices,
            Duration::from_secs(1),
            CancellationToken::new(),
            CancellationToken::new(),
        );
        assert_eq!(controller.phase(), SessionPhase::Init);
        controller.resume_ready();
        assert_eq!(controller.phase(), SessionPhase::Ready);
        assert!(controller.handle().snapshot().ready);
    }
}
