//! Static source supervisor
//!
//! Keeps exactly one execution of a [`StaticSource`] alive for a path,
//! restarts it after a fixed pause when it fails, forwards configuration
//! reloads and relays readiness announcements to the path owner.
//!
//! # Lifecycle
//!
//! ```text
//!   StaticSourceHandler ──start()──► RunningSource ──stop()──► StaticSourceHandler
//!        (Idle)                         │                          (Idle again)
//!                                       ▼
//!                 ┌──────────── worker task ─────────────┐
//!                 │  Running ──exit/error──► RetryPending │
//!                 │     ▲                        │        │
//!                 │     └──── retry timer ───────┘        │
//!                 └───────── cancel ──► Stopped ──────────┘
//! ```
//!
//! `start` consumes the idle handler and `stop` consumes the running one, so
//! starting twice or stopping twice cannot be expressed.
//!
//! All mutable supervisor state lives in the worker task. The outside world
//! talks to it through channels only: reloads from [`RunningSource`],
//! readiness requests from the source's [`SourceReporter`].

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

use super::error::SourceError;
use super::instance::{
    RunParams, SourceDescribe, SourceFactory, SourceOptions, SourceParent, StaticSource,
};
use super::ready::{SetNotReadyReq, SetReadyReq, SourceReporter};
use super::resolve::resolve_source;
use crate::conf::PathConf;
use crate::logger::LogLevel;
use crate::stats::SourceStats;

/// Pause between a failed execution and the next attempt
pub const RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Observable phase of a supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    /// An execution is in flight
    Running,
    /// Last execution failed, waiting for the retry timer
    RetryPending,
    /// Stopped; no further readiness events will be delivered
    Stopped,
}

/// Supervisor of a path's static source, not yet started
pub struct StaticSourceHandler {
    conf: Arc<PathConf>,
    matches: Vec<String>,
    instance: Arc<dyn StaticSource>,
    parent: Arc<dyn SourceParent>,
    retry_pause: Duration,
    stats: Arc<SourceStats>,
}

impl StaticSourceHandler {
    /// Create a supervisor for `conf`
    ///
    /// The source implementation is chosen once, from the scheme of the
    /// configured source, and built with the server-wide `options`.
    /// `matches` are the capture groups of the path lookup, used to fill
    /// `$G<n>` placeholders on every launch.
    pub fn new(
        conf: Arc<PathConf>,
        matches: Option<Vec<String>>,
        options: &SourceOptions,
        factory: &dyn SourceFactory,
        parent: Arc<dyn SourceParent>,
    ) -> Result<Self, SourceError> {
        let kind = conf
            .source_kind()
            .ok_or_else(|| SourceError::NotStatic(conf.source.clone()))?;
        let instance = factory.create(kind, &conf, options)?;

        Ok(Self {
            conf,
            matches: matches.unwrap_or_default(),
            instance,
            parent,
            retry_pause: RETRY_PAUSE,
            stats: Arc::new(SourceStats::new()),
        })
    }

    /// Override the pause between attempts
    pub fn retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Configuration the next start will use
    pub fn conf(&self) -> &Arc<PathConf> {
        &self.conf
    }

    /// Counters shared with every run of this supervisor
    pub fn stats(&self) -> &Arc<SourceStats> {
        &self.stats
    }

    /// Describe the supervised source
    pub fn describe(&self) -> SourceDescribe {
        self.instance.describe()
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.parent
            .log(level, &format!("[{}] {}", self.instance.describe().kind, message));
    }

    /// Launch the source in the background
    ///
    /// Returns immediately; the first execution is started by the worker.
    /// `query` fills `$MTX_QUERY` and is kept for every retry.
    pub fn start(self, on_demand: bool, query: impl Into<String>) -> RunningSource {
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = mpsc::channel(1);
        let (not_ready_tx, not_ready_rx) = mpsc::channel(1);
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let (phase_tx, phase_rx) = watch::channel(SourcePhase::Running);

        self.log(
            LogLevel::Info,
            if on_demand {
                "started on demand"
            } else {
                "started"
            },
        );

        let reporter = SourceReporter::new(
            ready_tx,
            not_ready_tx,
            cancel.clone(),
            Arc::clone(&self.parent),
            self.instance.describe().kind,
        );

        let worker = Worker {
            conf: Arc::clone(&self.conf),
            matches: self.matches.clone(),
            query: query.into(),
            instance: Arc::clone(&self.instance),
            parent: Arc::clone(&self.parent),
            retry_pause: self.retry_pause,
            stats: Arc::clone(&self.stats),
            cancel: cancel.clone(),
            reporter,
            ready_rx,
            not_ready_rx,
            reload_rx,
            phase: phase_tx,
        };

        RunningSource {
            worker: tokio::spawn(worker.run()),
            handler: self,
            cancel,
            reload_tx,
            phase: phase_rx,
        }
    }
}

/// Supervisor of a path's static source, started
pub struct RunningSource {
    handler: StaticSourceHandler,
    cancel: CancellationToken,
    reload_tx: mpsc::Sender<Arc<PathConf>>,
    phase: watch::Receiver<SourcePhase>,
    worker: JoinHandle<()>,
}

impl RunningSource {
    /// Stop the source and wait until the worker has fully unwound
    ///
    /// After this returns no readiness request of this run is pending and
    /// none will be delivered. The returned handler carries the latest
    /// configuration and can be started again.
    pub async fn stop(self, reason: &str) -> StaticSourceHandler {
        self.handler
            .log(LogLevel::Info, &format!("stopped: {}", reason));

        self.cancel.cancel();

        if let Err(err) = self.worker.await {
            tracing::error!(
                path = %self.handler.conf.name,
                error = %err,
                "Static source supervisor ended abnormally"
            );
        }

        self.handler
    }

    /// Hand a new configuration to the supervisor without waiting
    ///
    /// Delivery happens from a throwaway task. While a retry is pending the
    /// configuration is stored for the next launch but not forwarded.
    pub fn reload_conf(&mut self, conf: Arc<PathConf>) {
        self.handler.conf = Arc::clone(&conf);

        let reload_tx = self.reload_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = reload_tx.send(conf) => {}
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Describe the supervised source
    pub fn describe(&self) -> SourceDescribe {
        self.handler.describe()
    }

    /// Latest configuration handed to the supervisor
    pub fn conf(&self) -> &Arc<PathConf> {
        &self.handler.conf
    }

    /// Counters of this supervisor
    pub fn stats(&self) -> &Arc<SourceStats> {
        &self.handler.stats
    }

    /// Current phase as published by the worker
    pub fn phase(&self) -> SourcePhase {
        *self.phase.borrow()
    }

    /// Wait until the worker publishes `phase`
    pub async fn wait_phase(&mut self, phase: SourcePhase) {
        // the sender lives as long as the worker; if it is gone we are stopped
        let _ = self.phase.wait_for(|p| *p == phase).await;
    }
}

/// One launched execution of the source
struct Execution {
    cancel: CancellationToken,
    reload_tx: mpsc::Sender<Arc<PathConf>>,
    handle: JoinHandle<Result<(), SourceError>>,
}

/// State owned by the supervisor task
struct Worker {
    conf: Arc<PathConf>,
    matches: Vec<String>,
    query: String,
    instance: Arc<dyn StaticSource>,
    parent: Arc<dyn SourceParent>,
    retry_pause: Duration,
    stats: Arc<SourceStats>,
    cancel: CancellationToken,
    reporter: SourceReporter,
    ready_rx: mpsc::Receiver<SetReadyReq>,
    not_ready_rx: mpsc::Receiver<SetNotReadyReq>,
    reload_rx: mpsc::Receiver<Arc<PathConf>>,
    phase: watch::Sender<SourcePhase>,
}

impl Worker {
    async fn run(mut self) {
        let mut execution = self.launch();
        let mut retry: Option<Pin<Box<Sleep>>> = None;
        if execution.is_none() {
            retry = Some(self.arm_retry());
        }

        loop {
            tokio::select! {
                // stopping wins over an execution that ends because of it
                biased;
                _ = self.cancel.cancelled() => {
                    if let Some(current) = execution.take() {
                        current.cancel.cancel();
                        let _ = current.handle.await;
                    }
                    self.phase.send_replace(SourcePhase::Stopped);
                    return;
                }

                res = wait_exit(&mut execution) => {
                    if let Some(ended) = execution.take() {
                        ended.cancel.cancel();
                    }

                    let err = match res {
                        Ok(Ok(())) => SourceError::Exited,
                        Ok(Err(err)) => err,
                        Err(join) => SourceError::Panicked(join_message(join)),
                    };
                    self.stats.record_failure(&err);
                    self.reporter.log(LogLevel::Error, &err.to_string());
                    self.discard_abandoned();

                    retry = Some(self.arm_retry());
                }

                Some(req) = self.ready_rx.recv() => {
                    self.stats.record_ready();
                    self.parent.on_source_ready(&self.cancel, req).await;
                }

                Some(req) = self.not_ready_rx.recv() => {
                    self.stats.record_not_ready();
                    self.parent.on_source_not_ready(&self.cancel, req).await;
                }

                Some(conf) = self.reload_rx.recv() => {
                    self.conf = Arc::clone(&conf);

                    if let Some(current) = &execution {
                        let reload_tx = current.reload_tx.clone();
                        let cancel = current.cancel.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = reload_tx.send(conf) => {}
                                _ = cancel.cancelled() => {}
                            }
                        });
                    }
                }

                _ = wait_retry(&mut retry) => {
                    retry = None;
                    execution = self.launch();
                    if execution.is_none() {
                        retry = Some(self.arm_retry());
                    }
                }
            }
        }
    }

    /// Resolve the source and spawn an execution
    ///
    /// A source that does not resolve counts as a failed run.
    fn launch(&mut self) -> Option<Execution> {
        let resolved = match resolve_source(
            &self.conf.source,
            &self.matches,
            &self.query,
            &self.conf.username,
            &self.conf.password,
        ) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.stats.record_failure(&err);
                self.reporter.log(
                    LogLevel::Error,
                    &format!("failed to resolve source {}: {}", self.conf.source, err),
                );
                return None;
            }
        };

        let cancel = self.cancel.child_token();
        let (reload_tx, reload_rx) = mpsc::channel(1);

        let params = RunParams {
            cancel: cancel.clone(),
            resolved_source: resolved,
            conf: Arc::clone(&self.conf),
            reload: reload_rx,
            reporter: self.reporter.clone(),
        };

        self.stats.record_run();
        self.phase.send_replace(SourcePhase::Running);

        let instance = Arc::clone(&self.instance);
        let handle = tokio::spawn(async move { instance.run(params).await });

        Some(Execution {
            cancel,
            reload_tx,
            handle,
        })
    }

    /// Answer requests the ended execution queued but stopped waiting for
    fn discard_abandoned(&mut self) {
        while let Ok(req) = self.ready_rx.try_recv() {
            req.reply(Err(SourceError::Terminated));
        }
        while let Ok(req) = self.not_ready_rx.try_recv() {
            req.ack();
        }
    }

    fn arm_retry(&self) -> Pin<Box<Sleep>> {
        self.phase.send_replace(SourcePhase::RetryPending);
        Box::pin(tokio::time::sleep(self.retry_pause))
    }
}

async fn wait_exit(
    execution: &mut Option<Execution>,
) -> Result<Result<(), SourceError>, JoinError> {
    match execution {
        Some(current) => (&mut current.handle).await,
        None => std::future::pending().await,
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

fn join_message(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(msg) = payload.downcast_ref::<&str>() {
            return (*msg).to_string();
        }
        if let Some(msg) = payload.downcast_ref::<String>() {
            return msg.clone();
        }
        return "unknown panic".to_string();
    }
    err.to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::source::{Media, MediaDescription, SourceKind};

    /// What the scripted source does on each run
    #[derive(Clone, Copy)]
    enum Script {
        /// Fail immediately
        Fail,
        /// Announce readiness, then stream until cancelled
        ReadyThenWait,
        /// Wait until cancelled without announcing
        Wait,
        /// Announce readiness, fail right after
        ReadyThenFail,
        /// Panic
        Panic,
        /// Announce readiness, lose the media, then wait until cancelled
        ReadyThenNotReady,
        /// Queue an announcement without waiting for it, then fail
        AbandonReady,
    }

    struct ScriptedSource {
        script: Script,
        launches: mpsc::UnboundedSender<(Instant, String)>,
        ready_results: mpsc::UnboundedSender<Result<(), SourceError>>,
        reloads: mpsc::UnboundedSender<Arc<PathConf>>,
        steps: mpsc::UnboundedSender<&'static str>,
    }

    #[async_trait]
    impl StaticSource for ScriptedSource {
        async fn run(&self, mut params: RunParams) -> Result<(), SourceError> {
            let _ = self
                .launches
                .send((Instant::now(), params.resolved_source.clone()));

            let desc = MediaDescription::new(vec![Media::video("H264")]);

            match self.script {
                Script::Fail => Err(SourceError::run("connection refused")),
                Script::Panic => panic!("decoder exploded"),
                Script::ReadyThenFail => {
                    let res = params.reporter.set_ready(desc).await;
                    let _ = self.ready_results.send(res);
                    Err(SourceError::run("stream ended"))
                }
                Script::AbandonReady => {
                    tokio::select! {
                        biased;
                        _ = params.reporter.set_ready(desc) => {}
                        _ = std::future::ready(()) => {}
                    }
                    Err(SourceError::run("gave up"))
                }
                Script::ReadyThenNotReady => {
                    let res = params.reporter.set_ready(desc).await;
                    let _ = self.ready_results.send(res);
                    params.reporter.set_not_ready().await;
                    let _ = self.steps.send("not_ready_returned");
                    params.cancel.cancelled().await;
                    Ok(())
                }
                Script::ReadyThenWait | Script::Wait => {
                    if matches!(self.script, Script::ReadyThenWait) {
                        let res = params.reporter.set_ready(desc).await;
                        let _ = self.ready_results.send(res);
                    }
                    loop {
                        tokio::select! {
                            _ = params.cancel.cancelled() => return Ok(()),
                            Some(conf) = params.reload.recv() => {
                                let _ = self.reloads.send(conf);
                            }
                        }
                    }
                }
            }
        }

        fn describe(&self) -> SourceDescribe {
            SourceDescribe::of(SourceKind::Rtsp)
        }
    }

    struct Factory {
        source: Arc<ScriptedSource>,
        options: Mutex<Vec<SourceOptions>>,
    }

    impl Factory {
        fn new(source: ScriptedSource) -> Self {
            Self {
                source: Arc::new(source),
                options: Mutex::new(Vec::new()),
            }
        }
    }

    impl SourceFactory for Factory {
        fn create(
            &self,
            _kind: SourceKind,
            _conf: &PathConf,
            options: &SourceOptions,
        ) -> Result<Arc<dyn StaticSource>, SourceError> {
            self.options.lock().unwrap().push(*options);
            Ok(self.source.clone())
        }
    }

    fn idle_source(script: Script) -> ScriptedSource {
        ScriptedSource {
            script,
            launches: mpsc::unbounded_channel().0,
            ready_results: mpsc::unbounded_channel().0,
            reloads: mpsc::unbounded_channel().0,
            steps: mpsc::unbounded_channel().0,
        }
    }

    /// How the test parent answers readiness
    #[derive(Clone, Copy)]
    enum Verdict {
        Accept,
        Reject,
        /// Hold the request until cancelled
        Stall,
        /// Accept readiness, hold loss-of-media notifications until cancelled
        StallNotReady,
    }

    struct Parent {
        verdict: Verdict,
        events: Mutex<Vec<&'static str>>,
        logs: Mutex<Vec<(LogLevel, String)>>,
    }

    impl Parent {
        fn new(verdict: Verdict) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                events: Mutex::new(Vec::new()),
                logs: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }

        fn logs(&self) -> Vec<(LogLevel, String)> {
            self.logs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceParent for Parent {
        async fn on_source_ready(&self, cancel: &CancellationToken, req: SetReadyReq) {
            self.events.lock().unwrap().push("ready");
            match self.verdict {
                Verdict::Accept | Verdict::StallNotReady => req.accept(),
                Verdict::Reject => req.reject("path is closing"),
                Verdict::Stall => {
                    cancel.cancelled().await;
                    req.reply(Err(SourceError::Terminated));
                }
            }
        }

        async fn on_source_not_ready(&self, cancel: &CancellationToken, req: SetNotReadyReq) {
            self.events.lock().unwrap().push("not_ready");
            if matches!(self.verdict, Verdict::StallNotReady) {
                cancel.cancelled().await;
                drop(req);
                return;
            }
            req.ack();
        }

        fn log(&self, level: LogLevel, message: &str) {
            self.logs.lock().unwrap().push((level, message.to_string()));
        }
    }

    struct Harness {
        launches: mpsc::UnboundedReceiver<(Instant, String)>,
        ready_results: mpsc::UnboundedReceiver<Result<(), SourceError>>,
        reloads: mpsc::UnboundedReceiver<Arc<PathConf>>,
        steps: mpsc::UnboundedReceiver<&'static str>,
        handler: StaticSourceHandler,
    }

    fn harness(script: Script, conf: PathConf, matches: Option<Vec<String>>, parent: Arc<Parent>) -> Harness {
        let (launch_tx, launches) = mpsc::unbounded_channel();
        let (ready_tx, ready_results) = mpsc::unbounded_channel();
        let (reload_tx, reloads) = mpsc::unbounded_channel();
        let (step_tx, steps) = mpsc::unbounded_channel();

        let factory = Factory::new(ScriptedSource {
            script,
            launches: launch_tx,
            ready_results: ready_tx,
            reloads: reload_tx,
            steps: step_tx,
        });

        let handler = StaticSourceHandler::new(
            Arc::new(conf),
            matches,
            &SourceOptions::default(),
            &factory,
            parent,
        )
        .unwrap();

        Harness {
            launches,
            ready_results,
            reloads,
            steps,
            handler,
        }
    }

    fn rtsp_conf() -> PathConf {
        PathConf::default().source("rtsp://cam.local:554/live")
    }

    #[tokio::test]
    async fn test_publisher_conf_is_not_static() {
        let factory = Factory::new(idle_source(Script::Wait));
        let res = StaticSourceHandler::new(
            Arc::new(PathConf::default()),
            None,
            &SourceOptions::default(),
            &factory,
            Parent::new(Verdict::Accept),
        );
        assert!(matches!(res, Err(SourceError::NotStatic(_))));
        assert!(factory.options.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_options_reach_factory() {
        let factory = Factory::new(idle_source(Script::Wait));
        let options = SourceOptions {
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(4),
            write_queue_size: 64,
        };

        StaticSourceHandler::new(
            Arc::new(rtsp_conf()),
            None,
            &options,
            &factory,
            Parent::new(Verdict::Accept),
        )
        .unwrap();

        assert_eq!(*factory.options.lock().unwrap(), vec![options]);
    }

    #[tokio::test]
    async fn test_start_resolves_template() {
        let conf = PathConf::default()
            .source("rtsp://$G1:8554/$MTX_QUERY")
            .source_on_demand(true)
            .credentials("admin", "secret");
        let mut h = harness(
            Script::Wait,
            conf,
            Some(vec!["cam-7".into(), "7".into()]),
            Parent::new(Verdict::Accept),
        );

        let running = h.handler.start(true, "token=abc");
        let (_, resolved) = h.launches.recv().await.unwrap();
        assert_eq!(resolved, "rtsp://admin:secret@7:8554/token=abc");
        assert_eq!(running.phase(), SourcePhase::Running);
        assert_eq!(running.describe().kind, "rtspSource");

        running.stop("test done").await;
    }

    #[tokio::test]
    async fn test_ready_is_forwarded_and_accepted() {
        let parent = Parent::new(Verdict::Accept);
        let mut h = harness(Script::ReadyThenWait, rtsp_conf(), None, parent.clone());

        let running = h.handler.start(false, "");
        assert_eq!(h.ready_results.recv().await.unwrap(), Ok(()));
        assert_eq!(parent.events(), vec!["ready"]);
        assert_eq!(running.stats().snapshot().ready_transitions, 1);

        running.stop("test done").await;
    }

    #[tokio::test]
    async fn test_logs_go_through_parent_with_kind() {
        let parent = Parent::new(Verdict::Accept);
        let mut h = harness(Script::ReadyThenWait, rtsp_conf(), None, parent.clone());

        let running = h.handler.start(false, "");
        assert_eq!(h.ready_results.recv().await.unwrap(), Ok(()));
        running.stop("closing").await;

        assert_eq!(
            parent.logs(),
            vec![
                (LogLevel::Info, "[rtspSource] started".to_string()),
                (LogLevel::Info, "[rtspSource] ready: 1 track (H264)".to_string()),
                (LogLevel::Info, "[rtspSource] stopped: closing".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_logged_through_parent() {
        let parent = Parent::new(Verdict::Accept);
        let mut h = harness(Script::Fail, rtsp_conf(), None, parent.clone());

        let mut running = h.handler.start(false, "");
        h.launches.recv().await.unwrap();
        running.wait_phase(SourcePhase::RetryPending).await;

        assert!(parent
            .logs()
            .contains(&(LogLevel::Error, "[rtspSource] connection refused".to_string())));

        running.stop("test done").await;
    }

    #[tokio::test]
    async fn test_not_ready_follows_ready() {
        let parent = Parent::new(Verdict::Accept);
        let mut h = harness(Script::ReadyThenNotReady, rtsp_conf(), None, parent.clone());

        let running = h.handler.start(false, "");
        assert_eq!(h.ready_results.recv().await.unwrap(), Ok(()));
        assert_eq!(h.steps.recv().await.unwrap(), "not_ready_returned");

        assert_eq!(parent.events(), vec!["ready", "not_ready"]);
        let snap = running.stats().snapshot();
        assert_eq!(snap.ready_transitions, 1);
        assert_eq!(snap.not_ready_transitions, 1);
        assert!(parent
            .logs()
            .contains(&(LogLevel::Info, "[rtspSource] not ready".to_string())));

        running.stop("test done").await;
    }

    #[tokio::test]
    async fn test_stop_releases_pending_not_ready() {
        let parent = Parent::new(Verdict::StallNotReady);
        let mut h = harness(Script::ReadyThenNotReady, rtsp_conf(), None, parent.clone());

        let running = h.handler.start(false, "");
        assert_eq!(h.ready_results.recv().await.unwrap(), Ok(()));

        // wait until the parent holds the notification
        while parent.events().len() < 2 {
            tokio::task::yield_now().await;
        }
        assert!(h.steps.try_recv().is_err());

        running.stop("closing").await;
        assert_eq!(h.steps.recv().await.unwrap(), "not_ready_returned");
        assert!(!parent
            .logs()
            .iter()
            .any(|(_, line)| line.ends_with("not ready")));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_abandoned_ready_is_not_delivered() {
        let parent = Parent::new(Verdict::Accept);
        let mut h = harness(Script::AbandonReady, rtsp_conf(), None, parent.clone());

        let mut running = h.handler.start(false, "");
        h.launches.recv().await.unwrap();
        running.wait_phase(SourcePhase::RetryPending).await;

        assert!(parent.events().is_empty());
        assert_eq!(running.stats().snapshot().ready_transitions, 0);
        assert_eq!(running.stats().snapshot().last_error.as_deref(), Some("gave up"));

        running.stop("test done").await;
        assert!(parent.events().is_empty());
    }

    #[tokio::test]
    async fn test_ready_rejection_reaches_source() {
        let mut h = harness(
            Script::ReadyThenWait,
            rtsp_conf(),
            None,
            Parent::new(Verdict::Reject),
        );

        let running = h.handler.start(false, "");
        assert_eq!(
            h.ready_results.recv().await.unwrap(),
            Err(SourceError::Rejected("path is closing".into()))
        );

        running.stop("test done").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_fixed_pause() {
        let mut h = harness(Script::Fail, rtsp_conf(), None, Parent::new(Verdict::Accept));

        let mut running = h.handler.start(false, "");

        let (first, _) = h.launches.recv().await.unwrap();
        running.wait_phase(SourcePhase::RetryPending).await;

        let (second, _) = h.launches.recv().await.unwrap();
        let (third, _) = h.launches.recv().await.unwrap();

        let gap = second - first;
        assert!(gap >= RETRY_PAUSE, "relaunched too early: {:?}", gap);
        assert!(gap < RETRY_PAUSE + Duration::from_millis(100), "relaunched too late: {:?}", gap);
        assert!(third - second >= RETRY_PAUSE);

        let snap = running.stats().snapshot();
        assert!(snap.runs >= 3);
        assert!(snap.failures >= 2);
        assert_eq!(snap.last_error.as_deref(), Some("connection refused"));

        running.stop("test done").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retry_pause() {
        let mut h = harness(Script::Fail, rtsp_conf(), None, Parent::new(Verdict::Accept));
        let handler = h.handler.retry_pause(Duration::from_millis(200));

        let running = handler.start(false, "");
        let (first, _) = h.launches.recv().await.unwrap();
        let (second, _) = h.launches.recv().await.unwrap();
        assert!(second - first >= Duration::from_millis(200));
        assert!(second - first < RETRY_PAUSE);

        running.stop("test done").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_source_is_retried() {
        let mut h = harness(Script::Panic, rtsp_conf(), None, Parent::new(Verdict::Accept));

        let running = h.handler.start(false, "");
        h.launches.recv().await.unwrap();
        h.launches.recv().await.unwrap();

        let snap = running.stats().snapshot();
        assert_eq!(
            snap.last_error.as_deref(),
            Some("source panicked: decoder exploded")
        );

        running.stop("test done").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolvable_source_retries() {
        let conf = PathConf::default()
            .source("rtsp://$G1/live")
            .source_on_demand(true);
        // capture group that breaks the URL
        let mut h = harness(
            Script::Wait,
            conf,
            Some(vec!["x".into(), "bad host/../ /".into()]),
            Parent::new(Verdict::Accept),
        );

        let mut running = h.handler.start(true, "");
        running.wait_phase(SourcePhase::RetryPending).await;
        assert!(h.launches.try_recv().is_err());

        tokio::time::sleep(RETRY_PAUSE * 2 + Duration::from_millis(10)).await;
        assert!(running.stats().snapshot().failures >= 2);

        running.stop("test done").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_during_retry_is_dropped() {
        let mut h = harness(Script::Fail, rtsp_conf(), None, Parent::new(Verdict::Accept));

        let mut running = h.handler.start(false, "");
        let (first, _) = h.launches.recv().await.unwrap();
        running.wait_phase(SourcePhase::RetryPending).await;

        running.reload_conf(Arc::new(rtsp_conf().max_readers(9)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // nothing relaunched early
        assert!(h.launches.try_recv().is_err());
        assert!(h.reloads.try_recv().is_err());

        let (second, _) = h.launches.recv().await.unwrap();
        assert!(second - first >= RETRY_PAUSE);

        let handler = running.stop("test done").await;
        assert_eq!(handler.conf().max_readers, 9);
    }

    #[tokio::test]
    async fn test_reload_forwarded_to_live_execution() {
        let mut h = harness(Script::Wait, rtsp_conf(), None, Parent::new(Verdict::Accept));

        let mut running = h.handler.start(false, "");
        h.launches.recv().await.unwrap();

        running.reload_conf(Arc::new(rtsp_conf().max_readers(4)));
        let delivered = h.reloads.recv().await.unwrap();
        assert_eq!(delivered.max_readers, 4);
        assert_eq!(running.conf().max_readers, 4);

        running.stop("test done").await;
    }

    #[tokio::test]
    async fn test_stop_answers_pending_handshake() {
        let parent = Parent::new(Verdict::Stall);
        let mut h = harness(Script::ReadyThenWait, rtsp_conf(), None, parent.clone());

        let running = h.handler.start(false, "");
        h.launches.recv().await.unwrap();

        // wait until the parent holds the request
        while parent.events().is_empty() {
            tokio::task::yield_now().await;
        }

        let handler = running.stop("closing").await;
        assert_eq!(
            h.ready_results.recv().await.unwrap(),
            Err(SourceError::Terminated)
        );

        // restartable after stop
        let running = handler.start(false, "");
        h.launches.recv().await.unwrap();
        running.stop("closing again").await;
    }

    #[tokio::test]
    async fn test_no_events_after_stop() {
        let parent = Parent::new(Verdict::Accept);
        let mut h = harness(Script::Wait, rtsp_conf(), None, parent.clone());

        let running = h.handler.start(false, "");
        h.launches.recv().await.unwrap();
        let mut phase = running.phase.clone();

        running.stop("closing").await;
        assert_eq!(*phase.borrow_and_update(), SourcePhase::Stopped);
        assert!(parent.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_then_fail_keeps_order() {
        let parent = Parent::new(Verdict::Accept);
        let mut h = harness(Script::ReadyThenFail, rtsp_conf(), None, parent.clone());

        let running = h.handler.start(false, "");
        assert_eq!(h.ready_results.recv().await.unwrap(), Ok(()));
        assert_eq!(h.ready_results.recv().await.unwrap(), Ok(()));
        assert_eq!(parent.events(), vec!["ready", "ready"]);

        running.stop("test done").await;
    }
}
