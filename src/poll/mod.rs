//! Fixed-interval poll loop: fetch → ingest → buffer → encode → sink
//!
//! One tokio task per loop. Ticks never overlap: a slow fetch delays the next
//! tick and missed ticks are skipped. A failed tick is logged once, counted,
//! and leaves both the session buffer and the sink untouched.

pub mod session;
pub mod source;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Settings;
use crate::mapper::Mapper;
use crate::sensors::SensorReading;
use crate::sinks::{Frame, GridSpec, PresentationSink};
pub use session::{PollSession, WindowMode};
pub use source::{HttpSource, SensorSource};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollStats {
    pub ticks: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_tick_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    pub buffered: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    /// Drop buffered readings, e.g. when the view switches mode
    Reset,
    /// Redraw the buffer, e.g. after a resize
    Replay,
}

pub struct Poller<S, K> {
    source: S,
    sink: K,
    mapper: Mapper,
    grid: GridSpec,
    period: Duration,
    session: PollSession,
    stats: PollStats,
}

impl<S: SensorSource, K: PresentationSink + 'static> Poller<S, K> {
    pub fn new(source: S, sink: K, settings: &Settings) -> Self {
        Self {
            source,
            sink,
            mapper: settings.mapper.clone(),
            grid: settings.grid,
            period: settings.interval,
            session: PollSession::new(settings.window, settings.grid.capacity()),
            stats: PollStats::default(),
        }
    }

    #[cfg(test)]
    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    #[cfg(test)]
    pub fn session(&self) -> &PollSession {
        &self.session
    }

    /// Run one poll cycle; returns how many readings are buffered afterwards
    pub async fn tick(&mut self) -> anyhow::Result<usize> {
        self.stats.ticks += 1;

        let result = self.cycle().await;
        match &result {
            Ok(buffered) => {
                tracing::debug!(buffered, "Poll tick {} rendered", self.stats.ticks);
            }
            Err(e) => {
                self.stats.failures += 1;
                self.stats.last_tick_failed = true;
                self.stats.last_error = Some(format!("{:#}", e));
                tracing::warn!(source = %self.source.describe(), "Poll tick {} failed: {:#}", self.stats.ticks, e);
                self.sink.report(&self.stats);
            }
        }
        result
    }

    async fn cycle(&mut self) -> anyhow::Result<usize> {
        let items = self.source.fetch().await?;
        let keys: Vec<_> = self.mapper.ranges().keys().collect();

        let readings = match self.session.window() {
            WindowMode::Tail => {
                let skip = items.len().saturating_sub(self.grid.capacity());
                items[skip..]
                    .iter()
                    .map(|item| SensorReading::from_json(item, keys.iter().copied()))
                    .collect()
            }
            WindowMode::Newest => items
                .last()
                .map(|item| vec![SensorReading::from_json(item, keys.iter().copied())])
                .unwrap_or_default(),
        };

        // build before touching the session so a sink error cannot half-apply
        let mut next = self.session.clone();
        next.absorb(readings);
        let frame = Frame::build(&self.mapper, &self.grid, next.readings());

        // the sink sees this tick's status before it draws the frame
        let mut stats = self.stats.clone();
        stats.successes += 1;
        stats.last_tick_failed = false;
        stats.last_success = Some(Utc::now());
        stats.buffered = next.len();
        self.sink.report(&stats);
        self.sink.apply(&frame)?;

        self.stats = stats;
        self.session = next;
        Ok(self.session.len())
    }

    /// Clear the buffer and draw the empty grid
    pub fn reset(&mut self) {
        if self.session.is_empty() {
            tracing::debug!("Poll session already empty");
        } else {
            tracing::info!(dropped = self.session.len(), "Poll session reset");
        }
        self.session.reset();
        self.stats.buffered = 0;
        self.sink.report(&self.stats);
        self.replay();
    }

    /// Redraw whatever is buffered without fetching. The grid does not depend
    /// on the terminal size, so this is a plain repaint.
    pub fn replay(&mut self) {
        let frame = Frame::build(&self.mapper, &self.grid, self.session.readings());
        if let Err(e) = self.sink.apply(&frame) {
            tracing::warn!("Replay failed: {:#}", e);
        }
    }

    /// Move the loop onto its own task. The first tick fires immediately.
    pub fn spawn(self) -> PollHandle {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(self.run(rx));
        PollHandle {
            task,
            control: PollControl { tx },
        }
    }

    async fn run(mut self, mut control: mpsc::Receiver<Control>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            source = %self.source.describe(),
            "Polling every {}s",
            self.period.as_secs()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // failures are already logged and counted
                    let _ = self.tick().await;
                }
                Some(cmd) = control.recv() => match cmd {
                    Control::Reset => self.reset(),
                    Control::Replay => self.replay(),
                },
            }
        }
    }
}

/// Owns a running poll loop; dropping it stops the loop
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    control: PollControl,
}

impl PollHandle {
    pub fn control(&self) -> PollControl {
        self.control.clone()
    }

    /// Stop the loop and wait for the task to finish
    pub async fn cancel(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        tracing::info!("Poll loop stopped");
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Cloneable remote for a running poll loop
#[derive(Debug, Clone)]
pub struct PollControl {
    tx: mpsc::Sender<Control>,
}

impl PollControl {
    /// Returns false if the loop has stopped
    pub async fn reset(&self) -> bool {
        self.tx.send(Control::Reset).await.is_ok()
    }

    pub async fn replay(&self) -> bool {
        self.tx.send(Control::Replay).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::FetchError;
    use crate::sensors::SensorKey;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    /// Hands out canned responses in order, then empty arrays
    struct Scripted {
        responses: Mutex<VecDeque<Result<Vec<Value>, FetchError>>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Vec<Value>, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl SensorSource for Scripted {
        fn fetch(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send {
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()));
            async move { next }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[derive(Clone, Default)]
    struct Recording {
        frames: Arc<Mutex<Vec<Frame>>>,
        reports: Arc<Mutex<Vec<PollStats>>>,
    }

    impl PresentationSink for Recording {
        fn apply(&mut self, frame: &Frame) -> anyhow::Result<()> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn report(&mut self, stats: &PollStats) {
            self.reports.lock().unwrap().push(stats.clone());
        }
    }

    /// Counts WARN events seen while installed
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct Broken;

    impl PresentationSink for Broken {
        fn apply(&mut self, _frame: &Frame) -> anyhow::Result<()> {
            anyhow::bail!("display gone")
        }
    }

    fn settings(window: WindowMode) -> Settings {
        let mut config = Config::default();
        config.window = window;
        config.grid.rows = 2;
        config.grid.cols = 2;
        config.validate().unwrap()
    }

    fn co(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| json!({ "co": v })).collect()
    }

    #[tokio::test]
    async fn test_tail_tick_renders_newest() {
        let sink = Recording::default();
        let source = Scripted::new(vec![Ok(co(&[0.1, 0.2, 0.3, 0.4, 0.5]))]);
        let mut poller = Poller::new(source, sink.clone(), &settings(WindowMode::Tail));

        assert_eq!(poller.tick().await.unwrap(), 4);
        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].cells[0].sensors[0].value, 0.2);
        assert_eq!(frames[0].latest().map(|c| c.sensors[0].value), Some(0.5));
    }

    #[tokio::test]
    async fn test_malformed_response_keeps_previous_state() {
        let sink = Recording::default();
        let source = Scripted::new(vec![
            Ok(co(&[0.1, 0.2])),
            Err(FetchError::NotArray {
                kind: "object",
                preview: "{\"error\":1}".to_string(),
            }),
        ]);
        let mut poller = Poller::new(source, sink.clone(), &settings(WindowMode::Tail));

        poller.tick().await.unwrap();
        let err = poller.tick().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::NotArray { .. })
        ));

        assert_eq!(sink.frames.lock().unwrap().len(), 1);
        assert_eq!(poller.session().len(), 2);

        let stats = poller.stats();
        assert_eq!((stats.ticks, stats.successes, stats.failures), (2, 1, 1));
        assert!(stats.last_tick_failed);
        assert_eq!(stats.buffered, 2);
        assert_eq!(sink.reports.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_newest_window_appends_one_per_tick() {
        let sink = Recording::default();
        let source = Scripted::new(vec![
            Ok(co(&[0.1, 0.2])),
            Ok(co(&[0.3])),
            Ok(Vec::new()),
        ]);
        let mut poller = Poller::new(source, sink.clone(), &settings(WindowMode::Newest));

        assert_eq!(poller.tick().await.unwrap(), 1);
        assert_eq!(poller.tick().await.unwrap(), 2);
        assert_eq!(poller.tick().await.unwrap(), 2);

        let frames = sink.frames.lock().unwrap();
        let last = frames.last().unwrap();
        let values: Vec<f64> = last
            .cells
            .iter()
            .filter(|c| c.reading_index.is_some())
            .map(|c| c.sensors[0].value)
            .collect();
        assert_eq!(values, vec![0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_sink_failure_leaves_session_untouched() {
        let source = Scripted::new(vec![Ok(co(&[0.1]))]);
        let mut poller = Poller::new(source, Broken, &settings(WindowMode::Tail));
        assert!(poller.tick().await.is_err());
        assert!(poller.session().is_empty());
        assert_eq!(poller.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_reset_draws_empty_grid() {
        let sink = Recording::default();
        let source = Scripted::new(vec![Ok(co(&[0.9]))]);
        let mut poller = Poller::new(source, sink.clone(), &settings(WindowMode::Tail));
        poller.tick().await.unwrap();
        poller.reset();

        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].filled(), 0);
        assert_eq!(frames[1].cells[0].sensors[0].key, SensorKey::Co);
    }

    #[tokio::test]
    async fn test_spawned_loop_ticks_and_cancels() {
        let sink = Recording::default();
        let source = Scripted::new(vec![Ok(co(&[0.4]))]);
        let handle = Poller::new(source, sink.clone(), &settings(WindowMode::Tail)).spawn();
        let control = handle.control();

        // first tick is immediate
        for _ in 0..100 {
            if !sink.frames.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.frames.lock().unwrap()[0].filled(), 1);

        assert!(control.replay().await);
        for _ in 0..100 {
            if sink.frames.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.frames.lock().unwrap()[1].filled(), 1);

        handle.cancel().await;
        assert!(!control.reset().await);
    }

    #[tokio::test]
    async fn test_failed_tick_logs_one_warning() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let _guard = tracing_subscriber::registry()
            .with(WarnCounter(warnings.clone()))
            .set_default();

        let source = Scripted::new(vec![
            Err(FetchError::NotArray {
                kind: "object",
                preview: "{\"error\":1}".to_string(),
            }),
            Err(FetchError::NotJson {
                content_type: Some("text/html".to_string()),
                preview: "<html>maintenance</html>".to_string(),
            }),
            Ok(co(&[0.2])),
        ]);
        let mut poller = Poller::new(source, Recording::default(), &settings(WindowMode::Tail));

        assert!(poller.tick().await.is_err());
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
        assert!(poller.tick().await.is_err());
        assert_eq!(warnings.load(Ordering::SeqCst), 2);
        assert!(poller.tick().await.is_ok());
        assert_eq!(warnings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_silent_endpoint_fails_tick_and_loop_continues() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let source = HttpSource::new(format!("http://{}/sensor", addr), Duration::from_millis(300)).unwrap();
        let mut poller = Poller::new(source, Recording::default(), &settings(WindowMode::Tail));

        for _ in 0..2 {
            let tick = tokio::time::timeout(Duration::from_secs(5), poller.tick()).await;
            assert!(matches!(tick, Ok(Err(_))));
        }
        server.abort();

        let stats = poller.stats();
        assert_eq!((stats.ticks, stats.failures), (2, 2));
        assert!(stats.last_tick_failed);
    }

    /// Write target that stays readable after the sink takes it
    #[cfg(feature = "terminal")]
    #[derive(Clone, Default)]
    struct Screen(Arc<Mutex<Vec<u8>>>);

    #[cfg(feature = "terminal")]
    impl std::io::Write for Screen {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(feature = "terminal")]
    impl Screen {
        /// Everything drawn since the last clear
        fn last_draw(&self) -> String {
            let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            text.rsplit("\x1b[2J").next().unwrap_or_default().to_string()
        }

        fn draws(&self) -> usize {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .matches("\x1b[2J")
                .count()
        }
    }

    #[cfg(feature = "terminal")]
    #[tokio::test]
    async fn test_terminal_status_matches_drawn_tick() {
        use crate::sinks::terminal::TerminalSink;

        let screen = Screen::default();
        let source = Scripted::new(vec![Ok(co(&[0.1])), Err(FetchError::Status(503)), Ok(co(&[0.2]))]);
        let mut poller = Poller::new(source, TerminalSink::new(screen.clone()), &settings(WindowMode::Tail));

        poller.tick().await.unwrap();
        assert!(screen.last_draw().ends_with("poll #1: ok (0 failures)\n"));

        assert!(poller.tick().await.is_err());
        assert_eq!(screen.draws(), 1);

        poller.tick().await.unwrap();
        assert_eq!(screen.draws(), 2);
        assert!(screen.last_draw().ends_with("poll #3: ok (1 failures)\n"));
    }

    #[cfg(feature = "terminal")]
    #[tokio::test]
    async fn test_terminal_replay_repaints_last_screen() {
        use crate::sinks::terminal::TerminalSink;

        let screen = Screen::default();
        let source = Scripted::new(vec![Ok(co(&[0.1, 0.7]))]);
        let mut poller = Poller::new(source, TerminalSink::new(screen.clone()), &settings(WindowMode::Tail));

        poller.tick().await.unwrap();
        let first = screen.last_draw();
        poller.replay();

        assert_eq!(screen.draws(), 2);
        assert_eq!(screen.last_draw(), first);
    }
}
