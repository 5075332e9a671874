//! Worker thread driving the reconnecting connection.

use std::{
    collections::VecDeque,
    fmt, io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::debug;

use super::{
    backoff::BackoffState,
    config::{ReconnectOptions, SocketConfig},
    drop_warner::{DropCause, DropWarner},
    events::{CLOSE_NORMAL, CloseEvent, ErrorEvent, ReadyState, SocketEvent, TIMEOUT_MESSAGE},
    shared::SocketShared,
    transport::{Channel, Incoming, Transport},
};

/// Commands processed by the worker thread.
#[derive(Debug)]
pub(crate) enum SocketCommand {
    Send(String),
    Close { code: u16, reason: String },
    Reconnect { code: u16, reason: String },
    Shutdown(Sender<()>),
}

/// Everything a worker needs, captured before the thread is spawned.
pub(crate) struct WorkerSeed {
    pub rx: Receiver<SocketCommand>,
    pub transport: Arc<dyn Transport>,
    pub url: String,
    pub options: ReconnectOptions,
    pub config: SocketConfig,
    pub shared: Arc<SocketShared>,
    pub warner: Arc<DropWarner>,
}

pub(crate) fn spawn_worker(seed: WorkerSeed) -> thread::JoinHandle<()> {
    thread::spawn(move || Worker::new(seed).run())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

struct Worker {
    rx: Receiver<SocketCommand>,
    transport: Arc<dyn Transport>,
    url: String,
    options: ReconnectOptions,
    config: SocketConfig,
    shared: Arc<SocketShared>,
    backoff: BackoffState,
    connection: Option<Box<dyn Channel>>,
    /// Set while open and not yet up for `min_uptime`.
    opened_at: Option<Instant>,
    should_reconnect: bool,
    interrupted: bool,
    queue: VecDeque<String>,
    warner: Arc<DropWarner>,
}

impl Worker {
    fn new(seed: WorkerSeed) -> Self {
        let backoff = BackoffState::new(&seed.options);
        let should_reconnect = !seed.options.start_closed;
        Self {
            rx: seed.rx,
            transport: seed.transport,
            url: seed.url,
            options: seed.options,
            config: seed.config,
            shared: seed.shared,
            backoff,
            connection: None,
            opened_at: None,
            should_reconnect,
            interrupted: false,
            queue: VecDeque::new(),
            warner: seed.warner,
        }
    }

    fn run(mut self) {
        while self.step() == Flow::Continue {}
        self.warner.flush();
        self.shared.set_ready_state(ReadyState::Closed);
    }

    fn step(&mut self) -> Flow {
        if self.connection.is_some() {
            return self.pump();
        }
        if self.should_reconnect {
            return self.attempt();
        }
        match self.rx.recv() {
            Ok(cmd) => self.handle(cmd),
            Err(_) => Flow::Shutdown,
        }
    }

    fn attempt(&mut self) -> Flow {
        let Some(delay) = self.backoff.next_attempt() else {
            self.debug(format_args!(
                "max retries reached {}",
                self.backoff.retry_count()
            ));
            self.should_reconnect = false;
            self.shared.set_ready_state(ReadyState::Closed);
            return Flow::Continue;
        };
        self.shared.set_retry_count(self.backoff.retry_count());
        self.shared.set_ready_state(ReadyState::Connecting);
        self.debug(format_args!(
            "connect {} in {:?}",
            self.backoff.retry_count(),
            delay
        ));

        self.interrupted = false;
        if self.wait(delay) == Flow::Shutdown {
            return Flow::Shutdown;
        }
        if self.interrupted {
            return Flow::Continue;
        }
        self.connect();
        Flow::Continue
    }

    /// Sleep for `delay` while still serving commands.
    fn wait(&mut self, delay: Duration) -> Flow {
        let deadline = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Flow::Continue;
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(cmd) => {
                    if self.handle(cmd) == Flow::Shutdown {
                        return Flow::Shutdown;
                    }
                    if self.interrupted {
                        return Flow::Continue;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Flow::Continue,
                Err(RecvTimeoutError::Disconnected) => return Flow::Shutdown,
            }
        }
    }

    fn connect(&mut self) {
        let retry_count = self.backoff.retry_count();
        match self
            .transport
            .connect(&self.url, self.options.connection_timeout)
        {
            Ok(channel) => {
                self.debug(format_args!("open {}", self.url));
                self.connection = Some(channel);
                self.opened_at = Some(Instant::now());
                self.shared.set_ready_state(ReadyState::Open);
                self.shared.emit(&SocketEvent::Open);
                self.flush_queue();
            }
            Err(err) => {
                let message = if err.kind() == io::ErrorKind::TimedOut {
                    TIMEOUT_MESSAGE.to_owned()
                } else {
                    err.to_string()
                };
                self.debug(format_args!("connect failed: {message}"));
                self.shared.emit(&SocketEvent::Error(ErrorEvent::new(
                    self.url.as_str(),
                    message,
                    retry_count,
                )));
            }
        }
    }

    fn pump(&mut self) -> Flow {
        if let Some(opened) = self.opened_at
            && opened.elapsed() >= self.options.min_uptime
        {
            self.debug(format_args!("accept open"));
            self.backoff.accept_open();
            self.shared.set_retry_count(0);
            self.opened_at = None;
        }

        let polled = match self.connection.as_mut() {
            Some(channel) => channel.poll(self.config.poll_interval),
            None => return Flow::Continue,
        };
        match polled {
            Ok(Some(Incoming::Text(text))) => self.shared.emit(&SocketEvent::Message(text)),
            Ok(Some(Incoming::Closed(event))) => self.remote_closed(event),
            Ok(None) => {}
            Err(err) => self.fail_connection(&err),
        }
        self.drain_commands()
    }

    fn drain_commands(&mut self) -> Flow {
        loop {
            match self.rx.try_recv() {
                Ok(cmd) => {
                    if self.handle(cmd) == Flow::Shutdown {
                        return Flow::Shutdown;
                    }
                }
                Err(TryRecvError::Empty) => return Flow::Continue,
                Err(TryRecvError::Disconnected) => return Flow::Shutdown,
            }
        }
    }

    fn handle(&mut self, cmd: SocketCommand) -> Flow {
        match cmd {
            SocketCommand::Send(text) => self.send(text),
            SocketCommand::Close { code, reason } => {
                self.should_reconnect = false;
                self.interrupted = true;
                self.close_connection(code, &reason);
                self.shared.set_ready_state(ReadyState::Closed);
            }
            SocketCommand::Reconnect { code, reason } => {
                self.should_reconnect = true;
                self.interrupted = true;
                self.backoff.reset();
                self.close_connection(code, &reason);
            }
            SocketCommand::Shutdown(ack) => {
                self.should_reconnect = false;
                self.close_connection(CLOSE_NORMAL, "");
                let _ = ack.send(());
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }

    fn send(&mut self, text: String) {
        let Some(channel) = self.connection.as_mut() else {
            self.enqueue(text);
            return;
        };
        if let Err(err) = channel.send_text(&text) {
            self.warner.record(DropCause::WriteFailed);
            self.fail_connection(&err);
        }
    }

    fn enqueue(&mut self, text: String) {
        if let Some(limit) = self.options.max_enqueued_messages
            && self.queue.len() >= limit
        {
            self.warner.record(DropCause::QueueFull);
            return;
        }
        self.queue.push_back(text);
    }

    fn flush_queue(&mut self) {
        while let Some(text) = self.queue.pop_front() {
            let Some(channel) = self.connection.as_mut() else {
                self.queue.push_front(text);
                return;
            };
            if let Err(err) = channel.send_text(&text) {
                self.warner.record(DropCause::WriteFailed);
                self.fail_connection(&err);
                return;
            }
        }
    }

    fn close_connection(&mut self, code: u16, reason: &str) {
        let Some(mut channel) = self.connection.take() else {
            self.debug(format_args!("close: no active connection"));
            return;
        };
        self.shared.set_ready_state(ReadyState::Closing);
        if let Err(err) = channel.close(code, reason) {
            self.debug(format_args!("close failed: {err}"));
        }
        self.opened_at = None;
        self.shared.set_ready_state(ReadyState::Closed);
        self.shared
            .emit(&SocketEvent::Close(CloseEvent::new(code, reason, true)));
    }

    fn remote_closed(&mut self, event: CloseEvent) {
        self.debug(format_args!("remote close {} {}", event.code, event.reason));
        self.connection = None;
        self.opened_at = None;
        self.shared.set_ready_state(ReadyState::Closed);
        self.shared.emit(&SocketEvent::Close(event));
    }

    fn fail_connection(&mut self, err: &io::Error) {
        self.debug(format_args!("connection failed: {err}"));
        self.connection = None;
        self.opened_at = None;
        self.shared.set_ready_state(ReadyState::Closed);
        self.shared.emit(&SocketEvent::Error(ErrorEvent::new(
            self.url.as_str(),
            err.to_string(),
            self.backoff.retry_count(),
        )));
        self.shared
            .emit(&SocketEvent::Close(CloseEvent::abnormal(err.to_string())));
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        if self.options.debug {
            debug!("ReconnectingSocket> {} {args}", self.url);
        }
    }
}
