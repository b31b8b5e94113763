use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shared_config::SchedulingConfig;

use crate::error::{ErrorKind, ErrorNotice, SchedulingError};
use crate::models::{AvailabilityParams, TimeSlot};
use crate::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

/// Where a session's availability comes from.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    async fn fetch(&self, params: &AvailabilityParams) -> Result<Vec<TimeSlot>, SchedulingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    Idle,
    Debouncing,
    Requesting,
    Succeeded,
    Failed,
}

/// State visible to the booking form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityView {
    pub phase: FetchPhase,
    /// Parameters the slots or notice belong to.
    pub params: Option<AvailabilityParams>,
    pub slots: Vec<TimeSlot>,
    pub notice: Option<ErrorNotice>,
}

impl Default for AvailabilityView {
    fn default() -> Self {
        Self {
            phase: FetchPhase::Idle,
            params: None,
            slots: Vec::new(),
            notice: None,
        }
    }
}

#[derive(Debug)]
pub enum FetchEvent {
    ParamsChanged(AvailabilityParams),
    TimerFired { generation: u64 },
    ResponseReceived {
        request_id: u64,
        outcome: Result<Vec<TimeSlot>, SchedulingError>,
    },
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchEffect {
    StartTimer { generation: u64, delay: Duration },
    CancelTimer,
    FireRequest { request_id: u64, params: AvailabilityParams },
    AbortRequest { request_id: u64 },
}

#[derive(Debug)]
struct InFlightRequest {
    id: u64,
    params: AvailabilityParams,
}

/// Debounce, dedup, single-flight and breaker logic with no I/O.
///
/// Each event returns the effects the driver must carry out. A response is
/// applied only while its request id is the one in flight and no different
/// parameters are waiting out the debounce, so anything from an aborted or
/// superseded request is dropped here even if it still arrives.
#[derive(Debug)]
pub struct FetchMachine {
    debounce: Duration,
    breaker: CircuitBreaker,
    pending: Option<AvailabilityParams>,
    timer_generation: u64,
    next_request_id: u64,
    in_flight: Option<InFlightRequest>,
    last_signature: Option<String>,
    settled_phase: FetchPhase,
    open_notice: Option<ErrorKind>,
    view: AvailabilityView,
}

impl FetchMachine {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            debounce: config.debounce,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::from(config)),
            pending: None,
            timer_generation: 0,
            next_request_id: 0,
            in_flight: None,
            last_signature: None,
            settled_phase: FetchPhase::Idle,
            open_notice: None,
            view: AvailabilityView::default(),
        }
    }

    pub fn view(&self) -> &AvailabilityView {
        &self.view
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn handle(&mut self, event: FetchEvent, now: Instant) -> Vec<FetchEffect> {
        match event {
            FetchEvent::ParamsChanged(params) => self.on_params_changed(params),
            FetchEvent::TimerFired { generation } => self.on_timer_fired(generation, now),
            FetchEvent::ResponseReceived { request_id, outcome } => {
                self.on_response(request_id, outcome, now)
            }
            FetchEvent::Cancel => self.on_cancel(),
        }
    }

    fn on_params_changed(&mut self, params: AvailabilityParams) -> Vec<FetchEffect> {
        debug!("Availability parameters changed to {}", params.signature());

        self.pending = Some(params);
        self.timer_generation += 1;
        self.view.phase = FetchPhase::Debouncing;

        vec![FetchEffect::StartTimer {
            generation: self.timer_generation,
            delay: self.debounce,
        }]
    }

    fn on_timer_fired(&mut self, generation: u64, now: Instant) -> Vec<FetchEffect> {
        if generation != self.timer_generation {
            debug!("Ignoring superseded debounce timer {}", generation);
            return Vec::new();
        }
        let Some(params) = self.pending.take() else {
            return Vec::new();
        };

        let signature = params.signature();
        if self.last_signature.as_deref() == Some(signature.as_str()) {
            debug!("Skipping duplicate availability request {}", signature);
            self.view.phase = if self.in_flight.is_some() {
                FetchPhase::Requesting
            } else {
                self.settled_phase
            };
            return Vec::new();
        }

        let mut effects = Vec::new();
        if let Some(stale) = self.in_flight.take() {
            debug!("Cancelling superseded availability request {}", stale.id);
            effects.push(FetchEffect::AbortRequest { request_id: stale.id });
        }

        if !self.breaker.allow_request(now) {
            debug!("Circuit open, short-circuiting availability request {}", signature);
            self.last_signature = None;
            self.settle_failure(params, &SchedulingError::CircuitOpen);
            return effects;
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        debug!("Firing availability request {} for {}", request_id, signature);

        self.in_flight = Some(InFlightRequest {
            id: request_id,
            params: params.clone(),
        });
        self.last_signature = Some(signature);
        self.view.phase = FetchPhase::Requesting;

        effects.push(FetchEffect::FireRequest { request_id, params });
        effects
    }

    fn on_response(
        &mut self,
        request_id: u64,
        outcome: Result<Vec<TimeSlot>, SchedulingError>,
        now: Instant,
    ) -> Vec<FetchEffect> {
        let request = match self.in_flight.take() {
            Some(request) if request.id == request_id => request,
            other => {
                self.in_flight = other;
                debug!("Discarding response of superseded request {}", request_id);
                return Vec::new();
            }
        };

        // Only a result for the parameters still being debounced may land.
        if let Some(pending) = &self.pending {
            if pending.signature() != request.params.signature() {
                debug!("Discarding response of request {}, newer parameters are pending", request_id);
                self.last_signature = None;
                return Vec::new();
            }
        }

        match outcome {
            Ok(slots) => {
                debug!("Request {} returned {} slots", request_id, slots.len());
                self.breaker.record_success();
                self.open_notice = None;
                self.view = AvailabilityView {
                    phase: FetchPhase::Succeeded,
                    params: Some(request.params),
                    slots,
                    notice: None,
                };
                self.settled_phase = FetchPhase::Succeeded;
            }
            Err(error) => {
                match error.kind() {
                    ErrorKind::Transient => self.breaker.record_failure(now),
                    // The backend answered; only "nothing to book" was said.
                    ErrorKind::Unavailable => self.breaker.record_success(),
                    ErrorKind::Session | ErrorKind::Validation => {}
                }
                if error.kind() != ErrorKind::Unavailable {
                    self.last_signature = None;
                }
                self.settle_failure(request.params, &error);
            }
        }

        if self.pending.is_some() {
            self.view.phase = FetchPhase::Debouncing;
        }

        Vec::new()
    }

    fn on_cancel(&mut self) -> Vec<FetchEffect> {
        self.pending = None;
        self.timer_generation += 1;
        self.last_signature = None;
        self.view.phase = FetchPhase::Idle;

        let mut effects = vec![FetchEffect::CancelTimer];
        if let Some(request) = self.in_flight.take() {
            effects.push(FetchEffect::AbortRequest { request_id: request.id });
        }
        effects
    }

    fn settle_failure(&mut self, params: AvailabilityParams, error: &SchedulingError) {
        let kind = error.kind();
        let suppressed = self.breaker.is_open() && self.open_notice == Some(kind);
        self.open_notice = self.breaker.is_open().then_some(kind);

        if suppressed {
            debug!("Suppressing repeated {:?} notice: {}", kind, error);
        } else {
            warn!("Availability lookup failed ({:?}): {}", kind, error);
        }

        self.view = AvailabilityView {
            phase: FetchPhase::Failed,
            params: Some(params),
            slots: Vec::new(),
            notice: Some(ErrorNotice::new(error, suppressed)),
        };
        self.settled_phase = FetchPhase::Failed;
    }
}

type FetchResponse = (u64, Result<Vec<TimeSlot>, SchedulingError>);

struct DebounceTimer {
    generation: u64,
    sleep: Pin<Box<Sleep>>,
}

async fn wait_for_timer(timer: &mut Option<DebounceTimer>) -> u64 {
    match timer {
        Some(timer) => {
            timer.sleep.as_mut().await;
            timer.generation
        }
        None => pending().await,
    }
}

/// One availability session, owned by one booking form.
///
/// Parameter changes are fed in with [`update_params`](Self::update_params);
/// results are observed through [`subscribe`](Self::subscribe). Dropping the
/// controller cancels any pending timer and in-flight request.
pub struct AvailabilityController {
    commands: mpsc::UnboundedSender<AvailabilityParams>,
    state: watch::Receiver<AvailabilityView>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AvailabilityController {
    pub fn spawn(source: Arc<dyn AvailabilitySource>, config: &SchedulingConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(AvailabilityView::default());
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(run_session(
            FetchMachine::new(config),
            source,
            config.request_timeout,
            command_rx,
            state_tx,
            cancel_token.clone(),
        ));

        Self {
            commands,
            state,
            cancel_token,
            handle: Some(handle),
        }
    }

    /// Validation happens here, before anything is queued.
    pub fn update_params(&self, params: AvailabilityParams) -> Result<(), SchedulingError> {
        params.validate()?;

        self.commands
            .send(params)
            .map_err(|_| SchedulingError::Validation("Availability session has been closed".to_string()))
    }

    pub fn subscribe(&self) -> watch::Receiver<AvailabilityView> {
        self.state.clone()
    }

    pub fn current(&self) -> AvailabilityView {
        self.state.borrow().clone()
    }

    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Availability session task failed to join: {}", e);
            }
        }
    }
}

impl Drop for AvailabilityController {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run_session(
    mut machine: FetchMachine,
    source: Arc<dyn AvailabilitySource>,
    request_timeout: Duration,
    mut commands: mpsc::UnboundedReceiver<AvailabilityParams>,
    state_tx: watch::Sender<AvailabilityView>,
    cancel_token: CancellationToken,
) {
    let (response_tx, mut responses) = mpsc::unbounded_channel::<FetchResponse>();
    let mut timer: Option<DebounceTimer> = None;
    let mut in_flight: Option<(u64, JoinHandle<()>)> = None;

    info!("Availability session started");

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => FetchEvent::Cancel,
            command = commands.recv() => match command {
                Some(params) => FetchEvent::ParamsChanged(params),
                None => FetchEvent::Cancel,
            },
            generation = wait_for_timer(&mut timer) => FetchEvent::TimerFired { generation },
            Some((request_id, outcome)) = responses.recv() => {
                FetchEvent::ResponseReceived { request_id, outcome }
            }
        };

        let shutting_down = matches!(event, FetchEvent::Cancel);
        match &event {
            FetchEvent::TimerFired { .. } => timer = None,
            FetchEvent::ResponseReceived { request_id, .. } => {
                if in_flight.as_ref().is_some_and(|(id, _)| id == request_id) {
                    in_flight = None;
                }
            }
            _ => {}
        }

        for effect in machine.handle(event, Instant::now()) {
            match effect {
                FetchEffect::StartTimer { generation, delay } => {
                    timer = Some(DebounceTimer {
                        generation,
                        sleep: Box::pin(sleep(delay)),
                    });
                }
                FetchEffect::CancelTimer => timer = None,
                FetchEffect::FireRequest { request_id, params } => {
                    let source = Arc::clone(&source);
                    let response_tx = response_tx.clone();

                    let handle = tokio::spawn(async move {
                        let outcome = match timeout(request_timeout, source.fetch(&params)).await {
                            Ok(outcome) => outcome,
                            Err(_) => Err(SchedulingError::Timeout(request_timeout)),
                        };
                        // The session may already be gone.
                        let _ = response_tx.send((request_id, outcome));
                    });

                    in_flight = Some((request_id, handle));
                }
                FetchEffect::AbortRequest { request_id } => {
                    if let Some((id, handle)) = in_flight.take() {
                        if id == request_id {
                            handle.abort();
                        } else {
                            in_flight = Some((id, handle));
                        }
                    }
                }
            }
        }

        state_tx.send_if_modified(|view| {
            if view != machine.view() {
                *view = machine.view().clone();
                true
            } else {
                false
            }
        });

        if shutting_down {
            break;
        }
    }

    if let Some((_, handle)) = in_flight.take() {
        handle.abort();
    }

    info!("Availability session stopped");
}
