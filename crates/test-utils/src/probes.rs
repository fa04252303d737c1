#![allow(dead_code)]

//! Probe operations for observing the scheduler from tests.
//!
//! A [`Probe`] is an `Int`-valued operation that records when it starts and
//! finishes into a shared [`ProbeLog`]. It can first meet other probes at a
//! [`Rendezvous`], then emit, fail, panic, sleep or block until cancelled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use imgdag::errors::OperationError;
use imgdag::exec::CancellationSignal;
use imgdag::{Inputs, Operation, Parameters, PortSpec, Value, ValueType};

const UNARY: &[PortSpec] = &[PortSpec::single(ValueType::Int)];
const BINARY: &[PortSpec] = &[
    PortSpec::new("left", ValueType::Int),
    PortSpec::new("right", ValueType::Int),
];

/// Upper bound for anything a probe blocks on.
const PROBE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Started(String),
    Finished(String),
    Cancelled(String),
    Failed(String),
}

/// Shared, ordered record of probe activity.
#[derive(Debug, Clone, Default)]
pub struct ProbeLog {
    events: Arc<Mutex<Vec<ProbeEvent>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ProbeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProbeEvent::Started(tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProbeEvent::Finished(tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    pub fn was_started(&self, tag: &str) -> bool {
        self.position(&ProbeEvent::Started(tag.to_string())).is_some()
    }

    /// Index of `event` in the log.
    pub fn position(&self, event: &ProbeEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    /// Highest number of probes observed inside `compute` at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn push(&self, event: ProbeEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn enter(&self, tag: &str) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.push(ProbeEvent::Started(tag.to_string()));
    }

    fn leave(&self, event: ProbeEvent) {
        self.push(event);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Barrier that gives up after a timeout instead of hanging a test.
#[derive(Debug)]
pub struct Rendezvous {
    expected: usize,
    arrived: Mutex<usize>,
    all_here: Condvar,
}

impl Rendezvous {
    pub fn new(expected: usize) -> Arc<Self> {
        Arc::new(Self {
            expected,
            arrived: Mutex::new(0),
            all_here: Condvar::new(),
        })
    }

    /// `true` if all parties arrived within `timeout`.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        if *arrived >= self.expected {
            self.all_here.notify_all();
            return true;
        }
        let (guard, result) = self
            .all_here
            .wait_timeout_while(arrived, timeout, |n| *n < self.expected)
            .unwrap();
        drop(guard);
        !result.timed_out()
    }
}

#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Emit the probe's value (sources) or combine inputs as decimal
    /// digits in port order, plus the value.
    Emit,
    Fail(String),
    Panic,
    /// Sleep, checking the signal every few milliseconds.
    Delay(Duration),
    /// Block until the pass signal is raised, then report cancellation.
    WaitForCancel,
}

#[derive(Debug, Clone)]
pub struct Probe {
    tag: String,
    ports: &'static [PortSpec],
    value: i64,
    meet: Option<Arc<Rendezvous>>,
    behaviour: Behaviour,
    log: ProbeLog,
}

impl Probe {
    pub fn source(log: &ProbeLog, tag: &str, value: i64) -> Self {
        Self::with_ports(log, tag, &[], value)
    }

    /// Single input on port `in`.
    pub fn unary(log: &ProbeLog, tag: &str) -> Self {
        Self::with_ports(log, tag, UNARY, 0)
    }

    /// Inputs on ports `left` and `right`.
    pub fn binary(log: &ProbeLog, tag: &str) -> Self {
        Self::with_ports(log, tag, BINARY, 0)
    }

    pub fn with_ports(log: &ProbeLog, tag: &str, ports: &'static [PortSpec], value: i64) -> Self {
        Self {
            tag: tag.to_string(),
            ports,
            value,
            meet: None,
            behaviour: Behaviour::Emit,
            log: log.clone(),
        }
    }

    pub fn behaviour(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    pub fn failing(self, message: &str) -> Self {
        self.behaviour(Behaviour::Fail(message.to_string()))
    }

    pub fn delayed(self, delay: Duration) -> Self {
        self.behaviour(Behaviour::Delay(delay))
    }

    pub fn waiting_for_cancel(self) -> Self {
        self.behaviour(Behaviour::WaitForCancel)
    }

    pub fn panicking(self) -> Self {
        self.behaviour(Behaviour::Panic)
    }

    /// Meet the other parties before doing anything else.
    pub fn meeting(mut self, rendezvous: &Arc<Rendezvous>) -> Self {
        self.meet = Some(Arc::clone(rendezvous));
        self
    }

    fn emit(&self, inputs: &Inputs) -> Result<Value, OperationError> {
        let mut digits = 0;
        for i in 0..inputs.len() {
            digits = digits * 10 + inputs.get::<i64>(i)?;
        }
        Ok(Value::Int(digits + self.value))
    }

    fn run(&self, inputs: &Inputs, cancel: &CancellationSignal) -> Result<Value, OperationError> {
        if let Some(rv) = &self.meet {
            if !rv.wait(PROBE_DEADLINE) {
                return Err(OperationError::failed(format!(
                    "probe '{}' waited alone at the rendezvous",
                    self.tag
                )));
            }
        }

        match &self.behaviour {
            Behaviour::Emit => self.emit(inputs),
            Behaviour::Fail(message) => Err(OperationError::failed(message.clone())),
            Behaviour::Panic => panic!("probe '{}' panicked", self.tag),
            Behaviour::Delay(delay) => {
                let until = Instant::now() + *delay;
                while Instant::now() < until {
                    cancel.check()?;
                    std::thread::sleep(Duration::from_millis(2));
                }
                self.emit(inputs)
            }
            Behaviour::WaitForCancel => {
                let until = Instant::now() + PROBE_DEADLINE;
                while Instant::now() < until {
                    if cancel.is_cancelled() {
                        return Err(OperationError::Cancelled);
                    }
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(OperationError::failed(format!(
                    "probe '{}' was never cancelled",
                    self.tag
                )))
            }
        }
    }
}

impl Operation for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    fn inputs(&self) -> &[PortSpec] {
        self.ports
    }

    fn output(&self) -> ValueType {
        ValueType::Int
    }

    fn compute(
        &self,
        inputs: &Inputs,
        _params: &Parameters,
        cancel: &CancellationSignal,
    ) -> Result<Value, OperationError> {
        self.log.enter(&self.tag);
        let result = self.run(inputs, cancel);
        let event = match &result {
            Ok(_) => ProbeEvent::Finished(self.tag.clone()),
            Err(OperationError::Cancelled) => ProbeEvent::Cancelled(self.tag.clone()),
            Err(_) => ProbeEvent::Failed(self.tag.clone()),
        };
        self.log.leave(event);
        result
    }
}
