//! The tick loop.
//!
//! Paces [`MainCycle::tick`] on a tokio interval, publishes the status
//! snapshot after every tick and stops when the shutdown future resolves.

use std::future::Future;
use std::time::{Duration, Instant};

use roomwatch_core::{
    AgentStatus, Delay, Indicator, MainCycle, NetworkPort, PresenceSensor, SessionPort,
    TemperatureSensor, TickReport, TimeSource,
};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Something that can be ticked and reports a status snapshot.
pub trait Ticker {
    /// Run one iteration.
    fn tick(&mut self, now: Instant) -> impl Future<Output = TickReport>;

    /// Snapshot after the last iteration.
    fn status(&self) -> &AgentStatus;
}

impl<N, T, S, D, TS, PS, I> Ticker for MainCycle<N, T, S, D, TS, PS, I>
where
    N: NetworkPort,
    T: TimeSource,
    S: SessionPort,
    D: Delay,
    TS: TemperatureSensor,
    PS: PresenceSensor,
    I: Indicator,
{
    fn tick(&mut self, now: Instant) -> impl Future<Output = TickReport> {
        Self::tick(self, now)
    }

    fn status(&self) -> &AgentStatus {
        Self::status(self)
    }
}

/// Tick until `shutdown` resolves. Returns the number of completed ticks.
///
/// A tick blocked in the connect sequence is abandoned on shutdown.
pub async fn run<A, F>(
    agent: &mut A,
    tick_interval: Duration,
    status: &watch::Sender<AgentStatus>,
    shutdown: F,
) -> u64
where
    A: Ticker,
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(tick_ms = tick_interval.as_millis(), "agent loop started");
    let mut ticks = 0_u64;
    loop {
        let now = tokio::select! {
            biased;
            () = &mut shutdown => break,
            instant = interval.tick() => instant.into_std(),
        };

        let report = tokio::select! {
            biased;
            () = &mut shutdown => {
                warn!("shutdown during tick");
                break;
            }
            report = agent.tick(now) => report,
        };

        ticks += 1;
        if let Some(verdict) = report.verdict {
            debug!(verdict, published = report.published, state = %report.state, "window closed");
        }
        status.send_replace(agent.status().clone());
    }

    info!(ticks, "agent loop stopped");
    ticks
}
