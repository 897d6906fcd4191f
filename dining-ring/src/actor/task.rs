//! Async driver of one actor.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, instrument};

use super::{Hand, Seat};
use crate::config::RingConfiguration;
use crate::control::RunController;
use crate::error::Cancelled;
use crate::timing::Jitter;

/// Nominal delays an actor draws from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timings {
    pub(crate) think: Duration,
    pub(crate) fumble: Duration,
    pub(crate) eat: Duration,
    pub(crate) poll: Duration,
}

impl From<&RingConfiguration> for Timings {
    fn from(config: &RingConfiguration) -> Self {
        Self {
            think: config.think_time,
            fumble: config.fumble_time,
            eat: config.eat_time,
            poll: config.negotiation_poll,
        }
    }
}

/// Runs one seat's lifecycle until shutdown.
pub(crate) struct ActorTask {
    seat: Seat,
    control: Arc<RunController>,
    timings: Timings,
    jitter: Jitter,
}

impl ActorTask {
    pub(crate) fn new(
        seat: Seat,
        control: Arc<RunController>,
        timings: Timings,
        jitter: Jitter,
    ) -> Self {
        Self {
            seat,
            control,
            timings,
            jitter,
        }
    }

    /// Drive the lifecycle. A reset sends the actor back to its initial
    /// assignment and parks it until the next run.
    #[instrument(skip(self), fields(actor = self.seat.id()))]
    pub(crate) async fn run(mut self) {
        loop {
            let cancelled = match self.cycle().await {
                Ok(never) => match never {},
                Err(cancelled) => cancelled,
            };
            match cancelled {
                Cancelled::Reset => {
                    debug!("reset observed");
                    let seat = &self.seat;
                    let parked = self
                        .control
                        .park(|generation| {
                            seat.restore();
                            seat.cell().acknowledge(generation);
                        })
                        .await;
                    if parked.is_err() {
                        break;
                    }
                }
                Cancelled::Shutdown => break,
            }
        }
        debug!("actor stopped");
    }

    async fn cycle(&mut self) -> Result<Infallible, Cancelled> {
        self.control.gate().await?;
        loop {
            self.seat.begin_thinking();
            self.rest(self.timings.think, true).await?;

            self.seat.begin_fumbling();
            self.rest(self.timings.fumble, true).await?;

            self.hunger().await?;

            self.rest(self.timings.eat, false).await?;
            self.seat.finish_eating();
        }
    }

    /// Negotiate until both resources are in hand, then start eating.
    async fn hunger(&mut self) -> Result<(), Cancelled> {
        self.seat.begin_hunger();
        loop {
            if self.seat.negotiate() && self.seat.begin_eating() {
                return Ok(());
            }
            let left = self.seat.resource(Hand::Left);
            let right = self.seat.resource(Hand::Right);
            tokio::select! {
                _ = left.notified(Hand::Left.side()) => {}
                _ = right.notified(Hand::Right.side()) => {}
                _ = time::sleep(self.timings.poll) => {}
                _ = self.control.interrupted() => {}
            }
            self.control.gate().await?;
        }
    }

    /// Interruptible delay around `nominal`.
    ///
    /// A pause freezes the remaining time; on resume the delay continues for
    /// half the planned duration. With `serve`, neighbor requests
    /// are answered as they arrive.
    async fn rest(&mut self, nominal: Duration, serve: bool) -> Result<(), Cancelled> {
        let planned = self.jitter.sample(nominal);
        let mut deadline = Instant::now() + planned;
        loop {
            if self.control.gate().await? {
                deadline = Instant::now() + planned / 2;
            }
            if serve {
                self.seat.serve_requests();
            }
            let left = self.seat.resource(Hand::Left);
            let right = self.seat.resource(Hand::Right);
            tokio::select! {
                _ = time::sleep_until(deadline) => return Ok(()),
                _ = self.control.interrupted() => {}
                _ = left.notified(Hand::Left.side()), if serve => {}
                _ = right.notified(Hand::Right.side()), if serve => {}
            }
        }
    }
}
