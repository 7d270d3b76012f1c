//! The cooperative poll loop.

use core::time::Duration;

use embedded_hal::blocking::delay::DelayMs;

/// How often and for how long [`drive`] polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollBudget {
    pub quantum_ms: u32,
    pub iterations: u32,
}

impl PollBudget {
    /// Budget for waiting `timeout` in steps of `quantum`.
    ///
    /// The iteration count is rounded up, and both the quantum and the count
    /// are at least 1, so the loop always sleeps and always ends.
    pub const fn new(timeout: Duration, quantum: Duration) -> Self {
        let quantum_ms = clamp_ms(quantum);
        let quantum_ms = if quantum_ms == 0 { 1 } else { quantum_ms };
        let iterations = clamp_ms(timeout).div_ceil(quantum_ms);
        let iterations = if iterations == 0 { 1 } else { iterations };
        Self {
            quantum_ms,
            iterations,
        }
    }

    /// The longest time [`drive`] can sleep with this budget.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.quantum_ms as u64 * self.iterations as u64)
    }
}

const fn clamp_ms(duration: Duration) -> u32 {
    let ms = duration.as_millis();
    if ms > u32::MAX as u128 {
        u32::MAX
    } else {
        ms as u32
    }
}

/// A state machine whose transitions happen in transport callbacks.
pub trait Completion {
    type Output;
    type Error;

    /// `WouldBlock` while the machine is still waiting for events.
    fn poll(&self) -> nb::Result<Self::Output, Self::Error>;
}

/// Drives `machine` until it completes or `budget` is used up.
///
/// `dispatch` must run the transport's event dispatch with `machine` as the
/// handler. A `WouldBlock` result means the budget ran out; what that means
/// (and how to clean up) is the caller's business.
pub fn drive<M, D, F>(
    machine: &mut M,
    budget: PollBudget,
    delay: &mut D,
    mut dispatch: F,
) -> nb::Result<M::Output, M::Error>
where
    M: Completion,
    D: DelayMs<u32>,
    F: FnMut(&mut M),
{
    for iteration in 0..budget.iterations {
        dispatch(machine);
        match machine.poll() {
            Err(nb::Error::WouldBlock) => {}
            done => {
                trace!("poll loop finished after {=u32} iterations", iteration + 1);
                return done;
            }
        }
        delay.delay_ms(budget.quantum_ms);
    }
    Err(nb::Error::WouldBlock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_from_durations() {
        let budget = PollBudget::new(Duration::from_secs(5), Duration::from_millis(100));
        assert_eq!(budget.iterations, 50);
        assert_eq!(budget.quantum_ms, 100);
        assert_eq!(budget.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn budget_rounds_up() {
        let budget = PollBudget::new(Duration::from_millis(250), Duration::from_millis(100));
        assert_eq!(budget.iterations, 3);
    }

    #[test]
    fn budget_is_never_empty() {
        let budget = PollBudget::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(budget.iterations, 1);
        assert_eq!(budget.quantum_ms, 1);
    }

    struct Countdown(u32);

    impl Completion for Countdown {
        type Output = ();
        type Error = ();

        fn poll(&self) -> nb::Result<(), ()> {
            if self.0 == 0 {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        }
    }

    struct Sleeps(u32);

    impl DelayMs<u32> for Sleeps {
        fn delay_ms(&mut self, _ms: u32) {
            self.0 += 1;
        }
    }

    #[test]
    fn stops_when_complete() {
        let mut machine = Countdown(3);
        let mut sleeps = Sleeps(0);
        let budget = PollBudget::new(Duration::from_secs(1), Duration::from_millis(100));
        let result = drive(&mut machine, budget, &mut sleeps, |m| m.0 -= 1);
        assert_eq!(result, Ok(()));
        assert_eq!(sleeps.0, 2);
    }

    #[test]
    fn gives_up_after_budget() {
        let mut machine = Countdown(u32::MAX);
        let mut sleeps = Sleeps(0);
        let budget = PollBudget::new(Duration::from_secs(1), Duration::from_millis(100));
        let result = drive(&mut machine, budget, &mut sleeps, |_| {});
        assert_eq!(result, Err(nb::Error::WouldBlock));
        assert_eq!(sleeps.0, 10);
    }
}
