use std::time::Instant;

// Leaky bucket: credits accrue continuously at `credits_per_second` up to
// `max_balance`. The bucket starts full.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    credits_per_second: f64,
    balance: f64,
    max_balance: f64,
    last_tick: Instant,
}

impl RateLimiter {
    pub(crate) fn new(credits_per_second: f64, max_balance: f64) -> RateLimiter {
        RateLimiter {
            credits_per_second,
            balance: max_balance,
            max_balance,
            last_tick: Instant::now(),
        }
    }

    pub(crate) fn check_credit(&mut self, item_cost: f64) -> bool {
        self.check_credit_at(item_cost, Instant::now)
    }

    fn check_credit_at<F>(&mut self, item_cost: f64, now: F) -> bool
    where
        F: Fn() -> Instant,
    {
        let current_time = now();
        let elapsed = current_time.saturating_duration_since(self.last_tick);
        if current_time > self.last_tick {
            self.last_tick = current_time;
        }
        self.balance = f64::min(
            self.balance + elapsed.as_secs_f64() * self.credits_per_second,
            self.max_balance,
        );
        if self.balance >= item_cost {
            self.balance -= item_cost;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RateLimiter;
    use std::ops::Add;
    use std::time::{Duration, Instant};

    #[test]
    fn test_rate_limiter() {
        // maximum balance 2, add 1 credit every 10 seconds
        let mut limiter = RateLimiter::new(0.1, 2.0);
        let current_time = Instant::now();
        limiter.last_tick = current_time;

        let test_cases = vec![
            (0, vec![true, true, false]),
            (1, vec![false]),
            (5, vec![false]),
            (10, vec![true, false]),
            (60, vec![true, true, false]), // maximum balance is 2
        ];

        for (elapsed_sec, cases) in test_cases.into_iter() {
            for should_pass in cases {
                assert_eq!(
                    should_pass,
                    limiter.check_credit_at(1.0, || {
                        current_time.add(Duration::from_secs(elapsed_sec))
                    })
                )
            }
        }
    }

    #[test]
    fn immediate_credits_are_floor_of_balance() {
        let mut limiter = RateLimiter::new(1.0, 2.5);
        let now = Instant::now();
        limiter.last_tick = now;

        let granted = (0..10).filter(|_| limiter.check_credit_at(1.0, || now)).count();
        assert_eq!(granted, 2);

        // 0.5 left, 0.75s at 1 credit/s brings the balance to 1.25
        let later = now + Duration::from_millis(750);
        assert!(limiter.check_credit_at(1.0, || later));
        assert!(!limiter.check_credit_at(1.0, || later));
    }

    #[test]
    fn rewound_clock_does_not_add_credit() {
        let mut limiter = RateLimiter::new(1.0, 1.0);
        let now = Instant::now() + Duration::from_secs(10);
        limiter.last_tick = now;

        assert!(limiter.check_credit_at(1.0, || now));
        assert!(!limiter.check_credit_at(1.0, || now - Duration::from_secs(5)));
        assert!(limiter.check_credit_at(1.0, || now + Duration::from_secs(1)));
    }
}
