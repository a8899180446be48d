use std::future::Future;
use std::time::Duration;

use super::ProviderKind;
use crate::Result;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX_EXPONENT: u32 = 3;

/// Exponential backoff: base, 2x, 4x, then 8x for every further attempt
#[derive(Debug)]
pub(crate) struct Backoff {
    base: Duration,
    attempt: u32,
    max_retries: u32,
}

impl Backoff {
    pub(crate) fn new(max_retries: u32) -> Self {
        Self::with_base(BACKOFF_BASE, max_retries)
    }

    pub(crate) fn with_base(base: Duration, max_retries: u32) -> Self {
        Self {
            base,
            attempt: 0,
            max_retries,
        }
    }

    pub(crate) fn next(&mut self) -> Duration {
        self.attempt += 1;
        self.base * 2u32.pow((self.attempt - 1).min(BACKOFF_MAX_EXPONENT))
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_retries
    }
}

/// Run `attempt` until it succeeds, fails with a non-retryable error, or the backoff runs out
pub(crate) async fn with_retries<T, F, Fut>(provider: ProviderKind, mut backoff: Backoff, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && !backoff.is_exhausted() => {
                let delay = backoff.next();
                tracing::warn!(
                    "{} request failed ({}), retry {}/{} in {:?}",
                    provider.display_name(),
                    err,
                    backoff.attempt,
                    backoff.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::YtsError;
    use std::cell::Cell;

    fn unavailable() -> YtsError {
        YtsError::VendorRequestFailed {
            provider: "Ollama".to_string(),
            status: 503,
            body: "loading model".to_string(),
        }
    }

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = Backoff::new(6);
        let delays: Vec<u64> = (0..6).map(|_| backoff.next().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
        assert!(backoff.is_exhausted());
    }

    #[test]
    fn test_zero_retries_is_exhausted_immediately() {
        assert!(Backoff::new(0).is_exhausted());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Cell::new(0);
        let result = with_retries(
            ProviderKind::Ollama,
            Backoff::with_base(Duration::from_millis(1), 3),
            || {
                calls.set(calls.get() + 1);
                let call = calls.get();
                async move {
                    if call < 3 {
                        Err(unavailable())
                    } else {
                        Ok(call)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retries(
            ProviderKind::Claude,
            Backoff::with_base(Duration::from_millis(1), 2),
            || {
                calls.set(calls.get() + 1);
                async { Err(unavailable()) }
            },
        )
        .await;

        assert!(matches!(result, Err(YtsError::VendorRequestFailed { status: 503, .. })));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = tokio_test::block_on(with_retries(
            ProviderKind::OpenAi,
            Backoff::with_base(Duration::from_millis(1), 5),
            || {
                calls.set(calls.get() + 1);
                async {
                    Err(YtsError::VendorRequestFailed {
                        provider: "OpenAI".to_string(),
                        status: 401,
                        body: "invalid key".to_string(),
                    })
                }
            },
        ));

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
