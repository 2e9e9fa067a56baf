//! Transaction submission queue
//!
//! All chains are driven by one signing identity, and its transactions must
//! not race on nonce ordering. Every state-changing binding call takes a
//! [`SubmissionPermit`], and a permit can only be obtained by waiting in the
//! identity's [`SubmissionQueue`]. Holding a permit across several calls
//! keeps a multi-step pipeline (approve then send) free of interleaving.

use alloy::primitives::Address;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// One queue per signing identity; clones share the same queue
#[derive(Debug, Clone)]
pub struct SubmissionQueue {
    signer: Address,
    slot: Arc<Mutex<()>>,
}

impl SubmissionQueue {
    pub fn new(signer: Address) -> Self {
        Self {
            signer,
            slot: Arc::new(Mutex::new(())),
        }
    }

    /// Address of the identity this queue serializes
    pub fn signer(&self) -> Address {
        self.signer
    }

    /// Wait for exclusive use of the signing identity
    pub async fn acquire(&self) -> SubmissionPermit {
        debug!(signer = %self.signer, "Waiting for submission slot");
        let guard = self.slot.clone().lock_owned().await;
        SubmissionPermit {
            signer: self.signer,
            _guard: guard,
        }
    }
}

/// Proof of exclusive submission rights; released on drop
#[derive(Debug)]
pub struct SubmissionPermit {
    signer: Address,
    _guard: OwnedMutexGuard<()>,
}

impl SubmissionPermit {
    /// The `from` address of every transaction sent under this permit
    pub fn signer(&self) -> Address {
        self.signer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_second_caller_waits_for_release() {
        let queue = SubmissionQueue::new(Address::repeat_byte(0x01));
        let permit = queue.acquire().await;

        let waiting = tokio::time::timeout(Duration::from_millis(50), queue.acquire()).await;
        assert!(waiting.is_err(), "queue must not hand out a second permit");

        drop(permit);
        let permit = tokio::time::timeout(Duration::from_millis(50), queue.acquire())
            .await
            .expect("permit available after release");
        assert_eq!(permit.signer(), Address::repeat_byte(0x01));
    }

    #[test]
    fn test_waiter_is_woken_on_release() {
        let queue = SubmissionQueue::new(Address::repeat_byte(0x03));
        let held = tokio_test::block_on(queue.acquire());

        let mut next = tokio_test::task::spawn(queue.acquire());
        tokio_test::assert_pending!(next.poll());

        drop(held);
        assert!(next.is_woken());
        let permit = tokio_test::assert_ready!(next.poll());
        assert_eq!(permit.signer(), Address::repeat_byte(0x03));
    }

    #[tokio::test]
    async fn test_clones_share_the_slot() {
        let queue = SubmissionQueue::new(Address::repeat_byte(0x02));
        let other = queue.clone();
        let _permit = queue.acquire().await;
        assert!(other.slot.try_lock().is_err());
    }
}
