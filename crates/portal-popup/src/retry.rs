//! Retry offer collaborator.
//!
//! When the popup fails to come up the coordinator closes and hands a
//! [`RetryOffer`] to the host's [`RetryPrompt`]. The host answers later
//! with `PopupCoordinator::answer_retry`; the prompt itself must not call
//! back into the coordinator.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::mpsc;
use tracing::debug;

/// Ticket for one retry offer. Only the most recent offer is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryOffer {
    pub(crate) seq: u64,
}

impl RetryOffer {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryChoice {
    /// Open the popup again.
    Reopen,
    /// Abandon the request; the host receives `Closed`.
    GiveUp,
}

pub trait RetryPrompt {
    /// Show the "open popup" prompt for `offer`.
    fn offer_retry(&mut self, offer: RetryOffer);
}

/// Prompt that only records offers. Useful for hosts that poll, and for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingPrompt {
    offers: Rc<RefCell<Vec<RetryOffer>>>,
}

impl RecordingPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offers(&self) -> Vec<RetryOffer> {
        self.offers.borrow().clone()
    }

    pub fn last(&self) -> Option<RetryOffer> {
        self.offers.borrow().last().copied()
    }

    pub fn count(&self) -> usize {
        self.offers.borrow().len()
    }
}

impl RetryPrompt for RecordingPrompt {
    fn offer_retry(&mut self, offer: RetryOffer) {
        self.offers.borrow_mut().push(offer);
    }
}

/// Prompt that forwards offers to an async host over a channel.
#[derive(Debug, Clone)]
pub struct ChannelPrompt {
    offers: mpsc::UnboundedSender<RetryOffer>,
}

impl ChannelPrompt {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RetryOffer>) {
        let (offers, rx) = mpsc::unbounded_channel();
        (Self { offers }, rx)
    }
}

impl RetryPrompt for ChannelPrompt {
    fn offer_retry(&mut self, offer: RetryOffer) {
        if self.offers.send(offer).is_err() {
            debug!(offer = offer.seq, "retry offer dropped, host stopped listening");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_prompt_shares_offers_between_clones() {
        let prompt = RecordingPrompt::new();
        let mut handle = prompt.clone();
        handle.offer_retry(RetryOffer { seq: 1 });
        handle.offer_retry(RetryOffer { seq: 2 });

        assert_eq!(prompt.count(), 2);
        assert_eq!(prompt.last().map(|o| o.seq()), Some(2));
    }

    #[test]
    fn channel_prompt_forwards_offers() {
        let (mut prompt, mut rx) = ChannelPrompt::new();
        prompt.offer_retry(RetryOffer { seq: 7 });
        assert_eq!(rx.try_recv().unwrap().seq(), 7);

        drop(rx);
        prompt.offer_retry(RetryOffer { seq: 8 });
    }
}
