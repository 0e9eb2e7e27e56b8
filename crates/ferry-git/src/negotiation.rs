//! Acknowledgement policy for the have/ack exchange.
//!
//! The negotiator is fed one decoded have batch at a time and returns the
//! server responses to send for it. It does no I/O.

use crate::capability::{Capability, CapabilityList};
use crate::haves::UploadHaves;
use crate::response::{Ack, AckStatus, ServerResponse};
use ferry_storage::ObjectId;
use std::collections::{HashMap, HashSet};

/// How the client asked to be acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// One plain `ACK` for the first common object, otherwise `NAK`.
    Single,
    /// `multi_ack`: every have acknowledged with `continue`.
    MultiAck,
    /// `multi_ack_detailed`: `common` for known objects, `ready` otherwise.
    MultiAckDetailed,
}

impl AckMode {
    /// Selects the mode from the client's capabilities. `multi_ack_detailed`
    /// wins when both multi-ack flavors are declared.
    pub fn from_capabilities(caps: &CapabilityList) -> Self {
        if caps.supports(Capability::MultiAckDetailed) {
            Self::MultiAckDetailed
        } else if caps.supports(Capability::MultiAck) {
            Self::MultiAck
        } else {
            Self::Single
        }
    }

    /// Returns true for both multi-ack flavors.
    pub fn is_multi(&self) -> bool {
        !matches!(self, Self::Single)
    }

    fn status(&self, known: bool) -> AckStatus {
        match self {
            Self::MultiAckDetailed if known => AckStatus::Common,
            Self::MultiAckDetailed => AckStatus::Ready,
            Self::MultiAck => AckStatus::Continue,
            Self::Single => AckStatus::Plain,
        }
    }
}

/// What one have batch produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Responses to write, in order.
    pub responses: Vec<ServerResponse>,
    /// Wants the batch's known haves are reachable from.
    pub common: HashSet<ObjectId>,
}

/// Negotiation state across have batches.
#[derive(Debug)]
pub struct Negotiator<'a> {
    mode: AckMode,
    index: &'a HashMap<ObjectId, Vec<ObjectId>>,
    haves: Vec<ObjectId>,
}

impl<'a> Negotiator<'a> {
    /// Creates a negotiator over an index mapping every object reachable
    /// from the wants to the wants it is reachable from.
    pub fn new(mode: AckMode, index: &'a HashMap<ObjectId, Vec<ObjectId>>) -> Self {
        Self {
            mode,
            index,
            haves: Vec::new(),
        }
    }

    /// The selected acknowledgement mode.
    pub fn mode(&self) -> AckMode {
        self.mode
    }

    /// All haves received so far.
    pub fn haves(&self) -> &[ObjectId] {
        &self.haves
    }

    /// Consumes the negotiator, returning the accumulated haves.
    pub fn into_haves(self) -> Vec<ObjectId> {
        self.haves
    }

    /// Classifies a batch and returns what to send for it.
    pub fn process(&mut self, batch: &UploadHaves) -> BatchOutcome {
        self.haves.extend_from_slice(&batch.haves);

        let mut outcome = BatchOutcome::default();
        let mut acks = Vec::new();
        let mut last = None;

        for have in &batch.haves {
            let refs = self.index.get(have);
            if let Some(refs) = refs {
                outcome.common.extend(refs.iter().copied());
            }
            let known = refs.is_some();

            if known || self.mode.is_multi() {
                let ack = Ack {
                    id: *have,
                    status: self.mode.status(known),
                };
                last = Some(ack);
                acks.push(ack);
                if !self.mode.is_multi() {
                    break;
                }
            }
        }

        if !self.haves.is_empty() {
            outcome.responses.push(ServerResponse { acks });
        }

        match last {
            _ if !batch.done => {
                if self.mode.is_multi() {
                    outcome.responses.push(ServerResponse::nak());
                }
            }
            Some(ack) if self.mode.is_multi() => {
                outcome.responses.push(ServerResponse {
                    acks: vec![Ack {
                        id: ack.id,
                        status: AckStatus::Plain,
                    }],
                });
            }
            Some(_) => {}
            None => outcome.responses.push(ServerResponse::nak()),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 20])
    }

    fn index(known: &[u8]) -> HashMap<ObjectId, Vec<ObjectId>> {
        known.iter().map(|b| (id(*b), vec![id(0xff)])).collect()
    }

    fn ack(byte: u8, status: AckStatus) -> Ack {
        Ack { id: id(byte), status }
    }

    fn batch(haves: &[u8], done: bool) -> UploadHaves {
        UploadHaves {
            haves: haves.iter().map(|b| id(*b)).collect(),
            done,
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(AckMode::from_capabilities(&CapabilityList::parse("side-band")), AckMode::Single);
        assert_eq!(AckMode::from_capabilities(&CapabilityList::parse("multi_ack")), AckMode::MultiAck);
        assert_eq!(
            AckMode::from_capabilities(&CapabilityList::parse("multi_ack multi_ack_detailed")),
            AckMode::MultiAckDetailed
        );
    }

    #[test]
    fn test_single_mode_acks_first_known_only() {
        let index = index(&[2, 3]);
        let mut negotiator = Negotiator::new(AckMode::Single, &index);

        let outcome = negotiator.process(&batch(&[1, 2, 3], true));
        assert_eq!(
            outcome.responses,
            vec![ServerResponse { acks: vec![ack(2, AckStatus::Plain)] }]
        );
        assert_eq!(outcome.common, [id(0xff)].into_iter().collect());
        assert_eq!(negotiator.into_haves(), vec![id(1), id(2), id(3)]);
    }

    #[test]
    fn test_single_mode_unknown_haves_then_done() {
        let index = index(&[]);
        let mut negotiator = Negotiator::new(AckMode::Single, &index);

        let first = negotiator.process(&batch(&[1], false));
        assert_eq!(first.responses, vec![ServerResponse::nak()]);

        let last = negotiator.process(&batch(&[], true));
        assert_eq!(last.responses, vec![ServerResponse::nak(), ServerResponse::nak()]);
    }

    #[test]
    fn test_clone_without_haves_gets_single_nak() {
        let index = index(&[]);
        for mode in [AckMode::Single, AckMode::MultiAck, AckMode::MultiAckDetailed] {
            let mut negotiator = Negotiator::new(mode, &index);
            let outcome = negotiator.process(&batch(&[], true));
            assert_eq!(outcome.responses, vec![ServerResponse::nak()]);
        }
    }

    #[test]
    fn test_multi_ack_continue_then_final_plain() {
        let index = index(&[1]);
        let mut negotiator = Negotiator::new(AckMode::MultiAck, &index);

        let round = negotiator.process(&batch(&[1, 2], false));
        assert_eq!(
            round.responses,
            vec![
                ServerResponse { acks: vec![ack(1, AckStatus::Continue), ack(2, AckStatus::Continue)] },
                ServerResponse::nak(),
            ]
        );

        let done = negotiator.process(&batch(&[3], true));
        assert_eq!(
            done.responses,
            vec![
                ServerResponse { acks: vec![ack(3, AckStatus::Continue)] },
                ServerResponse { acks: vec![ack(3, AckStatus::Plain)] },
            ]
        );
    }

    #[test]
    fn test_multi_ack_detailed_common_and_ready() {
        let index = index(&[1]);
        let mut negotiator = Negotiator::new(AckMode::MultiAckDetailed, &index);

        let outcome = negotiator.process(&batch(&[1, 2], true));
        assert_eq!(
            outcome.responses,
            vec![
                ServerResponse { acks: vec![ack(1, AckStatus::Common), ack(2, AckStatus::Ready)] },
                ServerResponse { acks: vec![ack(2, AckStatus::Plain)] },
            ]
        );
    }

    #[test]
    fn test_multi_mode_done_batch_without_haves_after_earlier_rounds() {
        let index = index(&[1]);
        let mut negotiator = Negotiator::new(AckMode::MultiAckDetailed, &index);
        negotiator.process(&batch(&[1], false));

        // Haves accumulated earlier, so the empty ack list is still sent.
        let outcome = negotiator.process(&batch(&[], true));
        assert_eq!(outcome.responses, vec![ServerResponse::nak(), ServerResponse::nak()]);
        assert!(outcome.common.is_empty());
        assert_eq!(negotiator.haves(), &[id(1)]);
    }
}
