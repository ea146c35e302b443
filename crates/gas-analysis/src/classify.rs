//! Receipt classification by emitted-event pattern.
//!
//! A single contract often emits the same events for different operations
//! (a Railgun unshield and a private transfer both emit `Nullified`), so the
//! logs returned by a scan are only candidates. Each candidate's receipt is
//! fetched and checked against a [`MatchPolicy`].

use std::collections::HashSet;

use alloy::primitives::B256;
use futures::future::join_all;
use gas_data::chain::{ChainClient, RetryPolicy};
use gas_data::types::{EventSignature, LogEntry, TopicEntry, TxReceipt};

/// Default number of receipt requests in flight per classification.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Required/forbidden `(contract, topic)` sets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Each entry must match at least one log.
    pub required: Vec<TopicEntry>,
    /// No entry may match any log.
    pub forbidden: Vec<TopicEntry>,
}

impl TopicFilter {
    pub fn new(required: Vec<TopicEntry>, forbidden: Vec<TopicEntry>) -> Self {
        Self {
            required,
            forbidden,
        }
    }
}

/// How a receipt's logs must look for the transaction to count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Exactly these events, in this order, and nothing else. Only the topic
    /// is compared, not the emitter.
    ExactSequence(Vec<B256>),
    /// Every required pair present and no forbidden pair present; order and
    /// extra logs are ignored.
    TopicSet(TopicFilter),
}

impl MatchPolicy {
    /// Exact-sequence policy from event signatures.
    pub fn exact(events: &[EventSignature]) -> Self {
        MatchPolicy::ExactSequence(events.iter().map(EventSignature::topic).collect())
    }

    /// Topic-set policy.
    pub fn topic_set(required: Vec<TopicEntry>, forbidden: Vec<TopicEntry>) -> Self {
        MatchPolicy::TopicSet(TopicFilter::new(required, forbidden))
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchPolicy::ExactSequence(_) => "exact-sequence",
            MatchPolicy::TopicSet(_) => "topic-set",
        }
    }
}

/// Whether `receipt`'s logs satisfy `policy`.
pub fn matches(receipt: &TxReceipt, policy: &MatchPolicy) -> bool {
    match policy {
        MatchPolicy::ExactSequence(expected) => {
            receipt.logs.len() == expected.len()
                && receipt
                    .logs
                    .iter()
                    .zip(expected)
                    .all(|(log, topic)| log.topic0 == Some(*topic))
        }
        MatchPolicy::TopicSet(filter) => {
            let emits = |entry: &TopicEntry| {
                receipt
                    .logs
                    .iter()
                    .any(|log| log.is(entry.address, entry.topic))
            };
            filter.required.iter().all(emits) && !filter.forbidden.iter().any(emits)
        }
    }
}

/// Result of classifying a candidate set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassifyOutcome {
    /// Receipts that matched, in candidate order within each batch.
    pub accepted: Vec<TxReceipt>,
    /// Receipts fetched successfully (matched or not).
    pub fetched: usize,
    /// Fetched receipts that did not match the policy.
    pub rejected: usize,
    /// Candidates skipped without a verdict: no tx hash, duplicate hash,
    /// unknown to the node, reverted, or no logs.
    pub skipped: usize,
    /// Candidates whose receipt fetch exhausted its retries.
    pub failed: usize,
}

enum Verdict {
    Accepted(TxReceipt),
    Rejected,
    Skipped,
    Failed,
}

/// Fetches receipts for `candidates` and keeps those matching `policy`.
///
/// Each distinct transaction hash is fetched at most once. Receipts are
/// requested in batches no larger than the number of matches still needed
/// (bounded by `max_in_flight`), so nothing is fetched once `cap` receipts
/// have been accepted.
#[tracing::instrument(skip_all, fields(policy = policy.label(), candidates = candidates.len(), cap = cap))]
pub async fn classify<C: ChainClient>(
    client: &C,
    candidates: &[LogEntry],
    policy: &MatchPolicy,
    cap: usize,
    retry: &RetryPolicy,
    max_in_flight: usize,
) -> ClassifyOutcome {
    let mut outcome = ClassifyOutcome::default();
    let mut seen: HashSet<B256> = HashSet::new();

    let mut pending = Vec::with_capacity(candidates.len());
    for log in candidates {
        match log.tx_hash {
            Some(tx_hash) if seen.insert(tx_hash) => pending.push(tx_hash),
            _ => outcome.skipped += 1,
        }
    }

    let mut queue = pending.into_iter();
    while outcome.accepted.len() < cap {
        let batch_size = (cap - outcome.accepted.len()).min(max_in_flight.max(1));
        let batch: Vec<B256> = queue.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }

        let verdicts = join_all(
            batch
                .iter()
                .map(|tx_hash| judge(client, *tx_hash, policy, retry)),
        )
        .await;

        for verdict in verdicts {
            match verdict {
                Verdict::Accepted(receipt) => {
                    outcome.fetched += 1;
                    outcome.accepted.push(receipt);
                }
                Verdict::Rejected => {
                    outcome.fetched += 1;
                    outcome.rejected += 1;
                }
                Verdict::Skipped => outcome.skipped += 1,
                Verdict::Failed => outcome.failed += 1,
            }
        }
    }

    tracing::info!(
        accepted = outcome.accepted.len(),
        fetched = outcome.fetched,
        rejected = outcome.rejected,
        skipped = outcome.skipped,
        failed = outcome.failed,
        "classification finished"
    );

    outcome
}

async fn judge<C: ChainClient>(
    client: &C,
    tx_hash: B256,
    policy: &MatchPolicy,
    retry: &RetryPolicy,
) -> Verdict {
    let receipt = match retry
        .run("eth_getTransactionReceipt", || client.receipt(tx_hash))
        .await
    {
        Ok(Some(receipt)) => receipt,
        Ok(None) => {
            tracing::debug!(%tx_hash, "receipt not found");
            return Verdict::Skipped;
        }
        Err(e) => {
            tracing::warn!(%tx_hash, error = %e, "dropping candidate");
            return Verdict::Failed;
        }
    };

    if !receipt.status || receipt.logs.is_empty() {
        tracing::debug!(%tx_hash, status = receipt.status, "skipping receipt without logs");
        return Verdict::Skipped;
    }

    if matches(&receipt, policy) {
        Verdict::Accepted(receipt)
    } else {
        Verdict::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address};
    use gas_data::mock::MockChain;
    use gas_data::types::Network;

    const POOL: Address = address!("00000000000000000000000000000000000000aa");
    const TOKEN: Address = address!("00000000000000000000000000000000000000cc");

    const A: EventSignature = EventSignature::new("Alpha", &["uint256"]);
    const B: EventSignature = EventSignature::new("Beta", &["address", "uint256"]);
    const C: EventSignature = EventSignature::new("Gamma", &["bytes32[]"]);

    fn log(address: Address, event: &EventSignature) -> LogEntry {
        LogEntry {
            address,
            topic0: Some(event.topic()),
            tx_hash: None,
            block_number: None,
        }
    }

    fn receipt(n: u8, logs: Vec<LogEntry>) -> TxReceipt {
        TxReceipt {
            tx_hash: B256::with_last_byte(n),
            block_number: Some(100),
            status: true,
            gas_used: 100_000,
            effective_gas_price: 10,
            logs,
        }
    }

    fn candidate(n: u8) -> LogEntry {
        LogEntry {
            address: POOL,
            topic0: Some(A.topic()),
            tx_hash: Some(B256::with_last_byte(n)),
            block_number: Some(100),
        }
    }

    fn abc_set() -> MatchPolicy {
        MatchPolicy::topic_set(
            vec![
                TopicEntry::new(POOL, &A),
                TopicEntry::new(POOL, &B),
                TopicEntry::new(POOL, &C),
            ],
            vec![],
        )
    }

    #[test]
    fn exact_sequence_accepts_same_order() {
        let r = receipt(1, vec![log(POOL, &A), log(POOL, &B), log(POOL, &C)]);
        assert!(matches(&r, &MatchPolicy::exact(&[A, B, C])));
    }

    #[test]
    fn exact_sequence_rejects_reordered_but_topic_set_accepts() {
        let r = receipt(1, vec![log(POOL, &A), log(POOL, &C), log(POOL, &B)]);
        assert!(!matches(&r, &MatchPolicy::exact(&[A, B, C])));
        assert!(matches(&r, &abc_set()));
    }

    #[test]
    fn exact_sequence_rejects_extra_logs() {
        let r = receipt(
            1,
            vec![log(POOL, &A), log(POOL, &B), log(POOL, &C), log(TOKEN, &A)],
        );
        assert!(!matches(&r, &MatchPolicy::exact(&[A, B, C])));
        assert!(matches(&r, &abc_set()), "topic set tolerates incidental logs");
    }

    #[test]
    fn topic_set_rejects_forbidden_topic() {
        let policy = MatchPolicy::topic_set(
            vec![TopicEntry::new(POOL, &A), TopicEntry::new(POOL, &B)],
            vec![TopicEntry::new(POOL, &C)],
        );
        let clean = receipt(1, vec![log(POOL, &A), log(POOL, &B)]);
        let tainted = receipt(2, vec![log(POOL, &A), log(POOL, &B), log(POOL, &C)]);
        assert!(matches(&clean, &policy));
        assert!(!matches(&tainted, &policy));
    }

    #[test]
    fn topic_set_compares_emitter_address() {
        let policy = MatchPolicy::topic_set(vec![TopicEntry::new(POOL, &A)], vec![]);
        let wrong_emitter = receipt(1, vec![log(TOKEN, &A)]);
        assert!(!matches(&wrong_emitter, &policy));

        let forbid_token = MatchPolicy::topic_set(
            vec![TopicEntry::new(POOL, &A)],
            vec![TopicEntry::new(TOKEN, &A)],
        );
        let pool_only = receipt(2, vec![log(POOL, &A)]);
        assert!(matches(&pool_only, &forbid_token));
    }

    #[tokio::test]
    async fn classify_keeps_only_matching_receipts() {
        let chain = MockChain::new(Network::Ethereum, 200)
            .with_receipt(receipt(1, vec![log(POOL, &A), log(POOL, &B)]))
            .with_receipt(receipt(2, vec![log(POOL, &B), log(POOL, &A)]))
            .with_receipt(receipt(3, vec![log(POOL, &A), log(POOL, &B)]));
        let candidates = vec![candidate(1), candidate(2), candidate(3)];

        let outcome = classify(
            &chain,
            &candidates,
            &MatchPolicy::exact(&[A, B]),
            10,
            &RetryPolicy::immediate(2),
            DEFAULT_MAX_IN_FLIGHT,
        )
        .await;

        let hashes: Vec<B256> = outcome.accepted.iter().map(|r| r.tx_hash).collect();
        assert_eq!(hashes, vec![B256::with_last_byte(1), B256::with_last_byte(3)]);
        assert_eq!(outcome.fetched, 3);
        assert_eq!(outcome.rejected, 1);
    }

    #[tokio::test]
    async fn classify_fetches_each_hash_once() {
        let chain = MockChain::new(Network::Ethereum, 200)
            .with_receipt(receipt(1, vec![log(POOL, &A)]));
        let candidates = vec![candidate(1), candidate(1), candidate(1)];

        let outcome = classify(
            &chain,
            &candidates,
            &MatchPolicy::exact(&[A]),
            10,
            &RetryPolicy::immediate(2),
            DEFAULT_MAX_IN_FLIGHT,
        )
        .await;

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(chain.receipt_requests(), vec![B256::with_last_byte(1)]);
        assert_eq!(outcome.skipped, 2);
    }

    #[tokio::test]
    async fn classify_stops_fetching_at_cap() {
        let mut chain = MockChain::new(Network::Ethereum, 200);
        for n in 1..=20 {
            chain = chain.with_receipt(receipt(n, vec![log(POOL, &A)]));
        }
        let candidates: Vec<LogEntry> = (1..=20).map(candidate).collect();

        let outcome = classify(
            &chain,
            &candidates,
            &MatchPolicy::exact(&[A]),
            5,
            &RetryPolicy::immediate(2),
            DEFAULT_MAX_IN_FLIGHT,
        )
        .await;

        assert_eq!(outcome.accepted.len(), 5);
        assert_eq!(chain.receipt_requests().len(), 5);
    }

    #[tokio::test]
    async fn classify_tops_up_after_rejections() {
        let mut chain = MockChain::new(Network::Ethereum, 200);
        for n in 1..=6 {
            let logs = if n % 2 == 0 {
                vec![log(POOL, &A)]
            } else {
                vec![log(POOL, &B)]
            };
            chain = chain.with_receipt(receipt(n, logs));
        }
        let candidates: Vec<LogEntry> = (1..=6).map(candidate).collect();

        let outcome = classify(
            &chain,
            &candidates,
            &MatchPolicy::exact(&[A]),
            2,
            &RetryPolicy::immediate(2),
            DEFAULT_MAX_IN_FLIGHT,
        )
        .await;

        // batches: [1,2] -> 1 accepted, [3] -> rejected, [4] -> accepted
        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(chain.receipt_requests().len(), 4);
    }

    #[tokio::test]
    async fn classify_skips_unusable_candidates() {
        let mut reverted = receipt(3, vec![log(POOL, &A)]);
        reverted.status = false;
        let chain = MockChain::new(Network::Ethereum, 200)
            .with_receipt(receipt(1, vec![]))
            .with_receipt(reverted)
            .with_receipt(receipt(4, vec![log(POOL, &A)]));
        let no_hash = LogEntry {
            tx_hash: None,
            ..candidate(9)
        };
        let candidates = vec![no_hash, candidate(1), candidate(2), candidate(3), candidate(4)];

        let outcome = classify(
            &chain,
            &candidates,
            &MatchPolicy::exact(&[A]),
            10,
            &RetryPolicy::immediate(2),
            DEFAULT_MAX_IN_FLIGHT,
        )
        .await;

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].tx_hash, B256::with_last_byte(4));
        // no hash, zero logs, unknown to node, reverted
        assert_eq!(outcome.skipped, 4);
        assert_eq!(outcome.rejected, 0);
    }

    #[tokio::test]
    async fn classify_drops_receipts_that_keep_failing() {
        let chain = MockChain::new(Network::Ethereum, 200)
            .with_receipt(receipt(1, vec![log(POOL, &A)]))
            .with_receipt(receipt(2, vec![log(POOL, &A)]))
            .with_receipt(receipt(3, vec![log(POOL, &A)]))
            .fail_receipt(B256::with_last_byte(2), 1)
            .break_receipt(B256::with_last_byte(3));
        let candidates = vec![candidate(1), candidate(2), candidate(3)];

        let outcome = classify(
            &chain,
            &candidates,
            &MatchPolicy::exact(&[A]),
            10,
            &RetryPolicy::immediate(2),
            DEFAULT_MAX_IN_FLIGHT,
        )
        .await;

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.failed, 1);
    }
}
