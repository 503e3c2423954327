//! # Settlement Scenarios
//!
//! A single proof-of-work validator node, driven by its own coordinator
//! unless a test needs exact control over block boundaries.
//!
//! - transfer with fee: sender pays amount plus fee, receiver gets amount
//! - two payables over one call: only the first settles
//! - rollback 10 → 5: spent hashes and balances restored, entries requeued

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared_crypto::{Secp256k1KeyPair, Signer};
    use shared_types::{Account, AccountKind, Amount, Block, Transaction, TransactionKind};
    use tl_02_validator::{ContractInfo, ContractMethod};
    use tl_04_ledger::{ChainVerdict, ConsensusMode};

    use crate::integration::network::{
        produce, transfer, wait_for_height, TestNetwork, ALLOCATION,
    };

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn solo_with_fee(fee_per_byte: Amount) -> TestNetwork {
        TestNetwork::build(1, |config| {
            config.ledger.consensus = ConsensusMode::ProofOfWork;
            config.validator.fee_per_byte = fee_per_byte;
        })
    }

    /// Accounts `alice` (the wallet), `bob` and contract `vault` whose
    /// `withdraw` emits a payable.
    fn register_vault(net: &TestNetwork, bob: &Secp256k1KeyPair) {
        let context = net.context(0);
        let vault = Secp256k1KeyPair::generate();
        for (name, key, kind) in [
            ("alice", net.wallet.identity(), AccountKind::User),
            ("bob", bob.identity(), AccountKind::User),
            ("vault", vault.identity(), AccountKind::Contract),
        ] {
            context
                .accounts()
                .add_account(Account {
                    name: name.into(),
                    owner_key: key,
                    kind,
                })
                .unwrap();
        }
        context
            .contracts()
            .add_contract(ContractInfo {
                name: "vault".into(),
                account: "alice".into(),
                methods: [(
                    "withdraw".to_string(),
                    ContractMethod {
                        emits: Some("Payable".into()),
                    },
                )]
                .into_iter()
                .collect(),
            })
            .unwrap();
    }

    fn withdraw(net: &TestNetwork) -> Transaction {
        let mut tx = Transaction::new(
            TransactionKind::Call,
            "alice",
            "vault",
            10,
            json!({"method": "withdraw", "params": {}}),
            1_700_000_000_000,
            1,
            0,
        );
        tx.signature = Signer::sign(&net.wallet, &tx.hash);
        tx
    }

    fn payable(reference: &Transaction, nonce: u64) -> Transaction {
        Transaction::new(
            TransactionKind::Payable {
                from_contract: "vault".into(),
                reference: Box::new(reference.clone()),
            },
            "alice",
            "bob",
            5,
            json!({}),
            1_700_000_000_001,
            nonce,
            0,
        )
    }

    fn contains(block: &Block, tx: &Transaction) -> bool {
        block.transactions.iter().any(|t| t.hash == tx.hash)
    }

    // =========================================================================
    // TRANSFERS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_transfer_debits_amount_and_fee() {
        let net = solo_with_fee(1);
        let context = net.context(0);
        let bob = Secp256k1KeyPair::generate();
        assert_eq!(context.balance(&net.wallet.identity()), ALLOCATION);

        let fee = transfer(&net.wallet, &bob.identity(), 100, 0, 1).fee_basis_size() as Amount;
        let underpaid = transfer(&net.wallet, &bob.identity(), 100, fee - 1, 1);
        assert!(context.submit_transaction(underpaid).is_err());

        let tx = transfer(&net.wallet, &bob.identity(), 100, fee, 1);
        context.submit_transaction(tx.clone()).unwrap();

        net.start_all().await;
        wait_for_height(context, 1).await;

        assert_eq!(context.balance(&net.wallet.identity()), 900 - fee);
        assert_eq!(context.balance(&bob.identity()), 100);
        assert_eq!(context.find_transaction(&tx.hash).unwrap().map(|(n, _)| n), Some(1));
        assert_eq!(context.mempool_size(), 0);

        let activity = context.history(&bob.identity()).unwrap();
        assert_eq!(activity.received, vec![tx]);
        assert_eq!(context.validate_entire_chain().unwrap(), ChainVerdict::Valid);

        net.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_overdraft_never_reaches_a_block() {
        let net = solo_with_fee(0);
        let context = net.context(0);
        let bob = Secp256k1KeyPair::generate();

        let first = transfer(&net.wallet, &bob.identity(), 600, 0, 1);
        let second = transfer(&net.wallet, &bob.identity(), 600, 0, 2);
        // each is covered by the committed balance on its own
        context.submit_transaction(first).unwrap();
        context.submit_transaction(second).unwrap();

        net.start_all().await;
        wait_for_height(context, 2).await;

        assert_eq!(context.balance(&bob.identity()), 600);
        assert_eq!(context.balance(&net.wallet.identity()), 400);
        assert_eq!(context.mempool_size(), 0);

        net.shutdown().await;
    }

    // =========================================================================
    // PAYABLES
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_second_payable_on_same_call_is_double_use() {
        let net = solo_with_fee(0);
        let context = net.context(0);
        let bob = Secp256k1KeyPair::generate();
        register_vault(&net, &bob);

        let call = withdraw(&net);
        context.submit_transaction(call.clone()).unwrap();
        net.start_all().await;
        wait_for_height(context, 1).await;

        let first = payable(&call, 2);
        let second = payable(&call, 3);
        context.submit_transaction(first.clone()).unwrap();
        context.submit_transaction(second.clone()).unwrap();

        let height = context.height();
        wait_for_height(context, height + 1).await;

        let block = context.block(height + 1).unwrap().unwrap();
        let (winner, loser) = if contains(&block, &first) {
            (first, second)
        } else {
            (second, first)
        };
        assert!(contains(&block, &winner));
        assert!(!contains(&block, &loser));
        assert_eq!(context.mempool_size(), 0);
        assert_eq!(context.balance("bob"), 5);

        let err = context.submit_transaction(loser).unwrap_err();
        assert!(err.is_double_use(), "unexpected error: {err}");

        net.shutdown().await;
    }

    // =========================================================================
    // ROLLBACK
    // =========================================================================

    #[tokio::test]
    async fn test_rollback_ten_to_five() {
        let net = solo_with_fee(0);
        let context = net.context(0);
        let proposer = net.node(0).identity().to_string();
        let bob = Secp256k1KeyPair::generate();

        let mut transfers = Vec::new();
        for nonce in 1..=10 {
            let tx = transfer(&net.wallet, &bob.identity(), 10, 0, nonce);
            context.submit_transaction(tx.clone()).unwrap();
            let block = produce(context, &proposer).await;
            assert!(block.transactions.iter().any(|t| t.hash == tx.hash));
            transfers.push(tx);
        }
        assert_eq!(context.height(), 10);
        assert_eq!(context.balance(&bob.identity()), 100);

        let removed = context.rollback_to_block(5).unwrap();
        assert_eq!(
            removed.iter().map(Block::number).collect::<Vec<_>>(),
            vec![6, 7, 8, 9, 10]
        );
        assert_eq!(context.head().map(|h| h.block_number), Some(5));
        assert!(context.header(6).is_none());
        assert_eq!(context.balance(&bob.identity()), 50);

        for tx in &transfers[..5] {
            assert!(context.find_transaction(&tx.hash).unwrap().is_some());
        }
        for tx in &transfers[5..] {
            assert!(context.find_transaction(&tx.hash).unwrap().is_none());
        }
        // unspent again, so back in the mempool
        assert_eq!(context.mempool_size(), 5);
        let pending = context.history(&net.wallet.identity()).unwrap().pending;
        assert_eq!(pending.sent.len(), 5);
        assert_eq!(context.validate_entire_chain().unwrap(), ChainVerdict::Valid);

        let block = produce(context, &proposer).await;
        assert_eq!(block.number(), 6);
        assert_eq!(block.transactions.len(), 6);
        assert_eq!(context.balance(&bob.identity()), 100);
    }
}
