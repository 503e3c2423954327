//! # Fork Scenarios
//!
//! Two proof-of-work nodes from the same genesis mine their own branches
//! without hearing from each other, then exchange blocks by hand.

#[cfg(test)]
mod tests {
    use shared_crypto::{Secp256k1KeyPair, Signer};
    use shared_types::Block;
    use tl_04_ledger::{ConsensusMode, RouteOutcome};

    use crate::integration::network::{produce, transfer, TestNetwork};

    fn isolated_pair() -> TestNetwork {
        let net = TestNetwork::new(2, ConsensusMode::ProofOfWork);
        net.mute_all();
        net
    }

    async fn branch(net: &TestNetwork, index: usize, length: usize) -> Vec<Block> {
        let proposer = net.node(index).identity().to_string();
        let mut blocks = Vec::with_capacity(length);
        for _ in 0..length {
            blocks.push(produce(net.context(index), &proposer).await);
        }
        blocks
    }

    #[tokio::test]
    async fn test_equal_work_keeps_current_head() {
        let net = isolated_pair();
        let ours = branch(&net, 0, 2).await;
        let theirs = branch(&net, 1, 2).await;
        let head = net.context(0).head().unwrap();
        assert_eq!(head.hash, ours[1].hash());

        let node = net.node(0);
        assert_eq!(
            node.accept_block(theirs[0].clone()).await.unwrap(),
            RouteOutcome::Pooled
        );
        // same length, same total difficulty
        assert_eq!(
            node.accept_block(theirs[1].clone()).await.unwrap(),
            RouteOutcome::KeptCurrent
        );
        assert_eq!(net.context(0).head(), Some(head));
    }

    #[tokio::test]
    async fn test_heavier_branch_reorganizes_and_requeues() {
        let net = isolated_pair();
        let bob = Secp256k1KeyPair::generate();
        let tx = transfer(&net.wallet, &bob.identity(), 25, 0, 1);
        net.context(0).submit_transaction(tx.clone()).unwrap();

        let ours = branch(&net, 0, 2).await;
        assert_eq!(ours[0].transactions.len(), 2);
        assert_eq!(net.context(0).balance(&bob.identity()), 25);

        let theirs = branch(&net, 1, 3).await;
        let node = net.node(0);
        node.accept_block(theirs[0].clone()).await.unwrap();
        node.accept_block(theirs[1].clone()).await.unwrap();
        match node.accept_block(theirs[2].clone()).await.unwrap() {
            RouteOutcome::Reorganized {
                fork_point,
                new_head,
                displaced,
            } => {
                assert_eq!(fork_point, 0);
                assert_eq!(new_head, 3);
                assert_eq!(displaced, ours);
            }
            other => panic!("expected reorganization, got {other:?}"),
        }

        let context = net.context(0);
        assert_eq!(context.head().map(|h| h.hash), Some(theirs[2].hash()));
        assert_eq!(context.balance(&bob.identity()), 0);
        assert!(context.find_transaction(&tx.hash).unwrap().is_none());
        // the displaced transfer is pending again
        assert_eq!(context.mempool_size(), 1);

        let proposer = node.identity().to_string();
        let next = produce(context, &proposer).await;
        assert_eq!(next.number(), 4);
        assert!(next.transactions.iter().any(|t| t.hash == tx.hash));
        assert_eq!(context.balance(&bob.identity()), 25);
    }

    #[tokio::test]
    async fn test_known_block_rejected_as_duplicate() {
        let net = isolated_pair();
        let ours = branch(&net, 0, 1).await;
        let node = net.node(0);
        assert!(node.accept_block(ours[0].clone()).await.is_err());
        assert_eq!(net.context(0).height(), 1);
    }
}
