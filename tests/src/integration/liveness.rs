//! # Liveness Scenarios
//!
//! Three permissioned validators, two signatures per block. Coordinators run
//! on paused Tokio time, so every wait below is virtual.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shared_crypto::{Secp256k1KeyPair, Signer};
    use tl_04_ledger::ConsensusMode;

    use crate::integration::network::{transfer, wait_for_height, TestNetwork};

    fn three_validators() -> TestNetwork {
        TestNetwork::new(
            3,
            ConsensusMode::Permissioned {
                minimum_signatures: 2,
            },
        )
    }

    fn heads(net: &TestNetwork) -> Vec<Option<shared_types::Hash>> {
        (0..net.nodes().len())
            .map(|i| net.context(i).head().map(|h| h.hash))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_validators_converge_on_one_chain() {
        let net = three_validators();
        let bob = Secp256k1KeyPair::generate();
        net.context(1)
            .submit_transaction(transfer(&net.wallet, &bob.identity(), 40, 0, 1))
            .unwrap();

        net.start_all().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let context = net.context(0);
        assert!(context.height() >= 3, "only {} blocks", context.height());
        let heads = heads(&net);
        assert!(heads.iter().all(|h| *h == heads[0]));

        // every committed block carries a quorum
        for number in 1..=context.height() {
            let header = context.header(number).unwrap();
            assert!(header.signatures.len() >= 2);
        }
        for i in 0..3 {
            assert_eq!(net.context(i).balance(&bob.identity()), 40);
        }

        net.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_validator_turn_is_skipped() {
        let net = three_validators();
        net.start_all().await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let silent = net.node(1).identity().to_string();
        net.mute(1);
        let before = net.context(0).height();

        tokio::time::sleep(Duration::from_secs(10)).await;

        let (a, c) = (net.context(0), net.context(2));
        wait_for_height(a, before + 2).await;
        assert_eq!(a.head(), c.head());

        let producers: Vec<String> = (before + 1..=a.height())
            .map(|number| a.header(number).unwrap().mined_by)
            .collect();
        assert!(!producers.contains(&silent));
        assert!(producers.contains(&net.node(0).identity().to_string()));
        assert!(producers.contains(&net.node(2).identity().to_string()));

        net.shutdown().await;
    }
}
