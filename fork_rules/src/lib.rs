use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

/// Block number meaning "active from genesis".
pub const GENESIS_ACTIVATION: u64 = 0;
/// Block number used by the `*At5` networks to exercise a transition edge.
pub const TRANSITION_ACTIVATION: u64 = 5;
/// Sentinel activation block that no test chain reaches.
pub const INACTIVE_SENTINEL: u64 = 2000;

pub const DAO_BLOCK_KEY: &str = "SIM_FORK_DAO_BLOCK";
pub const DAO_VOTE_KEY: &str = "SIM_FORK_DAO_VOTE";
pub const SKIP_POW_KEY: &str = "SIM_SKIP_POW";

/// Seal-engine mode for vectors carrying unsealed blocks.
pub const NO_PROOF_SEAL: &str = "NoProof";

/// Protocol rule changes in canonical activation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ForkFlag {
    Homestead,
    Tangerine,
    Spurious,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
}

impl ForkFlag {
    /// The ladder of cumulative forks. `SIM_FORK_DAO_BLOCK` is not part of
    /// it: the DAO fork never participates in the cumulative schedule and
    /// stays at the sentinel except for the one network that tests it.
    pub const LADDER: [ForkFlag; 7] = [
        ForkFlag::Homestead,
        ForkFlag::Tangerine,
        ForkFlag::Spurious,
        ForkFlag::Byzantium,
        ForkFlag::Constantinople,
        ForkFlag::Petersburg,
        ForkFlag::Istanbul,
    ];

    pub const fn env_key(self) -> &'static str {
        match self {
            ForkFlag::Homestead => "SIM_FORK_HOMESTEAD",
            ForkFlag::Tangerine => "SIM_FORK_TANGERINE",
            ForkFlag::Spurious => "SIM_FORK_SPURIOUS",
            ForkFlag::Byzantium => "SIM_FORK_BYZANTIUM",
            ForkFlag::Constantinople => "SIM_FORK_CONSTANTINOPLE",
            ForkFlag::Petersburg => "SIM_FORK_PETERSBURG",
            ForkFlag::Istanbul => "SIM_FORK_ISTANBUL",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("network {0} not defined in ruleset")]
pub struct UnknownNetwork(pub String);

/// Per-network schedule, encoded against the ladder rather than spelled out
/// flag by flag: the first `active` ladder forks activate at genesis, forks
/// up to `transition` activate at block 5, everything after stays at the
/// sentinel. `dao_block` is carried separately.
#[derive(Clone, Copy, Debug)]
struct NetworkRules {
    active: usize,
    transition: usize,
    dao_block: u64,
}

fn network_rules(network: &str) -> Option<NetworkRules> {
    let plain = |active| NetworkRules {
        active,
        transition: active,
        dao_block: INACTIVE_SENTINEL,
    };
    let edge = |active, transition| NetworkRules {
        active,
        transition,
        dao_block: INACTIVE_SENTINEL,
    };

    Some(match network {
        "Frontier" => plain(0),
        "Homestead" => plain(1),
        "EIP150" => plain(2),
        "EIP158" => plain(3),
        "Byzantium" => plain(4),
        "Constantinople" => plain(5),
        "ConstantinopleFix" => plain(6),
        "Istanbul" => plain(7),
        "FrontierToHomesteadAt5" => edge(0, 1),
        "HomesteadToEIP150At5" => edge(1, 2),
        "HomesteadToDaoAt5" => NetworkRules {
            active: 1,
            transition: 1,
            dao_block: TRANSITION_ACTIVATION,
        },
        "EIP158ToByzantiumAt5" => edge(3, 4),
        "ByzantiumToConstantinopleAt5" => edge(4, 5),
        // ConstantinopleFix reverts EIP-1283, so the fix network lifts both
        // Constantinople and Petersburg at the same edge.
        "ByzantiumToConstantinopleFixAt5" => edge(4, 6),
        "ConstantinopleFixToIstanbulAt5" => edge(6, 7),
        _ => return None,
    })
}

/// Whether `network` has an entry in the ruleset.
pub fn is_known(network: &str) -> bool {
    network_rules(network).is_some()
}

/// Resolve a network name to its fork-activation thresholds.
pub fn resolve(network: &str) -> Result<BTreeMap<&'static str, u64>, UnknownNetwork> {
    let rules =
        network_rules(network).ok_or_else(|| UnknownNetwork(network.to_string()))?;

    let mut thresholds = BTreeMap::new();
    for (position, flag) in ForkFlag::LADDER.iter().enumerate() {
        let activation = if position < rules.active {
            GENESIS_ACTIVATION
        } else if position < rules.transition {
            TRANSITION_ACTIVATION
        } else {
            INACTIVE_SENTINEL
        };
        thresholds.insert(flag.env_key(), activation);
    }
    thresholds.insert(DAO_BLOCK_KEY, rules.dao_block);
    Ok(thresholds)
}

/// Write the fork flags for `network` into a node environment, plus the
/// engine flags derived from the vector: skip-PoW when the seal engine is
/// `NoProof`, and DAO-vote acceptance unconditionally.
pub fn apply(
    network: &str,
    seal_engine: &str,
    env: &mut HashMap<String, String>,
) -> Result<(), UnknownNetwork> {
    for (key, activation) in resolve(network)? {
        env.insert(key.to_string(), activation.to_string());
    }
    if seal_engine == NO_PROOF_SEAL {
        env.insert(SKIP_POW_KEY.to_string(), "1".to_string());
    }
    env.insert(DAO_VOTE_KEY.to_string(), "1".to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const ALL_NETWORKS: [&str; 15] = [
        "Frontier",
        "Homestead",
        "EIP150",
        "EIP158",
        "Byzantium",
        "Constantinople",
        "ConstantinopleFix",
        "Istanbul",
        "FrontierToHomesteadAt5",
        "HomesteadToEIP150At5",
        "HomesteadToDaoAt5",
        "EIP158ToByzantiumAt5",
        "ByzantiumToConstantinopleAt5",
        "ByzantiumToConstantinopleFixAt5",
        "ConstantinopleFixToIstanbulAt5",
    ];

    #[test]
    fn every_network_resolves_every_flag_exactly_once() {
        for network in ALL_NETWORKS {
            let thresholds = resolve(network).unwrap();
            assert_eq!(thresholds.len(), ForkFlag::LADDER.len() + 1, "{network}");
            for flag in ForkFlag::LADDER {
                assert!(thresholds.contains_key(flag.env_key()), "{network}");
            }
            assert!(thresholds.contains_key(DAO_BLOCK_KEY), "{network}");
        }
    }

    #[test]
    fn ladder_thresholds_are_monotonically_non_decreasing() {
        for network in ALL_NETWORKS {
            let thresholds = resolve(network).unwrap();
            let mut previous = 0;
            for flag in ForkFlag::LADDER {
                let activation = thresholds[flag.env_key()];
                assert!(
                    activation >= previous,
                    "{network}: {} activates at {activation} after {previous}",
                    flag.env_key(),
                );
                previous = activation;
            }
        }
    }

    #[rstest]
    #[case("Frontier", 0)]
    #[case("Homestead", 1)]
    #[case("EIP150", 2)]
    #[case("EIP158", 3)]
    #[case("Byzantium", 4)]
    #[case("Constantinople", 5)]
    #[case("ConstantinopleFix", 6)]
    #[case("Istanbul", 7)]
    fn plain_networks_activate_a_ladder_prefix_at_genesis(
        #[case] network: &str,
        #[case] active: usize,
    ) {
        let thresholds = resolve(network).unwrap();
        for (position, flag) in ForkFlag::LADDER.iter().enumerate() {
            let expected = if position < active {
                GENESIS_ACTIVATION
            } else {
                INACTIVE_SENTINEL
            };
            assert_eq!(thresholds[flag.env_key()], expected, "{network}");
        }
        assert_eq!(thresholds[DAO_BLOCK_KEY], INACTIVE_SENTINEL);
    }

    #[rstest]
    #[case("FrontierToHomesteadAt5", ForkFlag::Homestead)]
    #[case("HomesteadToEIP150At5", ForkFlag::Tangerine)]
    #[case("EIP158ToByzantiumAt5", ForkFlag::Byzantium)]
    #[case("ByzantiumToConstantinopleAt5", ForkFlag::Constantinople)]
    #[case("ConstantinopleFixToIstanbulAt5", ForkFlag::Istanbul)]
    fn transition_networks_lower_the_edge_fork_to_block_five(
        #[case] network: &str,
        #[case] edge: ForkFlag,
    ) {
        let thresholds = resolve(network).unwrap();
        assert_eq!(thresholds[edge.env_key()], TRANSITION_ACTIVATION);

        let edge_position = ForkFlag::LADDER.iter().position(|f| *f == edge).unwrap();
        for flag in &ForkFlag::LADDER[edge_position + 1..] {
            assert_eq!(thresholds[flag.env_key()], INACTIVE_SENTINEL, "{network}");
        }
    }

    #[test]
    fn constantinople_fix_transition_lifts_both_forks() {
        let thresholds = resolve("ByzantiumToConstantinopleFixAt5").unwrap();
        assert_eq!(
            thresholds[ForkFlag::Constantinople.env_key()],
            TRANSITION_ACTIVATION
        );
        assert_eq!(
            thresholds[ForkFlag::Petersburg.env_key()],
            TRANSITION_ACTIVATION
        );
        assert_eq!(thresholds[ForkFlag::Istanbul.env_key()], INACTIVE_SENTINEL);
    }

    #[test]
    fn dao_transition_only_lowers_the_dao_block() {
        let thresholds = resolve("HomesteadToDaoAt5").unwrap();
        assert_eq!(thresholds[DAO_BLOCK_KEY], TRANSITION_ACTIVATION);
        assert_eq!(
            thresholds[ForkFlag::Homestead.env_key()],
            GENESIS_ACTIVATION
        );
        assert_eq!(
            thresholds[ForkFlag::Tangerine.env_key()],
            INACTIVE_SENTINEL
        );
    }

    #[test]
    fn unknown_network_is_an_error() {
        let err = resolve("Petersburg2").unwrap_err();
        assert_eq!(err, UnknownNetwork("Petersburg2".to_string()));
        assert!(!is_known("Petersburg2"));
    }

    #[test]
    fn apply_sets_skip_pow_only_for_no_proof_vectors() {
        let mut env = HashMap::new();
        apply("Frontier", NO_PROOF_SEAL, &mut env).unwrap();
        assert_eq!(env.get(SKIP_POW_KEY).map(String::as_str), Some("1"));
        assert_eq!(env.get(DAO_VOTE_KEY).map(String::as_str), Some("1"));
        assert_eq!(
            env.get(ForkFlag::Homestead.env_key()).map(String::as_str),
            Some("2000")
        );

        let mut env = HashMap::new();
        apply("Frontier", "Ethash", &mut env).unwrap();
        assert!(!env.contains_key(SKIP_POW_KEY));
        assert_eq!(env.get(DAO_VOTE_KEY).map(String::as_str), Some("1"));
    }

    #[test]
    fn apply_rejects_unknown_networks() {
        let mut env = HashMap::new();
        assert!(apply("Mainnet", "Ethash", &mut env).is_err());
        assert!(env.is_empty());
    }
}
