//! Determinism testing utilities.
//!
//! The simulation must produce identical results given identical seeds
//! and per-tick inputs. Sources of non-determinism this harness exists
//! to catch:
//!
//! - **Floating-point math**: different CPUs can round differently.
//!   The core uses fixed-point throughout; any float sneaking in shows
//!   up here as a hash mismatch.
//! - **HashMap iteration order**: Rust's default hasher is randomized
//!   per process. All simulation-visible iteration goes through sorted
//!   ids; a forgotten sort diverges across runs.
//! - **Unseeded randomness**: every roll must come from the one seeded
//!   generator owned by the simulation state.
//!
//! # Test Levels
//!
//! 1. Unit tests: individual systems are deterministic
//! 2. Property tests: random-but-reproducible inputs stay deterministic
//! 3. Integration tests: full battles replay exactly
//! 4. Parallel tests: N simulations on N threads all agree

use std::thread;

use firefight_core::simulation::{PlayerInput, Simulation};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Final hash from each run.
    pub hashes: Vec<u64>,
    /// Ticks simulated per run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// All distinct hashes (should be exactly one).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert the runs agreed, with a detailed message.
    ///
    /// # Panics
    ///
    /// Panics when runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine several times and compare final hashes.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for tick in 0..ticks {
            step(&mut state, tick);
        }
        hashes.push(hash(&state));
    }

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Verify a simulation setup replays identically under a scripted
/// input sequence. The script function maps tick number to input, so
/// orders and shots land on the same ticks in every run.
pub fn verify_simulation_determinism<Setup, Script>(
    setup: Setup,
    script: Script,
    runs: usize,
    ticks: u64,
) -> DeterminismResult
where
    Setup: Fn() -> Simulation,
    Script: Fn(u64) -> PlayerInput,
{
    verify_determinism(
        runs,
        ticks,
        setup,
        |sim, tick| {
            sim.tick(&script(tick));
        },
        Simulation::state_hash,
    )
}

/// Run N simulations on parallel threads and compare final hashes.
/// Catches non-determinism that only shows under scheduling or memory
/// layout variation.
pub fn run_parallel_simulations<Setup>(
    setup: Setup,
    num_sims: usize,
    num_ticks: u64,
) -> DeterminismResult
where
    Setup: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|scope| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                scope.spawn(|| {
                    let mut sim = setup();
                    let input = PlayerInput::default();
                    for _ in 0..num_ticks {
                        sim.tick(&input);
                    }
                    sim.state_hash()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect::<Vec<u64>>()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Tick two identical simulations side by side, returning the first
/// tick at which their hashes diverge. `None` means full agreement.
pub fn find_first_divergence<Setup>(setup: Setup, num_ticks: u64) -> Option<u64>
where
    Setup: Fn() -> Simulation,
{
    let mut a = setup();
    let mut b = setup();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    let input = PlayerInput::default();
    for tick in 1..=num_ticks {
        a.tick(&input);
        b.tick(&input);
        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }
    None
}

/// Verify the bincode round-trip preserves state exactly after some
/// ticks of play.
pub fn verify_serialization_determinism<Setup>(setup: Setup, num_ticks: u64) -> bool
where
    Setup: Fn() -> Simulation,
{
    let mut sim = setup();
    let input = PlayerInput::default();
    for _ in 0..num_ticks {
        sim.tick(&input);
    }

    let hash_before = sim.state_hash();
    let Ok(bytes) = sim.serialize() else { return false };
    let Ok(restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    hash_before == restored.state_hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bare_world, enemy_fixture, small_world, vec2};
    use firefight_core::player::MoveIntent;
    use firefight_core::simulation::SquadOrder;
    use firefight_core::variants::EnemyVariant;
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n, _| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_full_world_determinism() {
        let result = verify_simulation_determinism(
            || small_world(11),
            |_| PlayerInput::default(),
            3,
            300,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_determinism_with_player_activity() {
        // Movement, shooting, and orders all on scripted ticks.
        let script = |tick: u64| {
            let mut input = PlayerInput {
                movement: MoveIntent {
                    right: tick % 3 != 0,
                    down: tick % 5 != 0,
                    ..Default::default()
                },
                ..Default::default()
            };
            if tick % 40 == 7 {
                input.shoot_at = Some(vec2(700, 500));
            }
            if tick == 60 {
                input.order = Some(SquadOrder::CycleFormation);
            }
            if tick == 120 {
                input.order = Some(SquadOrder::Defend {
                    point: vec2(300, 300),
                    radius_tiles: 5,
                });
            }
            if tick == 200 {
                input.order = Some(SquadOrder::Recall);
            }
            input
        };

        let result = verify_simulation_determinism(|| small_world(23), script, 3, 300);
        result.assert_deterministic();
    }

    #[test]
    fn test_combat_scenario_determinism() {
        // A hand-built skirmish: two soldiers flanking the player.
        let setup = || {
            let mut sim = bare_world(31);
            let player_pos = sim
                .agents()
                .get(sim.player_id())
                .expect("player exists")
                .position;
            for offset in [vec2(80, 0), vec2(-80, 30)] {
                let id = sim.alloc_id();
                sim.insert_agent(enemy_fixture(id, EnemyVariant::Soldier, player_pos + offset));
            }
            sim
        };

        let result =
            verify_simulation_determinism(setup, |_| PlayerInput::default(), 4, 400);
        result.assert_deterministic();
    }

    #[test]
    fn test_no_divergence_over_long_run() {
        assert_eq!(find_first_divergence(|| small_world(5), 500), None);
    }

    #[test]
    fn test_parallel_simulations_agree() {
        let result = run_parallel_simulations(|| small_world(77), 4, 200);
        result.assert_deterministic();
    }

    #[test]
    fn test_serialization_roundtrip_mid_battle() {
        assert!(verify_serialization_determinism(|| small_world(13), 150));
    }

    proptest! {
        /// Any seed must produce a self-consistent, replayable world.
        #[test]
        fn prop_any_seed_is_deterministic(seed in 0u64..10_000) {
            let result = verify_simulation_determinism(
                || small_world(seed),
                |_| PlayerInput::default(),
                2,
                60,
            );
            prop_assert!(result.is_deterministic);
        }

        /// Random movement scripts replay exactly.
        #[test]
        fn prop_movement_scripts_replay(
            seed in 0u64..1_000,
            right_mod in 2u64..7,
            down_mod in 2u64..7,
        ) {
            let script = move |tick: u64| PlayerInput {
                movement: MoveIntent {
                    right: tick % right_mod == 0,
                    down: tick % down_mod == 0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let result = verify_simulation_determinism(
                || small_world(seed),
                script,
                2,
                80,
            );
            prop_assert!(result.is_deterministic);
        }

        /// Serialization is exact at arbitrary cut points.
        #[test]
        fn prop_serialization_exact_at_any_tick(
            seed in 0u64..1_000,
            ticks in 0u64..100,
        ) {
            prop_assert!(verify_serialization_determinism(|| small_world(seed), ticks));
        }
    }
}
